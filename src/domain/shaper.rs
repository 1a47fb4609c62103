use std::net::Ipv4Addr;
use std::sync::Mutex;

use crate::domain::ids::SliceName;

/// Abstract edge-shaping interface (spec.md §4.6 C8, §6): out-of-process
/// executables invoked with `(sliceName, capacityPct, srcIp, dstIp, ifname)`
/// on create and `(sliceName, ifname)` on destroy. Return codes are
/// advisory; the controller never blocks on completion (spec.md §6).
pub trait Shaper: Send + Sync {
    fn create(&self, slice: &SliceName, pct: u32, src_ip: Ipv4Addr, dst_ip: Ipv4Addr, ifname: &str);
    fn destroy(&self, slice: &SliceName, ifname: &str);
}

/// Fire-and-forget subprocess shaper, matching `subprocess.Popen(...)` calls
/// to `queue_create.sh`/`queue_delete.sh` in the original controller.
pub struct ProcessShaper {
    create_script: String,
    destroy_script: String,
}

impl ProcessShaper {
    pub fn new(create_script: impl Into<String>, destroy_script: impl Into<String>) -> Self {
        Self { create_script: create_script.into(), destroy_script: destroy_script.into() }
    }
}

impl Shaper for ProcessShaper {
    fn create(&self, slice: &SliceName, pct: u32, src_ip: Ipv4Addr, dst_ip: Ipv4Addr, ifname: &str) {
        let result = std::process::Command::new(&self.create_script)
            .arg(&slice.0)
            .arg(pct.to_string())
            .arg(src_ip.to_string())
            .arg(dst_ip.to_string())
            .arg(ifname)
            .spawn();
        match result {
            Ok(mut child) => {
                log::info!("spawned shaper create for slice '{}' on {}", slice.0, ifname);
                std::thread::spawn(move || {
                    if let Ok(status) = child.wait() {
                        log::debug!("shaper create exited with {:?}", status.code());
                    }
                });
            }
            Err(e) => log::warn!("failed to spawn shaper create for slice '{}': {}", slice.0, e),
        }
    }

    fn destroy(&self, slice: &SliceName, ifname: &str) {
        let result = std::process::Command::new(&self.destroy_script).arg(&slice.0).arg(ifname).spawn();
        match result {
            Ok(mut child) => {
                log::info!("spawned shaper destroy for slice '{}' on {}", slice.0, ifname);
                std::thread::spawn(move || {
                    if let Ok(status) = child.wait() {
                        log::debug!("shaper destroy exited with {:?}", status.code());
                    }
                });
            }
            Err(e) => log::warn!("failed to spawn shaper destroy for slice '{}': {}", slice.0, e),
        }
    }
}

/// Records every call it receives, for tests that verify shaper
/// create/destroy symmetry without spawning real processes.
#[derive(Debug, Default)]
pub struct RecordingShaper {
    creates: Mutex<Vec<(SliceName, u32, Ipv4Addr, Ipv4Addr, String)>>,
    destroys: Mutex<Vec<(SliceName, String)>>,
}

impl RecordingShaper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created_count(&self) -> usize {
        self.creates.lock().unwrap().len()
    }

    pub fn destroyed_count(&self) -> usize {
        self.destroys.lock().unwrap().len()
    }
}

impl Shaper for RecordingShaper {
    fn create(&self, slice: &SliceName, pct: u32, src_ip: Ipv4Addr, dst_ip: Ipv4Addr, ifname: &str) {
        self.creates.lock().unwrap().push((slice.clone(), pct, src_ip, dst_ip, ifname.to_string()));
    }

    fn destroy(&self, slice: &SliceName, ifname: &str) {
        self.destroys.lock().unwrap().push((slice.clone(), ifname.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_shaper_tracks_create_and_destroy() {
        let shaper = RecordingShaper::new();
        shaper.create(&SliceName::from("A"), 60, "10.0.0.1".parse().unwrap(), "10.0.0.3".parse().unwrap(), "s1-eth1");
        shaper.destroy(&SliceName::from("A"), "s1-eth1");
        assert_eq!(shaper.created_count(), 1);
        assert_eq!(shaper.destroyed_count(), 1);
    }
}
