use std::net::Ipv4Addr;

use crate::domain::driver::{Action, Match, SwitchDriver};
use crate::domain::ids::SwitchId;
use crate::error::{Error, Result};

/// Forwarding priority: normal slice forwarding rules (spec.md §4.6).
pub const P_FWD: u16 = 10;
/// Isolation priority: drop-all-from-source rule at a slice's ingress hop.
pub const P_ISO: u16 = 9;
/// L2 learning-switch priority (domain::learning_switch).
pub const P_L2_LEARN: u16 = 1;
/// Table-miss default priority.
pub const P_DEFAULT: u16 = 0;

/// One rule this programmer installed, recorded so teardown can delete
/// exactly what was installed rather than broadcasting (spec.md §9).
#[derive(Debug, Clone)]
pub struct RuleHandle {
    pub switch: SwitchId,
    pub priority: u16,
    pub m: Match,
}

/// Translates a path + flow + slice metadata into forward/reverse
/// forwarding rules and ingress-drop isolation rules (spec.md §4.6, C6).
pub struct RuleProgrammer;

impl RuleProgrammer {
    /// Installs the full rule set for one flow's forward path `p` and its
    /// reverse, returning every handle installed so the caller can persist
    /// them on the active-slice record for later teardown.
    ///
    /// On a mid-pass driver failure the handles for whatever was actually
    /// installed before the failure are returned alongside the error, so the
    /// caller can roll back exactly what landed on the driver rather than
    /// leaking un-torn-down rules.
    pub fn install(
        driver: &dyn SwitchDriver,
        path: &[SwitchId],
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        ports: &dyn Fn(SwitchId, SwitchId) -> Option<u32>,
    ) -> std::result::Result<Vec<RuleHandle>, (Vec<RuleHandle>, Error)> {
        let mut handles = Vec::new();
        if let Err(e) = Self::install_direction(driver, path, src_ip, dst_ip, ports, &mut handles) {
            return Err((handles, e));
        }
        let reversed: Vec<SwitchId> = path.iter().rev().copied().collect();
        if let Err(e) = Self::install_direction(driver, &reversed, dst_ip, src_ip, ports, &mut handles) {
            return Err((handles, e));
        }
        Ok(handles)
    }

    fn install_direction(
        driver: &dyn SwitchDriver,
        path: &[SwitchId],
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        ports: &dyn Fn(SwitchId, SwitchId) -> Option<u32>,
        handles: &mut Vec<RuleHandle>,
    ) -> Result<()> {
        for pair in path.windows(2) {
            let (u, v) = (pair[0], pair[1]);
            let port = ports(u, v).ok_or(crate::error::Error::NoPath { src: u.0, dst: v.0 })?;
            let m = Match::ipv4(src_ip, dst_ip);
            driver.install_rule(u, P_FWD, m.clone(), Action::Output(port))?;
            handles.push(RuleHandle { switch: u, priority: P_FWD, m });
        }

        if let Some(&first) = path.first() {
            let m = Match::ipv4_src(src_ip);
            driver.install_rule(first, P_ISO, m.clone(), Action::Drop)?;
            handles.push(RuleHandle { switch: first, priority: P_ISO, m });
        }

        Ok(())
    }

    /// Deletes exactly the rules named by `handles` (spec.md §9, preferred
    /// approach: record-then-delete rather than broadcast).
    pub fn teardown(driver: &dyn SwitchDriver, handles: &[RuleHandle]) -> Result<()> {
        for h in handles {
            driver.remove_rule(h.switch, h.priority, h.m.clone())?;
        }
        Ok(())
    }
}
