use std::collections::HashMap;
use std::net::Ipv4Addr;

use bimap::BiHashMap;

use crate::domain::ids::{HostName, SwitchId};
use crate::error::{Error, Result};

/// Static map host -> (switch, ip) loaded once at startup (spec.md §4.3).
///
/// Host name and IP are in a 1:1 relationship (every host has exactly one
/// address and no two hosts share one), so the name<->ip side is a
/// `BiHashMap` — the same shape the teacher uses for other 1:1 id
/// relationships — giving reverse ip->host lookup to the learning-switch
/// fallback for free.
#[derive(Debug, Default)]
pub struct HostLocator {
    switch_of: HashMap<HostName, SwitchId>,
    ip_of: BiHashMap<HostName, Ipv4Addr>,
}

impl HostLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, host: HostName, switch: SwitchId, ip: Ipv4Addr) {
        self.switch_of.insert(host.clone(), switch);
        self.ip_of.insert(host, ip);
    }

    pub fn switch_of(&self, host: &HostName) -> Result<SwitchId> {
        self.switch_of.get(host).copied().ok_or_else(|| Error::HostNotFound(host.0.clone()))
    }

    pub fn ip_of(&self, host: &HostName) -> Result<Ipv4Addr> {
        self.ip_of.get_by_left(host).copied().ok_or_else(|| Error::HostNotFound(host.0.clone()))
    }

    pub fn host_of_ip(&self, ip: Ipv4Addr) -> Option<&HostName> {
        self.ip_of.get_by_right(&ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_roundtrip() {
        let mut loc = HostLocator::new();
        loc.insert(HostName::from("h1"), SwitchId(1), "10.0.0.1".parse().unwrap());
        assert_eq!(loc.switch_of(&HostName::from("h1")).unwrap(), SwitchId(1));
        assert_eq!(loc.ip_of(&HostName::from("h1")).unwrap(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(loc.host_of_ip(Ipv4Addr::new(10, 0, 0, 1)), Some(&HostName::from("h1")));
    }

    #[test]
    fn unknown_host_is_not_found() {
        let loc = HostLocator::new();
        assert!(matches!(loc.switch_of(&HostName::from("ghost")), Err(Error::HostNotFound(_))));
    }
}
