use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::domain::graph::TopologyGraph;
use crate::domain::host_locator::HostLocator;
use crate::domain::ids::{HostName, SwitchId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDto {
    pub from: u32,
    pub to: u32,
    pub capacity: u32,
    pub port: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDto {
    pub switch: u32,
    pub ip: String,
}

/// The in-process constants described by spec.md §6 ("Host/topology
/// declaration"), as loaded from a static JSON document at startup. There is
/// no runtime feedback loop: this is parsed once and never revisited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyDto {
    pub switches: Vec<u32>,
    pub links: Vec<LinkDto>,
    pub hosts: std::collections::HashMap<String, HostDto>,
}

impl TopologyDto {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let dto: TopologyDto = serde_json::from_str(raw)?;
        Ok(dto)
    }

    pub fn from_json_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Builds the runtime `TopologyGraph` and `HostLocator` from this
    /// declaration, validating that every link's endpoints and every host's
    /// attached switch are declared switches.
    pub fn build(&self) -> Result<(TopologyGraph, HostLocator)> {
        let mut graph = TopologyGraph::new();
        for &id in &self.switches {
            graph.add_switch(SwitchId(id));
        }

        for link in &self.links {
            let from = SwitchId(link.from);
            let to = SwitchId(link.to);
            if !graph.has_switch(from) || !graph.has_switch(to) {
                return Err(Error::Configuration(format!("link {}->{} references an undeclared switch", link.from, link.to)));
            }
            graph.add_link(from, to, link.capacity, link.port);
        }

        let mut locator = HostLocator::new();
        for (name, host) in &self.hosts {
            let switch = SwitchId(host.switch);
            if !graph.has_switch(switch) {
                return Err(Error::Configuration(format!("host '{}' attached to undeclared switch {}", name, host.switch)));
            }
            let ip: Ipv4Addr = host.ip.parse().map_err(|_| Error::Configuration(format!("host '{}' has invalid IPv4 address '{}'", name, host.ip)))?;
            locator.insert(HostName(name.clone()), switch, ip);
        }

        Ok((graph, locator))
    }
}
