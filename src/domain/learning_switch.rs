use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::driver::{Action, Match, SwitchDriver};
use crate::domain::ids::SwitchId;
use crate::domain::rule_programmer::P_L2_LEARN;

/// L2 address of OpenFlow's `OFPP_FLOOD`/broadcast sentinel: "the destination
/// is unknown, send to every port." Not a real port number.
pub const FLOOD_PORT: u32 = 0;

/// The part of the topology the packet-in path is allowed to see: structure
/// only, never `usedBw` or the admission lock (spec.md §5). Constructed once
/// from the same `TopologyGraph` the Lifecycle Manager owns and handed to
/// `LearningSwitch` so it physically cannot reach mutable bandwidth state.
pub struct TopologyView {
    switches: Vec<SwitchId>,
}

impl TopologyView {
    pub fn from_graph(graph: &crate::domain::graph::TopologyGraph) -> Self {
        Self { switches: graph.switch_ids().collect() }
    }

    pub fn has_switch(&self, id: SwitchId) -> bool {
        self.switches.contains(&id)
    }
}

/// Per-switch MAC learning table and table-miss fallback, a direct
/// equivalent of `slicing_controller.py`'s `_packet_in_handler` /
/// `mac_to_port`. Orthogonal to slicing: it never touches the active-slice
/// table or link bandwidth, and takes its own lock independent of the
/// Lifecycle Manager's (spec.md §1 supplement, §5).
pub struct LearningSwitch {
    mac_to_port: RwLock<HashMap<SwitchId, HashMap<String, u32>>>,
    topology: TopologyView,
}

/// What the caller (the OpenFlow event pump, out of scope here) should do
/// with an incoming packet after the learning switch has processed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketAction {
    Flood,
    Output(u32),
    Ignore,
}

impl LearningSwitch {
    pub fn new(topology: TopologyView) -> Self {
        Self { mac_to_port: RwLock::new(HashMap::new()), topology }
    }

    /// Handles one packet-in: learns `src_mac` at `in_port`, decides the
    /// output action for `dst_mac`, and — when the destination is already
    /// known — installs a low-priority (`P_L2_LEARN`) forwarding rule so
    /// future packets of the same flow skip the controller, exactly as the
    /// original handler does. Slice rules at `P_FWD`/`P_ISO` always win ties
    /// because they are installed at a strictly higher priority.
    pub fn packet_in(&self, driver: &dyn SwitchDriver, switch: SwitchId, in_port: u32, src_mac: &str, dst_mac: &str) -> PacketAction {
        if !self.topology.has_switch(switch) {
            log::warn!("packet-in from unknown switch {}", switch);
            return PacketAction::Ignore;
        }
        if is_lldp_or_multicast(dst_mac) {
            return PacketAction::Ignore;
        }

        let out_port = {
            let mut table = self.mac_to_port.write().unwrap();
            let entry = table.entry(switch).or_default();
            entry.insert(src_mac.to_string(), in_port);
            entry.get(dst_mac).copied()
        };

        match out_port {
            Some(port) => {
                let m = Match::l2(in_port, dst_mac.to_string());
                if let Err(e) = driver.install_rule(switch, P_L2_LEARN, m, Action::Output(port)) {
                    log::warn!("failed to install learning-switch rule on {}: {}", switch, e);
                }
                PacketAction::Output(port)
            }
            None => PacketAction::Flood,
        }
    }
}

fn is_lldp_or_multicast(dst_mac: &str) -> bool {
    dst_mac.starts_with("33:33:") || dst_mac.eq_ignore_ascii_case("01:80:c2:00:00:0e")
}
