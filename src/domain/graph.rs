use std::collections::{HashMap, HashSet};

use slotmap::{SlotMap, new_key_type};

use crate::domain::ids::SwitchId;
use crate::error::{Error, Result};

new_key_type! {
    /// Internal handle for a directed link, distinct from the (from, to) pair
    /// so two edges with the same endpoints (which cannot happen here, but a
    /// future multigraph could) stay addressable independently.
    pub struct LinkKey;
}

/// A directed edge `u -> v` of the switch fabric (spec.md §3, "Link").
#[derive(Debug, Clone)]
pub struct Link {
    pub from: SwitchId,
    pub to: SwitchId,
    pub capacity: u32,
    pub used_bw: u32,
    pub egress_port: u32,
}

impl Link {
    pub fn available(&self) -> u32 {
        self.capacity.saturating_sub(self.used_bw)
    }
}

/// Directed graph of switches with per-edge capacity/used-bandwidth/egress
/// port (spec.md §4.1). Built once from a static description at startup;
/// `used_bw` is the only field ever mutated afterwards, and only under the
/// Lifecycle Manager's lock.
#[derive(Debug, Default)]
pub struct TopologyGraph {
    switches: HashSet<SwitchId>,
    links: SlotMap<LinkKey, Link>,
    /// Adjacency index: switch -> outgoing link keys, sorted by the id of
    /// the neighboring switch so the Path Planner can break ties
    /// deterministically (spec.md §4.4).
    adjacency: HashMap<SwitchId, Vec<LinkKey>>,
    by_endpoints: HashMap<(SwitchId, SwitchId), LinkKey>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_switch(&mut self, id: SwitchId) {
        self.switches.insert(id);
    }

    pub fn has_switch(&self, id: SwitchId) -> bool {
        self.switches.contains(&id)
    }

    /// Adds one directed edge. The reverse edge (if it exists) is a
    /// separate, independently-capacitated edge (spec.md §3).
    pub fn add_link(&mut self, from: SwitchId, to: SwitchId, capacity: u32, egress_port: u32) {
        let key = self.links.insert(Link { from, to, capacity, used_bw: 0, egress_port });
        let neighbors = self.adjacency.entry(from).or_default();
        neighbors.push(key);
        neighbors.sort_by_key(|k| self.links[*k].to);
        self.by_endpoints.insert((from, to), key);
    }

    /// Neighbor switches reachable by one directed hop from `u`, in the
    /// deterministic (ascending switch id) order used for path planning.
    pub fn neighbors(&self, u: SwitchId) -> Vec<SwitchId> {
        self.adjacency.get(&u).map(|keys| keys.iter().map(|k| self.links[*k].to).collect()).unwrap_or_default()
    }

    pub fn edge(&self, u: SwitchId, v: SwitchId) -> Option<&Link> {
        self.by_endpoints.get(&(u, v)).map(|k| &self.links[*k])
    }

    fn edge_mut(&mut self, u: SwitchId, v: SwitchId) -> Option<&mut Link> {
        let key = *self.by_endpoints.get(&(u, v))?;
        Some(&mut self.links[key])
    }

    /// Reserves `bw` on edge `u -> v`. Requires `used_bw + bw <= capacity`
    /// (I1); otherwise returns `CapacityExceeded` and leaves the edge
    /// unchanged.
    pub fn reserve(&mut self, u: SwitchId, v: SwitchId, bw: u32) -> Result<()> {
        let link = self.edge_mut(u, v).ok_or_else(|| Error::NoPath { src: u.0, dst: v.0 })?;
        if link.used_bw + bw > link.capacity {
            return Err(Error::CapacityExceeded { from: u.0, to: v.0, used: link.used_bw, requested: bw, capacity: link.capacity });
        }
        link.used_bw += bw;
        Ok(())
    }

    /// Releases `bw` on edge `u -> v`. Clamps at zero defensively; logs an
    /// invariant violation (never panics) if asked to release more than is
    /// currently reserved (spec.md §4.1).
    pub fn release(&mut self, u: SwitchId, v: SwitchId, bw: u32) {
        let Some(link) = self.edge_mut(u, v) else {
            log::warn!("release() called on nonexistent edge {}->{}", u, v);
            return;
        };
        if bw > link.used_bw {
            log::warn!("invariant violation: releasing {} on edge {}->{} but only {} reserved; clamping to 0", bw, u, v, link.used_bw);
            link.used_bw = 0;
        } else {
            link.used_bw -= bw;
        }
    }

    /// Snapshot of every edge's (from, to, capacity, used_bw) — the "global
    /// link utilization" of spec.md §4.7's `status()`.
    pub fn utilization(&self) -> Vec<(SwitchId, SwitchId, u32, u32)> {
        let mut out: Vec<_> = self.links.values().map(|l| (l.from, l.to, l.capacity, l.used_bw)).collect();
        out.sort_by_key(|(from, to, _, _)| (*from, *to));
        out
    }

    /// Every switch id known to the graph.
    pub fn switch_ids(&self) -> impl Iterator<Item = SwitchId> + '_ {
        self.switches.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_graph() -> TopologyGraph {
        let mut g = TopologyGraph::new();
        for id in [1, 2, 3] {
            g.add_switch(SwitchId(id));
        }
        g.add_link(SwitchId(1), SwitchId(2), 100, 1);
        g.add_link(SwitchId(2), SwitchId(1), 100, 1);
        g.add_link(SwitchId(2), SwitchId(3), 100, 2);
        g.add_link(SwitchId(3), SwitchId(2), 100, 1);
        g
    }

    #[test]
    fn reserve_respects_capacity() {
        let mut g = small_graph();
        g.reserve(SwitchId(1), SwitchId(2), 60).unwrap();
        assert_eq!(g.edge(SwitchId(1), SwitchId(2)).unwrap().used_bw, 60);
        let err = g.reserve(SwitchId(1), SwitchId(2), 50).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { .. }));
        assert_eq!(g.edge(SwitchId(1), SwitchId(2)).unwrap().used_bw, 60);
    }

    #[test]
    fn release_clamps_at_zero() {
        let mut g = small_graph();
        g.reserve(SwitchId(1), SwitchId(2), 30).unwrap();
        g.release(SwitchId(1), SwitchId(2), 1000);
        assert_eq!(g.edge(SwitchId(1), SwitchId(2)).unwrap().used_bw, 0);
    }

    #[test]
    fn neighbors_sorted_for_determinism() {
        let mut g = TopologyGraph::new();
        for id in [1, 2, 3, 4] {
            g.add_switch(SwitchId(id));
        }
        g.add_link(SwitchId(1), SwitchId(4), 100, 1);
        g.add_link(SwitchId(1), SwitchId(2), 100, 2);
        g.add_link(SwitchId(1), SwitchId(3), 100, 3);
        assert_eq!(g.neighbors(SwitchId(1)), vec![SwitchId(2), SwitchId(3), SwitchId(4)]);
    }
}
