use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::config::catalog::SliceCatalog;
use crate::domain::admission::{AdmissionDecision, AdmissionEngine};
use crate::domain::driver::SwitchDriver;
use crate::domain::graph::TopologyGraph;
use crate::domain::host_locator::HostLocator;
use crate::domain::ids::{HostName, SliceName, SwitchId};
use crate::domain::path_planner::PathPlanner;
use crate::domain::rule_programmer::{RuleHandle, RuleProgrammer};
use crate::domain::shaper::Shaper;
use crate::error::{Error, Result};

/// Owned by the Lifecycle Manager: everything an active slice needs to be
/// cleanly torn down later (spec.md §3, "Active slice record").
#[derive(Debug, Clone)]
pub struct ActiveSliceRecord {
    pub name: SliceName,
    pub priority: u32,
    pub reserved_bw: u32,
    pub paths: Vec<Vec<SwitchId>>,
    pub flows: Vec<(HostName, HostName)>,
    pub rule_handles: Vec<RuleHandle>,
    pub shaped_interfaces: HashSet<String>,
}

/// The mutable state a single exclusive lock protects for the duration of
/// one activate/deactivate call (spec.md §5): the topology graph's
/// bandwidth counters and the active-slice table.
struct ControllerState {
    graph: TopologyGraph,
    active: HashMap<SliceName, ActiveSliceRecord>,
}

/// A point-in-time view returned by `status()` (spec.md §4.7).
#[derive(Debug, Clone)]
pub struct SliceStatus {
    pub name: SliceName,
    pub paths: Vec<Vec<SwitchId>>,
    pub reserved_bw: u32,
}

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub slices: Vec<SliceStatus>,
    pub utilization: Vec<(SwitchId, SwitchId, u32, u32)>,
}

/// Orchestrates C4 (Path Planner) -> C5 (Admission Engine) -> preemption ->
/// bandwidth reservation -> C6 (Rule Programmer) -> C8 (Shaper) behind a
/// single exclusive lock (spec.md §2 C9, §4.7, §5).
pub struct SliceLifecycleManager {
    catalog: SliceCatalog,
    host_locator: HostLocator,
    state: Mutex<ControllerState>,
    driver: Box<dyn SwitchDriver>,
    shaper: Box<dyn Shaper>,
}

impl SliceLifecycleManager {
    pub fn new(catalog: SliceCatalog, host_locator: HostLocator, graph: TopologyGraph, driver: Box<dyn SwitchDriver>, shaper: Box<dyn Shaper>) -> Self {
        Self { catalog, host_locator, state: Mutex::new(ControllerState { graph, active: HashMap::new() }), driver, shaper }
    }

    pub fn activate(&self, name: &SliceName) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        if state.active.contains_key(name) {
            return Err(Error::AlreadyActive(name.0.clone()));
        }
        let def = self.catalog.get(name)?.clone();

        let mut paths = Vec::with_capacity(def.flows.len());
        for (src_host, dst_host) in &def.flows {
            let src_sw = self.host_locator.switch_of(src_host)?;
            let dst_sw = self.host_locator.switch_of(dst_host)?;
            paths.push(PathPlanner::path(&state.graph, src_sw, dst_sw)?);
        }

        let decision = AdmissionEngine::evaluate(&state.graph, &state.active, name, def.priority, def.capacity_pct, &paths);
        match decision {
            AdmissionDecision::Reject { from, to, required, available, freed } => {
                let available_with_preemption = available + freed;
                return Err(Error::AdmissionRefused {
                    from: from.0,
                    to: to.0,
                    required,
                    available: available_with_preemption,
                    shortfall: required.saturating_sub(available_with_preemption),
                });
            }
            AdmissionDecision::AdmitWithPreemption(victims) => {
                // BTreeSet iterates in ascending name order: the deterministic
                // order spec.md §4.7 requires for victim teardown.
                for victim in &victims {
                    log::info!("preempting slice '{}' to admit '{}'", victim.0, name.0);
                    self.deactivate_locked(&mut state, victim);
                }
            }
            AdmissionDecision::AdmitNoPreemption => {}
        }

        // Reserve bandwidth for every edge of every path; on partial
        // failure, release what was already reserved for this slice and
        // report the failure without touching anything else (spec.md §4.7
        // rollback guarantee).
        let mut reserved_edges: Vec<(SwitchId, SwitchId)> = Vec::new();
        for path in &paths {
            for pair in path.windows(2) {
                let (u, v) = (pair[0], pair[1]);
                if let Err(e) = state.graph.reserve(u, v, def.capacity_pct) {
                    for (ru, rv) in reserved_edges.drain(..) {
                        state.graph.release(ru, rv, def.capacity_pct);
                    }
                    return Err(e);
                }
                reserved_edges.push((u, v));
            }
        }

        let mut rule_handles: Vec<RuleHandle> = Vec::new();
        let mut shaped_interfaces: HashSet<String> = HashSet::new();

        // Snapshot egress ports before any further mutable access to the
        // graph, so the rollback closure below can still take `&mut
        // ControllerState` without fighting an outstanding immutable borrow.
        let mut port_table: HashMap<(SwitchId, SwitchId), u32> = HashMap::new();
        for path in &paths {
            for pair in path.windows(2) {
                if let Some(link) = state.graph.edge(pair[0], pair[1]) {
                    port_table.insert((pair[0], pair[1]), link.egress_port);
                }
            }
        }
        let ports = |u: SwitchId, v: SwitchId| port_table.get(&(u, v)).copied();

        let rollback = |state: &mut ControllerState, rule_handles: &[RuleHandle], shaped: &HashSet<String>, driver: &dyn SwitchDriver, shaper: &dyn Shaper| {
            for (u, v) in &reserved_edges {
                state.graph.release(*u, *v, def.capacity_pct);
            }
            if let Err(e) = RuleProgrammer::teardown(driver, rule_handles) {
                log::error!("error while rolling back rules for failed activation of '{}': {}", name.0, e);
            }
            for ifname in shaped {
                shaper.destroy(name, ifname);
            }
        };

        for (flow_idx, (src_host, dst_host)) in def.flows.iter().enumerate() {
            let src_ip = self.host_locator.ip_of(src_host)?;
            let dst_ip = self.host_locator.ip_of(dst_host)?;
            let path = &paths[flow_idx];

            match RuleProgrammer::install(self.driver.as_ref(), path, src_ip, dst_ip, &ports) {
                Ok(mut handles) => rule_handles.append(&mut handles),
                Err((mut partial, e)) => {
                    // `partial` holds handles for rules the driver actually
                    // installed before it failed; fold them in so rollback
                    // tears down exactly what landed on the driver.
                    rule_handles.append(&mut partial);
                    rollback(&mut state, &rule_handles, &shaped_interfaces, self.driver.as_ref(), self.shaper.as_ref());
                    return Err(e);
                }
            }

            let Some(&first) = path.first() else {
                continue;
            };
            let Some(&second) = path.get(1) else {
                continue;
            };
            let Some(port) = ports(first, second) else {
                rollback(&mut state, &rule_handles, &shaped_interfaces, self.driver.as_ref(), self.shaper.as_ref());
                return Err(Error::NoPath { src: first.0, dst: second.0 });
            };
            let ifname = format!("s{}-eth{}", first.0, port);
            self.shaper.create(name, def.capacity_pct, src_ip, dst_ip, &ifname);
            shaped_interfaces.insert(ifname);
        }

        tracing::info!(slice = %name.0, priority = def.priority, capacity_pct = def.capacity_pct, "slice activated");

        state.active.insert(
            name.clone(),
            ActiveSliceRecord {
                name: name.clone(),
                priority: def.priority,
                reserved_bw: def.capacity_pct,
                paths,
                flows: def.flows.clone(),
                rule_handles,
                shaped_interfaces,
            },
        );

        Ok(())
    }

    pub fn deactivate(&self, name: &SliceName) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.active.contains_key(name) {
            return Err(Error::NotActive(name.0.clone()));
        }
        self.deactivate_locked(&mut state, name);
        Ok(())
    }

    /// Full teardown of an active slice, assuming the lock is already held.
    /// Called both by the public `deactivate` and, recursively, by
    /// `activate`'s preemption phase (spec.md §5, §9 "Recursive
    /// deactivation within activation") — `std::sync::Mutex` is not
    /// reentrant, so this is the inlined non-locking variant rather than a
    /// second lock acquisition.
    fn deactivate_locked(&self, state: &mut ControllerState, name: &SliceName) {
        let Some(record) = state.active.remove(name) else {
            log::warn!("deactivate_locked called for '{}' which is not active", name.0);
            return;
        };
        tracing::warn!(slice = %name.0, "slice deactivated");

        for path in &record.paths {
            for pair in path.windows(2) {
                state.graph.release(pair[0], pair[1], record.reserved_bw);
            }
        }

        if let Err(e) = RuleProgrammer::teardown(self.driver.as_ref(), &record.rule_handles) {
            log::error!("error tearing down rules for '{}': {}", name.0, e);
        }

        for ifname in &record.shaped_interfaces {
            self.shaper.destroy(name, ifname);
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        let state = self.state.lock().unwrap();
        let mut slices: Vec<SliceStatus> = state
            .active
            .values()
            .map(|r| SliceStatus { name: r.name.clone(), paths: r.paths.clone(), reserved_bw: r.reserved_bw })
            .collect();
        slices.sort_by(|a, b| a.name.0.cmp(&b.name.0));
        StatusSnapshot { slices, utilization: state.graph.utilization() }
    }
}
