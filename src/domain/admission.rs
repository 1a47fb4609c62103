use std::collections::BTreeSet;

use crate::domain::graph::TopologyGraph;
use crate::domain::ids::SliceName;
use crate::domain::lifecycle::ActiveSliceRecord;
use crate::domain::ids::SwitchId;

/// A single path (a sequence of switch ids, length >= 1) for one flow of a
/// candidate slice, as produced by the Path Planner.
pub type CandidatePath = Vec<SwitchId>;

/// Outcome of `AdmissionEngine::evaluate` (spec.md §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// No active slice needs to be displaced.
    AdmitNoPreemption,
    /// Admit, but only after deactivating every slice in this set first.
    AdmitWithPreemption(BTreeSet<SliceName>),
    /// Insufficient capacity even after preempting every eligible lower
    /// priority slice on the named edge. `available` is the edge's residual
    /// capacity before preemption; `freed` is what preempting every eligible
    /// victim would have recovered — still short of `required`.
    Reject { from: SwitchId, to: SwitchId, required: u32, available: u32, freed: u32 },
}

/// Per-link residual-capacity check and victim selection (spec.md §4.5,
/// §2 C5 — the largest single share of the implementation budget).
pub struct AdmissionEngine;

impl AdmissionEngine {
    /// Evaluates a candidate slice `name`/`priority`/`required_bw` against
    /// every edge crossed by `paths` (one path per flow), given the current
    /// graph and active-slice table. Never mutates `graph`.
    pub fn evaluate(
        graph: &TopologyGraph,
        active: &std::collections::HashMap<SliceName, ActiveSliceRecord>,
        candidate_name: &SliceName,
        priority: u32,
        required_bw: u32,
        paths: &[CandidatePath],
    ) -> AdmissionDecision {
        let mut victims: BTreeSet<SliceName> = BTreeSet::new();

        for path in paths {
            for pair in path.windows(2) {
                let (u, v) = (pair[0], pair[1]);
                let Some(link) = graph.edge(u, v) else {
                    // Path Planner guarantees real edges; a missing edge here
                    // is an internal inconsistency, not a capacity question.
                    continue;
                };
                let available = link.available();
                if available >= required_bw {
                    continue;
                }

                let mut preemptable: Vec<(&SliceName, &ActiveSliceRecord)> = active
                    .iter()
                    .filter(|(name, _)| **name != *candidate_name)
                    .filter(|(_, record)| record.priority < priority)
                    .filter(|(_, record)| record.paths.iter().any(|p| crosses(p, u, v)))
                    .collect();

                // Ascending priority, then ascending reservedBw, then name —
                // the deterministic order spec.md §4.5 step 4 requires.
                preemptable.sort_by(|(na, ra), (nb, rb)| {
                    ra.priority.cmp(&rb.priority).then(ra.reserved_bw.cmp(&rb.reserved_bw)).then(na.0.cmp(&nb.0))
                });

                let mut freed = 0u32;
                let mut chosen_here = Vec::new();
                for (name, record) in preemptable {
                    if available + freed >= required_bw {
                        break;
                    }
                    freed += record.reserved_bw;
                    chosen_here.push(name.clone());
                }

                if available + freed < required_bw {
                    return AdmissionDecision::Reject { from: u, to: v, required: required_bw, available, freed };
                }

                victims.extend(chosen_here);
            }
        }

        if victims.is_empty() {
            AdmissionDecision::AdmitNoPreemption
        } else {
            AdmissionDecision::AdmitWithPreemption(victims)
        }
    }
}

fn crosses(path: &[SwitchId], u: SwitchId, v: SwitchId) -> bool {
    path.windows(2).any(|pair| pair[0] == u && pair[1] == v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::HostName;

    fn graph_100() -> TopologyGraph {
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

    fn record(priority: u32, reserved_bw: u32, path: Vec<SwitchId>) -> ActiveSliceRecord {
        ActiveSliceRecord {
            name: SliceName::from("x"),
            priority,
            reserved_bw,
            paths: vec![path],
            flows: vec![(HostName::from("h1"), HostName::from("h3"))],
            rule_handles: Vec::new(),
            shaped_interfaces: Default::default(),
        }
    }

    #[test]
    fn admits_without_preemption_when_capacity_available() {
        let g = graph_100();
        let active = std::collections::HashMap::new();
        let decision = AdmissionEngine::evaluate(&g, &active, &SliceName::from("A"), 1, 60, &[vec![SwitchId(1), SwitchId(2), SwitchId(3)]]);
        assert_eq!(decision, AdmissionDecision::AdmitNoPreemption);
    }

    #[test]
    fn rejects_when_no_lower_priority_victim_exists() {
        let mut g = graph_100();
        g.reserve(SwitchId(1), SwitchId(2), 60).unwrap();
        let mut active = std::collections::HashMap::new();
        active.insert(SliceName::from("A"), record(1, 60, vec![SwitchId(1), SwitchId(2), SwitchId(3)]));
        let decision = AdmissionEngine::evaluate(&g, &active, &SliceName::from("B"), 1, 50, &[vec![SwitchId(1), SwitchId(2), SwitchId(3)]]);
        assert_eq!(decision, AdmissionDecision::Reject { from: SwitchId(1), to: SwitchId(2), required: 50, available: 40, freed: 0 });
    }

    #[test]
    fn admits_with_preemption_of_strictly_lower_priority() {
        let mut g = graph_100();
        g.reserve(SwitchId(1), SwitchId(2), 60).unwrap();
        let mut active = std::collections::HashMap::new();
        active.insert(SliceName::from("A"), record(1, 60, vec![SwitchId(1), SwitchId(2), SwitchId(3)]));
        let decision = AdmissionEngine::evaluate(&g, &active, &SliceName::from("B"), 2, 50, &[vec![SwitchId(1), SwitchId(2), SwitchId(3)]]);
        let mut expect = BTreeSet::new();
        expect.insert(SliceName::from("A"));
        assert_eq!(decision, AdmissionDecision::AdmitWithPreemption(expect));
    }

    #[test]
    fn equal_priority_is_never_preempted() {
        let mut g = graph_100();
        g.reserve(SwitchId(1), SwitchId(2), 60).unwrap();
        let mut active = std::collections::HashMap::new();
        active.insert(SliceName::from("A"), record(2, 60, vec![SwitchId(1), SwitchId(2), SwitchId(3)]));
        let decision = AdmissionEngine::evaluate(&g, &active, &SliceName::from("B"), 2, 50, &[vec![SwitchId(1), SwitchId(2), SwitchId(3)]]);
        assert_eq!(decision, AdmissionDecision::Reject { from: SwitchId(1), to: SwitchId(2), required: 50, available: 40, freed: 0 });
    }
}
