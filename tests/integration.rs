use std::collections::HashMap;
use std::sync::Arc;

use sdn_slicectl::config::catalog::SliceCatalog;
use sdn_slicectl::config::topology::TopologyDto;
use sdn_slicectl::domain::driver::MockSwitchDriver;
use sdn_slicectl::domain::driver::{Action, Match, SwitchDriver};
use sdn_slicectl::domain::ids::{SliceName, SwitchId};
use sdn_slicectl::domain::lifecycle::SliceLifecycleManager;
use sdn_slicectl::domain::shaper::RecordingShaper;
use sdn_slicectl::error::Error;

const TOPOLOGY: &str = r#"{
    "switches": [1, 2, 3, 4, 5],
    "links": [
        {"from": 1, "to": 2, "capacity": 100, "port": 1},
        {"from": 2, "to": 1, "capacity": 100, "port": 1},
        {"from": 1, "to": 4, "capacity": 100, "port": 2},
        {"from": 4, "to": 1, "capacity": 100, "port": 1},
        {"from": 2, "to": 3, "capacity": 100, "port": 2},
        {"from": 3, "to": 2, "capacity": 100, "port": 1},
        {"from": 2, "to": 5, "capacity": 100, "port": 3},
        {"from": 5, "to": 2, "capacity": 100, "port": 1}
    ],
    "hosts": {
        "h1": {"switch": 1, "ip": "10.0.0.1"},
        "h2": {"switch": 1, "ip": "10.0.0.2"},
        "h3": {"switch": 3, "ip": "10.0.0.3"},
        "h4": {"switch": 3, "ip": "10.0.0.4"}
    }
}"#;

struct ArcDriver(Arc<MockSwitchDriver>);
impl SwitchDriver for ArcDriver {
    fn install_rule(&self, switch: SwitchId, priority: u16, m: Match, action: Action) -> sdn_slicectl::error::Result<()> {
        self.0.install_rule(switch, priority, m, action)
    }
    fn remove_rule(&self, switch: SwitchId, priority: u16, m: Match) -> sdn_slicectl::error::Result<()> {
        self.0.remove_rule(switch, priority, m)
    }
}

fn build_manager(catalog_json: &str) -> SliceLifecycleManager {
    let (graph, locator) = TopologyDto::from_json_str(TOPOLOGY).unwrap().build().unwrap();
    let catalog = SliceCatalog::from_json_str(catalog_json).unwrap();
    let driver = Box::new(MockSwitchDriver::new());
    let shaper = Box::new(RecordingShaper::new());
    SliceLifecycleManager::new(catalog, locator, graph, driver, shaper)
}

#[test]
fn malformed_catalog_json_is_a_configuration_error() {
    let err = SliceCatalog::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, Error::Deserialization(_)));
}

#[test]
fn malformed_topology_json_is_a_configuration_error() {
    let err = TopologyDto::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, Error::Deserialization(_)));
}

/// T6: given equal starting state and the same request order, admission
/// decisions and chosen paths are reproducible.
#[test]
fn t6_repeated_runs_from_equal_state_are_deterministic() {
    let catalog_json = r#"{"A": {"capacity_pct": 60, "priority": 1, "flows": [{"src": "h1", "dst": "h3"}]}}"#;

    let mgr1 = build_manager(catalog_json);
    mgr1.activate(&SliceName::from("A")).unwrap();
    let snap1 = mgr1.status();

    let mgr2 = build_manager(catalog_json);
    mgr2.activate(&SliceName::from("A")).unwrap();
    let snap2 = mgr2.status();

    let paths1: Vec<Vec<u32>> = snap1.slices[0].paths.iter().map(|p| p.iter().map(|s| s.0).collect()).collect();
    let paths2: Vec<Vec<u32>> = snap2.slices[0].paths.iter().map(|p| p.iter().map(|s| s.0).collect()).collect();
    assert_eq!(paths1, paths2);
}

/// T5: a slice of priority p cannot be preempted by admission of a slice
/// of priority <= p.
#[test]
fn t5_equal_priority_never_preempts() {
    let catalog_json = r#"{
        "A": {"capacity_pct": 60, "priority": 2, "flows": [{"src": "h1", "dst": "h3"}]},
        "B": {"capacity_pct": 50, "priority": 2, "flows": [{"src": "h1", "dst": "h3"}]}
    }"#;
    let mgr = build_manager(catalog_json);
    mgr.activate(&SliceName::from("A")).unwrap();
    let err = mgr.activate(&SliceName::from("B")).unwrap_err();
    assert!(matches!(err, Error::AdmissionRefused { .. }));
    assert_eq!(mgr.status().slices.len(), 1);
}

/// T4 (minimality, smallest-first): with two lower-priority victims
/// available, the engine picks only as many as needed, preferring the
/// smaller one first.
#[test]
fn t4_preemption_picks_smallest_sufficient_victim_set() {
    let catalog_json = r#"{
        "Small": {"capacity_pct": 20, "priority": 1, "flows": [{"src": "h1", "dst": "h3"}]},
        "Large": {"capacity_pct": 70, "priority": 1, "flows": [{"src": "h2", "dst": "h4"}]},
        "High": {"capacity_pct": 15, "priority": 5, "flows": [{"src": "h1", "dst": "h3"}]}
    }"#;
    let mgr = build_manager(catalog_json);
    mgr.activate(&SliceName::from("Small")).unwrap();
    mgr.activate(&SliceName::from("Large")).unwrap();
    // s1->s2 now at 20 (Small) + 70 (Large) = 90, available = 10, need 15:
    // both candidates on s1->s2 are "Small" (20) and "Large" (70) is not on
    // this edge (different flow, same edge s1->s2 though — h2 also attaches
    // to s1). Smallest-first should pick "Small" alone (20 freed >= shortfall 5).
    mgr.activate(&SliceName::from("High")).unwrap();

    let snap = mgr.status();
    let active: Vec<&str> = snap.slices.iter().map(|s| s.name.0.as_str()).collect();
    assert!(active.contains(&"Large"), "Large should survive: freeing Small alone was sufficient");
    assert!(!active.contains(&"Small"), "Small should have been preempted first (ascending reservedBw)");
    assert!(active.contains(&"High"));
}

#[test]
fn mock_driver_sees_symmetric_install_and_remove_calls_on_full_lifecycle() {
    let catalog_json = r#"{"A": {"capacity_pct": 60, "priority": 1, "flows": [{"src": "h1", "dst": "h3"}]}}"#;
    let (graph, locator) = TopologyDto::from_json_str(TOPOLOGY).unwrap().build().unwrap();
    let catalog = SliceCatalog::from_json_str(catalog_json).unwrap();
    let driver = Arc::new(MockSwitchDriver::new());
    let shaper = Box::new(RecordingShaper::new());
    let mgr = SliceLifecycleManager::new(catalog, locator, graph, Box::new(ArcDriver(driver.clone())), shaper);

    mgr.activate(&SliceName::from("A")).unwrap();
    assert!(driver.installed_count() > 0);
    mgr.deactivate(&SliceName::from("A")).unwrap();
    assert_eq!(driver.installed_count(), driver.removed_count());
}

#[test]
fn status_snapshot_reports_link_utilization() {
    let catalog_json = r#"{"A": {"capacity_pct": 60, "priority": 1, "flows": [{"src": "h1", "dst": "h3"}]}}"#;
    let mgr = build_manager(catalog_json);
    mgr.activate(&SliceName::from("A")).unwrap();
    let snap = mgr.status();
    let util: HashMap<(u32, u32), u32> = snap.utilization.iter().map(|(f, t, _, u)| ((f.0, t.0), *u)).collect();
    assert_eq!(util[&(1, 2)], 60);
}
