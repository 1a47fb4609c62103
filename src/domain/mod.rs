pub mod admission;
pub mod driver;
pub mod graph;
pub mod host_locator;
pub mod ids;
pub mod learning_switch;
pub mod lifecycle;
pub mod path_planner;
pub mod rule_programmer;
pub mod shaper;
