use thiserror::Error;

/// Unified error taxonomy for the slicing controller (see spec.md §7).
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration JSON: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("slice '{0}' not found in catalog")]
    SliceNotFound(String),

    #[error("host '{0}' not found in host locator")]
    HostNotFound(String),

    #[error("no path between switch {src} and switch {dst}")]
    NoPath { src: u32, dst: u32 },

    #[error("admission refused: link {from}->{to} short by {shortfall} (required {required}, available+preemptable {available})")]
    AdmissionRefused { from: u32, to: u32, required: u32, available: u32, shortfall: u32 },

    #[error("slice '{0}' is already active")]
    AlreadyActive(String),

    #[error("slice '{0}' is not active")]
    NotActive(String),

    #[error("link {from}->{to} capacity exceeded: used {used} + requested {requested} > capacity {capacity}")]
    CapacityExceeded { from: u32, to: u32, used: u32, requested: u32, capacity: u32 },

    #[error("switch or link driver failure: {0}")]
    Driver(String),
}

pub type Result<T> = std::result::Result<T, Error>;
