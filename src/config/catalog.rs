use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::ids::{HostName, SliceName};
use crate::error::{Error, Result};

/// One `{src, dst}` flow entry in a slice's `flows` list (spec.md §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDto {
    pub src: String,
    pub dst: String,
}

/// A catalog entry as it appears in the JSON config document (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceDto {
    pub capacity_pct: u32,
    #[serde(default)]
    pub priority: u32,
    pub flows: Vec<FlowDto>,
}

/// An immutable, fully-resolved slice definition (spec.md §3, §4.2).
#[derive(Debug, Clone)]
pub struct SliceDefinition {
    pub name: SliceName,
    pub flows: Vec<(HostName, HostName)>,
    pub capacity_pct: u32,
    pub priority: u32,
}

/// Immutable registry of declared slices, loaded once at startup. Parse
/// failures are `Error::Configuration`/`Error::Deserialization` and abort
/// startup (spec.md §7).
#[derive(Debug, Default)]
pub struct SliceCatalog {
    slices: HashMap<SliceName, SliceDefinition>,
}

impl SliceCatalog {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let dtos: HashMap<String, SliceDto> = serde_json::from_str(raw)?;
        let mut slices = HashMap::with_capacity(dtos.len());

        for (name, dto) in dtos {
            if dto.capacity_pct == 0 {
                return Err(Error::Configuration(format!("slice '{}' has capacity_pct of 0", name)));
            }
            if dto.flows.is_empty() {
                return Err(Error::Configuration(format!("slice '{}' declares no flows", name)));
            }
            let flows = dto.flows.into_iter().map(|f| (HostName(f.src), HostName(f.dst))).collect();
            let name = SliceName(name);
            slices.insert(
                name.clone(),
                SliceDefinition { name, flows, capacity_pct: dto.capacity_pct, priority: dto.priority },
            );
        }

        Ok(Self { slices })
    }

    pub fn from_json_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn get(&self, name: &SliceName) -> Result<&SliceDefinition> {
        self.slices.get(name).ok_or_else(|| Error::SliceNotFound(name.0.clone()))
    }

    pub fn names(&self) -> impl Iterator<Item = &SliceName> {
        self.slices.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_catalog() {
        let raw = r#"{
            "A": { "capacity_pct": 60, "priority": 1, "flows": [{"src": "h1", "dst": "h3"}] },
            "D": { "capacity_pct": 30, "flows": [{"src": "h1", "dst": "h3"}, {"src": "h2", "dst": "h4"}] }
        }"#;
        let cat = SliceCatalog::from_json_str(raw).unwrap();
        let a = cat.get(&SliceName::from("A")).unwrap();
        assert_eq!(a.capacity_pct, 60);
        assert_eq!(a.priority, 1);
        let d = cat.get(&SliceName::from("D")).unwrap();
        assert_eq!(d.priority, 0, "priority defaults to 0 when omitted");
        assert_eq!(d.flows.len(), 2);
    }

    #[test]
    fn rejects_zero_capacity() {
        let raw = r#"{"Z": {"capacity_pct": 0, "flows": [{"src": "h1", "dst": "h2"}]}}"#;
        assert!(matches!(SliceCatalog::from_json_str(raw), Err(Error::Configuration(_))));
    }

    #[test]
    fn unknown_slice_is_not_found() {
        let cat = SliceCatalog::from_json_str("{}").unwrap();
        assert!(matches!(cat.get(&SliceName::from("ghost")), Err(Error::SliceNotFound(_))));
    }
}
