use serde::Serialize;

use crate::domain::ids::SwitchId;
use crate::domain::lifecycle::StatusSnapshot;

/// `{ "status": "ok"|"error", "message": "…" }` envelope for mutating
/// requests (spec.md §4.8).
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: &'static str,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { status: "ok", message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: "error", message: message.into() }
    }
}

#[derive(Debug, Serialize)]
pub struct SliceStatusDto {
    pub name: String,
    pub paths: Vec<Vec<u32>>,
    pub reserved_bw: u32,
}

#[derive(Debug, Serialize)]
pub struct LinkUtilDto {
    pub from: u32,
    pub to: u32,
    pub capacity: u32,
    pub used_bw: u32,
}

/// Response body of `GET /slices/status` (spec.md §4.7's snapshot, made
/// concrete on the wire).
#[derive(Debug, Serialize)]
pub struct StatusResponseDto {
    pub slices: Vec<SliceStatusDto>,
    pub links: Vec<LinkUtilDto>,
}

impl From<StatusSnapshot> for StatusResponseDto {
    fn from(snapshot: StatusSnapshot) -> Self {
        let slices = snapshot
            .slices
            .into_iter()
            .map(|s| SliceStatusDto {
                name: s.name.0,
                paths: s.paths.into_iter().map(|p| p.into_iter().map(|id: SwitchId| id.0).collect()).collect(),
                reserved_bw: s.reserved_bw,
            })
            .collect();
        let links = snapshot
            .utilization
            .into_iter()
            .map(|(from, to, capacity, used_bw)| LinkUtilDto { from: from.0, to: to.0, capacity, used_bw })
            .collect();
        Self { slices, links }
    }
}
