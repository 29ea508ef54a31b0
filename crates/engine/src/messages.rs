//! Records exchanged between workers.

use serde::{Deserialize, Serialize};

use sky_core::{PointIndex, Rank, Shape};

/// Coordinator → every worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ReplicaMessage {
    /// Sent alone in the size round.
    Shape(Shape),
    /// Consecutive rows starting at point `first`, row-major.
    Rows { first: PointIndex, coords: Vec<f64> },
}

/// Every worker → coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartialResult {
    pub rank: Rank,
    pub first: PointIndex,
    pub bits: Vec<bool>,
    pub delta: i64,
}
