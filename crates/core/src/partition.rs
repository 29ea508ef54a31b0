//! Static block partitioning of point indices across workers.
//!
//! Every worker recomputes the same layout from `(len, peers, rank)`, so no
//! negotiation is needed to agree on who owns which index.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{PointIndex, Rank};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("at least one worker is required")]
    NoWorkers,
    #[error("rank {rank} is out of range for {peers} workers")]
    RankOutOfRange { rank: Rank, peers: usize },
}

/// Points per worker: `ceil(len / peers)`.
pub fn block_size(len: usize, peers: usize) -> Result<usize, PartitionError> {
    if peers == 0 {
        return Err(PartitionError::NoWorkers);
    }
    Ok(len.div_ceil(peers))
}

/// Half-open range `[start, end)` of indices owned by `rank`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Partition {
    pub rank: Rank,
    pub start: PointIndex,
    pub end: PointIndex,
}

impl Partition {
    pub fn of(len: usize, peers: usize, rank: Rank) -> Result<Self, PartitionError> {
        let block = block_size(len, peers)?;
        if rank >= peers {
            return Err(PartitionError::RankOutOfRange { rank, peers });
        }
        let start = rank.saturating_mul(block).min(len);
        let end = start.saturating_add(block).min(len);
        Ok(Self { rank, start, end })
    }

    /// A single partition owning every index, as seen by a lone worker.
    pub fn whole(len: usize) -> Self {
        Self { rank: 0, start: 0, end: len }
    }

    pub fn range(&self) -> Range<PointIndex> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, index: PointIndex) -> bool {
        self.range().contains(&index)
    }
}

/// Every partition in rank order.
pub fn partitions(len: usize, peers: usize) -> Result<Vec<Partition>, PartitionError> {
    (0..peers).map(|rank| Partition::of(len, peers, rank)).collect()
}
