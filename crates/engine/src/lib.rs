//! Distributed skyline engine.
//!
//! A run replicates the point table from the coordinator to every timely
//! worker, lets each worker decide membership for its own block of indices
//! against the whole table, and gathers the partial results back on the
//! coordinator. Any failure on any worker fails the whole run.

use std::sync::{Arc, Mutex};

use tracing::info;

use sky_core::{Membership, PartitionError, PointTable, Rank, TableError};
use sky_runtime::metrics::PhaseTimings;
use sky_runtime::{start_runtime, AbortSignal};

pub mod collectives;
pub mod messages;
mod protocol;

pub use protocol::{reduce_partials, ReplicaBuilder};

/// Worker that owns the input and assembles the result.
pub const COORDINATOR: Rank = 0;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub workers: usize,
    /// Rows per data-broadcast record.
    pub chunk_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { workers: 1, chunk_rows: 4096 }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.workers == 0 {
            return Err(PartitionError::NoWorkers.into());
        }
        if self.chunk_rows == 0 {
            return Err(EngineError::ZeroChunkRows);
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("chunk size must be at least one row")]
    ZeroChunkRows,
    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
    #[error("run aborted by another worker")]
    Aborted,
    #[error("coordinator has no point table to broadcast")]
    MissingSource,
    #[error("no problem size was broadcast")]
    MissingShape,
    #[error("problem size was broadcast more than once")]
    DuplicateShape,
    #[error("rows starting at {first} arrived with the problem size")]
    UnexpectedRows { first: usize },
    #[error("replica has a gap: expected row {expected}, got row {found}")]
    ReplicaGap { expected: usize, found: usize },
    #[error("replica chunk at row {first} holds {values} values, not a multiple of {dims}")]
    ReplicaWidth { first: usize, values: usize, dims: usize },
    #[error("replica holds {received} points, expected {expected}")]
    ReplicaLength { expected: usize, received: usize },
    #[error("can not allocate {values} coordinates for the replica")]
    Allocation { values: usize },
    #[error("no partial result from worker {rank}")]
    MissingPartial { rank: Rank },
    #[error("partial result of worker {rank} starts at {found}, expected {expected}")]
    PartialGap { rank: Rank, expected: usize, found: usize },
    #[error("reduced skyline count {reduced} disagrees with {counted} membership bits")]
    CountMismatch { reduced: i64, counted: usize },
    #[error("coordinator produced no result")]
    MissingResult,
    #[error(transparent)]
    Partition(#[from] PartitionError),
    #[error(transparent)]
    Table(#[from] TableError),
}

/// What the coordinator holds once the run completes.
#[derive(Debug, Clone)]
pub struct SkylineResult {
    pub table: PointTable,
    pub membership: Membership,
    pub count: usize,
    pub workers: usize,
    pub timings: PhaseTimings,
}

/// Compute the skyline of `table` on `config.workers` cooperating workers.
///
/// The table moves to the coordinator and comes back inside the result.
pub fn compute(table: PointTable, config: &EngineConfig) -> Result<SkylineResult, EngineError> {
    config.validate()?;
    let shape = table.shape();
    info!(
        dims = shape.dims,
        points = shape.len,
        workers = config.workers,
        "computing skyline"
    );

    let source = Arc::new(Mutex::new(Some(table)));
    let abort = AbortSignal::new();
    let chunk_rows = config.chunk_rows;

    let outcomes = start_runtime(config.workers, {
        let abort = abort.clone();
        move |rank, worker| {
            let _guard = abort.guard();
            let table = if rank == COORDINATOR {
                source.lock().ok().and_then(|mut slot| slot.take())
            } else {
                None
            };
            protocol::run_worker(worker, table, chunk_rows, &abort)
        }
    })?;

    let mut result = None;
    let mut failure = None;
    for outcome in outcomes {
        match outcome {
            Ok(Some(found)) => result = Some(found),
            Ok(None) => {}
            // Prefer the root cause over the siblings that merely followed it.
            Err(EngineError::Aborted) => {
                failure.get_or_insert(EngineError::Aborted);
            }
            Err(err) => {
                if matches!(failure, None | Some(EngineError::Aborted)) {
                    failure = Some(err);
                }
            }
        }
    }
    if let Some(err) = failure {
        return Err(err);
    }
    result.ok_or(EngineError::MissingResult)
}
