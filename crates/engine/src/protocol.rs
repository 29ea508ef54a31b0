//! What each worker does during a run.

use tracing::{debug, error, info};

use sky_core::{local_pass, Membership, Partition, PointTable, Rank, Shape};
use sky_runtime::metrics::{PhaseTimer, PhaseTimings};
use sky_runtime::AbortSignal;
use timely::communication::Allocate;
use timely::worker::Worker;

use crate::collectives::Collectives;
use crate::messages::{PartialResult, ReplicaMessage};
use crate::{EngineError, SkylineResult, COORDINATOR};

/// Size broadcast, data broadcast, local pass, gather. Returns the result on
/// the coordinator and `None` elsewhere.
///
/// A failing worker raises `abort` while its inputs are still open, so no
/// sibling can pass the next barrier without seeing the signal.
pub(crate) fn run_worker<A: Allocate>(
    worker: &mut Worker<A>,
    source: Option<PointTable>,
    chunk_rows: usize,
    abort: &AbortSignal,
) -> Result<Option<SkylineResult>, EngineError> {
    // Built before anything can fail so every worker holds the same dataflow.
    let mut collectives = Collectives::build(worker);
    let outcome = run_rounds(worker, &mut collectives, source, chunk_rows, abort);
    if let Err(err) = &outcome {
        if !matches!(err, EngineError::Aborted) {
            error!(rank = worker.index(), %err, "worker failed, aborting run");
            abort.raise();
        }
    }
    drop(collectives);
    outcome
}

fn run_rounds<A: Allocate>(
    worker: &mut Worker<A>,
    collectives: &mut Collectives,
    source: Option<PointTable>,
    chunk_rows: usize,
    abort: &AbortSignal,
) -> Result<Option<SkylineResult>, EngineError> {
    let rank = worker.index();
    let peers = worker.peers();
    let mut timer = PhaseTimer::start();

    let source = match (rank == COORDINATOR, source) {
        (true, None) => return Err(EngineError::MissingSource),
        (true, Some(table)) => Some(table),
        (false, _) => None,
    };

    if let Some(table) = &source {
        collectives.send_replica(ReplicaMessage::Shape(table.shape()));
    }
    collectives.round(worker, abort)?;
    let shape = expect_shape(collectives.take_replica())?;
    debug!(rank, dims = shape.dims, points = shape.len, "problem size received");

    // Reserve the replica before any rows arrive; the coordinator reads its own table.
    let replica = match source {
        Some(table) => Replica::Owned(table),
        None => Replica::Incoming(ReplicaBuilder::new(shape)?),
    };
    if let Replica::Owned(table) = &replica {
        let rows_per_chunk = chunk_rows.max(1);
        for (chunk, coords) in table
            .coords()
            .chunks(rows_per_chunk.saturating_mul(shape.dims))
            .enumerate()
        {
            collectives.send_replica(ReplicaMessage::Rows {
                first: chunk * rows_per_chunk,
                coords: coords.to_vec(),
            });
        }
    }
    collectives.round(worker, abort)?;
    let delivered = collectives.take_replica();
    let replica = match replica {
        Replica::Owned(table) => table,
        Replica::Incoming(mut builder) => {
            builder.extend(delivered)?;
            builder.finish()?
        }
    };
    let broadcast = timer.lap();

    let partition = Partition::of(shape.len, peers, rank)?;
    let pass = local_pass(&replica, partition);
    debug!(
        rank,
        start = partition.start,
        end = partition.end,
        excluded = pass.excluded(),
        "local dominance pass complete"
    );
    let local = timer.lap();

    collectives.send_partial(PartialResult {
        rank,
        first: partition.start,
        bits: pass.bits,
        delta: pass.delta,
    });
    collectives.round(worker, abort)?;
    let partials = collectives.take_partials();

    if rank != COORDINATOR {
        return Ok(None);
    }
    let (membership, count) = reduce_partials(shape.len, peers, partials)?;
    let timings = PhaseTimings {
        broadcast,
        local_pass: local,
        gather: timer.lap(),
    };
    info!(
        points = shape.len,
        skyline = count,
        workers = peers,
        "partial results combined"
    );
    Ok(Some(SkylineResult {
        table: replica,
        membership,
        count,
        workers: peers,
        timings,
    }))
}

enum Replica {
    Owned(PointTable),
    Incoming(ReplicaBuilder),
}

fn expect_shape(messages: Vec<ReplicaMessage>) -> Result<Shape, EngineError> {
    let mut shape = None;
    for msg in messages {
        match msg {
            ReplicaMessage::Shape(_) if shape.is_some() => {
                return Err(EngineError::DuplicateShape)
            }
            ReplicaMessage::Shape(found) => shape = Some(found),
            ReplicaMessage::Rows { first, .. } => {
                return Err(EngineError::UnexpectedRows { first })
            }
        }
    }
    shape.ok_or(EngineError::MissingShape)
}

/// Assembles a worker's replica from broadcast row chunks.
#[derive(Debug)]
pub struct ReplicaBuilder {
    shape: Shape,
    chunks: Vec<(usize, Vec<f64>)>,
    coords: Vec<f64>,
}

impl ReplicaBuilder {
    /// Reserves room for the whole table up front.
    pub fn new(shape: Shape) -> Result<Self, EngineError> {
        let values = shape
            .values()
            .ok_or(EngineError::Allocation { values: usize::MAX })?;
        let mut coords = Vec::new();
        coords
            .try_reserve_exact(values)
            .map_err(|_| EngineError::Allocation { values })?;
        Ok(Self {
            shape,
            chunks: Vec::new(),
            coords,
        })
    }

    pub fn extend(
        &mut self,
        messages: impl IntoIterator<Item = ReplicaMessage>,
    ) -> Result<(), EngineError> {
        for msg in messages {
            match msg {
                ReplicaMessage::Rows { first, coords } => {
                    if coords.len() % self.shape.dims != 0 {
                        return Err(EngineError::ReplicaWidth {
                            first,
                            values: coords.len(),
                            dims: self.shape.dims,
                        });
                    }
                    self.chunks.push((first, coords));
                }
                ReplicaMessage::Shape(_) => return Err(EngineError::DuplicateShape),
            }
        }
        Ok(())
    }

    /// Chunks may arrive in any order; together they must cover every row once.
    pub fn finish(mut self) -> Result<PointTable, EngineError> {
        self.chunks.sort_by_key(|(first, _)| *first);
        let mut next = 0;
        for (first, chunk) in &self.chunks {
            if *first != next {
                return Err(EngineError::ReplicaGap {
                    expected: next,
                    found: *first,
                });
            }
            next += chunk.len() / self.shape.dims;
            self.coords.extend_from_slice(chunk);
        }
        if next != self.shape.len {
            return Err(EngineError::ReplicaLength {
                expected: self.shape.len,
                received: next,
            });
        }
        Ok(PointTable::new(self.shape.dims, self.coords)?)
    }
}

/// Gather and reduce on the coordinator: order partials by rank, check they
/// tile `[0, len)`, concatenate their bits and sum their deltas.
pub fn reduce_partials(
    len: usize,
    peers: usize,
    mut partials: Vec<PartialResult>,
) -> Result<(Membership, usize), EngineError> {
    partials.sort_by_key(|partial| partial.rank);

    let mut bits = Vec::with_capacity(len);
    let mut delta = 0i64;
    for expected_rank in 0..peers {
        let partial = partials
            .get(expected_rank)
            .filter(|partial| partial.rank == expected_rank)
            .ok_or(EngineError::MissingPartial { rank: expected_rank })?;
        if partial.first != bits.len() {
            return Err(EngineError::PartialGap {
                rank: partial.rank,
                expected: bits.len(),
                found: partial.first,
            });
        }
        bits.extend_from_slice(&partial.bits);
        delta += partial.delta;
    }
    if partials.len() > peers {
        let rank: Rank = partials[peers].rank;
        return Err(EngineError::PartialGap {
            rank,
            expected: len,
            found: partials[peers].first,
        });
    }
    if bits.len() != len {
        return Err(EngineError::ReplicaLength {
            expected: len,
            received: bits.len(),
        });
    }

    let reduced = len as i64 + delta;
    let membership = Membership::from_bits(bits);
    let counted = membership.count();
    if reduced != counted as i64 {
        return Err(EngineError::CountMismatch { reduced, counted });
    }
    Ok((membership, counted))
}
