//! Broadcast and gather rounds on top of a timely dataflow.
//!
//! Each worker builds the same dataflow with two inputs. Records given to the
//! replica input reach every worker; records given to the partial input reach
//! the coordinator only. [`Collectives::round`] is a barrier: it returns once
//! every worker has finished sending for the round and all of those records
//! have been delivered locally. A fast sender may already be in the next
//! round, so deliveries are kept with their timestamp and only records of
//! closed rounds are handed out.

use std::cell::RefCell;
use std::rc::Rc;

use timely::communication::Allocate;
use timely::dataflow::operators::{Broadcast, Exchange, Input, Inspect, Probe};
use timely::dataflow::{InputHandle, ProbeHandle};
use timely::worker::Worker;
use tracing::trace;

use sky_runtime::AbortSignal;

use crate::messages::{PartialResult, ReplicaMessage};
use crate::{EngineError, COORDINATOR};

pub struct Collectives {
    replica_in: InputHandle<u64, ReplicaMessage>,
    partial_in: InputHandle<u64, PartialResult>,
    probe: ProbeHandle<u64>,
    replica: Rc<RefCell<Vec<(u64, ReplicaMessage)>>>,
    partials: Rc<RefCell<Vec<(u64, PartialResult)>>>,
    round: u64,
}

impl Collectives {
    pub fn build<A: Allocate>(worker: &mut Worker<A>) -> Self {
        let mut replica_in = InputHandle::new();
        let mut partial_in = InputHandle::new();
        let mut probe = ProbeHandle::new();
        let replica = Rc::new(RefCell::new(Vec::new()));
        let partials = Rc::new(RefCell::new(Vec::new()));

        let replica_sink = Rc::clone(&replica);
        let partial_sink = Rc::clone(&partials);
        worker.dataflow::<u64, _, _>(|scope| {
            scope
                .input_from(&mut replica_in)
                .broadcast()
                .inspect_batch(move |time: &u64, batch: &[ReplicaMessage]| {
                    stamp(&replica_sink, *time, batch)
                })
                .probe_with(&mut probe);

            scope
                .input_from(&mut partial_in)
                .exchange(|_partial: &PartialResult| COORDINATOR as u64)
                .inspect_batch(move |time: &u64, batch: &[PartialResult]| {
                    stamp(&partial_sink, *time, batch)
                })
                .probe_with(&mut probe);
        });

        Self {
            replica_in,
            partial_in,
            probe,
            replica,
            partials,
            round: 0,
        }
    }

    pub fn send_replica(&mut self, msg: ReplicaMessage) {
        self.replica_in.send(msg);
    }

    pub fn send_partial(&mut self, partial: PartialResult) {
        self.partial_in.send(partial);
    }

    /// Close the current round and wait until every worker has closed it.
    pub fn round<A: Allocate>(
        &mut self,
        worker: &mut Worker<A>,
        abort: &AbortSignal,
    ) -> Result<(), EngineError> {
        self.round += 1;
        self.replica_in.advance_to(self.round);
        self.partial_in.advance_to(self.round);
        while self.probe.less_than(&self.round) {
            if abort.is_raised() {
                return Err(EngineError::Aborted);
            }
            worker.step();
        }
        // A sibling may have failed after sending its share of this round.
        if abort.is_raised() {
            return Err(EngineError::Aborted);
        }
        trace!(worker = worker.index(), round = self.round, "round complete");
        Ok(())
    }

    /// Replica records sent in rounds that are closed.
    pub fn take_replica(&mut self) -> Vec<ReplicaMessage> {
        drain_closed(&self.replica, self.round)
    }

    /// Partial results sent in rounds that are closed; empty everywhere but
    /// the coordinator.
    pub fn take_partials(&mut self) -> Vec<PartialResult> {
        drain_closed(&self.partials, self.round)
    }
}

fn stamp<D: Clone>(sink: &RefCell<Vec<(u64, D)>>, time: u64, batch: &[D]) {
    sink.borrow_mut()
        .extend(batch.iter().cloned().map(|record| (time, record)));
}

/// Remove and return records stamped before `round`, keeping later ones.
fn drain_closed<D>(buffer: &RefCell<Vec<(u64, D)>>, round: u64) -> Vec<D> {
    let mut buffer = buffer.borrow_mut();
    let (closed, open): (Vec<_>, Vec<_>) =
        buffer.drain(..).partition(|(time, _)| *time < round);
    *buffer = open;
    closed.into_iter().map(|(_, record)| record).collect()
}
