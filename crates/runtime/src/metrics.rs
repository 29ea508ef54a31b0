use std::time::{Duration, Instant};

use serde::Serialize;

/// Wall-clock time spent in each phase of a run, measured on the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTimings {
    pub broadcast: Duration,
    pub local_pass: Duration,
    pub gather: Duration,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RunStats {
    pub points: usize,
    pub dims: usize,
    pub skyline: usize,
    pub workers: usize,
    #[serde(skip)]
    pub timings: PhaseTimings,
}

impl RunStats {
    pub fn to_json_line(&self, label: &str, elapsed: Option<Duration>) -> String {
        #[derive(Serialize)]
        struct Snapshot<'a> {
            label: &'a str,
            points: usize,
            dims: usize,
            skyline: usize,
            workers: usize,
            broadcast_ms: f64,
            local_pass_ms: f64,
            gather_ms: f64,
            elapsed_ms: Option<f64>,
        }

        let payload = Snapshot {
            label,
            points: self.points,
            dims: self.dims,
            skyline: self.skyline,
            workers: self.workers,
            broadcast_ms: millis(self.timings.broadcast),
            local_pass_ms: millis(self.timings.local_pass),
            gather_ms: millis(self.timings.gather),
            elapsed_ms: elapsed.map(millis),
        };
        serde_json::to_string(&payload).unwrap_or_else(|_| String::from("{}"))
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_micros() as f64 / 1_000.0
}

pub struct PhaseTimer {
    start: Instant,
    last: Instant,
}

impl PhaseTimer {
    pub fn start() -> Self {
        let now = Instant::now();
        Self { start: now, last: now }
    }

    /// Time since the previous lap, or since start for the first one.
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let lap = now - self.last;
        self.last = now;
        lap
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
