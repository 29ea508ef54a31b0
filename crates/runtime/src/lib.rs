//! Runtime bootstrap for the timely workers of a skyline run.

use anyhow::{anyhow, ensure, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod abort;
pub mod metrics;

pub use abort::{AbortSignal, PanicGuard};

/// Install a stderr subscriber so stdout stays reserved for results.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Start a single-process timely runtime with `workers` threads, run `f` once
/// per worker and collect what each worker returned, in worker order.
pub fn start_runtime<T, F>(workers: usize, f: F) -> Result<Vec<T>>
where
    T: Send + 'static,
    F: Fn(usize, &mut timely::worker::Worker<timely::communication::allocator::Generic>) -> T
        + Send
        + Sync
        + 'static,
{
    ensure!(workers > 0, "at least one worker is required");
    info!(%workers, "starting timely runtime");
    let guards = timely::execute(timely::Config::process(workers), move |worker| {
        let index = worker.index();
        f(index, worker)
    })
    .map_err(|err| anyhow!("failed to start timely runtime: {err}"))?;

    guards
        .join()
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| outcome.map_err(|err| anyhow!("worker {index} failed: {err}")))
        .collect()
}
