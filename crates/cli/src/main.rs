//! `skyline` — reads a point set on stdin and writes its skyline to stdout.
//!
//! ```sh
//! SKYLINE_WORKERS=4 skyline < points.in > skyline.out
//! skyline --workers 8 --stats-json < points.in > skyline.out
//! ```

use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use sky_core::{read_points, write_skyline};
use sky_engine::{compute, EngineConfig};
use sky_runtime::init_tracing;
use sky_runtime::metrics::{PhaseTimer, RunStats};

#[derive(Parser)]
#[command(name = "skyline")]
#[command(about = "Distributed skyline (Pareto frontier) of a point set read from stdin")]
#[command(version)]
struct Cli {
    /// Number of cooperating workers.
    #[arg(
        short,
        long,
        env = "SKYLINE_WORKERS",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    workers: u32,
    /// Rows per data-broadcast record.
    #[arg(long, default_value_t = 4096, value_parser = clap::value_parser!(u32).range(1..))]
    chunk_rows: u32,
    /// Also write run statistics to stderr as one JSON line.
    #[arg(long)]
    stats_json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let table = read_points(io::stdin().lock()).context("failed to read points from stdin")?;
    let config = EngineConfig {
        workers: cli.workers as usize,
        chunk_rows: cli.chunk_rows as usize,
    };

    let timer = PhaseTimer::start();
    let result = compute(table, &config).context("skyline computation failed")?;
    let elapsed = timer.elapsed();

    let mut out = BufWriter::new(io::stdout().lock());
    write_skyline(&mut out, &result.table, &result.membership)
        .and_then(|()| out.flush())
        .context("failed to write skyline")?;

    let stats = RunStats {
        points: result.table.len(),
        dims: result.table.dims(),
        skyline: result.count,
        workers: result.workers,
        timings: result.timings,
    };
    info!(
        points = stats.points,
        dimensions = stats.dims,
        skyline = stats.skyline,
        workers = stats.workers,
        elapsed_s = elapsed.as_secs_f64(),
        "skyline complete"
    );
    if cli.stats_json {
        eprintln!("{}", stats.to_json_line("skyline", Some(elapsed)));
    }
    Ok(())
}
