//! nvstat: live NVIDIA GPU telemetry in the terminal.
//!
//! Samples `nvidia-smi` on a fixed interval and redraws per-device bar
//! charts (temperature, utilization, memory, power) plus aggregate gauges,
//! sized to the terminal. Ctrl+C / q / Esc exits.
//!
//! Run: `nvstat`

use std::time::Duration;

use clap::Parser;

use nvstat::app::Monitor;
use nvstat::sampler::Sampler;

/// Live NVIDIA GPU bar charts and gauges, refreshed in place.
#[derive(Parser, Debug)]
#[command(name = "nvstat")]
#[command(author = "PAIML Team")]
#[command(version)]
#[command(about = "Live NVIDIA GPU telemetry in the terminal", long_about = None)]
struct Cli {
    /// Refresh interval in milliseconds
    #[arg(short, long, default_value = "2000")]
    refresh: u64,

    /// GPU query command to invoke
    #[arg(long, default_value = "nvidia-smi")]
    smi: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let interval = Duration::from_millis(cli.refresh.max(100));
    let mut monitor = Monitor::new(Sampler::new(cli.smi), interval);

    // Interruption returns Ok; only a missing query facility at startup
    // (or a broken terminal) surfaces here.
    monitor.run()?;
    Ok(())
}
