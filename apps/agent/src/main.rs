use clap::Parser;
use std::{io::Write, path::PathBuf, thread, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;
use iox::{write_ndjson, FileDatasource, SourceConfig, DEFAULT_MAX_READS};

/// Replays telemetry files as one JSON reading per line on stdout.
#[derive(Parser, Debug)]
#[command(name = "road-agent", version)]
struct Args {
    #[arg(long, default_value = "data/accelerometer.csv")]
    accelerometer: PathBuf,
    #[arg(long, default_value = "data/gps.csv")]
    gps: PathBuf,
    /// Ground clearance file: length,longitude,latitude
    #[arg(long, default_value = "data/parking.csv")]
    parking: PathBuf,
    #[arg(long, default_value_t = DEFAULT_MAX_READS)]
    max_reads: u32,
    #[arg(long, default_value_t = 1)]
    user_id: u32,
    /// Pause between readings
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut src = FileDatasource::open(SourceConfig {
        accelerometer_path: args.accelerometer,
        gps_path: args.gps,
        parking_path: args.parking,
        max_reads: args.max_reads,
        user_id: args.user_id,
    })?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let delay = Duration::from_millis(args.delay_ms);
    for reading in src.by_ref() {
        write_ndjson(&mut out, &reading?)?;
        out.flush()?;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
    src.close();
    info!(reads = src.reads(), "agent finished");
    Ok(())
}
