use anyhow::Context;
use clap::Parser;
use std::{io::Write, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;
use analysis::Classifier;
use iox::{read_ndjson, write_ndjson};
use model::InputReading;

/// Reads telemetry JSON lines on stdin and writes classified readings on stdout.
#[derive(Parser, Debug)]
#[command(name = "road-edge", version)]
struct Args {
    /// Artificial processing delay per reading
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,
    /// Emit one JSON array (ready to POST to the hub) instead of JSON lines
    #[arg(long)]
    array: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let classifier = Classifier::new(Duration::from_millis(args.latency_ms));

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut batch = Vec::new();
    let mut count = 0usize;
    for input in read_ndjson::<_, InputReading>(stdin.lock()) {
        count += 1;
        let input = input.with_context(|| format!("reading {count}"))?;
        let processed = classifier.process(&input);
        if args.array {
            batch.push(processed);
        } else {
            write_ndjson(&mut out, &processed)?;
            out.flush()?;
        }
    }
    if args.array {
        serde_json::to_writer(&mut out, &batch)?;
        writeln!(out)?;
    }
    info!(count, "edge finished");
    Ok(())
}
