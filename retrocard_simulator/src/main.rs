//! CLI entry point for the bus simulation: runs a random host script against the bus
//! engine and optionally writes the bus trace as JSON lines.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use retrocard_mcu::{CounterSource, CycleKind};
use retrocard_shared::PinMap;
use retrocard_simulator::{HostScript, HostTiming, run_scripted};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "bus_sim", about = "Drive the card's bus engine with a simulated host.")]
struct Cli {
    /// Number of host bus cycles
    #[arg(short, long, default_value_t = 1000)]
    cycles: usize,

    /// RNG seed for the host script
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Initial device counter
    #[arg(long, default_value_t = 0)]
    start: u8,

    /// Fraction of cycles that are host reads
    #[arg(long, default_value_t = 0.5)]
    read_ratio: f64,

    /// Polls between host cycles
    #[arg(long, default_value_t = 2)]
    idle_polls: u32,

    /// Polls the host holds select after wait is released
    #[arg(long, default_value_t = 1)]
    hold_polls: u32,

    /// Write the bus trace here as JSON lines
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

#[derive(Serialize)]
struct CycleLine {
    cycle: usize,
    read: bool,
    byte: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_max_level(cli.log_level).init();

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let script = HostScript::random(&mut rng, cli.cycles, cli.read_ratio);
    let timing = HostTiming { idle_polls: cli.idle_polls, hold_polls: cli.hold_polls };
    tracing::info!("Simulating {} bus cycles (seed {}, read ratio {})", cli.cycles, cli.seed, cli.read_ratio);

    let report = run_scripted(PinMap::default(), script, timing, CounterSource::new(cli.start))?;

    let reads = report.records.iter().filter(|r| r.kind == CycleKind::HostRead).count();
    tracing::info!(
        "Completed {} cycles ({} reads, {} writes) in {} polls; counter now {:#04x}",
        report.records.len(),
        reads,
        report.records.len() - reads,
        report.lines.polls(),
        report.state.source.counter()
    );

    if let Some(path) = &cli.trace {
        let mut out = BufWriter::new(File::create(path)?);
        for (cycle, record) in report.records.iter().enumerate() {
            let line = CycleLine { cycle, read: record.kind == CycleKind::HostRead, byte: record.byte };
            serde_json::to_writer(&mut out, &line)?;
            out.write_all(b"\n")?;
        }
        for event in report.lines.trace() {
            serde_json::to_writer(&mut out, event)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        tracing::info!("Bus trace written to {}", path.display());
    }

    let faults = report.faults();
    if !faults.is_empty() {
        for fault in &faults {
            tracing::error!("Bus fault: {:?}", fault);
        }
        return Err(format!("{} bus faults detected", faults.len()).into());
    }
    Ok(())
}
