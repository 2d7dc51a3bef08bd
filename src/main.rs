// src/main.rs - card application entry point
use clap::{Parser, Subcommand};
use retrocard_rs::config::{self, Config};
use retrocard_rs::{
    FilePartitionTable, HttpUpdateClient, ProcessRestart, Restart, TomlStore, UpdateOutcome, UpdateTrigger, Updater,
    run_update_task, switch_to_factory,
};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Parser, Debug)]
#[command(name = "retrocard", version, about = "Expansion card firmware running on a simulated bus.")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "retrocard.toml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve host bus cycles and wait for update requests
    Run {
        /// Host cycles to serve before shutting down
        #[arg(long, default_value_t = 1000)]
        cycles: usize,

        /// RNG seed for the simulated host
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Raise the update trigger at startup
        #[arg(long)]
        check_update: bool,
    },
    /// Run one update check
    CheckUpdate,
    /// Boot the factory image next
    Factory,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_max_level(cli.log_level).init();

    tracing::info!("Starting retrocard {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Loading configuration from: {}", cli.config);
    let config = config::load_config(&cli.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", cli.config, e);
        Box::new(e) as BoxError
    })?;
    tracing::info!("Card revision {}, update server {}:{}", config.card.revision, config.update.host, config.update.port);

    match cli.command {
        Command::Run { cycles, seed, check_update } => run_card(config, cycles, seed, check_update).await,
        Command::CheckUpdate => {
            let mut updater = build_updater(&config).await?;
            match updater.check_for_update().await {
                Ok(UpdateOutcome::UpToDate { local, remote }) => {
                    tracing::info!("Firmware up to date (local {:?}, remote {})", local, remote);
                    Ok(())
                }
                Ok(UpdateOutcome::Installed { version, bytes }) => {
                    tracing::info!("Installed firmware version {} ({} bytes)", version, bytes);
                    ProcessRestart.restart();
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!("Update attempt abandoned: {}", e);
                    Err(Box::new(e) as BoxError)
                }
            }
        }
        Command::Factory => {
            let mut flash = FilePartitionTable::open(&config.update.partition_dir).await?;
            switch_to_factory(&mut flash, &ProcessRestart).await?;
            Ok(())
        }
    }
}

async fn build_updater(
    config: &Config,
) -> Result<Updater<HttpUpdateClient, FilePartitionTable, TomlStore>, BoxError> {
    let update = &config.update;
    let client = HttpUpdateClient::new(&update.host, update.port, update.connect_timeout(), update.read_timeout())
        .map_err(|e| {
            tracing::error!("Failed to build update client: {}", e);
            Box::new(e) as BoxError
        })?;
    let flash = FilePartitionTable::open(&update.partition_dir).await.map_err(|e| {
        tracing::error!("Failed to open partition directory {}: {}", update.partition_dir.display(), e);
        Box::new(e) as BoxError
    })?;
    let store = TomlStore::open(&update.storage_path).await.map_err(|e| {
        tracing::error!("Failed to open key-value store {}: {}", update.storage_path.display(), e);
        Box::new(e) as BoxError
    })?;
    Ok(Updater::new(client, flash, store, config.card.revision).with_read_timeout(update.read_timeout()))
}

#[cfg(feature = "sim-in-host")]
async fn run_card(config: Config, cycles: usize, seed: u64, check_update: bool) -> Result<(), BoxError> {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use retrocard_mcu::{BusCycleEngine, CounterSource, EngineState, configure_lines};
    use retrocard_simulator::{HostScript, SimulatedLines};

    let mut rng = StdRng::seed_from_u64(seed);
    let script = HostScript::random(&mut rng, cycles, 0.5);
    let lines = SimulatedLines::new(config.pins.clone(), script);
    let configured = configure_lines(lines, config.pins.clone()).map_err(|e| {
        tracing::error!("Line configuration failed: {}", e);
        Box::new(e) as BoxError
    })?;

    let trigger = UpdateTrigger::new();
    let updater = build_updater(&config).await?;
    let update_task = tokio::spawn(run_update_task(trigger.clone(), updater, ProcessRestart));
    if check_update || config.update.check_on_start {
        trigger.raise();
    }

    // The engine spins; keep it off the async workers.
    let bus = tokio::task::spawn_blocking(move || {
        let mut engine = BusCycleEngine::new(configured);
        let mut state = EngineState::new(CounterSource::new(0));
        for _ in 0..cycles {
            engine.run_cycle(&mut state);
        }
        (engine.into_lines(), state)
    });

    let (lines, state) = bus.await?;
    let faults = lines.faults().count();
    tracing::info!(
        "Served {} host cycles, device counter at {}, {} bus faults",
        lines.cycles_completed(),
        state.source.counter(),
        faults
    );
    update_task.abort();
    if faults > 0 {
        return Err(format!("{} bus faults observed", faults).into());
    }
    Ok(())
}

#[cfg(not(feature = "sim-in-host"))]
async fn run_card(_config: Config, _cycles: usize, _seed: u64, _check_update: bool) -> Result<(), BoxError> {
    tracing::error!("This build has no bus backend; rebuild with the sim-in-host feature");
    Err("no bus backend".into())
}
