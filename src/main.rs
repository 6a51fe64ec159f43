//! fsmreg - finite automaton worker
//!
//! Drives configured automatons from a pool of threads against the
//! process-wide definition registry, with periodic snapshots.

mod config;
mod error;
mod worker;

use clap::{Parser, Subcommand};
use config::Config;
use fsmreg_core::{Definition, Registry};
use fsmreg_persist::SnapshotStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use worker::Worker;

#[derive(Parser)]
#[command(name = "fsmreg")]
#[command(about = "Drive deduplicated finite automatons with snapshot persistence")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration
    #[arg(short, long, env = "FSMREG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive every configured machine
    Run {
        /// Number of driver threads
        #[arg(short, long)]
        threads: Option<usize>,

        /// Symbols applied to each machine
        #[arg(short, long)]
        iterations: Option<u64>,
    },

    /// Validate configuration and print definition fingerprints
    Check,

    /// Show stored snapshots
    Snapshots,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading config from {}", path.display());
            Config::load_from(path)?
        }
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run {
            threads,
            iterations,
        } => {
            if let Some(n) = threads {
                config.worker.threads = n;
            }
            if let Some(n) = iterations {
                config.worker.iterations = n;
            }
            config.validate()?;

            let snapshot_dir = config.storage.snapshots_dir();
            tracing::info!("Snapshot directory: {}", snapshot_dir.display());
            let store = SnapshotStore::open(&snapshot_dir)?;

            let report = Worker::new(&config, Registry::global(), &store)
                .run()
                .map_err(|e| {
                    tracing::error!("Run failed [{}]: {}", e.error_code(), e);
                    e
                })?;

            for machine in report.machines.values() {
                println!(
                    "{:<24} state={:<16} applied={:<8} failures={:<4} checksum={:016x}{}",
                    machine.name,
                    machine.final_state,
                    machine.applied,
                    machine.failures,
                    machine.checksum,
                    if machine.restored { " (restored)" } else { "" }
                );
            }

            if report.failures() > 0 {
                return Err(format!("{} symbol(s) rejected", report.failures()).into());
            }
        }

        Commands::Check => {
            config.validate()?;
            let registry = Registry::global();
            for machine in &config.machines {
                let definition = Definition::from_parts(machine.definition.clone())?;
                let fingerprint = definition.fingerprint();
                let (id, _) = registry.register(definition);
                println!("{:<24} {} {}", machine.name, id, fingerprint);
            }
            println!(
                "{} machine(s), {} distinct definition(s)",
                config.machines.len(),
                registry.number_of_definitions()
            );
        }

        Commands::Snapshots => {
            let store = SnapshotStore::open(config.storage.snapshots_dir())?;
            for meta in store.list() {
                println!(
                    "{:<24} state={:<4} size={:<6} crc={} machine={}",
                    meta.name, meta.state, meta.size_bytes, meta.checksum, meta.machine
                );
            }
        }
    }

    Ok(())
}
