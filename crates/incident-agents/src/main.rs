//! `incident-agents` — run the triage pipeline from the command line.
//!
//! ```bash
//! # Triage incidents with the simulated provider
//! incident-agents process incidents.json --pretty
//!
//! # Against a capability gateway, with a config file
//! TRIAGE_GATEWAY_URL=http://gateway:8080 incident-agents --config triage.toml process a.json b.json
//!
//! # Inspect what is active
//! incident-agents taxonomy
//! incident-agents config
//! ```
//!
//! Results go to stdout as JSON, logs to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coordination::{parse_incidents, Incident};
use incident_agents::{Pipeline, TriageConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (overrides TRIAGE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline over one or more incident JSON files
    Process {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Indent the JSON results
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Print the active intent taxonomy as JSON
    Taxonomy,
    /// Print the effective configuration as TOML
    Config,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("TRIAGE_LOG_LEVEL"))
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_incidents(files: &[PathBuf]) -> Result<Vec<Incident>> {
    let mut incidents = Vec::new();
    for path in files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let parsed = parse_incidents(&text)
            .with_context(|| format!("Failed to parse incidents in {}", path.display()))?;
        incidents.extend(parsed);
    }
    Ok(incidents)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = TriageConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Process { files, pretty } => {
            let incidents = read_incidents(&files)?;
            info!(count = incidents.len(), "triaging incidents");

            let pipeline = Arc::new(Pipeline::from_config(&config)?);
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing with partial RCA documents");
                    on_signal.cancel();
                }
            });

            for outcome in pipeline.process_batch(incidents, cancel).await {
                let line = if pretty {
                    serde_json::to_string_pretty(&outcome)?
                } else {
                    serde_json::to_string(&outcome)?
                };
                println!("{line}");
            }
        }
        Command::Taxonomy => {
            let taxonomy = config.load_taxonomy()?;
            println!("{}", serde_json::to_string_pretty(taxonomy.as_ref())?);
        }
        Command::Config => {
            println!("{}", toml::to_string_pretty(&config.redacted())?);
        }
    }

    Ok(())
}
