//! Conduit CLI - startup composition and operator commands.
//!
//! ```text
//! main() -> ConduitConfig -> Conduit::build() -> run | validate | terminate | ...
//!                                 |
//!                                 v
//!          store + listener hub + command dispatcher + protocol services + pollers
//! ```
//!
//! `run` keeps the worker pool polling until Ctrl-C. The other subcommands act
//! once against the configured store and exit.

mod compose;

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use tokio::signal;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use conduit_config::ConduitConfig;
use conduit_engine::{CommandOutcome, Initiation, WorkerPool};
use conduit_types::{Command, ProcessId};
use conduit_validator::{MessageType, Validator};

use crate::compose::Conduit;

#[derive(Parser)]
#[command(name = "conduit")]
#[command(about = "Lifecycle core of a data-exchange connector", long_about = None)]
struct Cli {
    /// Config file (default: ~/.conduit/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the state-machine pollers until Ctrl-C
    Run,

    /// Validate a protocol message file
    Validate {
        /// Message type, e.g. contract-offer or transfer-request
        message_type: String,
        /// JSON document to check
        file: PathBuf,
    },

    /// Terminate a process
    Terminate {
        process_id: String,
        reason: String,
    },

    /// Complete a started transfer
    Complete { process_id: String },

    /// Start a consumer-side negotiation or transfer
    Initiate {
        #[arg(value_enum)]
        kind: ProcessKind,
        counter_party_id: String,
        counter_party_address: String,
        /// JSON payload stored on the process
        #[arg(long)]
        payload: Option<PathBuf>,
    },

    /// Print a stored process as JSON
    Show { process_id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProcessKind {
    Negotiation,
    Transfer,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.conduit/logs/conduit.log
    if let Some(data_dir) = conduit_config::data_dir() {
        candidates.push(data_dir.join("logs").join("conduit.log"));
    }

    // Fallback: ./.conduit/logs/conduit.log
    candidates.push(PathBuf::from(".conduit").join("logs").join("conduit.log"));

    candidates
}

fn load_config(path: Option<&Path>) -> Result<ConduitConfig> {
    let config = match path {
        Some(path) => ConduitConfig::load_from(path)?,
        None => ConduitConfig::load()?.unwrap_or_default(),
    };
    Ok(config)
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {} as JSON", path.display()))
}

fn process_id(raw: &str) -> Result<ProcessId> {
    ProcessId::new(raw).context("process id must not be empty")
}

fn validate(message_type: &str, file: &Path) -> Result<()> {
    let Some(message_type) = MessageType::parse(message_type) else {
        let known: Vec<&str> = MessageType::ALL.iter().map(|t| t.as_str()).collect();
        bail!(
            "unknown message type '{message_type}', expected one of: {}",
            known.join(", ")
        );
    };
    let document = read_json(file)?;

    match message_type.validator().validate(&document) {
        Ok(()) => {
            println!("{}: valid {message_type} message", file.display());
            Ok(())
        }
        Err(failure) => {
            for violation in failure.violations() {
                println!("{violation}");
            }
            bail!("{}: {failure}", file.display())
        }
    }
}

fn print_outcome(outcome: &CommandOutcome) -> Result<()> {
    match outcome {
        CommandOutcome::Applied(process) => {
            println!("{}", serde_json::to_string_pretty(process)?);
        }
        CommandOutcome::Ignored { state } => {
            println!("No change: command does not apply in state {state}");
        }
    }
    Ok(())
}

async fn run(conduit: &Conduit, config: &ConduitConfig) -> Result<()> {
    let pool = WorkerPool::start(
        &conduit.machines,
        config.state_machine.workers,
        config.state_machine.poll_interval(),
    );
    signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    tracing::info!("Shutdown requested");
    pool.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Commands::Validate { message_type, file } = &cli.command {
        return validate(message_type, file);
    }

    let config = load_config(cli.config.as_deref())?;
    let conduit = Conduit::build(&config)?;

    match cli.command {
        Commands::Run => run(&conduit, &config).await,
        Commands::Validate { .. } => Ok(()),
        Commands::Terminate { process_id: id, reason } => {
            let command = Command::terminate(process_id(&id)?, reason);
            print_outcome(&conduit.commands.dispatch(&command)?)
        }
        Commands::Complete { process_id: id } => {
            let command = Command::complete(process_id(&id)?);
            print_outcome(&conduit.commands.dispatch(&command)?)
        }
        Commands::Initiate {
            kind,
            counter_party_id,
            counter_party_address,
            payload,
        } => {
            let payload = match payload {
                Some(path) => read_json(&path)?,
                None => Value::Object(Map::new()),
            };
            let initiation = Initiation {
                counter_party_id,
                counter_party_address,
                payload,
            };
            let process = match kind {
                ProcessKind::Negotiation => conduit.negotiations.initiate(initiation)?,
                ProcessKind::Transfer => conduit.transfers.initiate(initiation)?,
            };
            println!("{}", serde_json::to_string_pretty(&process)?);
            Ok(())
        }
        Commands::Show { process_id: id } => {
            match conduit.store.find(&process_id(&id)?)? {
                Some(process) => println!("{}", serde_json::to_string_pretty(&process)?),
                None => bail!("Could not find Process with ID [{id}]"),
            }
            Ok(())
        }
    }
}
