//! Reception CLI - Offline tools over reception load responses.
//!
//! Every command reads reception JSON as returned by persistence on load.
//!
//! # Usage
//!
//! ```bash
//! # Show mode, edit permission, prices and totals
//! rx-cli inspect reception.json
//!
//! # Print the canonical form used for change detection
//! rx-cli canonical reception.json
//!
//! # Compare two receptions by canonical form
//! rx-cli diff before.json after.json
//!
//! # Check a proposed state against the original (partial-edit rules included)
//! rx-cli validate original.json proposed.json
//!
//! # Print the save payload that would be sent to persistence
//! rx-cli export reception.json
//! ```
//!
//! # Environment Variables
//!
//! - `RECEPTION_WEIGHT_TOLERANCE` - Allowed per-lot net weight drift (default 0.01)
//! - `RECEPTION_PARTIAL_EDIT_KEYWORDS` - Comma-separated words marking a
//!   box-usage refusal
//! - `RUST_LOG` - Log filter (default `warn`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use reception_engine::EngineConfig;

mod commands;

#[derive(Parser)]
#[command(name = "rx-cli")]
#[command(author, version, about = "Raw material reception tools")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a reception
    Inspect {
        /// Load response JSON
        file: PathBuf,
    },
    /// Print the canonical form of a reception
    Canonical {
        /// Load response JSON
        file: PathBuf,
    },
    /// Report whether two receptions differ
    Diff {
        /// Baseline load response
        a: PathBuf,
        /// Load response to compare
        b: PathBuf,
    },
    /// Validate a proposed reception against its original
    Validate {
        /// Load response before editing
        original: PathBuf,
        /// Load response after editing
        proposed: PathBuf,
    },
    /// Print the save payload for a reception
    Export {
        /// Load response JSON
        file: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Logs go to stderr so command output on stdout stays parseable.
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!json).then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let config = EngineConfig::from_env()?;
    match cli.command {
        Commands::Inspect { file } => commands::inspect::inspect(&file, &config).await?,
        Commands::Canonical { file } => commands::inspect::canonical(&file, &config).await?,
        Commands::Diff { a, b } => commands::compare::diff(&a, &b, &config).await?,
        Commands::Validate { original, proposed } => {
            commands::compare::validate(&original, &proposed, &config).await?;
        }
        Commands::Export { file } => commands::export::export(&file, &config).await?,
    }
    Ok(())
}
