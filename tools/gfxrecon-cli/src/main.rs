//! GfxRecon CLI - drive the reconstruction tracker from call scripts
//!
//! # Commands
//!
//! - `gfxrecon run` - Record a call script and save the replay snapshot
//! - `gfxrecon plan` - Record a call script and print the replay order
//! - `gfxrecon inspect` - Summarize a saved snapshot
//!
//! # Usage
//!
//! ```bash
//! # Record a script and write the snapshot
//! gfxrecon run calls.toml -o device.grcn
//!
//! # Show which calls would be replayed, in order
//! gfxrecon plan calls.toml
//!
//! # Summarize a snapshot as JSON
//! gfxrecon inspect device.grcn --json
//! ```
//!
//! # Tracker Config
//!
//! ```toml
//! violations = "log"
//! batched_descriptor_updates = false
//!
//! [snapshot]
//! compress = true
//! checksum = true
//! ```

mod inspect;
mod plan;
mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gfxrecon_core::{CallScript, TrackerConfig};

/// GfxRecon CLI - object tracking and replay reconstruction
#[derive(Parser)]
#[command(name = "gfxrecon")]
#[command(about = "Record call scripts and inspect reconstruction snapshots")]
#[command(version)]
struct Cli {
    /// Tracker config file (.toml); violations are logged when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a call script and save the replay snapshot
    Run(run::RunArgs),

    /// Record a call script and print the replay order
    Plan(plan::PlanArgs),

    /// Summarize a saved snapshot
    Inspect(inspect::InspectArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => run::execute(args, config),
        Commands::Plan(args) => plan::execute(args, config),
        Commands::Inspect(args) => inspect::execute(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    match path {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("Failed to load tracker config: {}", path.display())),
        None => Ok(TrackerConfig::lenient()),
    }
}

/// Load a call script, with the path in the error
pub(crate) fn load_script(path: &Path) -> Result<CallScript> {
    CallScript::from_file(path).with_context(|| format!("Failed to load call script: {}", path.display()))
}
