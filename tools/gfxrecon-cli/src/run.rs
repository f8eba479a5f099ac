//! Run command - record a call script and save the replay snapshot

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gfxrecon_core::{SnapshotTracker, TrackerConfig};

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Call script to record (.toml)
    pub script: PathBuf,

    /// Snapshot file to write
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Execute the run command
pub fn execute(args: RunArgs, config: TrackerConfig) -> Result<()> {
    let script = crate::load_script(&args.script)?;
    let tracker = SnapshotTracker::new(config);
    let report = script.play(&tracker)?;

    println!(
        "Recorded {} calls from {}",
        report.recorded.len(),
        args.script.display()
    );
    for (index, name, err) in &report.failures {
        println!("  call {index} ({name}): {err}");
    }

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create snapshot: {}", args.output.display()))?;
    let buffers = tracker
        .save_replay_buffers(BufWriter::new(file))
        .with_context(|| format!("Failed to write snapshot: {}", args.output.display()))?;

    println!(
        "Saved {} handles and {} calls to {}",
        buffers.handles.len(),
        buffers.calls.len(),
        args.output.display()
    );

    if !report.is_clean() {
        anyhow::bail!("{} script calls failed", report.failures.len());
    }
    Ok(())
}
