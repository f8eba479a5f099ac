//! Inspect command - summarize a saved snapshot

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gfxrecon_core::{ReplayBuffers, SnapshotTracker};
use serde::Serialize;

/// Arguments for the inspect command
#[derive(Args)]
pub struct InspectArgs {
    /// Snapshot file to read
    pub snapshot: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Snapshot summary
#[derive(Debug, Serialize)]
struct SnapshotSummary {
    handle_count: usize,
    call_count: usize,
    call_bytes: usize,
    handles: Vec<String>,
    call_sizes: Vec<usize>,
}

impl SnapshotSummary {
    fn new(buffers: &ReplayBuffers) -> Self {
        Self {
            handle_count: buffers.handles.len(),
            call_count: buffers.calls.len(),
            call_bytes: buffers.call_bytes(),
            handles: buffers.handles.iter().map(|h| format!("{h:#x}")).collect(),
            call_sizes: buffers.calls.iter().map(Vec::len).collect(),
        }
    }
}

/// Execute the inspect command
pub fn execute(args: InspectArgs) -> Result<()> {
    let file = File::open(&args.snapshot)
        .with_context(|| format!("Failed to open snapshot: {}", args.snapshot.display()))?;
    let buffers = SnapshotTracker::load_replay_buffers(BufReader::new(file))
        .with_context(|| format!("Failed to read snapshot: {}", args.snapshot.display()))?;
    let summary = SnapshotSummary::new(&buffers);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("=== Snapshot ===");
    println!("  File: {}", args.snapshot.display());
    println!("  Handles: {}", summary.handle_count);
    println!("  Calls: {} ({} bytes)", summary.call_count, summary.call_bytes);
    for (index, size) in summary.call_sizes.iter().enumerate() {
        println!("    {index:4}: {size} bytes");
    }
    Ok(())
}
