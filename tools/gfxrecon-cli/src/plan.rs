//! Plan command - print the replay order for a call script

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use gfxrecon_core::{SnapshotTracker, TrackerConfig};

/// Arguments for the plan command
#[derive(Args)]
pub struct PlanArgs {
    /// Call script to record (.toml)
    pub script: PathBuf,
}

/// Execute the plan command
pub fn execute(args: PlanArgs, config: TrackerConfig) -> Result<()> {
    let script = crate::load_script(&args.script)?;
    let tracker = SnapshotTracker::new(config);
    let report = script.play(&tracker)?;
    for (index, name, err) in &report.failures {
        println!("skipped call {index} ({name}): {err}");
    }

    let replay = tracker.compute_replay_buffer();
    tracker.with_state(|recon| {
        for (position, call) in replay.calls.iter().enumerate() {
            let id = call.to_string();
            match recon.trace().get(*call) {
                Some(record) => {
                    let created: Vec<String> = record.created.iter().map(|h| h.to_string()).collect();
                    println!(
                        "{position:4}  {id:<6}  {:<40} {:?} [{}]",
                        record.name,
                        record.effect,
                        created.join(", ")
                    );
                }
                None => println!("{position:4}  {id:<6}  <missing>"),
            }
        }
    });

    let stats = tracker.stats();
    println!(
        "{} calls, {} live handles ({} modified), {} awaiting destroy, {} action nodes, {} edges",
        replay.len(),
        stats.live_handles,
        stats.modified_objects,
        stats.delayed_destroys,
        stats.action_nodes,
        stats.edges
    );
    Ok(())
}
