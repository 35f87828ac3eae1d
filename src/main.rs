//! Boot-time binary patcher for console system processes.
//!
//! Scans the code regions of a fixed set of privileged processes for known
//! byte patterns, verifies each candidate site against a coarse instruction
//! check, and overwrites a few bytes through the debug-memory channel to
//! neutralize signature and integrity checks. Runs once, records what it
//! did, exits.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sys_patch::args::Args;
use sys_patch::runner;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let report = runner::run(&args)?;

    for entry in &report.entries {
        for pattern in &entry.patterns {
            println!("{}/{}: {}", entry.name, pattern.name, pattern.outcome);
        }
    }
    println!("patch_time: {}", report.stats.patch_time);
    Ok(())
}
