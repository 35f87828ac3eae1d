//! The one-shot boot pipeline: configuration, the MMC policy gate, one scan
//! per catalog entry, then the run log.

use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

use syspatch_core::{scan_entry, Catalog, CatalogRun, RunContext, ScanBuffer, READ_BUFFER_SIZE};
use syspatch_host::image::ImageDirHost;
use syspatch_store::{format_patch_time, load_config, remove_log, write_log, LogStats};
use syspatch_types::{EmummcPaths, SystemFacts};

use crate::args::Args;
use crate::report::{EntryReport, PatternReport, RunReport, StatsReport};

/// Static scratch heap the patcher reserves for itself; reported in the
/// log's stats stanza.
pub const INNER_HEAP_SIZE: u64 = 0x1000;

/// Execute one full run and return the report that mirrors the log.
pub fn run(args: &Args) -> Result<RunReport> {
    let catalog = Catalog::builtin();
    let toggles: Vec<(&str, &str)> = catalog
        .entries
        .iter()
        .flat_map(|entry| entry.patterns.iter().map(move |p| (entry.name, p.name)))
        .collect();

    remove_log(&args.log).context("failed to clear previous run log")?;
    let config = load_config(&args.config, &toggles).context("failed to load configuration")?;

    let mut runs = CatalogRun::new(&catalog);
    for entry_run in &mut runs.entries {
        let section = entry_run.entry.name;
        for pattern in &mut entry_run.patterns {
            pattern.set_enabled(config.is_enabled(section, pattern.spec.name));
        }
    }

    let emummc_paths = if args.emummc {
        EmummcPaths::from_paths("emummc/", "emummc/Nintendo")
    } else {
        EmummcPaths::empty()
    };
    let emummc = emummc_paths.is_emummc();
    let facts = SystemFacts {
        fw_version: args.firmware,
        ams_version: args.ams_version,
        ams_target_version: args.ams_target,
        ams_keygen: args.keygen,
        ams_hash: args.ams_hash,
        emummc,
    };
    let ctx = RunContext {
        facts,
        version_skip: config.options.version_skip,
    };

    // The policy gate: each MMC mode has its own opt-out.
    let enable_patching = if emummc {
        config.options.patch_emummc
    } else {
        config.options.patch_sysmmc
    };

    let started = Instant::now();
    if enable_patching {
        let mut host = ImageDirHost::open(&args.image_dir, args.dry_run)
            .context("failed to open image directory")?;
        let mut buffer = ScanBuffer::new();
        for entry_run in &mut runs.entries {
            let status = scan_entry(&mut host, &mut buffer, entry_run, &ctx);
            debug!(entry = entry_run.entry.name, ?status, "entry done");
        }
        let flushed = host.flush().context("failed to flush patched images")?;
        if flushed > 0 {
            info!(files = flushed, "flushed patched images");
        }
    } else {
        info!(emummc, "patching disabled by MMC policy");
    }
    let patch_time = format_patch_time(started.elapsed());

    let report = build_report(&runs, enable_patching, &facts, patch_time);

    if config.options.enable_logging {
        let rows = report.entries.iter().flat_map(|entry| {
            entry
                .patterns
                .iter()
                .map(move |p| (entry.name.as_str(), p.name.as_str(), p.outcome.as_str()))
        });
        let stats = LogStats {
            version: report.stats.version.clone(),
            build_date: report.stats.build_date.clone(),
            fw_version: report.stats.fw_version.clone(),
            ams_version: report.stats.ams_version.clone(),
            ams_target_version: report.stats.ams_target_version.clone(),
            ams_keygen: report.stats.ams_keygen.clone(),
            ams_hash: report.stats.ams_hash.clone(),
            is_emummc: report.stats.is_emummc,
            heap_size: report.stats.heap_size,
            buffer_size: report.stats.buffer_size,
            patch_time: report.stats.patch_time.clone(),
        };
        write_log(&args.log, rows, &stats).context("failed to write run log")?;
    }

    if let Some(path) = &args.emit_report_json {
        let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        fs::write(path, json)
            .with_context(|| format!("failed to write report {}", path.display()))?;
    }

    Ok(report)
}

fn build_report(
    runs: &CatalogRun<'_>,
    enable_patching: bool,
    facts: &SystemFacts,
    patch_time: String,
) -> RunReport {
    let entries = runs
        .entries
        .iter()
        .map(|entry_run| EntryReport {
            name: entry_run.entry.name.to_string(),
            title_id: entry_run.entry.title_id.to_string(),
            patterns: entry_run
                .patterns
                .iter()
                .map(|p| PatternReport {
                    name: p.spec.name.to_string(),
                    // With patching disabled by policy, the whole catalog
                    // reports Skipped; nothing was scanned or written.
                    outcome: if enable_patching {
                        p.outcome.as_log_str().to_string()
                    } else {
                        "Skipped".to_string()
                    },
                })
                .collect(),
        })
        .collect();

    RunReport {
        entries,
        stats: StatsReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_date: env!("SYS_PATCH_BUILD_DATE").to_string(),
            fw_version: facts.fw_version.to_string(),
            ams_version: facts.ams_version.to_string(),
            ams_target_version: facts.ams_target_version.to_string(),
            ams_keygen: facts.ams_keygen.to_string(),
            ams_hash: format!("{:08x}", (facts.ams_hash >> 32) as u32),
            is_emummc: facts.emummc,
            heap_size: INNER_HEAP_SIZE,
            buffer_size: READ_BUFFER_SIZE as u64,
            patch_time,
        },
    }
}
