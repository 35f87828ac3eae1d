//! Run-log emission.
//!
//! The log is rebuilt from scratch each run: one key per pattern under its
//! entry's section, then a `stats` stanza describing the environment and
//! how long the run took.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::kv::KvDocument;

/// The environment stanza appended after the per-pattern outcomes.
#[derive(Debug, Clone)]
pub struct LogStats {
    pub version: String,
    pub build_date: String,
    pub fw_version: String,
    pub ams_version: String,
    pub ams_target_version: String,
    pub ams_keygen: String,
    pub ams_hash: String,
    pub is_emummc: bool,
    pub heap_size: u64,
    pub buffer_size: u64,
    pub patch_time: String,
}

/// Remove a previous run's log; missing files are fine.
pub fn remove_log(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Write the whole log: `(section, key, outcome)` rows in catalog order,
/// then the stats stanza. Rows sharing a key overwrite in place, so the
/// last row of a shared toggle wins, as it always has.
pub fn write_log<'a>(
    path: &Path,
    rows: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>,
    stats: &LogStats,
) -> Result<()> {
    let mut doc = KvDocument::new();
    for (section, key, outcome) in rows {
        doc.set(section, key, outcome);
    }

    doc.set("stats", "version", stats.version.as_str());
    doc.set("stats", "build_date", stats.build_date.as_str());
    doc.set("stats", "fw_version", stats.fw_version.as_str());
    doc.set("stats", "ams_version", stats.ams_version.as_str());
    doc.set("stats", "ams_target_version", stats.ams_target_version.as_str());
    doc.set("stats", "ams_keygen", stats.ams_keygen.as_str());
    doc.set("stats", "ams_hash", stats.ams_hash.as_str());
    doc.set("stats", "is_emummc", if stats.is_emummc { "1" } else { "0" });
    doc.set("stats", "heap_size", stats.heap_size.to_string());
    doc.set("stats", "buffer_size", stats.buffer_size.to_string());
    doc.set("stats", "patch_time", stats.patch_time.as_str());

    doc.save(path)
}

/// Render an elapsed time as seconds with millisecond precision, e.g.
/// `1.234s`.
pub fn format_patch_time(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    format!("{}.{:03}s", ms / 1000, ms % 1000)
}
