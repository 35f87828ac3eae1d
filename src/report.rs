//! Machine-readable mirror of the run log, for diffing runs.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub entries: Vec<EntryReport>,
    pub stats: StatsReport,
}

#[derive(Debug, Serialize)]
pub struct EntryReport {
    pub name: String,
    pub title_id: String,
    pub patterns: Vec<PatternReport>,
}

#[derive(Debug, Serialize)]
pub struct PatternReport {
    pub name: String,
    pub outcome: String,
}

#[derive(Debug, Serialize)]
pub struct StatsReport {
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
