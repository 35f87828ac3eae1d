//! Persistence: the tiny `[section]`/`key=value` format shared by the
//! configuration store and the human-readable run log.

pub mod config;
pub mod kv;
pub mod log;

pub use config::{load_config, Config, Options};
pub use kv::KvDocument;
pub use log::{format_patch_time, remove_log, write_log, LogStats};
