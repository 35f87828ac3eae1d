//! Configuration load with default write-back.
//!
//! Four global options plus one boolean toggle per catalog pattern, keyed
//! `[entry-name] pattern-name`. Every key absent from the file is written
//! back with its default so the configuration UI always sees the full set.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

use crate::kv::KvDocument;

/// The global options. Everything defaults to on.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub patch_sysmmc: bool,
    pub patch_emummc: bool,
    pub enable_logging: bool,
    pub version_skip: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            patch_sysmmc: true,
            patch_emummc: true,
            enable_logging: true,
            version_skip: true,
        }
    }
}

/// Loaded configuration: options plus per-pattern toggles.
#[derive(Debug, Clone)]
pub struct Config {
    pub options: Options,
    toggles: HashMap<(String, String), bool>,
}

impl Config {
    /// The toggle for `section.key`; unknown patterns default to enabled.
    pub fn is_enabled(&self, section: &str, key: &str) -> bool {
        self.toggles
            .get(&(section.to_string(), key.to_string()))
            .copied()
            .unwrap_or(true)
    }
}

/// Read the configuration store, writing defaults back for missing keys.
///
/// `toggles` lists `(section, key)` pairs in catalog order; duplicated
/// pairs (patterns sharing a toggle) collapse onto one stored key.
pub fn load_config(path: &Path, toggles: &[(&str, &str)]) -> Result<Config> {
    let mut doc = KvDocument::load(path)?;

    let options = Options {
        patch_sysmmc: doc.load_or_insert_bool("options", "patch_sysmmc", true),
        patch_emummc: doc.load_or_insert_bool("options", "patch_emummc", true),
        enable_logging: doc.load_or_insert_bool("options", "enable_logging", true),
        version_skip: doc.load_or_insert_bool("options", "version_skip", true),
    };

    let mut loaded = HashMap::new();
    for &(section, key) in toggles {
        let enabled = doc.load_or_insert_bool(section, key, true);
        loaded.insert((section.to_string(), key.to_string()), enabled);
    }

    if doc.is_dirty() {
        doc.save(path)?;
    }

    Ok(Config {
        options,
        toggles: loaded,
    })
}
