//! An ordered `[section]` / `key=value` document.
//!
//! This is a fixed external interface shared with the configuration UI, so
//! the codec is deliberately small: sections and keys keep insertion order,
//! values are opaque strings, `;`/`#` lines are comments. Unknown content
//! is preserved on load and written back untouched.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Default)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

/// An in-memory key-value document with read-modify-write file semantics.
#[derive(Debug, Clone, Default)]
pub struct KvDocument {
    sections: Vec<Section>,
    dirty: bool,
}

impl KvDocument {
    pub fn new() -> Self {
        KvDocument::default()
    }

    /// Parse the textual form. Lines that are neither a section header nor
    /// a `key=value` pair are dropped.
    pub fn parse(text: &str) -> Self {
        let mut doc = KvDocument::new();
        let mut current: Option<usize> = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                current = Some(doc.section_index(name.trim()));
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let idx = match current {
                    Some(idx) => idx,
                    // Keys before any header land in an unnamed section.
                    None => doc.section_index(""),
                };
                doc.sections[idx]
                    .entries
                    .push((key.trim().to_string(), value.trim().to_string()));
            }
        }
        doc.dirty = false;
        doc
    }

    /// Load from `path`; a missing file is an empty document.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(KvDocument::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(KvDocument::new()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    /// Write the document to `path` (atomic replace), creating parent
    /// directories as needed.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let tmp_path = path.with_extension("ini.tmp");
        fs::write(&tmp_path, self.to_string())
            .with_context(|| format!("failed to write temp file {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;
        self.dirty = false;
        Ok(())
    }

    fn section_index(&mut self, name: &str) -> usize {
        if let Some(idx) = self.sections.iter().position(|s| s.name == name) {
            return idx;
        }
        self.sections.push(Section {
            name: name.to_string(),
            entries: Vec::new(),
        });
        self.sections.len() - 1
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == section)?
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_key(&self, section: &str, key: &str) -> bool {
        self.get(section, key).is_some()
    }

    /// Set `section.key`, overwriting an existing value in place or
    /// appending in insertion order.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let idx = self.section_index(section);
        let entries = &mut self.sections[idx].entries;
        let value = value.into();
        if let Some((_, v)) = entries.iter_mut().find(|(k, _)| k == key) {
            if *v != value {
                *v = value;
                self.dirty = true;
            }
        } else {
            entries.push((key.to_string(), value));
            self.dirty = true;
        }
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Option<bool> {
        self.get(section, key).map(parse_bool)
    }

    /// Read a boolean, writing the default back when the key is absent.
    pub fn load_or_insert_bool(&mut self, section: &str, key: &str, default: bool) -> bool {
        match self.get_bool(section, key) {
            Some(value) => value,
            None => {
                self.set(section, key, if default { "1" } else { "0" });
                default
            }
        }
    }

    /// Whether the document changed since it was loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl fmt::Display for KvDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            if !section.name.is_empty() {
                writeln!(f, "[{}]", section.name)?;
            }
            for (key, value) in &section.entries {
                writeln!(f, "{}={}", key, value)?;
            }
        }
        Ok(())
    }
}

/// Truthy first characters, in the mold of the classic ini readers.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().bytes().next(),
        Some(b'1') | Some(b't') | Some(b'T') | Some(b'y') | Some(b'Y')
    )
}
