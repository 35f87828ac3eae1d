//! The per-chunk patch engine.
//!
//! For each live pattern of an entry: find a match in the streamed window,
//! bounds-check the instruction and patch sites, verify the instruction
//! family, then either write the replacement through the debug channel or
//! recognize an already-applied payload. Each pattern makes at most one
//! transition out of its initial state per run; later chunks short-circuit
//! on the terminal `Patched*`/`Disabled` states.

use tracing::{debug, trace, warn};

use syspatch_host::{DebugHost, DebugSession};
use syspatch_types::{Outcome, SystemFacts};

use crate::catalog::{Catalog, PatchEntry, PatternSpec};

/// Environment facts and global toggles, fixed at startup and threaded
/// through the engine explicitly.
#[derive(Debug, Clone, Copy)]
pub struct RunContext {
    pub facts: SystemFacts,
    /// When set, patterns and entries outside their version windows are
    /// marked `Skipped` instead of scanned.
    pub version_skip: bool,
}

impl RunContext {
    /// Whether the current firmware/tool versions fall inside the row's
    /// windows.
    fn version_allows(&self, spec: &PatternSpec) -> bool {
        spec.fw.contains(self.facts.fw_version) && spec.ams.contains(self.facts.ams_version)
    }
}

// =============================================================================
// Run state
// =============================================================================

/// Mutable per-run state of one catalog row: the config toggle and the
/// outcome. The catalog itself never changes.
#[derive(Debug)]
pub struct PatternRun<'a> {
    pub spec: &'a PatternSpec,
    pub enabled: bool,
    pub outcome: Outcome,
}

impl<'a> PatternRun<'a> {
    fn new(spec: &'a PatternSpec) -> Self {
        PatternRun {
            spec,
            enabled: true,
            outcome: Outcome::NotFound,
        }
    }

    /// Apply the configuration toggle. A disabled pattern enters (and
    /// stays) `Disabled`.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.outcome = Outcome::Disabled;
        }
    }
}

/// Run state for one entry.
#[derive(Debug)]
pub struct EntryRun<'a> {
    pub entry: &'a PatchEntry,
    pub patterns: Vec<PatternRun<'a>>,
}

impl<'a> EntryRun<'a> {
    /// Mark every still-live pattern `Skipped` (entry-level version gate).
    pub fn skip_all(&mut self) {
        for p in &mut self.patterns {
            if p.outcome != Outcome::Disabled {
                p.outcome = Outcome::Skipped;
            }
        }
    }
}

/// Run state for the whole catalog.
#[derive(Debug)]
pub struct CatalogRun<'a> {
    pub entries: Vec<EntryRun<'a>>,
}

impl<'a> CatalogRun<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        CatalogRun {
            entries: catalog
                .entries
                .iter()
                .map(|entry| EntryRun {
                    entry,
                    patterns: entry.patterns.iter().map(PatternRun::new).collect(),
                })
                .collect(),
        }
    }
}

// =============================================================================
// The engine
// =============================================================================

/// `base + offset` clamped to a window slot of `len` bytes, or `None` when
/// any part of the slot falls outside the window.
fn site_in_window(window_len: usize, base: usize, offset: i32, len: usize) -> Option<usize> {
    let idx = base as i64 + offset as i64;
    if idx < 0 {
        return None;
    }
    let idx = idx as usize;
    (idx.checked_add(len)? <= window_len).then_some(idx)
}

/// Run every live pattern of an entry over one streamed chunk.
///
/// `window` holds `OVERLAP` carried bytes followed by the fresh read;
/// `base_addr` is the absolute address of `window[0]` in the target, so
/// patch offsets resolve to absolute write addresses.
pub fn patch_chunk<H: DebugHost>(
    session: &mut DebugSession<'_, H>,
    window: &[u8],
    base_addr: u64,
    patterns: &mut [PatternRun<'_>],
    ctx: &RunContext,
) {
    for p in patterns {
        match p.outcome {
            Outcome::Disabled | Outcome::PatchedFile | Outcome::PatchedSysPatch => continue,
            _ => {}
        }
        if ctx.version_skip && !ctx.version_allows(p.spec) {
            p.outcome = Outcome::Skipped;
            continue;
        }

        let patch_len = p.spec.replacement.len();
        let mut next = 0;
        while let Some(at) = p.spec.pattern.find_from(window, next) {
            next = at + 1;

            // Both the instruction word and the whole patch window must sit
            // inside this chunk; otherwise the site is abandoned.
            let Some(inst_at) = site_in_window(window.len(), at, p.spec.inst_offset, 4) else {
                continue;
            };
            let Some(patch_at) =
                site_in_window(window.len(), inst_at, p.spec.patch_offset, patch_len)
            else {
                continue;
            };

            let inst = u32::from_le_bytes(window[inst_at..inst_at + 4].try_into().unwrap());

            if p.spec.check.accepts(inst) {
                let patch = p.spec.replacement.produce(inst);
                let target = base_addr.wrapping_add(patch_at as u64);
                match session.write_memory(target, patch.bytes()) {
                    Ok(()) => {
                        debug!(
                            patch = p.spec.name,
                            addr = %format_args!("{:#x}", target),
                            len = patch.len(),
                            "patched"
                        );
                        p.outcome = Outcome::PatchedSysPatch;
                    }
                    Err(e) => {
                        warn!(patch = p.spec.name, error = %e, "debug write failed");
                        p.outcome = Outcome::WriteFailed;
                    }
                }
                break;
            } else if p.spec.replacement.is_applied(&window[patch_at..], inst) {
                trace!(patch = p.spec.name, "already patched from file");
                p.outcome = Outcome::PatchedFile;
                break;
            }
            // Neither the expected instruction nor an applied payload: keep
            // scanning, the window may hold another candidate.
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
