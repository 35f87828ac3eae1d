//! The patching core: the byte-pattern compiler and matcher, the
//! replacement-payload parser, the coarse instruction classifier, the
//! declarative patch catalog, the per-chunk patch engine, and the process
//! scanner that streams code regions through it.
//!
//! Everything here is deterministic for a given memory snapshot: entries in
//! declaration order, regions in ascending address order, chunks in
//! ascending order, patterns in declaration order, matches left to right.

pub mod catalog;
pub mod engine;
pub mod inst;
pub mod patch;
pub mod pattern;
pub mod scan;

pub use catalog::{Catalog, PatchEntry, PatternSpec, Replacement};
pub use engine::{CatalogRun, EntryRun, PatternRun, RunContext};
pub use patch::Patch;
pub use pattern::{MatchCell, Pattern};
pub use scan::{scan_entry, ScanBuffer, ScanStatus, OVERLAP, READ_BUFFER_SIZE};
