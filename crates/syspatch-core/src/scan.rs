//! Process discovery, region enumeration, and streamed scanning.
//!
//! The target is the process whose first debug event carries the entry's
//! title id. Its non-empty read+execute static-code regions are streamed
//! through a single reusable buffer in steps of `READ_BUFFER_SIZE -
//! OVERLAP`, each chunk carrying an `OVERLAP`-byte prefix from the one
//! before, so a pattern straddling a chunk boundary is still visible to at
//! least one matcher invocation. The target stays suspended while attached,
//! so the whole walk is kept short and the debug handle is released on
//! every exit path.

use tracing::{debug, trace};

use syspatch_host::{attach, DebugHost, DebugSession};

use crate::engine::{patch_chunk, EntryRun, RunContext};

/// Bytes fetched per debug read.
pub const READ_BUFFER_SIZE: usize = 0x1000;

/// Tail bytes carried between chunks. Must stay strictly greater than the
/// longest catalog pattern; re-derive when patterns are added.
pub const OVERLAP: usize = 0x4F;

const STEP: u64 = (READ_BUFFER_SIZE - OVERLAP) as u64;

/// What a scan did for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// The target was found and its code regions were streamed.
    Scanned,
    /// No running process matched the title id; prior results stand.
    ProcessNotFound,
    /// The entry's firmware window excluded this host.
    VersionSkipped,
}

/// The one streaming buffer, reused across regions, processes, and entries.
pub struct ScanBuffer {
    buf: Box<[u8; READ_BUFFER_SIZE + OVERLAP]>,
}

impl ScanBuffer {
    pub fn new() -> Self {
        ScanBuffer {
            buf: Box::new([0u8; READ_BUFFER_SIZE + OVERLAP]),
        }
    }

    fn reset(&mut self) {
        self.buf.fill(0);
    }
}

impl Default for ScanBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan one catalog entry: find its process, stream its code regions, and
/// let the engine transition pattern outcomes.
///
/// Host failures never escape: a process that cannot be found or attached
/// leaves prior results standing, and a failed region query or read ends
/// that enumeration only.
pub fn scan_entry<H: DebugHost>(
    host: &mut H,
    buffer: &mut ScanBuffer,
    run: &mut EntryRun<'_>,
    ctx: &RunContext,
) -> ScanStatus {
    if ctx.version_skip && !run.entry.fw.contains(ctx.facts.fw_version) {
        debug!(
            entry = run.entry.name,
            fw = %ctx.facts.fw_version,
            "entry outside firmware window"
        );
        run.skip_all();
        return ScanStatus::VersionSkipped;
    }

    let Ok(pids) = host.process_ids() else {
        return ScanStatus::ProcessNotFound;
    };

    for pid in pids {
        let Ok(mut session) = attach(host, pid) else {
            continue;
        };
        let Ok(title_id) = session.title_id() else {
            continue;
        };
        if title_id != run.entry.title_id {
            continue;
        }

        debug!(entry = run.entry.name, pid, title_id = %title_id, "attached");
        buffer.reset();
        scan_regions(&mut session, buffer, run, ctx);
        return ScanStatus::Scanned;
    }

    ScanStatus::ProcessNotFound
}

fn scan_regions<H: DebugHost>(
    session: &mut DebugSession<'_, H>,
    buffer: &mut ScanBuffer,
    run: &mut EntryRun<'_>,
    ctx: &RunContext,
) {
    let mut addr = 0u64;
    loop {
        let Ok(region) = session.query_region(addr) else {
            break;
        };
        addr = region.end();
        // Address 0 is the reserved tail of the address space.
        if addr == 0 {
            break;
        }
        if !region.is_scannable() {
            continue;
        }

        trace!(
            entry = run.entry.name,
            base = %format_args!("{:#x}", region.addr),
            size = region.size,
            "streaming region"
        );
        stream_region(session, buffer, run, ctx, region.addr, region.size);
    }
}

fn stream_region<H: DebugHost>(
    session: &mut DebugSession<'_, H>,
    buffer: &mut ScanBuffer,
    run: &mut EntryRun<'_>,
    ctx: &RunContext,
    region_addr: u64,
    region_size: u64,
) {
    let buf = &mut *buffer.buf;
    let mut cursor = 0u64;
    while cursor < region_size {
        let actual = (region_size - cursor).min(READ_BUFFER_SIZE as u64) as usize;
        if session
            .read_memory(region_addr + cursor, &mut buf[OVERLAP..OVERLAP + actual])
            .is_err()
        {
            break;
        }

        // The first OVERLAP bytes are carried from the previous chunk
        // (zero for the first), so the base address backs up by OVERLAP.
        let window_len = OVERLAP + actual;
        let base = region_addr.wrapping_add(cursor).wrapping_sub(OVERLAP as u64);
        patch_chunk(session, &buf[..window_len], base, &mut run.patterns, ctx);

        // Reads advance by STEP but fetch up to READ_BUFFER_SIZE, so the
        // bytes sitting just ahead of the next cursor are already in the
        // window at [STEP, STEP + OVERLAP). Those become the next prefix;
        // carrying the window's very last bytes instead would duplicate the
        // next read's head under addresses OVERLAP too low.
        if actual > STEP as usize {
            buf.copy_within(STEP as usize..STEP as usize + OVERLAP, 0);
            buf[OVERLAP..].fill(0);
        }

        cursor += STEP;
    }
}
