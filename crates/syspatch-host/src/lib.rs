//! The debug-memory channel the scanner drives, and the backends that
//! implement it.
//!
//! The trait mirrors the host kernel's debug surface, one call per
//! operation: list process ids, open one for debugging, read the title id
//! from the first debug event, walk memory regions, and read/write target
//! memory. Between open and close the target is suspended, so callers keep
//! sessions short and must release the handle on every exit path;
//! [`DebugSession`] encodes that as drop-to-detach.

pub mod image;
pub mod mem;

use anyhow::Result;
use syspatch_types::{RegionInfo, TitleId};

/// Opaque handle to an attached process, in the mold of a kernel handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugHandle(pub u32);

/// Host operations needed to discover, inspect, and patch a target process.
pub trait DebugHost {
    /// Ids of the currently running processes.
    fn process_ids(&mut self) -> Result<Vec<u64>>;

    /// Attach to a process for debugging. Fails for processes that refuse a
    /// debugger; callers move on to the next candidate.
    fn open_debug(&mut self, pid: u64) -> Result<DebugHandle>;

    /// Release a debug handle, resuming the target.
    fn close_debug(&mut self, handle: DebugHandle);

    /// Title id carried by the first debug event of the attached process.
    fn title_id(&mut self, handle: DebugHandle) -> Result<TitleId>;

    /// The region containing `addr`. Errors end region enumeration for this
    /// process; results already produced stand.
    fn query_region(&mut self, handle: DebugHandle, addr: u64) -> Result<RegionInfo>;

    /// Read `buf.len()` bytes of target memory at `addr`.
    fn read_memory(&mut self, handle: DebugHandle, addr: u64, buf: &mut [u8]) -> Result<()>;

    /// Write bytes into target memory at `addr`.
    fn write_memory(&mut self, handle: DebugHandle, addr: u64, data: &[u8]) -> Result<()>;
}

/// An open debug handle paired with its host. Detaches on drop, so every
/// exit path (including errors) resumes the target.
pub struct DebugSession<'a, H: DebugHost> {
    host: &'a mut H,
    handle: DebugHandle,
}

/// Attach to `pid` for the duration of the returned session.
pub fn attach<H: DebugHost>(host: &mut H, pid: u64) -> Result<DebugSession<'_, H>> {
    let handle = host.open_debug(pid)?;
    Ok(DebugSession { host, handle })
}

impl<'a, H: DebugHost> DebugSession<'a, H> {
    pub fn title_id(&mut self) -> Result<TitleId> {
        self.host.title_id(self.handle)
    }

    pub fn query_region(&mut self, addr: u64) -> Result<RegionInfo> {
        self.host.query_region(self.handle, addr)
    }

    pub fn read_memory(&mut self, addr: u64, buf: &mut [u8]) -> Result<()> {
        self.host.read_memory(self.handle, addr, buf)
    }

    pub fn write_memory(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        self.host.write_memory(self.handle, addr, data)
    }
}

impl<'a, H: DebugHost> Drop for DebugSession<'a, H> {
    fn drop(&mut self) {
        self.host.close_debug(self.handle);
    }
}
