//! In-memory host backend.
//!
//! Backs the image-directory CLI mode and every test that needs a target
//! process without a live kernel. Write faults are injectable per address
//! range so the engine's failure path can be exercised.

use std::ops::Range;

use anyhow::{anyhow, bail, Result};
use syspatch_types::{MemoryType, RegionInfo, RegionPerm, TitleId};

use crate::{DebugHandle, DebugHost};

/// One mapped span of a fake process.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    pub addr: u64,
    pub perm: RegionPerm,
    pub mem_type: MemoryType,
    pub bytes: Vec<u8>,
}

impl MemoryRegion {
    pub fn info(&self) -> RegionInfo {
        RegionInfo {
            addr: self.addr,
            size: self.bytes.len() as u64,
            perm: self.perm,
            mem_type: self.mem_type,
        }
    }

    fn contains(&self, addr: u64) -> bool {
        addr >= self.addr && addr.wrapping_sub(self.addr) < self.bytes.len() as u64
    }
}

/// A fake process: pid, title id, and its mapped regions.
#[derive(Debug, Clone)]
pub struct MemoryProcess {
    pub pid: u64,
    pub title_id: TitleId,
    pub debuggable: bool,
    pub regions: Vec<MemoryRegion>,
}

impl MemoryProcess {
    pub fn new(pid: u64, title_id: TitleId) -> Self {
        MemoryProcess {
            pid,
            title_id,
            debuggable: true,
            regions: Vec::new(),
        }
    }

    pub fn with_region(
        mut self,
        addr: u64,
        perm: RegionPerm,
        mem_type: MemoryType,
        bytes: Vec<u8>,
    ) -> Self {
        self.regions.push(MemoryRegion {
            addr,
            perm,
            mem_type,
            bytes,
        });
        self.regions.sort_by_key(|r| r.addr);
        self
    }

    /// Processes that refuse a debugger, for exercising the attach-skip path.
    pub fn refusing_debugger(mut self) -> Self {
        self.debuggable = false;
        self
    }
}

/// In-memory [`DebugHost`]. Enforces the single-debugger contract: a second
/// `open_debug` while a handle is outstanding is an error, which makes
/// leaked handles show up in tests immediately.
#[derive(Debug, Default)]
pub struct MemoryHost {
    processes: Vec<MemoryProcess>,
    attached: Option<(DebugHandle, usize)>,
    next_handle: u32,
    poisoned: Vec<Range<u64>>,
    writes: Vec<(u64, usize)>,
}

impl MemoryHost {
    pub fn new() -> Self {
        MemoryHost::default()
    }

    pub fn add_process(&mut self, process: MemoryProcess) {
        self.processes.push(process);
    }

    /// Reject writes overlapping `range` with an error, leaving memory
    /// untouched.
    pub fn poison_writes(&mut self, range: Range<u64>) {
        self.poisoned.push(range);
    }

    /// `(addr, len)` of every successful write, in order.
    pub fn writes(&self) -> &[(u64, usize)] {
        &self.writes
    }

    pub fn process_by_pid(&self, pid: u64) -> Option<&MemoryProcess> {
        self.processes.iter().find(|p| p.pid == pid)
    }

    /// Read back target memory for assertions, addressed by title id.
    pub fn read_bytes(&self, title_id: TitleId, addr: u64, len: usize) -> Option<Vec<u8>> {
        let process = self.processes.iter().find(|p| p.title_id == title_id)?;
        let region = process.regions.iter().find(|r| r.contains(addr))?;
        let off = (addr - region.addr) as usize;
        region.bytes.get(off..off + len).map(|b| b.to_vec())
    }

    fn attached_index(&self, handle: DebugHandle) -> Result<usize> {
        match self.attached {
            Some((open, idx)) if open == handle => Ok(idx),
            _ => Err(anyhow!("stale or unknown debug handle {:?}", handle)),
        }
    }
}

impl DebugHost for MemoryHost {
    fn process_ids(&mut self) -> Result<Vec<u64>> {
        Ok(self.processes.iter().map(|p| p.pid).collect())
    }

    fn open_debug(&mut self, pid: u64) -> Result<DebugHandle> {
        if let Some((handle, _)) = self.attached {
            bail!("debugger already attached (handle {:?} not released)", handle);
        }
        let idx = self
            .processes
            .iter()
            .position(|p| p.pid == pid)
            .ok_or_else(|| anyhow!("no process with pid {}", pid))?;
        if !self.processes[idx].debuggable {
            bail!("process {} refuses a debugger", pid);
        }
        self.next_handle += 1;
        let handle = DebugHandle(self.next_handle);
        self.attached = Some((handle, idx));
        Ok(handle)
    }

    fn close_debug(&mut self, handle: DebugHandle) {
        if matches!(self.attached, Some((open, _)) if open == handle) {
            self.attached = None;
        }
    }

    fn title_id(&mut self, handle: DebugHandle) -> Result<TitleId> {
        let idx = self.attached_index(handle)?;
        Ok(self.processes[idx].title_id)
    }

    fn query_region(&mut self, handle: DebugHandle, addr: u64) -> Result<RegionInfo> {
        let idx = self.attached_index(handle)?;
        let process = &self.processes[idx];

        if let Some(region) = process.regions.iter().find(|r| r.contains(addr)) {
            return Ok(region.info());
        }

        // Synthesize the free span up to the next mapping, or to the top of
        // the address space (whose end wraps to 0, the enumeration sentinel).
        let next_start = process
            .regions
            .iter()
            .map(|r| r.addr)
            .filter(|&start| start > addr)
            .min();
        let size = match next_start {
            Some(start) => start - addr,
            None => 0u64.wrapping_sub(addr),
        };
        Ok(RegionInfo {
            addr,
            size,
            perm: RegionPerm::empty(),
            mem_type: MemoryType::Free,
        })
    }

    fn read_memory(&mut self, handle: DebugHandle, addr: u64, buf: &mut [u8]) -> Result<()> {
        let idx = self.attached_index(handle)?;
        let process = &self.processes[idx];
        let region = process
            .regions
            .iter()
            .find(|r| r.contains(addr))
            .ok_or_else(|| anyhow!("read from unmapped address {:#x}", addr))?;
        let off = (addr - region.addr) as usize;
        let end = off
            .checked_add(buf.len())
            .filter(|&end| end <= region.bytes.len())
            .ok_or_else(|| anyhow!("read of {} bytes at {:#x} crosses region end", buf.len(), addr))?;
        buf.copy_from_slice(&region.bytes[off..end]);
        Ok(())
    }

    fn write_memory(&mut self, handle: DebugHandle, addr: u64, data: &[u8]) -> Result<()> {
        let idx = self.attached_index(handle)?;
        let end_addr = addr.wrapping_add(data.len() as u64);
        if self
            .poisoned
            .iter()
            .any(|r| addr < r.end && end_addr > r.start)
        {
            bail!("debug write of {} bytes at {:#x} rejected", data.len(), addr);
        }
        let process = &mut self.processes[idx];
        let region = process
            .regions
            .iter_mut()
            .find(|r| r.contains(addr))
            .ok_or_else(|| anyhow!("write to unmapped address {:#x}", addr))?;
        let off = (addr - region.addr) as usize;
        let end = off
            .checked_add(data.len())
            .filter(|&end| end <= region.bytes.len())
            .ok_or_else(|| anyhow!("write of {} bytes at {:#x} crosses region end", data.len(), addr))?;
        region.bytes[off..end].copy_from_slice(data);
        self.writes.push((addr, data.len()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attach;

    const TID: TitleId = TitleId::new(0x0100000000000000);

    fn host_with_one_region() -> MemoryHost {
        let mut host = MemoryHost::new();
        host.add_process(MemoryProcess::new(7, TID).with_region(
            0x1000,
            RegionPerm::RX,
            MemoryType::CodeStatic,
            vec![0xAA; 0x100],
        ));
        host
    }

    #[test]
    fn test_query_walks_mapped_and_free_spans() {
        let mut host = host_with_one_region();
        let mut session = attach(&mut host, 7).unwrap();

        let gap = session.query_region(0).unwrap();
        assert_eq!(gap.mem_type, MemoryType::Free);
        assert_eq!(gap.end(), 0x1000);

        let code = session.query_region(gap.end()).unwrap();
        assert!(code.is_scannable());
        assert_eq!(code.end(), 0x1100);

        // The trailing free span runs to the top of the address space.
        let tail = session.query_region(code.end()).unwrap();
        assert_eq!(tail.end(), 0);
    }

    #[test]
    fn test_single_debugger_enforced_and_released_on_drop() {
        let mut host = host_with_one_region();
        {
            let _session = attach(&mut host, 7).unwrap();
        }
        // Dropping the first session released the handle.
        let second = attach(&mut host, 7);
        assert!(second.is_ok());
    }

    #[test]
    fn test_poisoned_write_is_rejected_and_memory_untouched() {
        let mut host = host_with_one_region();
        host.poison_writes(0x1010..0x1020);
        {
            let mut session = attach(&mut host, 7).unwrap();
            assert!(session.write_memory(0x1018, &[1, 2, 3, 4]).is_err());
            assert!(session.write_memory(0x1020, &[1, 2, 3, 4]).is_ok());
        }
        assert_eq!(host.read_bytes(TID, 0x1018, 4).unwrap(), vec![0xAA; 4]);
        assert_eq!(host.read_bytes(TID, 0x1020, 4).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(host.writes().len(), 1);
    }

    #[test]
    fn test_read_crossing_region_end_errors() {
        let mut host = host_with_one_region();
        let mut session = attach(&mut host, 7).unwrap();
        let mut buf = [0u8; 8];
        assert!(session.read_memory(0x10FC, &mut buf).is_err());
        assert!(session.read_memory(0x10F8, &mut buf).is_ok());
    }

    #[test]
    fn test_undebuggable_process_refuses_attach() {
        let mut host = MemoryHost::new();
        host.add_process(MemoryProcess::new(3, TID).refusing_debugger());
        assert!(attach(&mut host, 3).is_err());
    }
}
