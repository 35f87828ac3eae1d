//! Memory-region descriptors reported by the debug channel.

use bitflags::bitflags;

bitflags! {
    /// Access permissions of a mapped region.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegionPerm: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

impl RegionPerm {
    pub const RX: RegionPerm = RegionPerm::READ.union(RegionPerm::EXECUTE);
}

/// Coarse classification of a region, mirroring the kernel's memory states.
/// Only `CodeStatic` is eligible for scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    Free,
    Io,
    Normal,
    CodeStatic,
    CodeMutable,
    Heap,
    SharedMemory,
    Reserved,
}

/// One contiguous virtual memory span of the target process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
    pub addr: u64,
    pub size: u64,
    pub perm: RegionPerm,
    pub mem_type: MemoryType,
}

impl RegionInfo {
    /// Address one past the region; wraps to 0 at the top of the address
    /// space, which region enumeration treats as the stop sentinel.
    pub fn end(&self) -> u64 {
        self.addr.wrapping_add(self.size)
    }

    /// Non-empty, readable+executable, static code: the only regions the
    /// scanner streams.
    pub fn is_scannable(&self) -> bool {
        self.size != 0
            && self.perm.contains(RegionPerm::RX)
            && self.mem_type == MemoryType::CodeStatic
    }
}
