//! Flat code-image directory backend.
//!
//! Each `<title-id>.bin` file in the directory (16 hex digits, e.g.
//! `0100000000000000.bin`) is exposed as one process with a single
//! read+execute static-code region. Successful runs flush patched bytes
//! back to the files; `dry_run` keeps every file untouched.
//!
//! This is the offline stand-in for a live console: the scanner and engine
//! drive exactly the same channel either way.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};

use syspatch_types::{MemoryType, RegionPerm, TitleId};

use crate::mem::{MemoryHost, MemoryProcess};
use crate::{DebugHandle, DebugHost};

/// Base address every image is mapped at.
pub const IMAGE_BASE_ADDR: u64 = 0x0800_0000;

/// [`DebugHost`] over a directory of flat code images.
pub struct ImageDirHost {
    inner: MemoryHost,
    files: HashMap<u64, PathBuf>,
    open_pids: HashMap<DebugHandle, u64>,
    dirty: BTreeSet<u64>,
    dry_run: bool,
}

impl ImageDirHost {
    /// Load every `*.bin` image in `dir`. Files whose stem is not a title id
    /// are skipped with a warning.
    pub fn open(dir: &Path, dry_run: bool) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed to read image directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("bin"))
            .collect();
        paths.sort();

        let mut inner = MemoryHost::new();
        let mut files = HashMap::new();
        for (idx, path) in paths.iter().enumerate() {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            let title_id: TitleId = match stem.parse() {
                Ok(id) => id,
                Err(_) => {
                    warn!(path = %path.display(), "skipping image with non-title-id name");
                    continue;
                }
            };
            let bytes = fs::read(path)
                .with_context(|| format!("failed to read image {}", path.display()))?;
            let pid = idx as u64 + 1;
            debug!(
                pid,
                title_id = %title_id,
                size = bytes.len(),
                "loaded code image"
            );
            inner.add_process(MemoryProcess::new(pid, title_id).with_region(
                IMAGE_BASE_ADDR,
                RegionPerm::RX,
                MemoryType::CodeStatic,
                bytes,
            ));
            files.insert(pid, path.clone());
        }

        Ok(ImageDirHost {
            inner,
            files,
            open_pids: HashMap::new(),
            dirty: BTreeSet::new(),
            dry_run,
        })
    }

    /// Write patched images back to disk. Returns how many files changed.
    pub fn flush(&mut self) -> Result<usize> {
        if self.dry_run {
            debug!(dirty = self.dirty.len(), "dry run, not flushing images");
            self.dirty.clear();
            return Ok(0);
        }
        let mut flushed = 0;
        for pid in std::mem::take(&mut self.dirty) {
            let path = self
                .files
                .get(&pid)
                .ok_or_else(|| anyhow!("no image file for pid {}", pid))?;
            let process = self
                .inner
                .process_by_pid(pid)
                .ok_or_else(|| anyhow!("no loaded image for pid {}", pid))?;
            let region = process
                .regions
                .first()
                .ok_or_else(|| anyhow!("image for pid {} has no region", pid))?;
            atomic_write(path, &region.bytes)?;
            flushed += 1;
        }
        Ok(flushed)
    }
}

/// Write to `<path>.tmp` then rename over the destination.
fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("bin.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("failed to write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

impl DebugHost for ImageDirHost {
    fn process_ids(&mut self) -> Result<Vec<u64>> {
        self.inner.process_ids()
    }

    fn open_debug(&mut self, pid: u64) -> Result<DebugHandle> {
        let handle = self.inner.open_debug(pid)?;
        self.open_pids.insert(handle, pid);
        Ok(handle)
    }

    fn close_debug(&mut self, handle: DebugHandle) {
        self.open_pids.remove(&handle);
        self.inner.close_debug(handle);
    }

    fn title_id(&mut self, handle: DebugHandle) -> Result<TitleId> {
        self.inner.title_id(handle)
    }

    fn query_region(&mut self, handle: DebugHandle, addr: u64) -> Result<syspatch_types::RegionInfo> {
        self.inner.query_region(handle, addr)
    }

    fn read_memory(&mut self, handle: DebugHandle, addr: u64, buf: &mut [u8]) -> Result<()> {
        self.inner.read_memory(handle, addr, buf)
    }

    fn write_memory(&mut self, handle: DebugHandle, addr: u64, data: &[u8]) -> Result<()> {
        self.inner.write_memory(handle, addr, data)?;
        if let Some(&pid) = self.open_pids.get(&handle) {
            self.dirty.insert(pid);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attach;
    use tempfile::TempDir;

    fn write_image(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_open_maps_images_by_title_id() {
        let dir = TempDir::new().unwrap();
        write_image(dir.path(), "0100000000000000.bin", &[1, 2, 3]);
        write_image(dir.path(), "010000000000002b.bin", &[4, 5, 6]);
        write_image(dir.path(), "notes.txt", &[0]);
        write_image(dir.path(), "garbage.bin", &[0]);

        let mut host = ImageDirHost::open(dir.path(), false).unwrap();
        let pids = host.process_ids().unwrap();
        assert_eq!(pids.len(), 2);

        let mut session = attach(&mut host, pids[0]).unwrap();
        assert_eq!(
            session.title_id().unwrap(),
            TitleId::new(0x0100000000000000)
        );
        let region = session.query_region(IMAGE_BASE_ADDR).unwrap();
        assert!(region.is_scannable());
        assert_eq!(region.size, 3);
    }

    #[test]
    fn test_flush_writes_only_dirty_images() {
        let dir = TempDir::new().unwrap();
        let patched = write_image(dir.path(), "0100000000000000.bin", &[0u8; 16]);
        let untouched = write_image(dir.path(), "0100000000000001.bin", &[0u8; 16]);

        let mut host = ImageDirHost::open(dir.path(), false).unwrap();
        {
            let mut session = attach(&mut host, 1).unwrap();
            session.write_memory(IMAGE_BASE_ADDR + 4, &[0xE0, 0x03, 0x1F, 0x2A]).unwrap();
        }
        assert_eq!(host.flush().unwrap(), 1);

        let bytes = fs::read(&patched).unwrap();
        assert_eq!(&bytes[4..8], &[0xE0, 0x03, 0x1F, 0x2A]);
        assert_eq!(fs::read(&untouched).unwrap(), vec![0u8; 16]);
    }

    #[test]
    fn test_dry_run_never_touches_files() {
        let dir = TempDir::new().unwrap();
        let path = write_image(dir.path(), "0100000000000000.bin", &[0u8; 16]);

        let mut host = ImageDirHost::open(dir.path(), true).unwrap();
        {
            let mut session = attach(&mut host, 1).unwrap();
            session.write_memory(IMAGE_BASE_ADDR, &[0xFF; 4]).unwrap();
        }
        assert_eq!(host.flush().unwrap(), 0);
        assert_eq!(fs::read(&path).unwrap(), vec![0u8; 16]);
    }
}
