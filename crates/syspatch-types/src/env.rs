//! Environment facts gathered once at startup.

use serde::Serialize;

use crate::version::Version;

/// Length of each path field in the emulated-MMC probe reply.
pub const EMUMMC_PATH_LEN: usize = 0x80;

/// Reply of the secure-monitor emulated-MMC probe: two fixed-size path
/// buffers. A non-empty first byte in either means the host boots from an
/// emulated MMC.
#[derive(Clone, Copy)]
pub struct EmummcPaths {
    pub storage_path: [u8; EMUMMC_PATH_LEN],
    pub nintendo_path: [u8; EMUMMC_PATH_LEN],
}

impl EmummcPaths {
    pub fn empty() -> Self {
        EmummcPaths {
            storage_path: [0; EMUMMC_PATH_LEN],
            nintendo_path: [0; EMUMMC_PATH_LEN],
        }
    }

    /// Build a probe reply from path strings, truncating to the field size.
    pub fn from_paths(storage: &str, nintendo: &str) -> Self {
        fn fill(field: &mut [u8; EMUMMC_PATH_LEN], value: &str) {
            let bytes = value.as_bytes();
            let n = bytes.len().min(EMUMMC_PATH_LEN);
            field[..n].copy_from_slice(&bytes[..n]);
        }
        let mut paths = EmummcPaths::empty();
        fill(&mut paths.storage_path, storage);
        fill(&mut paths.nintendo_path, nintendo);
        paths
    }

    pub fn is_emummc(&self) -> bool {
        self.storage_path[0] != 0 || self.nintendo_path[0] != 0
    }
}

impl Default for EmummcPaths {
    fn default() -> Self {
        Self::empty()
    }
}

/// Firmware and patcher-tool facts, plus the MMC mode, fixed for the whole
/// run and threaded through the engine explicitly.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SystemFacts {
    pub fw_version: Version,
    pub ams_version: Version,
    pub ams_target_version: Version,
    pub ams_keygen: u8,
    /// Tool commit hash; the log renders the top 32 bits as hex.
    pub ams_hash: u64,
    pub emummc: bool,
}

impl Default for SystemFacts {
    fn default() -> Self {
        SystemFacts {
            fw_version: Version::ANY,
            ams_version: Version::ANY,
            ams_target_version: Version::ANY,
            ams_keygen: 0,
            ams_hash: 0,
            emummc: false,
        }
    }
}
