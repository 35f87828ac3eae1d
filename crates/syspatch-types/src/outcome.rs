//! Per-pattern outcomes.

use serde::Serialize;

/// Terminal state of one catalog pattern for one run. Every pattern starts
/// at `NotFound` and makes at most one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// No match produced a patch anywhere in the scanned regions.
    NotFound,
    /// Excluded by the version gate or by the MMC policy.
    Skipped,
    /// Turned off in the configuration store.
    Disabled,
    /// An equivalent patch was already present (installed from a file on disk).
    PatchedFile,
    /// This run wrote the patch through the debug channel.
    PatchedSysPatch,
    /// The debug-memory write was rejected by the host.
    WriteFailed,
}

impl Outcome {
    /// The string recorded in the run log. These are a fixed external
    /// interface; do not edit them to taste.
    pub fn as_log_str(self) -> &'static str {
        match self {
            Outcome::NotFound => "Unpatched",
            Outcome::Skipped => "Skipped",
            Outcome::Disabled => "Disabled",
            Outcome::PatchedFile => "Patched (file)",
            Outcome::PatchedSysPatch => "Patched (sys-patch)",
            Outcome::WriteFailed => "Failed (svcWriteDebugProcessMemory)",
        }
    }

    /// Whether the check this pattern neutralizes is taken care of, by
    /// whichever installer.
    pub fn is_patched(self) -> bool {
        matches!(self, Outcome::PatchedFile | Outcome::PatchedSysPatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_strings_are_the_wire_values() {
        assert_eq!(Outcome::NotFound.as_log_str(), "Unpatched");
        assert_eq!(Outcome::Skipped.as_log_str(), "Skipped");
        assert_eq!(Outcome::Disabled.as_log_str(), "Disabled");
        assert_eq!(Outcome::PatchedFile.as_log_str(), "Patched (file)");
        assert_eq!(Outcome::PatchedSysPatch.as_log_str(), "Patched (sys-patch)");
        assert_eq!(
            Outcome::WriteFailed.as_log_str(),
            "Failed (svcWriteDebugProcessMemory)"
        );
    }

    #[test]
    fn test_patched_covers_both_installers() {
        assert!(Outcome::PatchedFile.is_patched());
        assert!(Outcome::PatchedSysPatch.is_patched());
        assert!(!Outcome::NotFound.is_patched());
        assert!(!Outcome::WriteFailed.is_patched());
    }
}
