//! Command-line surface of the boot-time patcher.

use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;

use syspatch_types::Version;

/// Runs the boot pipeline once against a directory of code images and
/// exits: load configuration (writing back defaults), gate on the MMC
/// policy, scan every catalog entry, write the run log.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Directory of flat code images (`<title-id>.bin`) standing in for the
    /// live system processes.
    #[arg(long, value_name = "DIR")]
    pub image_dir: PathBuf,

    /// Configuration store; absent keys are written back with defaults.
    #[arg(long, value_name = "PATH", default_value = "/config/sys-patch/config.ini")]
    pub config: PathBuf,

    /// Run log; truncated on every run.
    #[arg(long, value_name = "PATH", default_value = "/config/sys-patch/log.ini")]
    pub log: PathBuf,

    /// Firmware version of the host.
    #[arg(long, value_name = "X.Y.Z")]
    pub firmware: Version,

    /// Patcher-tool version.
    #[arg(long, value_name = "X.Y.Z", default_value = "1.9.0")]
    pub ams_version: Version,

    /// Lowest firmware the tool build targets.
    #[arg(long, value_name = "X.Y.Z", default_value = "0.0.0")]
    pub ams_target: Version,

    /// Key-generation byte.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub keygen: u8,

    /// Tool commit hash (up to 16 hex digits).
    #[arg(long, value_name = "HEX", default_value = "0", value_parser = parse_hex_u64)]
    pub ams_hash: u64,

    /// Treat the host as booting from emulated MMC.
    #[arg(long, default_value_t = false)]
    pub emummc: bool,

    /// Scan and report without flushing patched images back to disk.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Write a machine-readable mirror of the run log as JSON.
    #[arg(long, value_name = "PATH")]
    pub emit_report_json: Option<PathBuf>,
}

fn parse_hex_u64(s: &str) -> Result<u64, anyhow::Error> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| anyhow!("invalid hex value {:?}: {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64("0xAF66FF9900000000").unwrap(), 0xAF66FF9900000000);
        assert_eq!(parse_hex_u64("af66ff99").unwrap(), 0xAF66FF99);
        assert_eq!(parse_hex_u64("0").unwrap(), 0);
        assert!(parse_hex_u64("0xZZ").is_err());
    }

    #[test]
    fn test_args_parse_minimal() {
        let args = Args::try_parse_from([
            "sys-patch",
            "--image-dir",
            "/tmp/images",
            "--firmware",
            "20.1.5",
        ])
        .unwrap();
        assert_eq!(args.firmware, Version::new(20, 1, 5));
        assert_eq!(args.config, PathBuf::from("/config/sys-patch/config.ini"));
        assert!(!args.emummc);
        assert!(!args.dry_run);
    }
}
