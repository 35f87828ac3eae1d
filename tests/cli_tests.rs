//! End-to-end runs of the `sys-patch` binary.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sys_patch_cmd() -> Command {
    Command::cargo_bin("sys-patch").expect("binary not found")
}

/// An erpt code image with one genuine `no_erpt` site at 0x40.
fn erpt_image() -> Vec<u8> {
    let mut bytes = vec![0xCCu8; 0x200];
    bytes[0x3C..0x40].copy_from_slice(&[0xFF, 0x43, 0x05, 0xD1]);
    bytes[0x40..0x4C].copy_from_slice(&[
        0xFD, 0x7B, 0x02, 0xA9, 0xFD, 0x83, 0x00, 0x91, 0xF7, 0x63, 0x05, 0xA9,
    ]);
    bytes
}

struct Fixture {
    _dir: TempDir,
    image_dir: PathBuf,
    config: PathBuf,
    log: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let image_dir = dir.path().join("images");
        fs::create_dir(&image_dir).unwrap();
        fs::write(image_dir.join("010000000000002b.bin"), erpt_image()).unwrap();
        Fixture {
            image_dir,
            config: dir.path().join("config.ini"),
            log: dir.path().join("log.ini"),
            _dir: dir,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = sys_patch_cmd();
        cmd.arg("--image-dir")
            .arg(&self.image_dir)
            .arg("--config")
            .arg(&self.config)
            .arg("--log")
            .arg(&self.log)
            .arg("--firmware")
            .arg("20.1.5");
        cmd
    }
}

#[test]
fn help_names_the_pipeline_options() {
    sys_patch_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--image-dir"))
        .stdout(predicate::str::contains("--firmware"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn run_patches_the_erpt_image() {
    let fx = Fixture::new();
    fx.cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("erpt/no_erpt: Patched (sys-patch)"))
        .stdout(predicate::str::contains("patch_time:"));

    // The payload landed in the image and the log was written.
    let bytes = fs::read(fx.image_dir.join("010000000000002b.bin")).unwrap();
    assert_eq!(
        &bytes[0x3C..0x44],
        &[0xE0, 0x03, 0x1F, 0x2A, 0xC0, 0x03, 0x5F, 0xD6]
    );
    let log = fs::read_to_string(&fx.log).unwrap();
    assert!(log.contains("no_erpt=Patched (sys-patch)"));
    assert!(log.contains("fw_version=20.1.5"));

    let config = fs::read_to_string(&fx.config).unwrap();
    assert!(config.contains("patch_sysmmc=1"));
}

#[test]
fn second_run_detects_file_patch_is_not_refound() {
    let fx = Fixture::new();
    fx.cmd().assert().success();
    // The payload overwrote part of the pattern, so a second boot simply
    // finds nothing left to patch.
    fx.cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("erpt/no_erpt: Unpatched"));
}

#[test]
fn dry_run_leaves_the_image_alone() {
    let fx = Fixture::new();
    fx.cmd()
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("erpt/no_erpt: Patched (sys-patch)"));
    assert_eq!(
        fs::read(fx.image_dir.join("010000000000002b.bin")).unwrap(),
        erpt_image()
    );
}

#[test]
fn missing_image_dir_fails() {
    let dir = TempDir::new().unwrap();
    sys_patch_cmd()
        .arg("--image-dir")
        .arg(dir.path().join("nope"))
        .arg("--config")
        .arg(dir.path().join("config.ini"))
        .arg("--log")
        .arg(dir.path().join("log.ini"))
        .arg("--firmware")
        .arg("20.1.5")
        .assert()
        .failure();
}

#[test]
fn emummc_flag_is_reflected_in_the_log() {
    let fx = Fixture::new();
    fx.cmd().arg("--emummc").assert().success();
    let log = fs::read_to_string(&fx.log).unwrap();
    assert!(log.contains("is_emummc=1"));
}
