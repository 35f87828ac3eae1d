//! The built-in catalog driven end to end over an in-memory host.

use syspatch_core::{scan_entry, Catalog, CatalogRun, RunContext, ScanBuffer, ScanStatus};
use syspatch_host::mem::{MemoryHost, MemoryProcess};
use syspatch_integration_tests::{
    erpt_image, fs_image_17, ERPT_PAYLOAD, ERPT_TITLE, FS_TITLE, NOP,
};
use syspatch_types::{MemoryType, Outcome, RegionPerm, SystemFacts, TitleId, Version};

const BASE: u64 = 0x0800_0000;

fn ctx(fw: Version) -> RunContext {
    RunContext {
        facts: SystemFacts {
            fw_version: fw,
            ams_version: Version::new(1, 9, 0),
            ..SystemFacts::default()
        },
        version_skip: true,
    }
}

fn code_process(pid: u64, title: TitleId, bytes: Vec<u8>) -> MemoryProcess {
    MemoryProcess::new(pid, title).with_region(BASE, RegionPerm::RX, MemoryType::CodeStatic, bytes)
}

fn scan_all(host: &mut MemoryHost, runs: &mut CatalogRun<'_>, ctx: &RunContext) {
    let mut buffer = ScanBuffer::new();
    for entry_run in &mut runs.entries {
        scan_entry(host, &mut buffer, entry_run, ctx);
    }
}

fn outcome_of(runs: &CatalogRun<'_>, entry: &str, pattern: &str) -> Outcome {
    runs.entries
        .iter()
        .find(|e| e.entry.name == entry)
        .unwrap()
        .patterns
        .iter()
        .find(|p| p.spec.name == pattern)
        .unwrap()
        .outcome
}

#[test]
fn patches_fs_and_erpt_across_processes() {
    let mut host = MemoryHost::new();
    // Unrelated and undebuggable processes come first; erpt is the very
    // last pid and must still be scanned.
    host.add_process(MemoryProcess::new(1, TitleId::new(0xDEAD)));
    host.add_process(MemoryProcess::new(2, TitleId::new(0xBEEF)).refusing_debugger());
    host.add_process(code_process(3, FS_TITLE, fs_image_17(0x400, 0x80)));
    host.add_process(code_process(4, ERPT_TITLE, erpt_image(0x200, 0x40)));

    let catalog = Catalog::builtin();
    let mut runs = CatalogRun::new(&catalog);
    scan_all(&mut host, &mut runs, &ctx(Version::new(20, 1, 5)));

    // fs: the 17.0.0+ nca row fires, rows outside 20.1.5 skip, the one
    // other in-window row finds nothing.
    assert_eq!(
        outcome_of(&runs, "fs", "noncasigchk_17.0.0+"),
        Outcome::PatchedSysPatch
    );
    assert_eq!(
        outcome_of(&runs, "fs", "noncasigchk_4.0.0-16.1.0"),
        Outcome::Skipped
    );
    assert_eq!(
        outcome_of(&runs, "fs", "noacidsigchk_1.0.0-9.2.0"),
        Outcome::Skipped
    );
    assert_eq!(
        outcome_of(&runs, "fs", "nocntchk_19.0.0-20.5.0"),
        Outcome::NotFound
    );
    assert_eq!(outcome_of(&runs, "fs", "nocntchk_21.0.0+"), Outcome::Skipped);

    assert_eq!(outcome_of(&runs, "erpt", "no_erpt"), Outcome::PatchedSysPatch);

    // Entries without a live process keep their initial state.
    assert_eq!(outcome_of(&runs, "es", "es_19.0.0+"), Outcome::NotFound);
    assert_eq!(
        outcome_of(&runs, "nim", "blockfirmwareupdates_12.0.0+"),
        Outcome::NotFound
    );

    // Exactly two writes, and the payloads landed.
    assert_eq!(host.writes().len(), 2);
    assert_eq!(
        host.read_bytes(FS_TITLE, BASE + 0x80 - 18, 4).unwrap(),
        NOP.to_vec()
    );
    assert_eq!(
        host.read_bytes(ERPT_TITLE, BASE + 0x40 - 4, 8).unwrap(),
        ERPT_PAYLOAD.to_vec()
    );
}

#[test]
fn recognizes_file_installed_patch() {
    // The nop is already in place, so the tbz check fails and the applied
    // branch reports a file-installed patch without writing.
    let mut image = fs_image_17(0x200, 0x80);
    image[0x80 - 18..0x80 - 14].copy_from_slice(&NOP);

    let mut host = MemoryHost::new();
    host.add_process(code_process(1, FS_TITLE, image));

    let catalog = Catalog::builtin();
    let mut runs = CatalogRun::new(&catalog);
    scan_all(&mut host, &mut runs, &ctx(Version::new(20, 1, 5)));

    assert_eq!(
        outcome_of(&runs, "fs", "noncasigchk_17.0.0+"),
        Outcome::PatchedFile
    );
    assert!(host.writes().is_empty());
}

#[test]
fn records_rejected_debug_write() {
    let mut host = MemoryHost::new();
    host.add_process(code_process(1, ERPT_TITLE, erpt_image(0x200, 0x40)));
    host.poison_writes(BASE..BASE + 0x200);

    let catalog = Catalog::builtin();
    let mut runs = CatalogRun::new(&catalog);
    scan_all(&mut host, &mut runs, &ctx(Version::new(20, 1, 5)));

    assert_eq!(outcome_of(&runs, "erpt", "no_erpt"), Outcome::WriteFailed);
    assert_eq!(
        host.read_bytes(ERPT_TITLE, BASE + 0x40, 4).unwrap(),
        vec![0xFD, 0x7B, 0x02, 0xA9]
    );
}

#[test]
fn entry_window_skips_whole_entry_below_minimum() {
    // erpt only exists on fw 10+; on 9.2.0 its entry window shortcuts the
    // scan before any attach.
    let mut host = MemoryHost::new();
    host.add_process(code_process(1, ERPT_TITLE, erpt_image(0x200, 0x40)));

    let catalog = Catalog::builtin();
    let mut runs = CatalogRun::new(&catalog);
    let ctx = ctx(Version::new(9, 2, 0));
    let mut buffer = ScanBuffer::new();
    let erpt_run = runs
        .entries
        .iter_mut()
        .find(|e| e.entry.name == "erpt")
        .unwrap();
    let status = scan_entry(&mut host, &mut buffer, erpt_run, &ctx);

    assert_eq!(status, ScanStatus::VersionSkipped);
    assert_eq!(outcome_of(&runs, "erpt", "no_erpt"), Outcome::Skipped);
    assert!(host.writes().is_empty());
}

#[test]
fn disabled_pattern_never_transitions() {
    let mut host = MemoryHost::new();
    host.add_process(code_process(1, ERPT_TITLE, erpt_image(0x200, 0x40)));

    let catalog = Catalog::builtin();
    let mut runs = CatalogRun::new(&catalog);
    for entry_run in &mut runs.entries {
        for p in &mut entry_run.patterns {
            if p.spec.name == "no_erpt" {
                p.set_enabled(false);
            }
        }
    }
    scan_all(&mut host, &mut runs, &ctx(Version::new(20, 1, 5)));

    assert_eq!(outcome_of(&runs, "erpt", "no_erpt"), Outcome::Disabled);
    assert!(host.writes().is_empty());
}
