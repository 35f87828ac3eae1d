//! The built-in patch catalog: which integrity checks get neutralized, in
//! which system processes, under which firmware windows.
//!
//! Offsets are in bytes: `inst_offset` is relative to the pattern match,
//! `patch_offset` relative to the instruction word. Patterns are written so
//! the bytes being *patched* are wildcarded and the bytes being *tested*
//! live at `inst_offset`; see the replacement constants below for the exact
//! payloads (all AArch64 encodings).

use syspatch_types::{TitleId, Version, VersionWindow};

use crate::inst::InstCheck;
use crate::patch::Patch;
use crate::pattern::Pattern;

// =============================================================================
// Replacements
// =============================================================================

/// How a row's replacement bytes are produced. Every current row is a fixed
/// constant; the instruction word stays in the signatures so a derived
/// variant can be added without touching callers.
#[derive(Debug, Clone)]
pub enum Replacement {
    Const(Patch),
}

impl Replacement {
    pub fn produce(&self, _inst: u32) -> Patch {
        match self {
            Replacement::Const(patch) => patch.clone(),
        }
    }

    /// Whether an equivalent patch already sits at the candidate site.
    pub fn is_applied(&self, site: &[u8], inst: u32) -> bool {
        self.produce(inst).matches(site)
    }

    pub fn len(&self) -> usize {
        match self {
            Replacement::Const(patch) => patch.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// mov w0, wzr
const RET0: &str = "0xE0031F2A";
// mov x0, #1
const RET1: &str = "0x200080D2";
// mov w0, wzr; ret
const MOV0_RET: &str = "0xE0031F2AC0035FD6";
// nop
const NOP: &str = "0x1F2003D5";
// mov x0, xzr
const MOV0: &str = "0xE0031FAA";
// mov x2, xzr
const MOV2: &str = "0xE2031FAA";
// second byte of cmp w0, w1 -> cmp w0, w0
const CMP_W0: &str = "0x00";
// synthesized connectivity-test bypass, 20 bytes
const CTEST: &str = "0x00309AD2001EA1F2610100D4E0031FAAC0035FD6";

// =============================================================================
// Catalog rows
// =============================================================================

/// One pattern row: where to look, how to verify the site, what to write.
#[derive(Debug, Clone)]
pub struct PatternSpec {
    /// Name of the patch; doubles as its configuration key.
    pub name: &'static str,
    pub pattern: Pattern,
    /// Byte offset of the instruction word, relative to the match start.
    pub inst_offset: i32,
    /// Byte offset of the patch site, relative to the instruction word.
    pub patch_offset: i32,
    pub check: InstCheck,
    pub replacement: Replacement,
    /// Firmware window this row applies to; `ANY` bounds are open.
    pub fw: VersionWindow,
    /// Patcher-tool window; unused by the current rows but honored.
    pub ams: VersionWindow,
}

/// Patterns grouped under one target process.
#[derive(Debug, Clone)]
pub struct PatchEntry {
    /// Name of the system title; doubles as its configuration section.
    pub name: &'static str,
    pub title_id: TitleId,
    /// Firmware window below/above which the whole entry is skipped.
    pub fw: VersionWindow,
    pub patterns: Vec<PatternSpec>,
}

/// The full declarative table, immutable at run time.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub entries: Vec<PatchEntry>,
}

fn row(
    name: &'static str,
    pattern: &str,
    inst_offset: i32,
    patch_offset: i32,
    check: InstCheck,
    replacement: &str,
    fw: VersionWindow,
) -> PatternSpec {
    PatternSpec {
        name,
        pattern: Pattern::parse(pattern),
        inst_offset,
        patch_offset,
        check,
        replacement: Replacement::Const(Patch::from_hex(replacement)),
        fw,
        ams: VersionWindow::ANY,
    }
}

fn below(major: u8, minor: u8, micro: u8) -> VersionWindow {
    VersionWindow::new(Version::ANY, Version::new(major, minor, micro))
}

fn from(major: u8, minor: u8, micro: u8) -> VersionWindow {
    VersionWindow::new(Version::new(major, minor, micro), Version::ANY)
}

fn between(min: (u8, u8, u8), max: (u8, u8, u8)) -> VersionWindow {
    VersionWindow::new(
        Version::new(min.0, min.1, min.2),
        Version::new(max.0, max.1, max.2),
    )
}

impl Catalog {
    /// Build the built-in table. Entry and row order is load-bearing: the
    /// scanner honors declaration order end to end.
    pub fn builtin() -> Catalog {
        use InstCheck::*;

        let fs = vec![
            // Both acid rows share one name on purpose: FAT32 and exFAT
            // variants of the same check, collapsed under one toggle.
            row("noacidsigchk_1.0.0-9.2.0", "0xC8FE4739", -24, 0, Bl, RET0, below(9, 2, 0)),
            row("noacidsigchk_1.0.0-9.2.0", "0x0210911F000072", -5, 0, Bl, RET0, below(9, 2, 0)),
            row("noncasigchk_1.0.0-3.0.2", "0x881E42B958808C521FC14271", -4, 0, Tbz, NOP, between((1, 0, 0), (3, 0, 2))),
            row("noncasigchk_4.0.0-16.1.0", "0x1E4839....00......0054", -17, 0, Tbz, NOP, between((4, 0, 0), (16, 1, 0))),
            row("noncasigchk_17.0.0+", "0x0694....00..42..0091", -18, 0, Tbz, NOP, from(17, 0, 0)),
            row("nocntchk_1.0.0-18.1.0", "0x00....0240F9........08..........00......00......0037", 6, 0, Bl, RET0, between((1, 0, 0), (18, 1, 0))),
            row("nocntchk_19.0.0-20.5.0", "0x00....0240F9........08..........00......00......0054", 6, 0, Bl, RET0, between((19, 0, 0), (20, 5, 0))),
            row("nocntchk_21.0.0+", "0x00....0240F9........E8..........00......00......0054", 6, 0, Bl, RET0, from(21, 0, 0)),
        ];

        let ldr = vec![
            // 1F00016B cmp w0, w1 -> 1F00006B cmp w0, w0
            row("noacidsigchk_10.0.0+", "0x009401C0BE121F00", 6, 2, Cmp, CMP_W0, VersionWindow::ANY),
        ];

        let erpt = vec![
            // FF4305D1 sub sp, sp, #0x150 -> mov w0, wzr; ret
            row("no_erpt", "0xFD7B02A9FD830091F76305A9", -4, 0, Sub, MOV0_RET, VersionWindow::ANY),
        ];

        let es = vec![
            row("es_1.0.0-8.1.1", "0xE8..00......FF97..0300AA....00..........E0..0091....0094..7E4092..............A9", 32, 0, Es, MOV0, between((1, 0, 0), (8, 1, 1))),
            row("es_9.0.0-11.0.1", "0x00..............................00..........A0....D1......97..............A9", 30, 0, Es, MOV0, between((9, 0, 0), (11, 0, 1))),
            row("es_12.0.0-18.1.0", "0x02..00......................00......00..........A0....D1......97..............A9", 32, 0, Es, MOV0, between((12, 0, 0), (18, 1, 0))),
            row("es_19.0.0+", "0xA1..00......................00......00..........A0....D1......97..............A9", 32, 0, Es, MOV0, from(19, 0, 0)),
        ];

        let olsc = vec![
            row("olsc_6.0.0-14.1.2", "0x00..73....F968024039....00......00", 42, 0, Bl, RET1, between((6, 0, 0), (14, 1, 2))),
            row("olsc_15.0.0-18.1.0", "0x00..73....F968024039....00......00", 38, 0, Bl, RET1, between((15, 0, 0), (18, 1, 0))),
            row("olsc_19.0.0+", "0x00..73....F968024039....00......00", 42, 0, Bl, RET1, from(19, 0, 0)),
        ];

        let nifm = vec![
            row("ctest_1.0.0-19.0.1", "0x03.AAE003.AA...39..04F8....E0", -29, 0, Ctest, CTEST, below(18, 1, 0)),
            row("ctest_20.0.0+", "0x03.AA...AA.........0314AA..14AA", -17, 0, Ctest, CTEST, from(20, 0, 0)),
        ];

        let nim = vec![
            row("blankcal0crashfix_17.0.0+", "0x00351F2003D5..............................97....0094....00..........61", 6, 0, Adr, MOV2, from(17, 0, 0)),
            row("blockfirmwareupdates_1.0.0-5.1.0", "0x1139F30301AA81..40F9E0..1191", -30, 0, BlockFw, MOV0_RET, between((1, 0, 0), (5, 1, 0))),
            row("blockfirmwareupdates_6.0.0-6.2.0", "0xF30301AA..4E40F9E0....91", -40, 0, BlockFw, MOV0_RET, between((6, 0, 0), (6, 2, 0))),
            row("blockfirmwareupdates_7.0.0-10.2.0", "0xF30301AA014C40F9F40300AAE0....91", -36, 0, BlockFw, MOV0_RET, between((7, 0, 0), (10, 2, 0))),
            row("blockfirmwareupdates_11.0.0-11.0.1", "0x280841F9084C00F9................................C0035FD6", 28, 0, BlockFw, MOV0_RET, between((11, 0, 0), (11, 0, 1))),
            row("blockfirmwareupdates_12.0.0+", "0x280841F9084C00F9........C0035FD6", 16, 0, BlockFw, MOV0_RET, from(12, 0, 0)),
        ];

        Catalog {
            entries: vec![
                PatchEntry {
                    name: "fs",
                    title_id: TitleId::new(0x0100000000000000),
                    fw: VersionWindow::ANY,
                    patterns: fs,
                },
                // ldr only needs patching on fw 10+
                PatchEntry {
                    name: "ldr",
                    title_id: TitleId::new(0x0100000000000001),
                    fw: from(10, 0, 0),
                    patterns: ldr,
                },
                PatchEntry {
                    name: "erpt",
                    title_id: TitleId::new(0x010000000000002B),
                    fw: from(10, 0, 0),
                    patterns: erpt,
                },
                // es exists since fw 2
                PatchEntry {
                    name: "es",
                    title_id: TitleId::new(0x0100000000000033),
                    fw: from(2, 0, 0),
                    patterns: es,
                },
                // olsc exists since fw 6
                PatchEntry {
                    name: "olsc",
                    title_id: TitleId::new(0x010000000000003E),
                    fw: from(6, 0, 0),
                    patterns: olsc,
                },
                PatchEntry {
                    name: "nifm",
                    title_id: TitleId::new(0x010000000000000F),
                    fw: VersionWindow::ANY,
                    patterns: nifm,
                },
                PatchEntry {
                    name: "nim",
                    title_id: TitleId::new(0x0100000000000025),
                    fw: VersionWindow::ANY,
                    patterns: nim,
                },
            ],
        }
    }

    /// Longest compiled pattern across the whole table.
    pub fn max_pattern_len(&self) -> usize {
        self.entries
            .iter()
            .flat_map(|e| &e.patterns)
            .map(|p| p.pattern.len())
            .max()
            .unwrap_or(0)
    }
}
