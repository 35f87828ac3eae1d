//! End-to-end tests for the sys-patch workspace live in `tests/`; this
//! crate body only hosts shared fixture builders.

use syspatch_types::TitleId;

pub const FS_TITLE: TitleId = TitleId::new(0x0100000000000000);
pub const ERPT_TITLE: TitleId = TitleId::new(0x010000000000002B);

/// An erpt code image with one genuine `no_erpt` site.
///
/// The prologue pattern sits at `at`; the `sub sp, sp, #imm` instruction it
/// anchors on sits four bytes earlier, which is also where the
/// `mov w0, wzr; ret` payload lands.
pub fn erpt_image(len: usize, at: usize) -> Vec<u8> {
    let mut bytes = vec![0xCCu8; len];
    bytes[at - 4..at].copy_from_slice(&[0xFF, 0x43, 0x05, 0xD1]);
    bytes[at..at + 12].copy_from_slice(&[
        0xFD, 0x7B, 0x02, 0xA9, 0xFD, 0x83, 0x00, 0x91, 0xF7, 0x63, 0x05, 0xA9,
    ]);
    bytes
}

/// The payload `erpt_image` expects at the patch site after a successful run.
pub const ERPT_PAYLOAD: [u8; 8] = [0xE0, 0x03, 0x1F, 0x2A, 0xC0, 0x03, 0x5F, 0xD6];

/// An fs code image with one genuine `noncasigchk_17.0.0+` site.
///
/// The pattern (`06 94 ?? ?? 00 ?? 42 ?? 00 91`) sits at `at`; the tbz it
/// anchors on sits 18 bytes earlier and is replaced by a nop.
pub fn fs_image_17(len: usize, at: usize) -> Vec<u8> {
    let mut bytes = vec![0xCCu8; len];
    bytes[at - 18..at - 14].copy_from_slice(&[0x11, 0x22, 0x33, 0x36]);
    bytes[at..at + 10]
        .copy_from_slice(&[0x06, 0x94, 0xAA, 0xBB, 0x00, 0xEE, 0x42, 0xDD, 0x00, 0x91]);
    bytes
}

pub const NOP: [u8; 4] = [0x1F, 0x20, 0x03, 0xD5];
