//! Fixed-offset signature checks
//!
//! An ordered battery of header checks over the logical window. Cartridge
//! checks come first: several cartridge formats overlap disc images in
//! size, and a cartridge magic at byte 0 is the stronger evidence. The
//! first check that fires wins.

use crate::disc::boot::classify_playstation;
use crate::disc::error::{IdentifyError, IdentifyResult};
use crate::disc::identifier::{Confidence, ConfidenceLevel, ConfidencePath};
use crate::disc::iso9660::{VolumeDescriptor, CDI_DESCRIPTOR_TYPE, PVD_OFFSET};
use crate::disc::system::SystemId;

/// Shortest window worth checking
pub const MIN_WINDOW: usize = 16;

/// Descriptor checks only run once the window is past this point
const PVD_CHECK_BYTES: usize = PVD_OFFSET + 0x240;

const N64_MAGICS: [u32; 3] = [0x8037_1240, 0x3780_4012, 0x4012_3780];
const GAMECUBE_MAGIC: u32 = 0xC233_9F3D;
const WII_MAGIC: u32 = 0x5D1C_9EA3;

/// Start of the Nintendo logo in a GBA header
const GBA_LOGO_PREFIX: [u8; 8] = [0x24, 0xFF, 0xAE, 0x51, 0x69, 0x9A, 0xA2, 0x21];
/// Start of the Nintendo logo in a Game Boy header
const GB_LOGO_PREFIX: [u8; 8] = [0xCE, 0xED, 0x66, 0x66, 0xCC, 0x0D, 0x00, 0x0B];

/// Whether a check looks at cartridge or disc layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Header magic near byte 0; includes the GameCube and Wii disc
    /// headers, which are laid out like cartridge headers
    Cartridge,
    /// CD banners and volume descriptors
    Disc,
}

/// A signature hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMatch {
    pub system: SystemId,
    pub confidence: Confidence,
    pub path: ConfidencePath,
    /// Name of the check that fired
    pub rule: &'static str,
    /// Window size that could firm up a heuristic hit
    pub wanted_bytes: Option<usize>,
}

impl SignatureMatch {
    fn definitive(system: SystemId, rule: &'static str) -> Self {
        Self {
            system,
            confidence: Confidence::Definitive,
            path: ConfidencePath::Signature,
            rule,
            wanted_bytes: None,
        }
    }
}

struct SignatureCheck {
    name: &'static str,
    kind: MediaKind,
    probe: fn(&[u8]) -> Option<SignatureMatch>,
}

static CHECKS: &[SignatureCheck] = &[
    SignatureCheck { name: "iNES header", kind: MediaKind::Cartridge, probe: probe_nes },
    SignatureCheck { name: "N64 boot magic", kind: MediaKind::Cartridge, probe: probe_n64 },
    SignatureCheck { name: "Lynx header", kind: MediaKind::Cartridge, probe: probe_lynx },
    SignatureCheck { name: "Atari 7800 header", kind: MediaKind::Cartridge, probe: probe_atari7800 },
    SignatureCheck { name: "32X header", kind: MediaKind::Cartridge, probe: probe_32x },
    SignatureCheck { name: "Mega Drive header", kind: MediaKind::Cartridge, probe: probe_genesis },
    SignatureCheck { name: "GBA logo", kind: MediaKind::Cartridge, probe: probe_gba },
    SignatureCheck { name: "Game Boy logo", kind: MediaKind::Cartridge, probe: probe_gameboy },
    SignatureCheck { name: "TMR SEGA header", kind: MediaKind::Cartridge, probe: probe_tmr_sega },
    SignatureCheck { name: "GameCube disc magic", kind: MediaKind::Cartridge, probe: probe_gamecube },
    SignatureCheck { name: "Wii disc magic", kind: MediaKind::Cartridge, probe: probe_wii },
    SignatureCheck { name: "Saturn banner", kind: MediaKind::Disc, probe: probe_saturn },
    SignatureCheck { name: "Sega CD banner", kind: MediaKind::Disc, probe: probe_segacd },
    SignatureCheck { name: "Dreamcast banner", kind: MediaKind::Disc, probe: probe_dreamcast },
    SignatureCheck { name: "3DO volume header", kind: MediaKind::Disc, probe: probe_3do },
    SignatureCheck { name: "PLAYSTATION volume", kind: MediaKind::Disc, probe: probe_playstation },
    SignatureCheck { name: "CD-i descriptor", kind: MediaKind::Disc, probe: probe_cdi },
    SignatureCheck { name: "PC Engine banner", kind: MediaKind::Disc, probe: probe_pcengine },
];

/// Names and kinds of the checks, in evaluation order
pub fn checks() -> impl Iterator<Item = (&'static str, MediaKind)> {
    CHECKS.iter().map(|c| (c.name, c.kind))
}

/// Run the checks over a logical window
///
/// `NoMatch` is the common outcome and not a fault.
pub fn match_signature(window: &[u8]) -> IdentifyResult<SignatureMatch> {
    if window.len() < MIN_WINDOW {
        return Err(IdentifyError::InsufficientData {
            needed: MIN_WINDOW,
            available: window.len(),
        });
    }

    for check in CHECKS {
        if let Some(hit) = (check.probe)(window) {
            log::debug!("Signature check '{}' matched {}", check.name, hit.system);
            return Ok(hit);
        }
    }

    Err(IdentifyError::NoMatch)
}

fn bytes_at(window: &[u8], offset: usize, expected: &[u8]) -> bool {
    window.get(offset..offset + expected.len()) == Some(expected)
}

fn be_u32_at(window: &[u8], offset: usize) -> Option<u32> {
    let bytes = window.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn probe_nes(window: &[u8]) -> Option<SignatureMatch> {
    bytes_at(window, 0, b"NES\x1A").then(|| SignatureMatch::definitive(SystemId::Nes, "iNES header"))
}

fn probe_n64(window: &[u8]) -> Option<SignatureMatch> {
    let magic = be_u32_at(window, 0)?;
    N64_MAGICS
        .contains(&magic)
        .then(|| SignatureMatch::definitive(SystemId::N64, "N64 boot magic"))
}

fn probe_lynx(window: &[u8]) -> Option<SignatureMatch> {
    bytes_at(window, 0, b"LYNX\0").then(|| SignatureMatch::definitive(SystemId::AtariLynx, "Lynx header"))
}

fn probe_atari7800(window: &[u8]) -> Option<SignatureMatch> {
    bytes_at(window, 1, b"ATARI7800")
        .then(|| SignatureMatch::definitive(SystemId::Atari7800, "Atari 7800 header"))
}

fn probe_32x(window: &[u8]) -> Option<SignatureMatch> {
    bytes_at(window, 0x100, b"SEGA 32X").then(|| SignatureMatch::definitive(SystemId::Sega32x, "32X header"))
}

fn probe_genesis(window: &[u8]) -> Option<SignatureMatch> {
    if !bytes_at(window, 0x100, b"SEGA") {
        return None;
    }
    let header = window.get(0x100..0x120)?;
    (contains(header, b"GENESIS") || contains(header, b"MEGA DRIVE"))
        .then(|| SignatureMatch::definitive(SystemId::Genesis, "Mega Drive header"))
}

fn probe_gba(window: &[u8]) -> Option<SignatureMatch> {
    (bytes_at(window, 0x04, &GBA_LOGO_PREFIX) && window.get(0xB2) == Some(&0x96))
        .then(|| SignatureMatch::definitive(SystemId::GameBoyAdvance, "GBA logo"))
}

fn probe_gameboy(window: &[u8]) -> Option<SignatureMatch> {
    if !bytes_at(window, 0x104, &GB_LOGO_PREFIX) {
        return None;
    }
    // CGB flag: 0x80 supports color, 0xC0 requires it
    match window.get(0x143) {
        Some(0x80) | Some(0xC0) => Some(SignatureMatch::definitive(
            SystemId::GameBoyColor,
            "Game Boy logo, CGB flag",
        )),
        _ => Some(SignatureMatch::definitive(SystemId::GameBoy, "Game Boy logo")),
    }
}

fn probe_tmr_sega(window: &[u8]) -> Option<SignatureMatch> {
    if !bytes_at(window, 0x7FF0, b"TMR SEGA") {
        return None;
    }
    let region = window.get(0x7FFF)? >> 4;
    match region {
        5..=7 => Some(SignatureMatch::definitive(SystemId::GameGear, "TMR SEGA header, GG region")),
        3 | 4 => Some(SignatureMatch::definitive(
            SystemId::MasterSystem,
            "TMR SEGA header, SMS region",
        )),
        _ => Some(SignatureMatch {
            confidence: Confidence::Heuristic(ConfidenceLevel::Medium),
            ..SignatureMatch::definitive(SystemId::MasterSystem, "TMR SEGA header")
        }),
    }
}

fn probe_gamecube(window: &[u8]) -> Option<SignatureMatch> {
    (be_u32_at(window, 0x1C)? == GAMECUBE_MAGIC)
        .then(|| SignatureMatch::definitive(SystemId::GameCube, "GameCube disc magic"))
}

fn probe_wii(window: &[u8]) -> Option<SignatureMatch> {
    (be_u32_at(window, 0x18)? == WII_MAGIC).then(|| SignatureMatch::definitive(SystemId::Wii, "Wii disc magic"))
}

fn probe_saturn(window: &[u8]) -> Option<SignatureMatch> {
    bytes_at(window, 0, b"SEGA SEGASATURN").then(|| SignatureMatch::definitive(SystemId::Saturn, "Saturn banner"))
}

fn probe_segacd(window: &[u8]) -> Option<SignatureMatch> {
    (bytes_at(window, 0, b"SEGADISCSYSTEM") || bytes_at(window, 0, b"SEGA DISCSYSTEM"))
        .then(|| SignatureMatch::definitive(SystemId::SegaCd, "Sega CD banner"))
}

fn probe_dreamcast(window: &[u8]) -> Option<SignatureMatch> {
    (bytes_at(window, 0, b"SEGA SEGAKATANA") || bytes_at(window, 0, b"SEGA SEGADC"))
        .then(|| SignatureMatch::definitive(SystemId::Dreamcast, "Dreamcast banner"))
}

fn probe_3do(window: &[u8]) -> Option<SignatureMatch> {
    (bytes_at(window, 0, &[0x01, 0x00, 0x00, 0x00]) && bytes_at(window, 0x28, b"CD-ROM"))
        .then(|| SignatureMatch::definitive(SystemId::ThreeDo, "3DO volume header"))
}

fn probe_playstation(window: &[u8]) -> Option<SignatureMatch> {
    if window.len() <= PVD_CHECK_BYTES {
        return None;
    }
    let descriptor = VolumeDescriptor::from_window(window).ok()?;
    if !descriptor.system_id.contains("PLAYSTATION") {
        return None;
    }

    let verdict = classify_playstation(window, &descriptor);
    Some(SignatureMatch {
        system: verdict.system,
        confidence: verdict.confidence,
        path: ConfidencePath::VolumeDescriptor,
        rule: verdict.rule,
        wanted_bytes: verdict.wanted_bytes,
    })
}

fn probe_cdi(window: &[u8]) -> Option<SignatureMatch> {
    (window.len() > PVD_CHECK_BYTES && window[PVD_OFFSET] == CDI_DESCRIPTOR_TYPE)
        .then(|| SignatureMatch::definitive(SystemId::CdI, "CD-i descriptor"))
}

fn probe_pcengine(window: &[u8]) -> Option<SignatureMatch> {
    let head = &window[..window.len().min(0x100)];
    (contains(head, b"PC Engine") || contains(head, b"PC-ENGINE"))
        .then(|| SignatureMatch::definitive(SystemId::PcEngine, "PC Engine banner"))
}
