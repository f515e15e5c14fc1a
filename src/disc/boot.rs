//! PlayStation generation from the boot descriptor
//!
//! Both PlayStation generations use ISO 9660 volumes with `PLAYSTATION` as
//! the system identifier. The root-level `SYSTEM.CNF` settles it:
//!
//! ```text
//! BOOT = cdrom:\SLUS_123.45;1      PlayStation
//! BOOT2 = cdrom0:\SLUS_123.45;1    PlayStation 2
//! ```
//!
//! When the file cannot be read from the window, descriptor fields give a
//! weaker answer.

use regex::Regex;
use std::sync::LazyLock;

use crate::disc::identifier::{Confidence, ConfidenceLevel};
use crate::disc::iso9660::VolumeDescriptor;
use crate::disc::system::SystemId;

/// Root-directory boot descriptor file
pub const BOOT_FILE: &str = "SYSTEM.CNF";

static BOOT2_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bBOOT2\b").unwrap());

static BOOT_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bBOOT\b").unwrap());

/// Outcome of the PlayStation generation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootVerdict {
    pub system: SystemId,
    pub confidence: Confidence,
    /// Which rule decided
    pub rule: &'static str,
    /// Window size that would have reached the boot descriptor
    pub wanted_bytes: Option<usize>,
}

/// Classify `SYSTEM.CNF` contents by their boot token
pub fn classify_boot_file(contents: &str) -> Option<(SystemId, &'static str)> {
    if BOOT2_PATTERN.is_match(contents) {
        Some((SystemId::PlayStation2, "SYSTEM.CNF BOOT2"))
    } else if BOOT_PATTERN.is_match(contents) {
        Some((SystemId::PlayStation, "SYSTEM.CNF BOOT"))
    } else {
        None
    }
}

/// Decide between PlayStation and PlayStation 2 for a `PLAYSTATION` volume
pub fn classify_playstation(window: &[u8], descriptor: &VolumeDescriptor) -> BootVerdict {
    let mut wanted_bytes = None;

    match descriptor.read_file(window, BOOT_FILE) {
        Ok(bytes) => {
            let contents = String::from_utf8_lossy(bytes);
            if let Some((system, rule)) = classify_boot_file(&contents) {
                return BootVerdict {
                    system,
                    confidence: Confidence::Definitive,
                    rule,
                    wanted_bytes: None,
                };
            }
            log::debug!("{} has no boot token", BOOT_FILE);
        }
        Err(e) => {
            log::debug!("{} unavailable: {}", BOOT_FILE, e);
            wanted_bytes = e.wanted_bytes();
        }
    }

    let (system, confidence, rule) = descriptor_fallback(descriptor);
    BootVerdict {
        system,
        confidence,
        rule,
        wanted_bytes,
    }
}

fn descriptor_fallback(descriptor: &VolumeDescriptor) -> (SystemId, Confidence, &'static str) {
    if descriptor.system_id.contains('2') {
        return (
            SystemId::PlayStation2,
            Confidence::Heuristic(ConfidenceLevel::Medium),
            "system identifier contains 2",
        );
    }

    let publisher = &descriptor.publisher_id;
    if publisher.contains('2') && publisher.to_uppercase().contains("PLAYSTATION") {
        return (
            SystemId::PlayStation2,
            Confidence::Heuristic(ConfidenceLevel::Low),
            "publisher names PLAYSTATION 2",
        );
    }

    // PlayStation is by far the more common of the two
    (
        SystemId::PlayStation,
        Confidence::Heuristic(ConfidenceLevel::Low),
        "PLAYSTATION volume default",
    )
}
