//! Track metadata chain
//!
//! CD and GD-ROM containers carry one text record per track in a linked
//! list of metadata blocks, e.g.
//! `TRACK:1 TYPE:MODE2_RAW SUBTYPE:NONE FRAMES:251793`. The track layout
//! alone is enough to name some systems when the hunks themselves cannot be
//! decoded.

use std::fmt;

use crate::disc::error::{IdentifyError, IdentifyResult};
use crate::disc::identifier::{Confidence, ConfidenceLevel};
use crate::disc::source::ByteSource;
use crate::disc::system::SystemId;

/// CD-ROM track, v2
pub const CHT2_TAG: &[u8; 4] = b"CHT2";
/// CD-ROM track, v1
pub const CHTR_TAG: &[u8; 4] = b"CHTR";
/// GD-ROM track
pub const CHGT_TAG: &[u8; 4] = b"CHGT";

const BLOCK_HEADER_SIZE: usize = 16;

/// Sector format of a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackType {
    Mode1,
    Mode1Raw,
    Mode2,
    Mode2Form1,
    Mode2Form2,
    Mode2FormMix,
    Mode2Raw,
    Audio,
    Other(String),
}

impl TrackType {
    pub fn parse(value: &str) -> Self {
        match value {
            "MODE1" => Self::Mode1,
            "MODE1_RAW" => Self::Mode1Raw,
            "MODE2" => Self::Mode2,
            "MODE2_FORM1" => Self::Mode2Form1,
            "MODE2_FORM2" => Self::Mode2Form2,
            "MODE2_FORM_MIX" => Self::Mode2FormMix,
            "MODE2_RAW" => Self::Mode2Raw,
            "AUDIO" => Self::Audio,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_audio(&self) -> bool {
        *self == Self::Audio
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mode1 => "MODE1",
            Self::Mode1Raw => "MODE1_RAW",
            Self::Mode2 => "MODE2",
            Self::Mode2Form1 => "MODE2_FORM1",
            Self::Mode2Form2 => "MODE2_FORM2",
            Self::Mode2FormMix => "MODE2_FORM_MIX",
            Self::Mode2Raw => "MODE2_RAW",
            Self::Audio => "AUDIO",
            Self::Other(name) => name.as_str(),
        };
        f.write_str(name)
    }
}

/// Subcode format of a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSubtype {
    None,
    /// `RW`
    Cooked,
    /// `RW_RAW`
    Raw,
    Other(String),
}

impl TrackSubtype {
    pub fn parse(value: &str) -> Self {
        match value {
            "NONE" => Self::None,
            "RW" => Self::Cooked,
            "RW_RAW" => Self::Raw,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One track as described by the container metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    pub track_number: u32,
    pub track_type: TrackType,
    pub subtype: TrackSubtype,
    pub frames: u32,
    pub pregap: u32,
}

/// Bounds for the metadata walk
#[derive(Debug, Clone, Copy)]
pub struct MetadataLimits {
    /// Blocks followed before giving up (guards against cycles)
    pub hop_limit: usize,
    /// Largest track record read
    pub record_bytes: usize,
}

impl Default for MetadataLimits {
    fn default() -> Self {
        Self {
            hop_limit: 100,
            record_bytes: 512,
        }
    }
}

/// Parse a single track record
///
/// Unknown keys and malformed values are ignored; a record without a
/// positive track number is dropped.
pub fn parse_track_record(content: &str) -> Option<TrackDescriptor> {
    let mut track_number = 0u32;
    let mut track_type = TrackType::Other(String::new());
    let mut subtype = TrackSubtype::None;
    let mut frames = 0u32;
    let mut pregap = 0u32;

    for part in content.split_whitespace() {
        if let Some((key, value)) = part.split_once(':') {
            match key {
                "TRACK" => track_number = value.parse().unwrap_or(0),
                "TYPE" => track_type = TrackType::parse(value),
                "SUBTYPE" => subtype = TrackSubtype::parse(value),
                "FRAMES" => frames = value.parse().unwrap_or(0),
                "PREGAP" => pregap = value.parse().unwrap_or(0),
                _ => {}
            }
        }
    }

    if track_number > 0 {
        Some(TrackDescriptor {
            track_number,
            track_type,
            subtype,
            frames,
            pregap,
        })
    } else {
        None
    }
}

/// Walk the metadata chain from `meta_offset` and collect track records
///
/// Stops silently at a zero offset, a short or failed read, or after
/// `limits.hop_limit` blocks. The result is sorted by track number.
pub fn read_track_metadata<S: ByteSource + ?Sized>(
    source: &mut S,
    meta_offset: u64,
    limits: MetadataLimits,
) -> Vec<TrackDescriptor> {
    let mut tracks = Vec::new();
    let mut offset = meta_offset;

    for _ in 0..limits.hop_limit {
        if offset == 0 {
            break;
        }

        let block = match source.read_at(offset, BLOCK_HEADER_SIZE) {
            Ok(block) if block.len() == BLOCK_HEADER_SIZE => block,
            Ok(_) => break,
            Err(e) => {
                log::debug!("Metadata block at {} unreadable: {}", offset, e);
                break;
            }
        };

        let tag = &block[0..4];
        let length = u32::from_be_bytes([0, block[5], block[6], block[7]]) as usize;
        let mut next = [0u8; 8];
        next.copy_from_slice(&block[8..16]);
        let next = u64::from_be_bytes(next);

        if tag == CHT2_TAG || tag == CHTR_TAG || tag == CHGT_TAG {
            let data_offset = offset.saturating_add(BLOCK_HEADER_SIZE as u64);
            match source.read_at(data_offset, length.min(limits.record_bytes)) {
                Ok(data) => {
                    let text = String::from_utf8_lossy(&data);
                    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
                    match parse_track_record(text) {
                        Some(track) => tracks.push(track),
                        None => log::debug!("Skipping track record without number: {:?}", text),
                    }
                }
                Err(e) => {
                    log::debug!("Track record at {} unreadable: {}", data_offset, e);
                    break;
                }
            }
        }

        offset = next;
    }

    tracks.sort_by_key(|t| t.track_number);
    tracks
}

/// Systems a MODE1 first track is consistent with
pub const MODE1_CANDIDATES: &[SystemId] = &[
    SystemId::Saturn,
    SystemId::SegaCd,
    SystemId::Dreamcast,
    SystemId::PcEngine,
];

/// What the track layout says about the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackVerdict {
    Match {
        system: SystemId,
        confidence: Confidence,
        rule: &'static str,
    },
    /// Consistent with several systems; needs sector data to decide
    Ambiguous { candidates: &'static [SystemId] },
    Unknown,
}

impl TrackVerdict {
    pub fn into_result(self) -> IdentifyResult<(SystemId, Confidence)> {
        match self {
            Self::Match {
                system, confidence, ..
            } => Ok((system, confidence)),
            Self::Ambiguous { .. } | Self::Unknown => Err(IdentifyError::NoMatch),
        }
    }
}

/// Classify a disc from its (sorted) track list
pub fn classify_tracks(tracks: &[TrackDescriptor]) -> TrackVerdict {
    let Some(first) = tracks.first() else {
        return TrackVerdict::Unknown;
    };

    match first.track_type {
        // XA sectors
        TrackType::Mode2Raw => {
            return TrackVerdict::Match {
                system: SystemId::PlayStation,
                confidence: Confidence::Definitive,
                rule: "track 1 MODE2_RAW",
            }
        }
        TrackType::Mode1Raw | TrackType::Mode1 => {
            return TrackVerdict::Ambiguous {
                candidates: MODE1_CANDIDATES,
            }
        }
        _ => {}
    }

    // 3DO discs master their data as audio sectors; Jaguar CD and CD-i can
    // look the same but are far rarer
    if tracks.iter().all(|t| t.track_type.is_audio()) {
        return TrackVerdict::Match {
            system: SystemId::ThreeDo,
            confidence: Confidence::Heuristic(ConfidenceLevel::Medium),
            rule: "all tracks AUDIO",
        };
    }

    TrackVerdict::Unknown
}
