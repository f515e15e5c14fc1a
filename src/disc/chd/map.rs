//! Hunk map decoding
//!
//! Each hunk of the logical image has a 12-byte map entry:
//!
//! ```text
//! [0]      selector (0..=3 codec slot, 4 uncompressed, 5 self, 6 parent)
//! [1..4]   compressed length, u24 BE
//! [4..10]  source offset, u48 BE
//! [10..12] CRC-16 of the decoded hunk
//! ```
//!
//! [`HunkMapDecoder::materialize`] walks the map from hunk 0 and appends
//! decoded hunks to a [`LogicalWindow`] until the budget is met or a hunk
//! cannot be produced. Whatever was decoded before the stop stays usable.

use std::fmt;
use std::io;

use super::codec::{decode_hunk, CodecError, CodecTag};
use super::header::ContainerHeader;
use crate::disc::error::{IdentifyError, IdentifyResult};
use crate::disc::source::ByteSource;

/// Size of one map entry in bytes
pub const MAP_ENTRY_SIZE: usize = 12;

/// How a hunk is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkSelector {
    /// Compressed with the codec in the given header slot
    Codec(u8),
    Uncompressed,
    /// Copy of another hunk in this image
    SelfReference,
    /// Copy of a hunk in the parent image
    ParentReference,
    Unknown(u8),
}

impl HunkSelector {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0..=3 => Self::Codec(byte),
            4 => Self::Uncompressed,
            5 => Self::SelfReference,
            6 => Self::ParentReference,
            other => Self::Unknown(other),
        }
    }
}

/// One decoded map entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkMapEntry {
    pub selector: HunkSelector,
    pub compressed_length: u32,
    pub source_offset: u64,
    pub crc16: u16,
}

impl HunkMapEntry {
    /// Parse a 12-byte entry; `None` if the slice is short
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < MAP_ENTRY_SIZE {
            return None;
        }

        let compressed_length = u32::from_be_bytes([0, bytes[1], bytes[2], bytes[3]]);
        let mut offset = [0u8; 8];
        offset[2..].copy_from_slice(&bytes[4..10]);

        Some(Self {
            selector: HunkSelector::from_byte(bytes[0]),
            compressed_length,
            source_offset: u64::from_be_bytes(offset),
            crc16: u16::from_be_bytes([bytes[10], bytes[11]]),
        })
    }
}

/// Why materialization stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStop {
    BudgetReached,
    EndOfImage,
    ShortRead { hunk: u64 },
    SelfReference { hunk: u64 },
    ParentReference { hunk: u64 },
    UnsupportedCodec { hunk: u64, tag: CodecTag },
    CorruptHunk { hunk: u64 },
    InvalidSelector { hunk: u64, selector: u8 },
}

impl fmt::Display for WindowStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BudgetReached => write!(f, "budget reached"),
            Self::EndOfImage => write!(f, "end of image"),
            Self::ShortRead { hunk } => write!(f, "short read at hunk {}", hunk),
            Self::SelfReference { hunk } => write!(f, "self reference at hunk {}", hunk),
            Self::ParentReference { hunk } => write!(f, "parent reference at hunk {}", hunk),
            Self::UnsupportedCodec { hunk, tag } => {
                write!(f, "unsupported codec {} at hunk {}", tag, hunk)
            }
            Self::CorruptHunk { hunk } => write!(f, "corrupt hunk {}", hunk),
            Self::InvalidSelector { hunk, selector } => {
                write!(f, "invalid selector {} at hunk {}", selector, hunk)
            }
        }
    }
}

/// Contiguous decoded prefix of the logical image
#[derive(Debug, Clone)]
pub struct LogicalWindow {
    data: Vec<u8>,
    hunks_decoded: u64,
    stop: WindowStop,
}

impl LogicalWindow {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn hunks_decoded(&self) -> u64 {
        self.hunks_decoded
    }

    pub fn stop(&self) -> WindowStop {
        self.stop
    }

    /// The codec that halted decoding, if that is why it stopped
    pub fn unsupported_codec(&self) -> Option<CodecTag> {
        match self.stop {
            WindowStop::UnsupportedCodec { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Reads map entries and hunks for one container
pub struct HunkMapDecoder<'a> {
    header: &'a ContainerHeader,
}

impl<'a> HunkMapDecoder<'a> {
    /// Fails with `NoCodecsDeclared` when every codec slot is empty; the
    /// header stays usable for the metadata path
    pub fn new(header: &'a ContainerHeader) -> IdentifyResult<Self> {
        if header.declared_codecs().next().is_none() {
            return Err(IdentifyError::NoCodecsDeclared);
        }
        Ok(Self { header })
    }

    /// Read the map entry for hunk `index`; `None` on a short read
    pub fn entry<S: ByteSource + ?Sized>(
        &self,
        source: &mut S,
        index: u64,
    ) -> Result<Option<HunkMapEntry>, io::Error> {
        let offset = index
            .checked_mul(MAP_ENTRY_SIZE as u64)
            .and_then(|rel| self.header.map_offset.checked_add(rel));
        let Some(offset) = offset else {
            return Ok(None);
        };

        let bytes = source.read_at(offset, MAP_ENTRY_SIZE)?;
        Ok(HunkMapEntry::parse(&bytes))
    }

    /// Decode hunks from logical offset 0 until `budget` bytes are available
    /// or a hunk cannot be produced
    ///
    /// Never fails: a stop condition is recorded in the returned window.
    pub fn materialize<S: ByteSource + ?Sized>(&self, source: &mut S, budget: usize) -> LogicalWindow {
        let empty = LogicalWindow {
            data: Vec::new(),
            hunks_decoded: 0,
            stop: WindowStop::BudgetReached,
        };
        self.extend(source, empty, budget)
    }

    /// Continue decoding a window that stopped on its budget
    ///
    /// Windows that stopped for any other reason are returned unchanged.
    pub fn extend<S: ByteSource + ?Sized>(
        &self,
        source: &mut S,
        window: LogicalWindow,
        budget: usize,
    ) -> LogicalWindow {
        if window.stop != WindowStop::BudgetReached {
            return window;
        }
        let LogicalWindow {
            mut data,
            hunks_decoded: mut index,
            ..
        } = window;

        let stop = loop {
            if data.len() >= budget {
                break WindowStop::BudgetReached;
            }
            if index >= self.header.hunk_count {
                break WindowStop::EndOfImage;
            }

            let entry = match self.entry(source, index) {
                Ok(Some(entry)) => entry,
                Ok(None) => break WindowStop::ShortRead { hunk: index },
                Err(e) => {
                    log::debug!("Map entry {} unreadable: {}", index, e);
                    break WindowStop::ShortRead { hunk: index };
                }
            };

            match self.decode(source, index, &entry) {
                Ok(hunk) => {
                    data.extend_from_slice(&hunk);
                    index += 1;
                }
                Err(stop) => break stop,
            }
        };

        // The final hunk is padded past the end of the logical image
        if let Ok(logical) = usize::try_from(self.header.logical_bytes) {
            data.truncate(logical);
        }

        log::debug!(
            "Materialized {} bytes from {} hunks ({})",
            data.len(),
            index,
            stop
        );

        LogicalWindow {
            data,
            hunks_decoded: index,
            stop,
        }
    }

    fn decode<S: ByteSource + ?Sized>(
        &self,
        source: &mut S,
        index: u64,
        entry: &HunkMapEntry,
    ) -> Result<Vec<u8>, WindowStop> {
        let hunk_bytes = self.header.hunk_bytes as usize;

        match entry.selector {
            HunkSelector::Uncompressed => {
                let raw = read_exact_or_stop(source, entry.source_offset, hunk_bytes, index)?;
                Ok(raw)
            }
            HunkSelector::Codec(slot) => {
                let tag = self.header.codec(slot).ok_or(WindowStop::InvalidSelector {
                    hunk: index,
                    selector: slot,
                })?;
                // Checked before the payload read so no budget is spent on it
                if !tag.is_supported() {
                    return Err(WindowStop::UnsupportedCodec { hunk: index, tag });
                }

                let payload = read_exact_or_stop(
                    source,
                    entry.source_offset,
                    entry.compressed_length as usize,
                    index,
                )?;

                decode_hunk(tag, &payload, hunk_bytes).map_err(|e| match e {
                    CodecError::Unsupported(tag) => WindowStop::UnsupportedCodec { hunk: index, tag },
                    CodecError::Corrupt(reason) => {
                        log::debug!("Hunk {} corrupt: {}", index, reason);
                        WindowStop::CorruptHunk { hunk: index }
                    }
                })
            }
            HunkSelector::SelfReference => Err(WindowStop::SelfReference { hunk: index }),
            HunkSelector::ParentReference => Err(WindowStop::ParentReference { hunk: index }),
            HunkSelector::Unknown(selector) => Err(WindowStop::InvalidSelector {
                hunk: index,
                selector,
            }),
        }
    }
}

fn read_exact_or_stop<S: ByteSource + ?Sized>(
    source: &mut S,
    offset: u64,
    length: usize,
    hunk: u64,
) -> Result<Vec<u8>, WindowStop> {
    match source.read_at(offset, length) {
        Ok(bytes) if bytes.len() == length => Ok(bytes),
        Ok(bytes) => {
            log::debug!(
                "Hunk {} short read: {} of {} bytes at {}",
                hunk,
                bytes.len(),
                length,
                offset
            );
            Err(WindowStop::ShortRead { hunk })
        }
        Err(e) => {
            log::debug!("Hunk {} read failed: {}", hunk, e);
            Err(WindowStop::ShortRead { hunk })
        }
    }
}
