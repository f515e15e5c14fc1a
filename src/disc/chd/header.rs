//! CHD v5 container header
//!
//! Layout (all big-endian):
//!
//! | offset | size | field          |
//! |--------|------|----------------|
//! | 0      | 8    | magic `MComprHD` |
//! | 8      | 4    | header length  |
//! | 12     | 4    | version        |
//! | 16     | 16   | codec tags x4  |
//! | 32     | 8    | logical bytes  |
//! | 40     | 8    | map offset     |
//! | 48     | 8    | metadata offset|
//! | 56     | 4    | hunk bytes     |
//! | 60     | 4    | unit bytes     |
//! | 64     | 20   | raw SHA-1      |
//! | 84     | 20   | SHA-1          |
//! | 104    | 20   | parent SHA-1   |

use super::codec::CodecTag;
use crate::disc::error::{IdentifyError, IdentifyResult};

/// Container magic
pub const CHD_MAGIC: &[u8; 8] = b"MComprHD";

/// Size of a v5 header in bytes
pub const CHD_V5_HEADER_SIZE: usize = 124;

/// The only container revision this crate reads
pub const SUPPORTED_VERSION: u32 = 5;

/// Largest hunk size accepted; real images use a few KiB to 1 MiB
const MAX_HUNK_BYTES: u32 = 16 * 1024 * 1024;

const SHA1_BYTES: usize = 20;

/// Parsed v5 container header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub header_length: u32,
    pub version: u32,
    /// Codec per slot; map entries select codecs by slot index
    pub compressors: [Option<CodecTag>; 4],
    pub logical_bytes: u64,
    pub map_offset: u64,
    pub meta_offset: u64,
    pub hunk_bytes: u32,
    pub unit_bytes: u32,
    pub raw_sha1: [u8; SHA1_BYTES],
    pub sha1: [u8; SHA1_BYTES],
    pub parent_sha1: [u8; SHA1_BYTES],
    /// Derived: `ceil(logical_bytes / hunk_bytes)`
    pub hunk_count: u64,
}

impl ContainerHeader {
    /// Quick magic check, no further validation
    pub fn is_container(bytes: &[u8]) -> bool {
        bytes.len() >= CHD_MAGIC.len() && &bytes[..CHD_MAGIC.len()] == CHD_MAGIC
    }

    /// Parse and validate a header from the first bytes of a file
    pub fn parse(bytes: &[u8]) -> IdentifyResult<Self> {
        if !Self::is_container(bytes) {
            return Err(IdentifyError::NotAContainer);
        }
        if bytes.len() < 16 {
            return Err(IdentifyError::InsufficientData {
                needed: 16,
                available: bytes.len(),
            });
        }

        let version = be_u32(bytes, 12);
        if version != SUPPORTED_VERSION {
            return Err(IdentifyError::UnsupportedVersion(version));
        }

        if bytes.len() < CHD_V5_HEADER_SIZE {
            return Err(IdentifyError::InsufficientData {
                needed: CHD_V5_HEADER_SIZE,
                available: bytes.len(),
            });
        }

        let mut compressors = [None; 4];
        for (slot, codec) in compressors.iter_mut().enumerate() {
            let at = 16 + slot * 4;
            *codec = CodecTag::from_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        }

        let logical_bytes = be_u64(bytes, 32);
        let hunk_bytes = be_u32(bytes, 56);

        if hunk_bytes == 0 {
            return Err(IdentifyError::DegenerateHeader(
                "hunk size is zero".to_string(),
            ));
        }
        if hunk_bytes > MAX_HUNK_BYTES {
            return Err(IdentifyError::DegenerateHeader(format!(
                "hunk size {} exceeds {}",
                hunk_bytes, MAX_HUNK_BYTES
            )));
        }

        let hunk_count = logical_bytes.div_ceil(u64::from(hunk_bytes));

        Ok(Self {
            header_length: be_u32(bytes, 8),
            version,
            compressors,
            logical_bytes,
            map_offset: be_u64(bytes, 40),
            meta_offset: be_u64(bytes, 48),
            hunk_bytes,
            unit_bytes: be_u32(bytes, 60),
            raw_sha1: sha1_at(bytes, 64),
            sha1: sha1_at(bytes, 84),
            parent_sha1: sha1_at(bytes, 104),
            hunk_count,
        })
    }

    /// Codec in the given slot, if the slot is declared
    pub fn codec(&self, slot: u8) -> Option<CodecTag> {
        self.compressors.get(slot as usize).copied().flatten()
    }

    /// Declared codecs, skipping empty slots
    pub fn declared_codecs(&self) -> impl Iterator<Item = CodecTag> + '_ {
        self.compressors.iter().flatten().copied()
    }

    /// Whether this image is a delta against a parent container
    pub fn has_parent(&self) -> bool {
        self.parent_sha1.iter().any(|&b| b != 0)
    }
}

fn be_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn be_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_be_bytes(raw)
}

fn sha1_at(bytes: &[u8], at: usize) -> [u8; SHA1_BYTES] {
    let mut hash = [0u8; SHA1_BYTES];
    hash.copy_from_slice(&bytes[at..at + SHA1_BYTES]);
    hash
}
