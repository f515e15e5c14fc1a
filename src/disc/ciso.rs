//! CISO (compact ISO) wrapper
//!
//! ```text
//! 0x0000  "CISO"
//! 0x0004  block size, u32 LE
//! 0x0008  block map, one byte per block (1 = present, 0 = absent)
//! 0x8000  present blocks, stored back to back
//! ```
//!
//! The first stored block starts at logical offset 0, so for identification
//! the payload from 0x8000 onward stands in for the logical image.

/// Wrapper magic
pub const CISO_MAGIC: &[u8; 4] = b"CISO";

/// Offset of the first stored block
pub const CISO_DATA_OFFSET: usize = 0x8000;

const MIN_BLOCK_SIZE: u32 = 2048;
const MAX_BLOCK_SIZE: u32 = 64 * 1024 * 1024;

/// A CISO prefix
#[derive(Debug, Clone, Copy)]
pub struct CisoImage<'a> {
    pub block_size: u32,
    /// Whether logical block 0 is stored; absent blocks read as zeros
    pub first_block_present: bool,
    data: &'a [u8],
}

impl<'a> CisoImage<'a> {
    /// Quick magic check
    pub fn is_ciso(bytes: &[u8]) -> bool {
        bytes.starts_with(CISO_MAGIC)
    }

    /// Parse a prefix; `None` unless it is a plausible CISO that reaches the
    /// payload
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        if data.len() < 12 || !Self::is_ciso(data) {
            return None;
        }

        let block_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
            log::debug!("CISO block size {} out of range", block_size);
            return None;
        }

        if data.len() <= CISO_DATA_OFFSET {
            return None;
        }

        Some(Self {
            block_size,
            first_block_present: data[8] != 0,
            data,
        })
    }

    /// Payload bytes, starting at logical offset 0
    pub fn logical_prefix(&self) -> &'a [u8] {
        &self.data[CISO_DATA_OFFSET..]
    }
}
