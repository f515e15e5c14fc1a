//! Hunk codecs
//!
//! CHD v5 names up to four codecs by 4-byte tag. Only the generic
//! deflate/LZMA/zstd codecs are decoded here; the CD-specific composite
//! codecs (`cdzl`, `cdlz`, `cdfl`, ...) interleave sector and subcode
//! streams and come back as [`CodecError::Unsupported`], which sends the
//! caller down the track-metadata path instead.

use std::fmt;
use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};
use lzma_rs::decompress::raw::{LzmaDecoder, LzmaParams, LzmaProperties};
use thiserror::Error;

/// Compression codec named in a container header slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecTag {
    /// `zlib`: raw deflate stream
    Zlib,
    /// `lzma`: LZMA stream
    Lzma,
    /// `zstd`: zstd frame
    Zstd,
    /// `none`: stored bytes
    None,
    /// Any other tag
    Unrecognized([u8; 4]),
}

impl CodecTag {
    /// Decode a header slot; an all-zero slot declares no codec
    pub fn from_bytes(tag: [u8; 4]) -> Option<Self> {
        match &tag {
            [0, 0, 0, 0] => None,
            b"zlib" => Some(Self::Zlib),
            b"lzma" => Some(Self::Lzma),
            b"zstd" => Some(Self::Zstd),
            b"none" => Some(Self::None),
            _ => Some(Self::Unrecognized(tag)),
        }
    }

    pub fn as_bytes(&self) -> [u8; 4] {
        match self {
            Self::Zlib => *b"zlib",
            Self::Lzma => *b"lzma",
            Self::Zstd => *b"zstd",
            Self::None => *b"none",
            Self::Unrecognized(tag) => *tag,
        }
    }

    /// Whether hunks using this codec can be decoded
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl fmt::Display for CodecTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.as_bytes();
        if tag.iter().all(|b| b.is_ascii_graphic()) {
            write!(f, "{}", String::from_utf8_lossy(&tag))
        } else {
            write!(f, "0x{:08X}", u32::from_be_bytes(tag))
        }
    }
}

/// Why a hunk could not be decoded
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("codec {0} is not supported")]
    Unsupported(CodecTag),

    #[error("corrupt hunk: {0}")]
    Corrupt(String),
}

/// Decode one hunk to exactly `hunk_bytes` bytes
///
/// A failing recognized codec is retried as raw deflate and then as
/// zlib-framed deflate: real containers turn up with deflate payloads
/// under other labels.
pub fn decode_hunk(tag: CodecTag, payload: &[u8], hunk_bytes: usize) -> Result<Vec<u8>, CodecError> {
    let primary = match tag {
        CodecTag::Zlib => inflate_raw(payload, hunk_bytes),
        CodecTag::Lzma => unpack_lzma(payload, hunk_bytes),
        CodecTag::Zstd => unpack_zstd(payload, hunk_bytes),
        CodecTag::None => Ok(payload.to_vec()),
        CodecTag::Unrecognized(_) => return Err(CodecError::Unsupported(tag)),
    }
    .and_then(|out| fit_hunk(out, hunk_bytes));

    let primary_err = match primary {
        Ok(hunk) => return Ok(hunk),
        Err(e) => e,
    };

    log::debug!(
        "{} hunk failed to decode ({}), retrying as deflate",
        tag,
        primary_err
    );

    let retry = if tag == CodecTag::Zlib {
        Err(primary_err.clone())
    } else {
        inflate_raw(payload, hunk_bytes).and_then(|out| fit_hunk(out, hunk_bytes))
    };

    retry
        .or_else(|_| inflate_zlib(payload, hunk_bytes).and_then(|out| fit_hunk(out, hunk_bytes)))
        .map_err(|_| CodecError::Corrupt(format!("{}: {}", tag, primary_err)))
}

/// Trim decoder output to the hunk size; anything shorter is corruption
fn fit_hunk(mut out: Vec<u8>, hunk_bytes: usize) -> Result<Vec<u8>, String> {
    if out.len() < hunk_bytes {
        return Err(format!(
            "decoded {} bytes, expected {}",
            out.len(),
            hunk_bytes
        ));
    }
    out.truncate(hunk_bytes);
    Ok(out)
}

fn inflate_raw(payload: &[u8], hunk_bytes: usize) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(hunk_bytes);
    DeflateDecoder::new(payload)
        .take(hunk_bytes as u64)
        .read_to_end(&mut out)
        .map_err(|e| format!("deflate: {}", e))?;
    Ok(out)
}

fn inflate_zlib(payload: &[u8], hunk_bytes: usize) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(hunk_bytes);
    ZlibDecoder::new(payload)
        .take(hunk_bytes as u64)
        .read_to_end(&mut out)
        .map_err(|e| format!("zlib: {}", e))?;
    Ok(out)
}

fn unpack_zstd(payload: &[u8], hunk_bytes: usize) -> Result<Vec<u8>, String> {
    let decoder = zstd::stream::read::Decoder::new(payload).map_err(|e| format!("zstd: {}", e))?;
    let mut out = Vec::with_capacity(hunk_bytes);
    decoder
        .take(hunk_bytes as u64)
        .read_to_end(&mut out)
        .map_err(|e| format!("zstd: {}", e))?;
    Ok(out)
}

/// LZMA as a self-describing `.lzma` stream first, then as the headerless
/// raw stream MAME's encoder writes
fn unpack_lzma(payload: &[u8], hunk_bytes: usize) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(hunk_bytes);
    let mut input = payload;
    match lzma_rs::lzma_decompress(&mut input, &mut out) {
        Ok(()) if out.len() >= hunk_bytes => return Ok(out),
        Ok(()) => log::debug!("lzma stream decoded short ({} bytes)", out.len()),
        Err(e) => log::debug!("lzma stream rejected: {:?}", e),
    }

    // A range coder always opens with a zero byte; anything else is not a
    // raw LZMA stream and would otherwise decode to garbage
    if payload.first() != Some(&0) {
        return Err("not a raw lzma stream".to_string());
    }

    let params = LzmaParams::new(
        LzmaProperties { lc: 3, lp: 0, pb: 2 },
        lzma_dict_size(hunk_bytes as u32),
        Some(hunk_bytes as u64),
    );
    let mut decoder = LzmaDecoder::new(params, None).map_err(|e| format!("lzma: {:?}", e))?;
    let mut out = Vec::with_capacity(hunk_bytes);
    let mut input = payload;
    decoder
        .decompress(&mut input, &mut out)
        .map_err(|e| format!("raw lzma: {:?}", e))?;
    Ok(out)
}

/// Dictionary size the container encoder picks for a given hunk size
fn lzma_dict_size(hunk_bytes: u32) -> u32 {
    for shift in 11..=30u32 {
        let two = 2u64 << shift;
        let three = 3u64 << shift;
        if u64::from(hunk_bytes) <= two {
            return two as u32;
        }
        if u64::from(hunk_bytes) <= three {
            return three as u32;
        }
    }
    1 << 26
}
