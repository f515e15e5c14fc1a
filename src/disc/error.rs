//! Identification outcomes
//!
//! Every stage of the identification ladder reports failure through
//! [`IdentifyError`]. None of these are fatal: the ladder consumes them and
//! moves on to the next strategy, so only `Io`/`Archive` ever reach a caller
//! (and only from the path-opening helpers).

use thiserror::Error;

use super::chd::CodecTag;

/// Typed outcomes of the header, hunk, directory and matching stages
#[derive(Error, Debug)]
pub enum IdentifyError {
    #[error("Not a CHD container (bad magic)")]
    NotAContainer,

    #[error("Unsupported CHD version: {0}")]
    UnsupportedVersion(u32),

    #[error("Degenerate CHD header: {0}")]
    DegenerateHeader(String),

    #[error("CHD header declares no compression codecs")]
    NoCodecsDeclared,

    #[error("Unsupported hunk codec: {0}")]
    UnsupportedCodec(CodecTag),

    #[error("Insufficient data: need {needed} bytes, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Root directory lies outside the window (need {needed} bytes)")]
    RootDirectoryUnavailable { needed: usize },

    #[error("File extends beyond the window (need {needed} bytes)")]
    FileBeyondWindow { needed: usize },

    #[error("File not found in root directory: {0}")]
    FileNotFound(String),

    #[error("No signature matched")]
    NoMatch,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl IdentifyError {
    /// Window size that would let a retry succeed, for the outcomes that
    /// are cured by reading further into the image
    pub fn wanted_bytes(&self) -> Option<usize> {
        match self {
            Self::RootDirectoryUnavailable { needed } | Self::FileBeyondWindow { needed } => {
                Some(*needed)
            }
            _ => None,
        }
    }
}

/// Result type for identification stages
pub type IdentifyResult<T> = Result<T, IdentifyError>;
