//! Disc and cartridge image identification
//!
//! Provides functionality for reading just enough of an image (raw, CHD v5,
//! CISO or zipped) to tell which console it belongs to.

pub mod archive;
pub mod boot;
pub mod chd;
pub mod ciso;
pub mod error;
pub mod identifier;
pub mod iso9660;
pub mod signature;
pub mod source;
pub mod system;

pub use error::{IdentifyError, IdentifyResult};
pub use identifier::{
    Classification, Confidence, ConfidenceLevel, ConfidencePath, Identification, Identifier,
};
pub use source::{BoundedSource, ByteSource, CachedSource, FileSource, MemorySource, RangeSource};
pub use system::SystemId;
