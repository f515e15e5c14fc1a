//! Disc Identify Library
//!
//! Core functionality for identifying the console system of disc and
//! cartridge images from a small prefix of their bytes.

pub mod config;
pub mod disc;

pub use config::IdentifyConfig;
pub use disc::{Classification, Confidence, ConfidencePath, Identification, Identifier, SystemId};
