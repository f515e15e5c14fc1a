//! Identification configuration
//!
//! Handles loading tunables from identify.json. Every field has a default,
//! so an empty object (or no file at all) gives the stock limits.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::disc::chd::MetadataLimits;

const CONFIG_FILE: &str = "identify.json";

/// Limits and thresholds for one identification call
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct IdentifyConfig {
    /// Bytes fetched in one read at the start of the image
    #[serde(default = "default_head_bytes")]
    pub head_bytes: usize,
    /// Logical window decoded on the first attempt
    #[serde(default = "default_window_bytes")]
    pub window_bytes: usize,
    /// Ceiling for the single widening retry
    #[serde(default = "default_max_window_bytes")]
    pub max_window_bytes: usize,
    /// Total bytes one call may read from its source
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,
    /// Metadata blocks followed before giving up
    #[serde(default = "default_metadata_hop_limit")]
    pub metadata_hop_limit: usize,
    /// Largest track metadata record read
    #[serde(default = "default_metadata_record_bytes")]
    pub metadata_record_bytes: usize,
    /// Images larger than this cannot be CD media
    #[serde(default = "default_large_image_bytes")]
    pub large_image_bytes: u64,
    /// Wall-clock limit per call; `null` disables it
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: Option<u64>,
}

fn default_head_bytes() -> usize {
    0x20000
}

fn default_window_bytes() -> usize {
    0x20000
}

fn default_max_window_bytes() -> usize {
    0x40000
}

fn default_max_source_bytes() -> usize {
    0x80000
}

fn default_metadata_hop_limit() -> usize {
    100
}

fn default_metadata_record_bytes() -> usize {
    512
}

fn default_large_image_bytes() -> u64 {
    1_000_000_000
}

fn default_read_timeout_secs() -> Option<u64> {
    Some(60)
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            head_bytes: default_head_bytes(),
            window_bytes: default_window_bytes(),
            max_window_bytes: default_max_window_bytes(),
            max_source_bytes: default_max_source_bytes(),
            metadata_hop_limit: default_metadata_hop_limit(),
            metadata_record_bytes: default_metadata_record_bytes(),
            large_image_bytes: default_large_image_bytes(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

impl IdentifyConfig {
    /// Load configuration from identify.json in the current directory,
    /// then next to the executable
    pub fn load() -> Self {
        let mut dirs = vec![PathBuf::from(".")];
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            dirs.push(exe_dir);
        }
        Self::load_from_dirs(&dirs)
    }

    /// First identify.json that parses among `dirs`, else defaults
    pub fn load_from_dirs(dirs: &[PathBuf]) -> Self {
        for dir in dirs {
            let config_path = dir.join(CONFIG_FILE);
            match Self::load_from_path(&config_path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", config_path.display());
                    return config;
                }
                Err(e) if config_path.exists() => {
                    log::warn!("Ignoring {}: {}", config_path.display(), e);
                }
                Err(_) => {}
            }
        }

        log::info!("No {} found, using defaults", CONFIG_FILE);
        Self::default()
    }

    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.into();
        let content = fs::read_to_string(&path)?;
        let config: IdentifyConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }

    pub fn metadata_limits(&self) -> MetadataLimits {
        MetadataLimits {
            hop_limit: self.metadata_hop_limit,
            record_bytes: self.metadata_record_bytes,
        }
    }
}
