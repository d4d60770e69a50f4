//! Persisted configuration for a stacking run.
//!
//! Every section has a `Default`, and missing JSON fields fall back to it,
//! so a config file only needs to name the values it changes:
//!
//! ```json
//! { "registration": { "max_distance": 1.5 }, "stacking": { "max_brightness": 40.0 } }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stack_math::RegistrationConfig;
use thiserror::Error;

use crate::composite::{BoundingRect, DEFAULT_MAX_FRAME_INTERVAL_SECS};
use crate::frame_store::{FetchConfig, IndexConfig};
use crate::image_proc::ExtractionConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// How registered frames are grouped and composited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackingConfig {
    /// Start a new output image when consecutive frames are further apart.
    /// Default: 4 hours
    pub max_frame_interval_secs: i64,

    /// Frames brighter than this mean level are not stacked.
    pub max_brightness: Option<f64>,

    /// Crop applied to every output, in reference coordinates.
    pub crop: Option<BoundingRect>,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            max_frame_interval_secs: DEFAULT_MAX_FRAME_INTERVAL_SECS,
            max_brightness: None,
            crop: None,
        }
    }
}

/// Where frames are cached and written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub fetch: FetchConfig,
    pub index: IndexConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("data/images/output"),
            fetch: FetchConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub registration: RegistrationConfig,
    pub extraction: ExtractionConfig,
    pub stacking: StackingConfig,
    pub store: StoreConfig,
}

impl StackConfig {
    /// Save to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}
