//! Configuration types for the trial pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for array normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Lower bound of the target interval
    #[serde(default)]
    pub min_val: f64,

    /// Upper bound of the target interval
    #[serde(default = "default_max_val")]
    pub max_val: f64,
}

fn default_max_val() -> f64 {
    1.0
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            min_val: 0.0,
            max_val: default_max_val(),
        }
    }
}

/// Configuration for collecting per-trial CSV files into one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// File name of the metadata sidecar, resolved next to the input directory
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,

    /// Metadata field broadcast onto every collected row
    #[serde(default = "default_metadata_field")]
    pub metadata_field: String,

    /// Sort input files by name before concatenating
    #[serde(default = "default_true")]
    pub sort_files: bool,

    /// Write a leading per-file row index column
    #[serde(default)]
    pub write_index: bool,
}

fn default_metadata_file() -> String {
    "metadata.json".to_string()
}

fn default_metadata_field() -> String {
    "session_date".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            metadata_file: default_metadata_file(),
            metadata_field: default_metadata_field(),
            sort_files: true,
            write_index: false,
        }
    }
}

/// Configuration for boolean row filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Column holding the per-row flag
    #[serde(default = "default_flag_column")]
    pub flag_column: String,
}

fn default_flag_column() -> String {
    "valid".to_string()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            flag_column: default_flag_column(),
        }
    }
}

/// Configuration for stacking per-trial arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Sort input files by name before stacking
    #[serde(default = "default_true")]
    pub sort_files: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self { sort_files: true }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub normalize: NormalizeConfig,

    #[serde(default)]
    pub collect: CollectConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub merge: MergeConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
