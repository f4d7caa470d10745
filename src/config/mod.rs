//! Configuration types for the radio map pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Configuration for raw radio signal parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Placeholder RSS value for access points not observed in a scan.
    /// Must lie outside the legitimate (negative dBm) range.
    #[serde(default = "default_sentinel_rss")]
    pub sentinel_rss: f32,

    /// Regex used to extract the collection-session index from a checkpoint
    /// file stem. Files that do not match fall back to sorted-order indices.
    #[serde(default = "default_session_pattern")]
    pub session_pattern: String,
}

fn default_sentinel_rss() -> f32 {
    100.0
}

fn default_session_pattern() -> String {
    r"(?i)checkpoint[_-]?(\d+)".to_string()
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            sentinel_rss: default_sentinel_rss(),
            session_pattern: default_session_pattern(),
        }
    }
}

/// Configuration for the sampling-duration correction stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Maximum elapsed time (seconds) since the first scan of a session;
    /// later scans are dropped so every label contributes a comparable
    /// collection duration.
    #[serde(default = "default_max_sampling_secs")]
    pub max_sampling_secs: f32,
}

fn default_max_sampling_secs() -> f32 {
    60.0
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            max_sampling_secs: default_max_sampling_secs(),
        }
    }
}

/// Neighbor-aggregation statistic used by the proximity interpolator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NeighborAggregation {
    /// Equal-weight arithmetic mean of all qualifying neighbors.
    Mean,
    /// Reading of the closest qualifying neighbor (ties broken by row order).
    Nearest,
    /// Inverse-distance-weighted mean of all qualifying neighbors.
    InverseDistance,
}

impl std::str::FromStr for NeighborAggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "nearest" => Ok(Self::Nearest),
            "inverse-distance" | "inverse_distance" | "idw" => Ok(Self::InverseDistance),
            other => Err(format!(
                "unknown aggregation '{}', expected mean, nearest or inverse-distance",
                other
            )),
        }
    }
}

/// Configuration for the proximity interpolation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpolationConfig {
    /// Euclidean radius (meters) within which other rows qualify as
    /// neighbors for imputing a missing reading.
    #[serde(default = "default_distance_threshold_m")]
    pub distance_threshold_m: f32,

    /// Statistic used to combine neighbor readings.
    #[serde(default = "default_strategy")]
    pub strategy: NeighborAggregation,
}

fn default_distance_threshold_m() -> f32 {
    30.0
}

fn default_strategy() -> NeighborAggregation {
    NeighborAggregation::Mean
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            distance_threshold_m: default_distance_threshold_m(),
            strategy: default_strategy(),
        }
    }
}

/// Configuration for the rolling-mean smoothing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Number of consecutive scans averaged into one output row.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Number of rows the window advances between outputs.
    #[serde(default = "default_step")]
    pub step: usize,
}

fn default_window_size() -> usize {
    30
}

fn default_step() -> usize {
    5
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            step: default_step(),
        }
    }
}

/// Configuration for min-max scaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// Lower bound of the scaled output range.
    #[serde(default)]
    pub range_min: f32,

    /// Upper bound of the scaled output range.
    #[serde(default = "default_range_max")]
    pub range_max: f32,

    /// Scaled value assigned to sentinel (not-observed) cells.
    #[serde(default = "default_sentinel_scaled")]
    pub sentinel_scaled: f32,
}

fn default_range_max() -> f32 {
    1.0
}

fn default_sentinel_scaled() -> f32 {
    1.0
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            range_min: 0.0,
            range_max: default_range_max(),
            sentinel_scaled: default_sentinel_scaled(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub radio: RadioConfig,

    #[serde(default)]
    pub correction: CorrectionConfig,

    #[serde(default)]
    pub interpolation: InterpolationConfig,

    #[serde(default)]
    pub smoothing: SmoothingConfig,

    #[serde(default)]
    pub scaling: ScalingConfig,

    /// Ground-truth survey coordinates (meters) per location label.
    /// Labels absent from this map cannot be placed in the radio map.
    #[serde(default)]
    pub labels: HashMap<String, [f32; 2]>,
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

    /// Recognized labels in deterministic (sorted) order.
    pub fn sorted_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.labels.keys().cloned().collect();
        labels.sort();
        labels
    }
}
