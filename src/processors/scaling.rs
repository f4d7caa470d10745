//! Min-max scaling with persistable fit parameters.
//!
//! The fit is derived from the training table's legitimate (non-sentinel)
//! readings and saved to YAML next to the processed radio map, so the same
//! transform can be replayed on data collected later.

use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ScalingConfig;
use crate::core::loaders::RadioMap;

/// Errors that can occur during scaling.
#[derive(Debug, Error)]
pub enum ScalingError {
    #[error("table holds no observed readings to fit on")]
    NoObservedReadings,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for scaling operations.
pub type Result<T> = std::result::Result<T, ScalingError>;

/// Fitted min-max transform parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleParams {
    /// Smallest legitimate reading in the fit data.
    pub rss_min: f32,
    /// Largest legitimate reading in the fit data.
    pub rss_max: f32,
    /// Lower bound of the output range.
    pub range_min: f32,
    /// Upper bound of the output range.
    pub range_max: f32,
    /// Sentinel value in the unscaled table.
    pub sentinel_rss: f32,
    /// Value sentinel cells take in the scaled table.
    pub sentinel_scaled: f32,
}

impl ScaleParams {
    /// Fit transform parameters on a table's legitimate readings.
    ///
    /// Sentinel and non-finite cells are excluded from the fit.
    ///
    /// # Errors
    ///
    /// Returns `NoObservedReadings` when the table has no legitimate cell.
    pub fn fit(map: &RadioMap, sentinel: f32, config: &ScalingConfig) -> Result<Self> {
        let mut rss_min = f32::INFINITY;
        let mut rss_max = f32::NEG_INFINITY;

        for row in &map.rows {
            for &v in &row.rss {
                if v != sentinel && v.is_finite() {
                    rss_min = rss_min.min(v);
                    rss_max = rss_max.max(v);
                }
            }
        }

        if rss_min > rss_max {
            return Err(ScalingError::NoObservedReadings);
        }

        Ok(Self {
            rss_min,
            rss_max,
            range_min: config.range_min,
            range_max: config.range_max,
            sentinel_rss: sentinel,
            sentinel_scaled: config.sentinel_scaled,
        })
    }

    /// Scale one reading into the output range.
    ///
    /// Sentinel cells map to `sentinel_scaled`; legitimate readings map
    /// linearly and are clamped, so values outside the fitted range (from
    /// data collected after the fit) stay inside the configured bounds. A
    /// degenerate fit (`rss_min == rss_max`) maps every reading to
    /// `range_min`.
    pub fn scale_value(&self, value: f32) -> f32 {
        if value == self.sentinel_rss {
            return self.sentinel_scaled;
        }

        let span = self.rss_max - self.rss_min;
        if span == 0.0 {
            return self.range_min;
        }

        let unit = (value - self.rss_min) / span;
        let scaled = self.range_min + unit * (self.range_max - self.range_min);
        scaled.clamp(self.range_min, self.range_max)
    }

    /// Invert a scaled value back to an RSS reading.
    pub fn invert_value(&self, value: f32) -> f32 {
        if value == self.sentinel_scaled {
            return self.sentinel_rss;
        }

        let span = self.range_max - self.range_min;
        if span == 0.0 {
            return self.rss_min;
        }

        let unit = (value - self.range_min) / span;
        self.rss_min + unit * (self.rss_max - self.rss_min)
    }

    /// Persist fit parameters to a YAML file.
    pub fn save_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load fit parameters from a YAML file.
    pub fn load_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let params: ScaleParams = serde_yaml::from_str(&content)?;
        Ok(params)
    }
}

/// Apply a fitted min-max transform to every cell of a table.
pub fn scale(mut map: RadioMap, params: &ScaleParams) -> RadioMap {
    map.rows.par_iter_mut().for_each(|row| {
        for value in row.rss.iter_mut() {
            *value = params.scale_value(*value);
        }
    });
    map
}
