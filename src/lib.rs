//! WiFi RSS radio map preparation pipeline.
//!
//! This crate provides tools for:
//! - Loading raw WiFi scan checkpoints from per-label collection directories
//! - Bounding per-label sampling duration and attaching survey coordinates
//! - Filling unobserved access points with a sentinel reading
//! - Proximity-based interpolation of missing readings (KD-tree accelerated)
//! - Rolling-mean aggregation of consecutive scans per collection session
//! - Min-max scaling with persistable fit parameters
//!
//! # Example
//!
//! ```no_run
//! use radiomap_pipeline::config::PipelineConfig;
//! use radiomap_pipeline::processors::radiomap::build_radio_maps;
//! use std::path::Path;
//!
//! let config = PipelineConfig::default();
//! let summary =
//!     build_radio_maps(Path::new("data/checkpoints"), Path::new("output"), &config).unwrap();
//! println!("{} raw rows written", summary.raw_rows);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{
    CorrectionConfig, InterpolationConfig, NeighborAggregation, PipelineConfig, RadioConfig,
    ScalingConfig, SmoothingConfig,
};
pub use core::loaders::{RadioMap, RadioMapRow, ScanRecord};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
