//! Full-pipeline batch orchestration.
//!
//! Runs the whole preparation chain over a checkpoint directory tree and
//! writes both radio map variants: read -> correct -> fill -> interpolate,
//! then the raw branch (smooth -> write) and the processed branch
//! (scale -> smooth -> write).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::PipelineConfig;
use crate::core::loaders::read_checkpoints;
use crate::core::writers::write_radiomap_csv;
use crate::processors::correction::correct;
use crate::processors::filling::{count_sentinel_cells, fill_missing};
use crate::processors::interpolation::interpolate;
use crate::processors::scaling::{scale, ScaleParams};
use crate::processors::smoothing::rolling_mean;

/// File name of the unscaled radio map.
pub const RAW_RADIOMAP_FILE: &str = "raw_radiomap.csv";

/// File name of the scaled radio map.
pub const PROCESSED_RADIOMAP_FILE: &str = "processed_radiomap.csv";

/// File name of the persisted scale parameters.
pub const SCALE_PARAMS_FILE: &str = "scale_params.yaml";

/// Counters and output locations of a full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    /// Scan records loaded from the checkpoint tree.
    pub records_read: usize,
    /// Labels skipped because no checkpoint data was found.
    pub labels_skipped: Vec<String>,
    /// Session files skipped as unparseable.
    pub files_skipped: usize,
    /// Scans surviving the sampling-duration bound.
    pub scans_kept: usize,
    /// Scans dropped for exceeding the sampling-duration bound.
    pub dropped_late: usize,
    /// Scans dropped for lacking a coordinate mapping.
    pub dropped_unknown_label: usize,
    /// Cells that held no reading after the pivot.
    pub cells_missing: usize,
    /// Missing cells resolved by proximity interpolation.
    pub cells_interpolated: usize,
    /// Missing cells left unresolved (no neighbor in range).
    pub cells_unresolved: usize,
    /// Rows in the raw radio map.
    pub raw_rows: usize,
    /// Rows in the processed radio map.
    pub processed_rows: usize,
    /// Path of the raw radio map.
    pub raw_path: PathBuf,
    /// Path of the processed radio map.
    pub processed_path: PathBuf,
    /// Path of the persisted scale parameters.
    pub params_path: PathBuf,
}

/// Build the raw and processed radio maps for a checkpoint tree.
///
/// Scaling is fitted on (and applied to) the interpolated table before
/// smoothing, so the processed map is the smoothed view of scaled scans,
/// not a scaled view of smoothed ones.
///
/// # Arguments
///
/// * `input_root` - Checkpoint root (`<root>/<label>/*.csv`)
/// * `output_dir` - Directory the radio maps and scale parameters go to
/// * `config` - Pipeline configuration including the label coordinate map
///
/// # Errors
///
/// Structural failures (no resolvable labels, nothing surviving correction,
/// unwritable output) abort with context; per-label and per-file problems
/// are skipped, logged, and surfaced through the summary counts.
pub fn build_radio_maps(
    input_root: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<PipelineSummary> {
    let sentinel = config.radio.sentinel_rss;
    let labels = config.sorted_labels();

    let (records, load_report) =
        read_checkpoints(input_root, &labels, &config.radio.session_pattern)
            .with_context(|| format!("reading checkpoints under {}", input_root.display()))?;
    log::info!(
        "loaded {} scans from {} labels ({} skipped)",
        load_report.records,
        load_report.labels_loaded,
        load_report.labels_skipped.len()
    );

    let (table, correction_report) = correct(
        records,
        config.correction.max_sampling_secs,
        &config.labels,
    )
    .context("correcting scan records")?;
    log::info!(
        "corrected table: {} rows x {} access points ({} late, {} unknown-label scans dropped)",
        table.len(),
        table.num_aps(),
        correction_report.dropped_late,
        correction_report.dropped_unknown_label
    );

    let table = fill_missing(table, sentinel);
    let cells_missing = count_sentinel_cells(&table, sentinel);

    let table = interpolate(
        table,
        config.interpolation.distance_threshold_m,
        config.interpolation.strategy,
        sentinel,
    );
    let cells_unresolved = count_sentinel_cells(&table, sentinel);
    log::info!(
        "interpolation resolved {}/{} missing cells",
        cells_missing - cells_unresolved,
        cells_missing
    );

    // Raw branch: smooth the unscaled table
    let raw = rolling_mean(
        table.clone(),
        config.smoothing.window_size,
        config.smoothing.step,
    )
    .context("smoothing raw radio map")?;
    let raw_path = output_dir.join(RAW_RADIOMAP_FILE);
    write_radiomap_csv(&raw_path, &raw)
        .with_context(|| format!("writing {}", raw_path.display()))?;
    log::info!("raw radio map -> {} ({} rows)", raw_path.display(), raw.len());

    // Processed branch: fit + scale first, then smooth
    let params = ScaleParams::fit(&table, sentinel, &config.scaling)
        .context("fitting scale parameters")?;
    let params_path = output_dir.join(SCALE_PARAMS_FILE);
    params
        .save_yaml(&params_path)
        .with_context(|| format!("writing {}", params_path.display()))?;

    let processed = rolling_mean(
        scale(table, &params),
        config.smoothing.window_size,
        config.smoothing.step,
    )
    .context("smoothing processed radio map")?;
    let processed_path = output_dir.join(PROCESSED_RADIOMAP_FILE);
    write_radiomap_csv(&processed_path, &processed)
        .with_context(|| format!("writing {}", processed_path.display()))?;
    log::info!(
        "processed radio map -> {} ({} rows)",
        processed_path.display(),
        processed.len()
    );

    Ok(PipelineSummary {
        records_read: load_report.records,
        labels_skipped: load_report.labels_skipped,
        files_skipped: load_report.files_skipped,
        scans_kept: correction_report.scans_kept,
        dropped_late: correction_report.dropped_late,
        dropped_unknown_label: correction_report.dropped_unknown_label,
        cells_missing,
        cells_interpolated: cells_missing - cells_unresolved,
        cells_unresolved,
        raw_rows: raw.len(),
        processed_rows: processed.len(),
        raw_path,
        processed_path,
        params_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, SmoothingConfig};
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    fn write_checkpoint(root: &Path, label: &str, file: &str, scans: &[(f64, &[(&str, f32)])]) {
        let dir = root.join(label);
        fs::create_dir_all(&dir).unwrap();
        let mut out = File::create(dir.join(file)).unwrap();
        writeln!(out, "timestamp,bssid,rss").unwrap();
        for (ts, readings) in scans {
            for (ap, rss) in readings.iter() {
                writeln!(out, "{},{},{}", ts, ap, rss).unwrap();
            }
        }
    }

    fn test_config() -> PipelineConfig {
        let mut config = PipelineConfig {
            smoothing: SmoothingConfig {
                window_size: 2,
                step: 1,
            },
            ..Default::default()
        };
        config.labels.insert("kitchen".to_string(), [0.0, 0.0]);
        config.labels.insert("hall".to_string(), [1.0, 0.0]);
        config
    }

    #[test]
    fn test_build_radio_maps_end_to_end() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();

        write_checkpoint(
            input.path(),
            "kitchen",
            "checkpoint_1.csv",
            &[
                (0.0, &[("ap1", -40.0)]),
                (1.0, &[("ap1", -42.0), ("ap2", -70.0)]),
                (2.0, &[("ap1", -44.0)]),
            ],
        );
        write_checkpoint(
            input.path(),
            "hall",
            "checkpoint_1.csv",
            &[
                (0.0, &[("ap2", -60.0)]),
                (1.0, &[("ap2", -62.0)]),
            ],
        );

        let summary =
            build_radio_maps(input.path(), output.path(), &test_config()).unwrap();

        assert_eq!(summary.records_read, 5);
        assert_eq!(summary.scans_kept, 5);
        assert!(summary.labels_skipped.is_empty());
        // kitchen misses ap2 twice, hall misses ap1 twice
        assert_eq!(summary.cells_missing, 4);
        // hall sits 1m from kitchen, inside the default 30m threshold
        assert_eq!(summary.cells_unresolved, 0);
        // kitchen: 3 rows -> 2 windows; hall: 2 rows -> 1 window
        assert_eq!(summary.raw_rows, 3);
        assert_eq!(summary.processed_rows, 3);

        let raw = fs::read_to_string(&summary.raw_path).unwrap();
        assert!(raw.lines().next().unwrap().starts_with("label,x,y,ap1,ap2"));
        assert_eq!(raw.lines().count(), 4);

        let processed = fs::read_to_string(&summary.processed_path).unwrap();
        assert_eq!(processed.lines().count(), 4);

        assert!(summary.params_path.exists());
    }

    #[test]
    fn test_build_radio_maps_no_data() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();

        let result = build_radio_maps(input.path(), output.path(), &test_config());
        assert!(result.is_err());
    }
}
