//! Sampling-duration correction and coordinate attachment.
//!
//! Raw checkpoint recordings have uneven collection durations per label. This
//! stage bounds every (label, session) group to a common maximum duration,
//! attaches the ground-truth survey coordinate for each label, and pivots the
//! surviving scans into the wide radio map table.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::core::loaders::{RadioMap, RadioMapRow, ScanRecord};
use crate::core::transforms::ap_universe;

/// Errors that can occur during signal correction.
#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("no scan records to correct")]
    EmptyInput,

    #[error("no scans survived correction (max_sampling_secs={max_sampling_secs}, unknown labels dropped: {dropped_unknown_label})")]
    NoSurvivingScans {
        max_sampling_secs: f32,
        dropped_unknown_label: usize,
    },
}

/// Result type for correction operations.
pub type Result<T> = std::result::Result<T, CorrectionError>;

/// Summary of a correction pass.
#[derive(Debug, Clone, Default)]
pub struct CorrectionReport {
    /// Scan records consumed.
    pub scans_in: usize,
    /// Rows in the output table.
    pub scans_kept: usize,
    /// Scans dropped for exceeding the sampling-duration bound.
    pub dropped_late: usize,
    /// Scans dropped because their label has no coordinate mapping.
    pub dropped_unknown_label: usize,
}

/// Bound sampling duration, attach coordinates, and pivot to the wide table.
///
/// Within each (label, session) group, scans whose elapsed time since the
/// group's first scan exceeds `max_sampling_secs` are dropped; session
/// timestamps are non-decreasing, so the group's first scan marks the start
/// of collection. Scans whose label has no entry in `label_coords` are
/// dropped and counted, never fatal for the run.
///
/// The access point universe of the output table is the sorted union over
/// **all** input records, derived before any filtering, and is fixed for the
/// rest of the pipeline. Access points absent from a scan are left as
/// `f32::NAN` for the filler stage.
///
/// # Arguments
///
/// * `records` - Scan records from the checkpoint reader
/// * `max_sampling_secs` - Maximum elapsed collection time per session
/// * `label_coords` - Ground-truth `[x, y]` (meters) per label
///
/// # Errors
///
/// Returns `EmptyInput` for an empty record set and `NoSurvivingScans` when
/// every scan was dropped.
pub fn correct(
    records: Vec<ScanRecord>,
    max_sampling_secs: f32,
    label_coords: &HashMap<String, [f32; 2]>,
) -> Result<(RadioMap, CorrectionReport)> {
    if records.is_empty() {
        return Err(CorrectionError::EmptyInput);
    }

    let aps = ap_universe(&records);
    let ap_index: HashMap<String, usize> = aps
        .iter()
        .enumerate()
        .map(|(i, ap)| (ap.clone(), i))
        .collect();

    let mut report = CorrectionReport {
        scans_in: records.len(),
        ..Default::default()
    };

    // First-scan timestamp per (label, session) group; records arrive in
    // session order from the reader, so the first one seen is the start.
    let mut session_start: HashMap<(String, u32), f64> = HashMap::new();
    let mut warned_labels: HashSet<String> = HashSet::new();

    let mut map = RadioMap::new(aps);

    for record in records {
        let key = (record.label.clone(), record.session);
        let start = *session_start.entry(key).or_insert(record.timestamp);

        if (record.timestamp - start) as f32 > max_sampling_secs {
            report.dropped_late += 1;
            continue;
        }

        let Some(&[x, y]) = label_coords.get(&record.label) else {
            report.dropped_unknown_label += 1;
            if warned_labels.insert(record.label.clone()) {
                log::warn!(
                    "label '{}' has no coordinate mapping, dropping its scans",
                    record.label
                );
            }
            continue;
        };

        let mut rss = vec![f32::NAN; map.num_aps()];
        for (ap, value) in &record.readings {
            if let Some(&idx) = ap_index.get(ap.as_str()) {
                rss[idx] = *value;
            }
        }

        map.rows.push(RadioMapRow {
            label: record.label,
            session: record.session,
            timestamp: record.timestamp,
            x,
            y,
            rss,
        });
    }

    report.scans_kept = map.len();

    if map.is_empty() {
        return Err(CorrectionError::NoSurvivingScans {
            max_sampling_secs,
            dropped_unknown_label: report.dropped_unknown_label,
        });
    }

    Ok((map, report))
}
