//! Rolling-mean aggregation of consecutive scans.

use rayon::prelude::*;
use thiserror::Error;

use crate::core::loaders::{RadioMap, RadioMapRow};
use crate::core::transforms::session_groups;

/// Errors that can occur during smoothing.
#[derive(Debug, Error)]
pub enum SmoothingError {
    #[error("window size must be at least 1")]
    ZeroWindow,

    #[error("window step must be at least 1")]
    ZeroStep,
}

/// Result type for smoothing operations.
pub type Result<T> = std::result::Result<T, SmoothingError>;

/// Collapse overlapping windows of consecutive scans into mean rows.
///
/// Rows are grouped by (label, session); a window of `window_size`
/// consecutive rows slides over each group, advancing by `step`, and
/// produces one output row whose access point values are the arithmetic
/// mean across the window. Label, session, coordinates and timestamp are
/// copied from the window's first row. Windows never cross a label or
/// session boundary.
///
/// A group of length `L` yields `floor((L - W) / S) + 1` rows when
/// `L >= W` and none otherwise; sessions shorter than the window are
/// silently dropped rather than padded.
///
/// Groups are aggregated in parallel and concatenated in first-appearance
/// order, so output ordering is deterministic.
///
/// # Errors
///
/// Returns an error if `window_size` or `step` is zero.
pub fn rolling_mean(map: RadioMap, window_size: usize, step: usize) -> Result<RadioMap> {
    if window_size == 0 {
        return Err(SmoothingError::ZeroWindow);
    }
    if step == 0 {
        return Err(SmoothingError::ZeroStep);
    }

    let groups = session_groups(&map.rows);
    let num_aps = map.num_aps();

    let smoothed: Vec<Vec<RadioMapRow>> = groups
        .par_iter()
        .map(|(_, indices)| {
            if indices.len() < window_size {
                return Vec::new();
            }

            let mut rows = Vec::with_capacity((indices.len() - window_size) / step + 1);
            for start in (0..=indices.len() - window_size).step_by(step) {
                let window = &indices[start..start + window_size];
                let first = &map.rows[window[0]];

                let mut rss = vec![0.0f32; num_aps];
                for &idx in window {
                    for (acc, &v) in rss.iter_mut().zip(map.rows[idx].rss.iter()) {
                        *acc += v;
                    }
                }
                for acc in rss.iter_mut() {
                    *acc /= window_size as f32;
                }

                rows.push(RadioMapRow {
                    label: first.label.clone(),
                    session: first.session,
                    timestamp: first.timestamp,
                    x: first.x,
                    y: first.y,
                    rss,
                });
            }
            rows
        })
        .collect();

    Ok(RadioMap {
        aps: map.aps,
        rows: smoothed.into_iter().flatten().collect(),
    })
}
