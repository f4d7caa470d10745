//! Sentinel filling for unobserved access points.

use rayon::prelude::*;

use crate::core::loaders::RadioMap;

/// Replace every non-finite RSS cell with the sentinel value.
///
/// After this stage no cell is null: every value is either a legitimate
/// reading or the sentinel. Running the fill twice is a no-op.
pub fn fill_missing(mut map: RadioMap, sentinel: f32) -> RadioMap {
    map.rows.par_iter_mut().for_each(|row| {
        for value in row.rss.iter_mut() {
            if !value.is_finite() {
                *value = sentinel;
            }
        }
    });
    map
}

/// Count cells currently holding the sentinel value.
pub fn count_sentinel_cells(map: &RadioMap, sentinel: f32) -> usize {
    map.rows
        .par_iter()
        .map(|row| row.rss.iter().filter(|&&v| v == sentinel).count())
        .sum()
}
