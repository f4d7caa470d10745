//! Proximity interpolation of missing RSS readings.
//!
//! Sentinel cells are imputed from rows whose survey coordinate lies within a
//! spatial threshold, using:
//! - `kiddo` KD-tree for O(log n) spatial neighbor queries
//! - `rayon` for parallel neighbor finding and per-row imputation

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use rayon::prelude::*;

use crate::config::NeighborAggregation;
use crate::core::loaders::RadioMap;

/// Impute sentinel cells from spatially nearby rows.
///
/// # Algorithm
///
/// 1. **Build KD-tree** over all row coordinates
/// 2. **Parallel neighbor finding**: for each row, collect the other rows
///    within `distance_threshold_m` (any label), sorted by distance then row
///    index so every aggregation is deterministic
/// 3. **Parallel imputation**: for each (row, access point) cell holding the
///    sentinel, combine the neighbors' non-sentinel readings for that access
///    point with the configured `strategy`; a cell with no qualifying
///    neighbor keeps the sentinel
///
/// Replacement values are always computed from the input table, never from
/// freshly imputed cells, so the output is reproducible and growing the
/// threshold can only resolve more cells, never un-resolve one. Rows at the
/// boundary of the space with no neighbors in range simply stay unresolved.
///
/// # Arguments
///
/// * `map` - Radio map table with sentinel-filled cells
/// * `distance_threshold_m` - Euclidean neighbor radius in meters
/// * `strategy` - Neighbor-aggregation statistic
/// * `sentinel` - The not-observed placeholder value
pub fn interpolate(
    map: RadioMap,
    distance_threshold_m: f32,
    strategy: NeighborAggregation,
    sentinel: f32,
) -> RadioMap {
    let n = map.rows.len();
    if n == 0 {
        return map;
    }

    let coords = map.coords();
    let tree: ImmutableKdTree<f32, 2> = ImmutableKdTree::new_from_slice(&coords);

    let threshold_sq = distance_threshold_m * distance_threshold_m;

    // Phase 2: per-row neighbor lists as (row index, squared distance),
    // self excluded, ordered by (distance, index) for determinism
    let neighbors: Vec<Vec<(usize, f32)>> = coords
        .par_iter()
        .enumerate()
        .map(|(i, coord)| {
            let mut found: Vec<(usize, f32)> = tree
                .within::<SquaredEuclidean>(coord, threshold_sq)
                .iter()
                .filter_map(|nn| {
                    let idx = nn.item as usize;
                    if idx == i {
                        None
                    } else {
                        Some((idx, nn.distance))
                    }
                })
                .collect();
            found.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));
            found
        })
        .collect();

    // Phase 3: impute sentinel cells, reading only from the input table
    let num_aps = map.num_aps();
    let new_rss: Vec<Vec<f32>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut out = map.rows[i].rss.clone();
            for j in 0..num_aps {
                if out[j] != sentinel {
                    continue;
                }

                let readings: Vec<(f32, f32)> = neighbors[i]
                    .iter()
                    .filter_map(|&(k, dist_sq)| {
                        let v = map.rows[k].rss[j];
                        if v != sentinel && v.is_finite() {
                            Some((dist_sq, v))
                        } else {
                            None
                        }
                    })
                    .collect();

                if let Some(value) = aggregate(&readings, strategy) {
                    out[j] = value;
                }
            }
            out
        })
        .collect();

    let mut map = map;
    for (row, rss) in map.rows.iter_mut().zip(new_rss) {
        row.rss = rss;
    }
    map
}

/// Combine neighbor readings, ordered by (distance, row index).
fn aggregate(readings: &[(f32, f32)], strategy: NeighborAggregation) -> Option<f32> {
    if readings.is_empty() {
        return None;
    }

    let value = match strategy {
        NeighborAggregation::Mean => {
            readings.iter().map(|&(_, v)| v).sum::<f32>() / readings.len() as f32
        }
        NeighborAggregation::Nearest => readings[0].1,
        NeighborAggregation::InverseDistance => {
            // Exact-coordinate neighbors dominate any finite weight
            let exact: Vec<f32> = readings
                .iter()
                .filter(|&&(d, _)| d == 0.0)
                .map(|&(_, v)| v)
                .collect();
            if !exact.is_empty() {
                exact.iter().sum::<f32>() / exact.len() as f32
            } else {
                let mut weighted = 0.0f32;
                let mut total = 0.0f32;
                for &(dist_sq, v) in readings {
                    let w = 1.0 / dist_sq.sqrt();
                    weighted += w * v;
                    total += w;
                }
                weighted / total
            }
        }
    };

    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::RadioMapRow;

    const SENTINEL: f32 = 100.0;

    fn row(label: &str, x: f32, y: f32, rss: Vec<f32>) -> RadioMapRow {
        RadioMapRow {
            label: label.to_string(),
            session: 0,
            timestamp: 0.0,
            x,
            y,
            rss,
        }
    }

    fn three_label_map() -> RadioMap {
        // Labels at (0,0), (1,0), (10,10); (0,0) is missing AP "x"
        let mut map = RadioMap::new(vec!["x".to_string()]);
        map.rows.push(row("a", 0.0, 0.0, vec![SENTINEL]));
        map.rows.push(row("b", 1.0, 0.0, vec![-50.0]));
        map.rows.push(row("c", 10.0, 10.0, vec![SENTINEL]));
        map
    }

    #[test]
    fn test_single_neighbor_within_threshold() {
        let map = interpolate(three_label_map(), 2.0, NeighborAggregation::Mean, SENTINEL);

        // One neighbor at 1m: mean equals its reading
        assert_eq!(map.rows[0].rss[0], -50.0);
        // Far row has no neighbor within 2m and keeps the sentinel
        assert_eq!(map.rows[2].rss[0], SENTINEL);
        // Observed readings are untouched
        assert_eq!(map.rows[1].rss[0], -50.0);
    }

    #[test]
    fn test_mean_of_multiple_neighbors() {
        let mut map = RadioMap::new(vec!["x".to_string()]);
        map.rows.push(row("a", 0.0, 0.0, vec![SENTINEL]));
        map.rows.push(row("b", 1.0, 0.0, vec![-40.0]));
        map.rows.push(row("c", 0.0, 1.0, vec![-60.0]));

        let map = interpolate(map, 2.0, NeighborAggregation::Mean, SENTINEL);
        assert_eq!(map.rows[0].rss[0], -50.0);
    }

    #[test]
    fn test_nearest_strategy() {
        let mut map = RadioMap::new(vec!["x".to_string()]);
        map.rows.push(row("a", 0.0, 0.0, vec![SENTINEL]));
        map.rows.push(row("b", 1.0, 0.0, vec![-40.0]));
        map.rows.push(row("c", 0.0, 1.5, vec![-60.0]));

        let map = interpolate(map, 2.0, NeighborAggregation::Nearest, SENTINEL);
        assert_eq!(map.rows[0].rss[0], -40.0);
    }

    #[test]
    fn test_inverse_distance_strategy() {
        let mut map = RadioMap::new(vec!["x".to_string()]);
        map.rows.push(row("a", 0.0, 0.0, vec![SENTINEL]));
        map.rows.push(row("b", 1.0, 0.0, vec![-40.0]));
        map.rows.push(row("c", 2.0, 0.0, vec![-70.0]));

        let map = interpolate(map, 3.0, NeighborAggregation::InverseDistance, SENTINEL);

        // Weights 1/1 and 1/2: (-40 - 35) / 1.5 = -50
        let v = map.rows[0].rss[0];
        assert!((v - (-50.0)).abs() < 1e-4, "got {}", v);
    }

    #[test]
    fn test_inverse_distance_zero_distance_neighbor() {
        let mut map = RadioMap::new(vec!["x".to_string()]);
        map.rows.push(row("a", 0.0, 0.0, vec![SENTINEL]));
        map.rows.push(row("a", 0.0, 0.0, vec![-45.0]));
        map.rows.push(row("b", 1.0, 0.0, vec![-80.0]));

        let map = interpolate(map, 2.0, NeighborAggregation::InverseDistance, SENTINEL);
        assert_eq!(map.rows[0].rss[0], -45.0);
    }

    #[test]
    fn test_no_chaining_through_imputed_cells() {
        // b is within reach of a, but b itself holds the sentinel; a must
        // not pick up a value imputed into b during the same pass.
        let mut map = RadioMap::new(vec!["x".to_string()]);
        map.rows.push(row("a", 0.0, 0.0, vec![SENTINEL]));
        map.rows.push(row("b", 1.0, 0.0, vec![SENTINEL]));
        map.rows.push(row("c", 2.0, 0.0, vec![-70.0]));

        let map = interpolate(map, 1.5, NeighborAggregation::Mean, SENTINEL);

        assert_eq!(map.rows[1].rss[0], -70.0);
        // a's only in-range row (b) had no observed reading
        assert_eq!(map.rows[0].rss[0], SENTINEL);
    }

    #[test]
    fn test_threshold_monotonicity() {
        let map = three_label_map();
        let small = interpolate(map.clone(), 2.0, NeighborAggregation::Mean, SENTINEL);
        let large = interpolate(map, 20.0, NeighborAggregation::Mean, SENTINEL);

        // Cells resolved at the small threshold are still resolved
        for (s, l) in small.rows.iter().zip(large.rows.iter()) {
            for (sv, lv) in s.rss.iter().zip(l.rss.iter()) {
                if *sv != SENTINEL {
                    assert_ne!(*lv, SENTINEL);
                }
            }
        }
        // The far row resolves once the threshold reaches it
        assert_ne!(large.rows[2].rss[0], SENTINEL);
    }

    #[test]
    fn test_deterministic() {
        let a = interpolate(three_label_map(), 2.0, NeighborAggregation::Mean, SENTINEL);
        let b = interpolate(three_label_map(), 2.0, NeighborAggregation::Mean, SENTINEL);

        for (ra, rb) in a.rows.iter().zip(b.rows.iter()) {
            assert_eq!(ra.rss, rb.rss);
        }
    }

    #[test]
    fn test_empty_map() {
        let map = RadioMap::new(vec!["x".to_string()]);
        let map = interpolate(map, 2.0, NeighborAggregation::Mean, SENTINEL);
        assert!(map.is_empty());
    }
}
