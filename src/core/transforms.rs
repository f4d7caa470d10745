//! Table transformations shared between pipeline stages.

use std::collections::HashSet;

use super::loaders::{RadioMapRow, ScanRecord};

/// Derive the access point universe from a set of scan records.
///
/// The universe is the sorted union of every access point identifier seen
/// across all records. It is established once, before any record filtering,
/// and stays fixed for the rest of the pipeline.
pub fn ap_universe(records: &[ScanRecord]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    for record in records {
        for ap in record.readings.keys() {
            seen.insert(ap.as_str());
        }
    }

    let mut aps: Vec<String> = seen.into_iter().map(String::from).collect();
    aps.sort();
    aps
}

/// Group row indices by (label, session) in first-appearance order.
///
/// Windows and duration bounds must never cross a label or session boundary;
/// every stage that needs per-session grouping goes through this function so
/// the grouping semantics stay in one place.
pub fn session_groups(rows: &[RadioMapRow]) -> Vec<((String, u32), Vec<usize>)> {
    let mut groups: Vec<((String, u32), Vec<usize>)> = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let key = (row.label.clone(), row.session);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, indices)) => indices.push(idx),
            None => groups.push((key, vec![idx])),
        }
    }

    groups
}
