//! Data loaders for WiFi checkpoint recordings and radio map tables.
//!
//! This module provides parsers for:
//! - Raw per-label checkpoint directories (one CSV per collection session)
//! - Individual scan files (long format: timestamp, bssid, rss)
//! - Intermediate wide radio map tables written by [`crate::core::writers`]

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use regex::Regex;
use thiserror::Error;

/// Errors that can occur during data loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no checkpoint files found for label '{label}'")]
    DataNotFound { label: String },

    #[error("malformed scan record in '{path}' at line {line}: {reason}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("missing required columns: {0}")]
    MissingColumns(String),

    #[error("empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("invalid session pattern '{pattern}': {reason}")]
    InvalidSessionPattern { pattern: String, reason: String },

    #[error("no labels could be resolved under '{0}'")]
    NoLabelsResolved(PathBuf),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One WiFi sensing event: every access point heard in a single scan.
#[derive(Debug, Clone)]
pub struct ScanRecord {
    /// Location label the scan was collected at.
    pub label: String,
    /// Collection-session index within the label.
    pub session: u32,
    /// Scan time in epoch seconds.
    pub timestamp: f64,
    /// RSS reading (dBm) per access point identifier.
    pub readings: HashMap<String, f32>,
}

/// One row of the radio map table.
///
/// `rss` is aligned with the owning [`RadioMap`]'s `aps` vector; cells for
/// access points not observed in the scan are `f32::NAN` until the filler
/// stage replaces them with the sentinel.
#[derive(Debug, Clone)]
pub struct RadioMapRow {
    pub label: String,
    pub session: u32,
    pub timestamp: f64,
    /// Ground-truth x coordinate in meters.
    pub x: f32,
    /// Ground-truth y coordinate in meters.
    pub y: f32,
    /// RSS values, one per access point column.
    pub rss: Vec<f32>,
}

/// The radio map table threaded through the pipeline.
///
/// The access point universe (`aps`) is fixed once established and does not
/// grow or shrink between stages.
#[derive(Debug, Clone)]
pub struct RadioMap {
    /// Access point columns, sorted for deterministic output.
    pub aps: Vec<String>,
    /// Table rows: one per scan, or per window aggregate after smoothing.
    pub rows: Vec<RadioMapRow>,
}

impl RadioMap {
    /// Creates an empty table with the given access point universe.
    pub fn new(aps: Vec<String>) -> Self {
        Self {
            aps,
            rows: Vec::new(),
        }
    }

    /// Returns the number of rows in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of access point columns.
    #[inline]
    pub fn num_aps(&self) -> usize {
        self.aps.len()
    }

    /// Returns the column index of an access point, if present.
    pub fn ap_index(&self, ap: &str) -> Option<usize> {
        self.aps.iter().position(|a| a == ap)
    }

    /// Collects row coordinates as `[x, y]` arrays for spatial queries.
    pub fn coords(&self) -> Vec<[f32; 2]> {
        self.rows.iter().map(|r| [r.x, r.y]).collect()
    }
}

/// Summary of a checkpoint-directory read.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Labels for which at least one session file was loaded.
    pub labels_loaded: usize,
    /// Labels with no directory or no checkpoint files (skipped).
    pub labels_skipped: Vec<String>,
    /// Session files skipped because they could not be parsed.
    pub files_skipped: usize,
    /// Total scan records produced.
    pub records: usize,
}

/// Parse a scan timestamp as epoch seconds.
///
/// Accepts a plain numeric value or an RFC 3339 date-time string.
fn parse_timestamp(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<f64>() {
        return Some(secs);
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_millis()) / 1000.0)
}

/// Load scan records from a single checkpoint file.
///
/// The expected CSV format is long form with a header row:
/// `timestamp,bssid,rss`. Consecutive rows sharing a timestamp belong to the
/// same scan. Column order is resolved from the header (case-insensitive).
///
/// # Arguments
///
/// * `path` - Path to the checkpoint CSV file
/// * `label` - Location label the file belongs to
/// * `session` - Collection-session index assigned to the file
///
/// # Errors
///
/// Returns `MissingColumns` if the header lacks a required column,
/// `MalformedRecord` if a field cannot be parsed, and `EmptyFile` if the
/// file contains no data rows.
pub fn read_scan_file(path: &Path, label: &str, session: u32) -> Result<Vec<ScanRecord>> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let col_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_lowercase(), i))
        .collect();

    let ts_idx = *col_map
        .get("timestamp")
        .ok_or_else(|| LoaderError::MissingColumns("timestamp".to_string()))?;
    let ap_idx = *col_map
        .get("bssid")
        .or_else(|| col_map.get("ssid"))
        .ok_or_else(|| LoaderError::MissingColumns("bssid".to_string()))?;
    let rss_idx = *col_map
        .get("rss")
        .or_else(|| col_map.get("rssi"))
        .ok_or_else(|| LoaderError::MissingColumns("rss".to_string()))?;

    let mut records: Vec<ScanRecord> = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        // Header is line 1
        let line = row_idx + 2;

        let raw_ts = record.get(ts_idx).unwrap_or_default();
        let timestamp =
            parse_timestamp(raw_ts).ok_or_else(|| LoaderError::MalformedRecord {
                path: path.to_path_buf(),
                line,
                reason: format!("invalid timestamp '{}'", raw_ts),
            })?;

        let ap = record.get(ap_idx).unwrap_or_default().trim();
        if ap.is_empty() {
            return Err(LoaderError::MalformedRecord {
                path: path.to_path_buf(),
                line,
                reason: "empty access point identifier".to_string(),
            });
        }

        let raw_rss = record.get(rss_idx).unwrap_or_default();
        let rss: f32 = raw_rss
            .trim()
            .parse()
            .map_err(|_| LoaderError::MalformedRecord {
                path: path.to_path_buf(),
                line,
                reason: format!("invalid rss '{}'", raw_rss),
            })?;

        // Rows sharing the current timestamp extend the open scan record.
        match records.last_mut() {
            Some(last) if last.timestamp == timestamp => {
                last.readings.insert(ap.to_string(), rss);
            }
            _ => {
                let mut readings = HashMap::new();
                readings.insert(ap.to_string(), rss);
                records.push(ScanRecord {
                    label: label.to_string(),
                    session,
                    timestamp,
                    readings,
                });
            }
        }
    }

    if records.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(records)
}

/// Collect sorted CSV paths directly under a directory.
fn csv_files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Extract a session index from a file stem using the configured pattern.
fn session_from_stem(pattern: &Regex, path: &Path, fallback: u32) -> u32 {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| pattern.captures(stem))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(fallback)
}

/// Load every scan record under a checkpoint root directory.
///
/// The expected layout is `root/<label>/*.csv`, one CSV per collection
/// session. Labels are processed in sorted order and session files in sorted
/// filename order, so output is deterministic for a fixed input tree.
///
/// Labels without a directory or without any CSV files are skipped and
/// reported; files that fail to parse are skipped and counted. Only when no
/// label at all can be resolved does the read fail.
///
/// # Arguments
///
/// * `root` - Checkpoint root directory
/// * `labels` - Recognized location labels
/// * `session_pattern` - Regex extracting the session index from file stems
///
/// # Returns
///
/// All loaded scan records together with a [`LoadReport`] of skip counts.
///
/// # Errors
///
/// Returns `InvalidSessionPattern` if the regex does not compile and
/// `NoLabelsResolved` if every label was skipped.
pub fn read_checkpoints(
    root: &Path,
    labels: &[String],
    session_pattern: &str,
) -> Result<(Vec<ScanRecord>, LoadReport)> {
    let pattern =
        Regex::new(session_pattern).map_err(|e| LoaderError::InvalidSessionPattern {
            pattern: session_pattern.to_string(),
            reason: e.to_string(),
        })?;

    let mut sorted_labels: Vec<&String> = labels.iter().collect();
    sorted_labels.sort();

    let mut records = Vec::new();
    let mut report = LoadReport::default();

    for label in sorted_labels {
        let label_dir = root.join(label);
        let files = csv_files_in(&label_dir);

        if files.is_empty() {
            let err = LoaderError::DataNotFound {
                label: label.clone(),
            };
            log::warn!("{} (looked in {}), skipping", err, label_dir.display());
            report.labels_skipped.push(label.clone());
            continue;
        }

        let mut loaded_any = false;
        for (file_idx, file) in files.iter().enumerate() {
            let session = session_from_stem(&pattern, file, file_idx as u32);
            match read_scan_file(file, label, session) {
                Ok(mut scans) => {
                    report.records += scans.len();
                    records.append(&mut scans);
                    loaded_any = true;
                }
                Err(e) => {
                    log::warn!("skipping {}: {}", file.display(), e);
                    report.files_skipped += 1;
                }
            }
        }

        if loaded_any {
            report.labels_loaded += 1;
        } else {
            report.labels_skipped.push(label.clone());
        }
    }

    if report.labels_loaded == 0 {
        return Err(LoaderError::NoLabelsResolved(root.to_path_buf()));
    }

    Ok((records, report))
}

/// Load an intermediate radio map table written by
/// [`crate::core::writers::write_table_csv`].
///
/// The expected header is `label,session,timestamp,x,y` followed by one
/// column per access point. Empty RSS fields are read back as `f32::NAN`.
///
/// # Errors
///
/// Returns `MissingColumns` if the metadata columns are absent and
/// `EmptyFile` if the table has no rows.
pub fn load_table_csv(path: &Path) -> Result<RadioMap> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let expected = ["label", "session", "timestamp", "x", "y"];
    for (i, name) in expected.iter().enumerate() {
        if headers.get(i).map(|h| h.to_lowercase()) != Some(name.to_string()) {
            return Err(LoaderError::MissingColumns(expected.join(",")));
        }
    }

    let aps: Vec<String> = headers.iter().skip(expected.len()).map(String::from).collect();
    let mut map = RadioMap::new(aps);

    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        let line = row_idx + 2;

        let parse_err = |field: &str, value: &str| LoaderError::MalformedRecord {
            path: path.to_path_buf(),
            line,
            reason: format!("invalid {} '{}'", field, value),
        };

        let label = record.get(0).unwrap_or_default().to_string();
        let session: u32 = {
            let raw = record.get(1).unwrap_or_default();
            raw.trim().parse().map_err(|_| parse_err("session", raw))?
        };
        let timestamp: f64 = {
            let raw = record.get(2).unwrap_or_default();
            raw.trim().parse().map_err(|_| parse_err("timestamp", raw))?
        };
        let x: f32 = {
            let raw = record.get(3).unwrap_or_default();
            raw.trim().parse().map_err(|_| parse_err("x", raw))?
        };
        let y: f32 = {
            let raw = record.get(4).unwrap_or_default();
            raw.trim().parse().map_err(|_| parse_err("y", raw))?
        };

        let mut rss = Vec::with_capacity(map.num_aps());
        for i in 0..map.num_aps() {
            let raw = record.get(expected.len() + i).unwrap_or_default().trim();
            if raw.is_empty() {
                rss.push(f32::NAN);
            } else {
                rss.push(raw.parse().map_err(|_| parse_err("rss", raw))?);
            }
        }

        map.rows.push(RadioMapRow {
            label,
            session,
            timestamp,
            x,
            y,
            rss,
        });
    }

    if map.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_radio_map_operations() {
        let mut map = RadioMap::new(vec!["ap1".to_string(), "ap2".to_string()]);
        assert!(map.is_empty());
        assert_eq!(map.num_aps(), 2);
        assert_eq!(map.ap_index("ap2"), Some(1));
        assert_eq!(map.ap_index("ap9"), None);

        map.rows.push(RadioMapRow {
            label: "a".to_string(),
            session: 0,
            timestamp: 1.0,
            x: 2.0,
            y: 3.0,
            rss: vec![-50.0, -60.0],
        });

        assert_eq!(map.len(), 1);
        assert_eq!(map.coords(), vec![[2.0, 3.0]]);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("12.5"), Some(12.5));
        let rfc = parse_timestamp("2023-06-01T10:00:00+00:00").unwrap();
        assert!(rfc > 1.6e9);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_read_scan_file_groups_by_timestamp() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,bssid,rss").unwrap();
        writeln!(file, "1.0,aa:bb,-40").unwrap();
        writeln!(file, "1.0,cc:dd,-55").unwrap();
        writeln!(file, "2.0,aa:bb,-42").unwrap();
        file.flush().unwrap();

        let scans = read_scan_file(file.path(), "kitchen", 3)?;
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].readings.len(), 2);
        assert_eq!(scans[0].readings["cc:dd"], -55.0);
        assert_eq!(scans[1].readings["aa:bb"], -42.0);
        assert_eq!(scans[0].label, "kitchen");
        assert_eq!(scans[0].session, 3);

        Ok(())
    }

    #[test]
    fn test_read_scan_file_malformed_rss() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,bssid,rss").unwrap();
        writeln!(file, "1.0,aa:bb,strong").unwrap();
        file.flush().unwrap();

        let err = read_scan_file(file.path(), "kitchen", 0).unwrap_err();
        match err {
            LoaderError::MalformedRecord { line, .. } => assert_eq!(line, 2),
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_read_scan_file_missing_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "time,mac,signal").unwrap();
        writeln!(file, "1.0,aa:bb,-40").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            read_scan_file(file.path(), "kitchen", 0),
            Err(LoaderError::MissingColumns(_))
        ));
    }

    fn write_checkpoint(dir: &Path, label: &str, file: &str, rows: &[(f64, &str, f32)]) {
        let label_dir = dir.join(label);
        fs::create_dir_all(&label_dir).unwrap();
        let mut out = File::create(label_dir.join(file)).unwrap();
        writeln!(out, "timestamp,bssid,rss").unwrap();
        for (ts, ap, rss) in rows {
            writeln!(out, "{},{},{}", ts, ap, rss).unwrap();
        }
    }

    #[test]
    fn test_read_checkpoints_skips_missing_labels() -> Result<()> {
        let dir = tempdir().unwrap();
        write_checkpoint(
            dir.path(),
            "kitchen",
            "checkpoint_1.csv",
            &[(1.0, "aa:bb", -40.0)],
        );

        let labels = vec!["kitchen".to_string(), "garage".to_string()];
        let (records, report) =
            read_checkpoints(dir.path(), &labels, r"(?i)checkpoint[_-]?(\d+)")?;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].session, 1);
        assert_eq!(report.labels_loaded, 1);
        assert_eq!(report.labels_skipped, vec!["garage".to_string()]);

        Ok(())
    }

    #[test]
    fn test_read_checkpoints_counts_malformed_files() -> Result<()> {
        let dir = tempdir().unwrap();
        write_checkpoint(
            dir.path(),
            "kitchen",
            "checkpoint_1.csv",
            &[(1.0, "aa:bb", -40.0)],
        );
        // Second session file with a bogus header
        let label_dir = dir.path().join("kitchen");
        let mut bad = File::create(label_dir.join("checkpoint_2.csv")).unwrap();
        writeln!(bad, "nothing,useful,here").unwrap();
        writeln!(bad, "1,2,3").unwrap();

        let labels = vec!["kitchen".to_string()];
        let (records, report) =
            read_checkpoints(dir.path(), &labels, r"(?i)checkpoint[_-]?(\d+)")?;

        assert_eq!(records.len(), 1);
        assert_eq!(report.files_skipped, 1);

        Ok(())
    }

    #[test]
    fn test_read_checkpoints_no_labels_resolved() {
        let dir = tempdir().unwrap();
        let labels = vec!["kitchen".to_string()];
        let result = read_checkpoints(dir.path(), &labels, r"(\d+)");
        assert!(matches!(result, Err(LoaderError::NoLabelsResolved(_))));
    }

    #[test]
    fn test_session_fallback_to_file_order() -> Result<()> {
        let dir = tempdir().unwrap();
        write_checkpoint(dir.path(), "kitchen", "morning.csv", &[(1.0, "aa", -40.0)]);
        write_checkpoint(dir.path(), "kitchen", "night.csv", &[(2.0, "aa", -41.0)]);

        let labels = vec!["kitchen".to_string()];
        let (records, _) = read_checkpoints(dir.path(), &labels, r"(?i)checkpoint[_-]?(\d+)")?;

        assert_eq!(records[0].session, 0);
        assert_eq!(records[1].session, 1);

        Ok(())
    }

    #[test]
    fn test_load_table_csv_round_trip_nan() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "label,session,timestamp,x,y,ap1,ap2").unwrap();
        writeln!(file, "kitchen,0,1.0,0.5,0.5,-40.0,").unwrap();
        file.flush().unwrap();

        let map = load_table_csv(file.path())?;
        assert_eq!(map.aps, vec!["ap1", "ap2"]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.rows[0].rss[0], -40.0);
        assert!(map.rows[0].rss[1].is_nan());

        Ok(())
    }
}
