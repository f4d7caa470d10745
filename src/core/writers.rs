//! Delimited-text writers for radio map tables.
//!
//! Two formats are produced:
//! - The final radio map (`label,x,y,<ap...>`) consumed by model training
//! - The intermediate table (`label,session,timestamp,x,y,<ap...>`) used to
//!   chain individual pipeline stages from the CLI

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::loaders::RadioMap;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a CSV writer over a buffered file handle.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

/// Format an RSS cell for output; unfilled cells round-trip as empty fields.
fn format_rss(value: f32) -> String {
    if value.is_finite() {
        format!("{:.6}", value)
    } else {
        String::new()
    }
}

/// Write a radio map in its final delimited form.
///
/// The header row is `label,x,y` followed by one column per access point;
/// each table row becomes one data row. Parent directories are created if
/// needed.
///
/// # Arguments
///
/// * `path` - Output file path
/// * `map` - Radio map table to serialize
///
/// # Errors
///
/// Returns an error if the parent directories cannot be created or the file
/// cannot be written.
pub fn write_radiomap_csv(path: &Path, map: &RadioMap) -> Result<()> {
    let mut writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    let mut header = vec!["label".to_string(), "x".to_string(), "y".to_string()];
    header.extend(map.aps.iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for row in &map.rows {
        let mut fields = vec![
            row.label.clone(),
            format!("{:.6}", row.x),
            format!("{:.6}", row.y),
        ];
        fields.extend(row.rss.iter().map(|&v| format_rss(v)));
        writer
            .write_record(&fields)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write a radio map in the intermediate table form.
///
/// Keeps the session and timestamp columns so downstream stage commands can
/// preserve window boundaries; [`crate::core::loaders::load_table_csv`]
/// reads this format back.
///
/// # Errors
///
/// Returns an error if the parent directories cannot be created or the file
/// cannot be written.
pub fn write_table_csv(path: &Path, map: &RadioMap) -> Result<()> {
    let mut writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    let mut header = vec![
        "label".to_string(),
        "session".to_string(),
        "timestamp".to_string(),
        "x".to_string(),
        "y".to_string(),
    ];
    header.extend(map.aps.iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for row in &map.rows {
        let mut fields = vec![
            row.label.clone(),
            row.session.to_string(),
            format!("{:.3}", row.timestamp),
            format!("{:.6}", row.x),
            format!("{:.6}", row.y),
        ];
        fields.extend(row.rss.iter().map(|&v| format_rss(v)));
        writer
            .write_record(&fields)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::{load_table_csv, RadioMapRow};
    use tempfile::tempdir;

    fn test_map() -> RadioMap {
        let mut map = RadioMap::new(vec!["ap1".to_string(), "ap2".to_string()]);
        map.rows.push(RadioMapRow {
            label: "kitchen".to_string(),
            session: 0,
            timestamp: 10.0,
            x: 1.0,
            y: 2.0,
            rss: vec![-40.0, f32::NAN],
        });
        map.rows.push(RadioMapRow {
            label: "hall".to_string(),
            session: 1,
            timestamp: 11.0,
            x: 3.0,
            y: 4.0,
            rss: vec![-60.0, -70.0],
        });
        map
    }

    #[test]
    fn test_write_radiomap_csv_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw_radiomap.csv");

        write_radiomap_csv(&path, &test_map()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "label,x,y,ap1,ap2");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("kitchen,1.000000,2.000000,-40.000000,"));
    }

    #[test]
    fn test_write_radiomap_csv_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("output").join("test").join("map.csv");

        write_radiomap_csv(&path, &test_map()).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_table_csv_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let map = test_map();

        write_table_csv(&path, &map).unwrap();
        let loaded = load_table_csv(&path).unwrap();

        assert_eq!(loaded.aps, map.aps);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.rows[0].label, "kitchen");
        assert_eq!(loaded.rows[0].session, 0);
        assert!(loaded.rows[0].rss[1].is_nan());
        assert_eq!(loaded.rows[1].rss, vec![-60.0, -70.0]);
    }
}
