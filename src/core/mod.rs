//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

pub use loaders::{LoadReport, RadioMap, RadioMapRow, ScanRecord};
pub use writers::{write_radiomap_csv, write_table_csv, WriteError};
