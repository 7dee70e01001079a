//! Core data types and I/O operations.

pub mod loaders;
pub mod writers;

pub use loaders::{load_telemetry_csv, load_telemetry_csvs, RawRow};
pub use writers::{write_enhanced_csv, write_kml, WriteError};
