//! Flight telemetry GPS sanitization pipeline.
//!
//! This crate provides tools for:
//! - Loading flight telemetry CSV logs with duplicated/optional column names
//! - Resolving canonical fields through prioritized fallback chains
//! - Detecting anomalous GPS fixes (satellite count, median deviation, rate of change)
//! - Repairing bad fixes by time-weighted interpolation with provenance tracking
//! - Exporting the sanitized track as a styled KML flight path
//!
//! # Example
//!
//! ```no_run
//! use telemetry_pipeline::{config::PipelineConfig, core::loaders::load_telemetry_csv};
//! use telemetry_pipeline::processors::track::sanitize_track;
//!
//! let config = PipelineConfig::default();
//! let rows = load_telemetry_csv("flight.csv", &config.header_renames).unwrap();
//! let (records, summary) = sanitize_track(&rows, &config).unwrap();
//! println!("{} of {} fixes repaired", summary.repaired, summary.points);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use crate::config::{ConfigError, LineStyle, PipelineConfig, PointStyle};
pub use crate::core::loaders::RawRow;
pub use crate::processors::normalize::TelemetryRecord;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
