//! Sanitization pipeline stages.

pub mod fields;
pub mod interpolate;
pub mod normalize;
pub mod outliers;
pub mod track;

// Re-export key types for convenience
pub use fields::{resolve_row, CanonicalRow};
pub use interpolate::{interpolate, InterpolateError};
pub use normalize::{normalize_rows, NormalizeError, TelemetryRecord};
pub use outliers::{detect, InvalidReason, OutlierError, Verdict};
pub use track::{sanitize_track, TrackError, TrackSummary};
