//! Track-level orchestration of the sanitization stages.
//!
//! Ownership of the record sequence moves through the stages one at a
//! time: resolve -> normalize -> detect -> interpolate -> derived fields.
//! Everything is single-threaded and batch; global statistics need the
//! whole track in memory before detection starts.

use log::{debug, info};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::loaders::RawRow;
use crate::processors::fields::resolve_row;
use crate::processors::interpolate::{interpolate, InterpolateError};
use crate::processors::normalize::{normalize_rows, NormalizeError, TelemetryRecord};
use crate::processors::outliers::{detect, InvalidReason, OutlierError, Verdict};

/// Errors that abort processing of a whole track.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("no telemetry records to process")]
    Empty,

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Outliers(#[from] OutlierError),

    #[error(transparent)]
    Interpolate(#[from] InterpolateError),
}

/// Result type for track operations.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Counters describing one sanitization run.
#[derive(Debug, Clone, Default)]
pub struct TrackSummary {
    /// Records read from the log.
    pub points: usize,
    /// Records whose measured fix survived every gate.
    pub valid: usize,
    /// Records repaired by interpolation.
    pub repaired: usize,
    /// Rejections per gate.
    pub missing_fix: usize,
    pub bad_satellites: usize,
    pub median_outliers: usize,
    pub rate_outliers: usize,
    pub duplicates: usize,
}

impl TrackSummary {
    /// Tally one counter set from a verdict list.
    pub fn from_verdicts(verdicts: &[Verdict]) -> Self {
        let mut summary = TrackSummary {
            points: verdicts.len(),
            ..TrackSummary::default()
        };
        for verdict in verdicts {
            match verdict {
                Verdict::Valid => summary.valid += 1,
                Verdict::Invalid(reason) => {
                    summary.repaired += 1;
                    match reason {
                        InvalidReason::MissingCoordinate => summary.missing_fix += 1,
                        InvalidReason::BadSatelliteCount(_) => summary.bad_satellites += 1,
                        InvalidReason::TooFarFromMedian { .. } => summary.median_outliers += 1,
                        InvalidReason::ExcessiveRate { .. } => summary.rate_outliers += 1,
                        InvalidReason::DuplicatePosition => summary.duplicates += 1,
                    }
                }
            }
        }
        summary
    }
}

fn stamp_height_above_ground(records: &mut [TelemetryRecord], config: &PipelineConfig) {
    let ground = config.ground_elevation.or_else(|| {
        records
            .iter()
            .filter_map(|record| record.coordinate.map(|coord| coord[2]))
            .min_by(|a, b| a.total_cmp(b))
    });
    let Some(ground) = ground else {
        return;
    };

    for record in records.iter_mut() {
        if let Some(coord) = record.coordinate {
            record.height_above_ground = Some(coord[2] - ground);
        }
    }
}

/// Run the full sanitization pipeline over raw log rows.
///
/// Returns the sanitized records (every coordinate defined, rounded, with
/// provenance flags and derived fields stamped) plus a [`TrackSummary`]
/// for reporting.
///
/// # Errors
///
/// Fails when the track is empty, a timestamp is unparsable, or no valid
/// reference fixes exist to compute statistics or interpolate from. No
/// geometry is produced for an irrecoverable track.
pub fn sanitize_track(
    rows: &[RawRow],
    config: &PipelineConfig,
) -> Result<(Vec<TelemetryRecord>, TrackSummary)> {
    if rows.is_empty() {
        return Err(TrackError::Empty);
    }

    let canonical: Vec<_> = rows
        .iter()
        .map(|row| resolve_row(row, &config.field_mappings, &config.displayed_fields))
        .collect();

    let mut records = normalize_rows(&canonical, config)?;
    let verdicts = detect(&records, config)?;

    for (record, verdict) in records.iter_mut().zip(&verdicts) {
        if let Verdict::Invalid(reason) = verdict {
            record.status = reason.to_string();
            debug!("point {}: {}", record.index, reason);
        }
    }

    interpolate(&mut records, &verdicts, config)?;
    stamp_height_above_ground(&mut records, config);

    let summary = TrackSummary::from_verdicts(&verdicts);
    info!(
        "{} points sanitized: {} valid, {} repaired",
        summary.points, summary.valid, summary.repaired
    );

    Ok((records, summary))
}
