//! Statistical outlier detection for GPS fixes.
//!
//! Each record's coordinate is judged per axis through a layered gate:
//!
//! 1. satellite count inside the configured inclusive range
//! 2. absolute deviation from the per-axis median over all satellite-gate
//!    survivors (median, not mean, so the outliers being hunted cannot
//!    drag the reference)
//! 3. rate of change against the nearest preceding *accepted* fix, so one
//!    bad point cannot cascade into rejecting its good successors
//!
//! A record is invalid as soon as any axis fails any gate. Verdicts are
//! transient detector state; records themselves are not mutated here.

use std::fmt;

use thiserror::Error;

use crate::config::PipelineConfig;
use crate::processors::normalize::TelemetryRecord;

/// Axis names in storage order, for diagnostics.
pub const AXIS_NAMES: [&str; 3] = ["longitude", "latitude", "elevation"];

/// Errors that make the whole track unusable for detection.
#[derive(Debug, Error)]
pub enum OutlierError {
    #[error(
        "satellite gate rejected all {total} records; no reference fixes exist to compute a median"
    )]
    NoSatelliteLock { total: usize },
}

/// Result type for detection operations.
pub type Result<T> = std::result::Result<T, OutlierError>;

/// Why a record's coordinate was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidReason {
    /// One or more coordinate axes missing or unparsable.
    MissingCoordinate,
    /// Satellite count outside the configured inclusive range.
    BadSatelliteCount(u32),
    /// Axis value too far from the track median.
    TooFarFromMedian {
        axis: &'static str,
        value: f64,
        median: f64,
    },
    /// Axis rate of change against the last accepted fix too large.
    ExcessiveRate {
        axis: &'static str,
        rate: f64,
        limit: f64,
    },
    /// Longitude/latitude exactly repeat the last accepted fix.
    DuplicatePosition,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCoordinate => write!(f, "No GPS fix"),
            Self::BadSatelliteCount(count) => write!(f, "Bad satellite count: {}", count),
            Self::TooFarFromMedian {
                axis,
                value,
                median,
            } => write!(
                f,
                "Too far from median {}: {} (median {})",
                axis, value, median
            ),
            Self::ExcessiveRate { axis, rate, limit } => {
                write!(f, "Impossible {} rate: {}/s (limit {}/s)", axis, rate, limit)
            }
            Self::DuplicatePosition => write!(f, "Duplicate location"),
        }
    }
}

/// Per-record detection outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Valid,
    Invalid(InvalidReason),
}

impl Verdict {
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Flag every record's coordinate as valid or invalid.
///
/// Returns one verdict per record, in sequence order. Records whose
/// coordinate is undefined are invalid from the start and excluded from
/// all statistics.
///
/// # Errors
///
/// Returns [`OutlierError::NoSatelliteLock`] when no record passes the
/// satellite gate: with no reference fixes there is no median to validate
/// against, and treating such a track as valid would export garbage.
pub fn detect(records: &[TelemetryRecord], config: &PipelineConfig) -> Result<Vec<Verdict>> {
    let [min_sats, max_sats] = config.valid_sat_range;

    // Stage 1: satellite gate.
    let mut verdicts: Vec<Verdict> = records
        .iter()
        .map(|record| {
            if record.coordinate.is_none() {
                Verdict::Invalid(InvalidReason::MissingCoordinate)
            } else if record.satellites < min_sats || record.satellites > max_sats {
                Verdict::Invalid(InvalidReason::BadSatelliteCount(record.satellites))
            } else {
                Verdict::Valid
            }
        })
        .collect();

    let survivors: Vec<&TelemetryRecord> = records
        .iter()
        .zip(&verdicts)
        .filter(|(_, verdict)| verdict.is_valid())
        .map(|(record, _)| record)
        .collect();

    if survivors.is_empty() {
        return Err(OutlierError::NoSatelliteLock {
            total: records.len(),
        });
    }

    // Stage 2: deviation from the per-axis median over the survivors.
    let mut medians = [0.0f64; 3];
    for (axis, median_value) in medians.iter_mut().enumerate() {
        let values = survivors
            .iter()
            .filter_map(|record| record.coordinate.map(|coord| coord[axis]))
            .collect();
        *median_value = median(values);
    }

    for (record, verdict) in records.iter().zip(verdicts.iter_mut()) {
        if !verdict.is_valid() {
            continue;
        }
        let Some(coord) = record.coordinate else {
            continue;
        };
        for axis in 0..3 {
            if (coord[axis] - medians[axis]).abs() > config.xyz_limit[axis] {
                *verdict = Verdict::Invalid(InvalidReason::TooFarFromMedian {
                    axis: AXIS_NAMES[axis],
                    value: coord[axis],
                    median: medians[axis],
                });
                break;
            }
        }
    }

    // Stage 3: rate of change, anchored on the last accepted fix. An
    // explicit fold in timestamp order keeps the invariant auditable:
    // the anchor only ever advances onto a record judged valid by every
    // gate so far.
    let mut anchor: Option<([f64; 3], chrono::NaiveDateTime)> = None;
    for (record, verdict) in records.iter().zip(verdicts.iter_mut()) {
        if !verdict.is_valid() {
            continue;
        }
        let Some(coord) = record.coordinate else {
            continue;
        };

        if let Some((prev_coord, prev_timestamp)) = anchor {
            if config.discard_duplicate_positions && coord[..2] == prev_coord[..2] {
                *verdict = Verdict::Invalid(InvalidReason::DuplicatePosition);
                continue;
            }

            let dt = (record.timestamp - prev_timestamp).num_milliseconds() as f64 / 1000.0;
            let mut rejected = false;
            for axis in 0..3 {
                let delta = (coord[axis] - prev_coord[axis]).abs();
                let rate = if dt > 0.0 {
                    delta / dt
                } else if delta > 0.0 {
                    // Same timestamp, different position: infinite rate.
                    f64::INFINITY
                } else {
                    0.0
                };
                if rate > config.xyz_delta_limit[axis] {
                    *verdict = Verdict::Invalid(InvalidReason::ExcessiveRate {
                        axis: AXIS_NAMES[axis],
                        rate,
                        limit: config.xyz_delta_limit[axis],
                    });
                    rejected = true;
                    break;
                }
            }
            if rejected {
                continue;
            }
        }

        anchor = Some((coord, record.timestamp));
    }

    Ok(verdicts)
}
