//! Interpolation-based repair of rejected GPS fixes.
//!
//! Every invalid coordinate is replaced by a linear blend of its nearest
//! valid neighbors, weighted by elapsed time. Boundary runs with a valid
//! record on only one side inherit that neighbor's value; the track is
//! never extrapolated past its data. Repaired records are stamped
//! `interpolated` and never feed back into detection.

use thiserror::Error;

use crate::config::PipelineConfig;
use crate::processors::normalize::TelemetryRecord;
use crate::processors::outliers::Verdict;

/// Errors that make the whole track unrepairable.
#[derive(Debug, Error)]
pub enum InterpolateError {
    #[error("no valid fixes remain out of {total} records; nothing to interpolate from")]
    NoValidFixes { total: usize },
}

/// Result type for interpolation operations.
pub type Result<T> = std::result::Result<T, InterpolateError>;

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn blend(a: [f64; 3], b: [f64; 3], fraction: f64) -> [f64; 3] {
    let mut out = [0.0; 3];
    for axis in 0..3 {
        out[axis] = a[axis] + (b[axis] - a[axis]) * fraction;
    }
    out
}

/// Replace every invalid coordinate and round the track for output.
///
/// Records flagged invalid receive a time-weighted linear interpolation
/// between the nearest preceding and following valid records and are
/// marked `interpolated`. Afterwards every coordinate axis is rounded to
/// its configured number of decimal places, exactly once.
///
/// # Errors
///
/// Returns [`InterpolateError::NoValidFixes`] when no record is valid;
/// fabricating a track with no reference data would be garbage.
pub fn interpolate(
    records: &mut [TelemetryRecord],
    verdicts: &[Verdict],
    config: &PipelineConfig,
) -> Result<()> {
    debug_assert_eq!(records.len(), verdicts.len());

    // Snapshot of the valid fixes; interpolated values never join it.
    let valid: Vec<(usize, [f64; 3], chrono::NaiveDateTime)> = records
        .iter()
        .zip(verdicts)
        .enumerate()
        .filter(|(_, (_, verdict))| verdict.is_valid())
        .filter_map(|(i, (record, _))| {
            record
                .coordinate
                .map(|coord| (i, coord, record.timestamp))
        })
        .collect();

    if valid.is_empty() {
        return Err(InterpolateError::NoValidFixes {
            total: records.len(),
        });
    }

    for (i, record) in records.iter_mut().enumerate() {
        if verdicts[i].is_valid() {
            continue;
        }

        // Nearest valid neighbors on either side, by sequence position
        // (the sequence is timestamp-ordered).
        let following = valid.iter().find(|(j, _, _)| *j > i);
        let preceding = valid.iter().rev().find(|(j, _, _)| *j < i);

        let replacement = match (preceding, following) {
            (Some(&(_, before, t0)), Some(&(_, after, t1))) => {
                let span = (t1 - t0).num_milliseconds() as f64;
                let fraction = if span > 0.0 {
                    (record.timestamp - t0).num_milliseconds() as f64 / span
                } else {
                    0.0
                };
                blend(before, after, fraction)
            }
            // Boundary runs inherit the nearest valid value.
            (Some(&(_, before, _)), None) => before,
            (None, Some(&(_, after, _))) => after,
            (None, None) => unreachable!("valid snapshot is non-empty"),
        };

        record.coordinate = Some(replacement);
        record.interpolated = true;
    }

    for record in records.iter_mut() {
        if let Some(coord) = record.coordinate.as_mut() {
            for axis in 0..3 {
                coord[axis] = round_to(coord[axis], config.xyz_rounding[axis]);
            }
        }
    }

    Ok(())
}
