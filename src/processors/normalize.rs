//! Typed telemetry records built from canonical rows.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use log::warn;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::processors::fields::CanonicalRow;

/// Canonical field carrying the combined "<lat> <lon>" position fix.
pub const GPS_FIELD: &str = "GPS";

/// Canonical field carrying the elevation in metres.
pub const ALTITUDE_FIELD: &str = "Alt(m)";

/// Canonical field carrying the satellite count.
pub const SATS_FIELD: &str = "Sats";

/// Canonical fields carrying the record date and time of day.
pub const DATE_FIELD: &str = "Date";
pub const TIME_FIELD: &str = "Time";

/// Derived display field: elevation above the reference ground level.
pub const HEIGHT_ABOVE_GROUND_FIELD: &str = "Height above Ground (m)";

/// Derived display field: human-readable fix validity description.
pub const POINT_DESCRIPTION_FIELD: &str = "Point Description";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Errors that can occur during record normalization.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("record {index}: missing Date/Time fields")]
    MissingTimestamp { index: usize },

    #[error("record {index}: cannot parse timestamp '{value}'")]
    BadTimestamp {
        index: usize,
        value: String,
        #[source]
        source: chrono::format::ParseError,
    },
}

/// Result type for normalization operations.
pub type Result<T> = std::result::Result<T, NormalizeError>;

/// One fully-typed telemetry point, the unit processed by the pipeline.
#[derive(Debug, Clone)]
pub struct TelemetryRecord {
    /// 1-based sequence position; provenance key, never changes.
    pub index: usize,

    /// Log timestamp; non-decreasing across the sequence.
    pub timestamp: NaiveDateTime,

    /// (longitude, latitude, elevation), or `None` when any axis is
    /// missing or unparsable. A record never has a partial coordinate.
    pub coordinate: Option<[f64; 3]>,

    /// Satellite count; absent parses as 0.
    pub satellites: u32,

    /// Resolved display-field values; passed through unmodified.
    pub display_fields: HashMap<String, String>,

    /// Elevation above the reference ground level, once known.
    pub height_above_ground: Option<f64>,

    /// Human-readable fix validity description, updated after detection.
    pub status: String,

    /// True once the coordinate was replaced by interpolation. Never
    /// reverts to false.
    pub interpolated: bool,
}

impl TelemetryRecord {
    /// Resolve one display field, including the derived ones.
    pub fn display_value(&self, field: &str) -> Option<String> {
        match field {
            HEIGHT_ABOVE_GROUND_FIELD => self.height_above_ground.map(|h| format!("{:.1}", h)),
            POINT_DESCRIPTION_FIELD => Some(self.status.clone()),
            _ => self.display_fields.get(field).cloned(),
        }
    }
}

fn parse_coordinate(row: &CanonicalRow) -> Option<[f64; 3]> {
    // The GPS field holds "<lat> <lon>"; axes are stored lon, lat, elev.
    let gps = row.get(GPS_FIELD)?;
    let mut parts = gps.split_whitespace();
    let lat: f64 = parts.next()?.parse().ok()?;
    let lon: f64 = parts.next()?.parse().ok()?;
    let elev: f64 = row.get(ALTITUDE_FIELD)?.trim().parse().ok()?;
    Some([lon, lat, elev])
}

fn parse_timestamp(row: &CanonicalRow, index: usize) -> Result<NaiveDateTime> {
    let date = row.get(DATE_FIELD);
    let time = row.get(TIME_FIELD);
    let (date, time) = match (date, time) {
        (Some(date), Some(time)) => (date, time),
        _ => return Err(NormalizeError::MissingTimestamp { index }),
    };

    let value = format!("{} {}", date, time);
    NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT).map_err(|source| {
        NormalizeError::BadTimestamp {
            index,
            value,
            source,
        }
    })
}

/// Build one [`TelemetryRecord`] per canonical row, strictly in input order.
///
/// Coordinate axes are parsed independently; if any is absent or fails to
/// parse, the whole coordinate is undefined for that record. The derived
/// height-above-ground value is filled in when an external ground elevation
/// is configured; otherwise it is stamped after sanitization from the
/// track minimum.
///
/// # Errors
///
/// Returns an error when a record's timestamp is missing or unparsable;
/// timestamps order every later stage, so there is no recovery for them.
pub fn normalize_rows(
    rows: &[CanonicalRow],
    config: &PipelineConfig,
) -> Result<Vec<TelemetryRecord>> {
    let mut records = Vec::with_capacity(rows.len());
    let mut previous_timestamp: Option<NaiveDateTime> = None;

    for (position, row) in rows.iter().enumerate() {
        let index = position + 1;
        let timestamp = parse_timestamp(row, index)?;

        if let Some(previous) = previous_timestamp {
            if timestamp < previous {
                warn!(
                    "record {}: timestamp {} regresses behind {}; log order kept",
                    index, timestamp, previous
                );
            }
        }
        previous_timestamp = Some(timestamp);

        let coordinate = parse_coordinate(row);
        let satellites = row
            .get(SATS_FIELD)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);

        let height_above_ground = match (config.ground_elevation, coordinate) {
            (Some(ground), Some(coord)) => Some(coord[2] - ground),
            _ => None,
        };

        let display_fields = config
            .displayed_fields
            .iter()
            .filter_map(|field| {
                row.get(field)
                    .map(|value| (field.clone(), value.to_string()))
            })
            .collect();

        records.push(TelemetryRecord {
            index,
            timestamp,
            coordinate,
            satellites,
            display_fields,
            height_above_ground,
            status: "Valid GPS".to_string(),
            interpolated: false,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::RawRow;
    use crate::processors::fields::resolve_row;

    fn canonical(pairs: &[(&str, &str)]) -> CanonicalRow {
        let raw = RawRow::from_pairs(
            pairs
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );
        let config = PipelineConfig::default();
        resolve_row(&raw, &config.field_mappings, &config.displayed_fields)
    }

    fn base_row() -> Vec<(&'static str, &'static str)> {
        vec![
            ("Date", "2024-05-01"),
            ("Time", "10:00:00.000"),
            ("Sats", "7"),
            ("GPS", "-35.001 149.102"),
            ("GPS Alt(m)", "120.3"),
        ]
    }

    #[test]
    fn test_normalize_basic_record() {
        let rows = vec![canonical(&base_row())];
        let records = normalize_rows(&rows, &PipelineConfig::default()).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.index, 1);
        assert_eq!(record.satellites, 7);
        // lat/lon swapped into lon, lat, elev order
        assert_eq!(record.coordinate, Some([149.102, -35.001, 120.3]));
        assert!(!record.interpolated);
        assert!(record.height_above_ground.is_none());
    }

    #[test]
    fn test_missing_axis_undefines_whole_coordinate() {
        let mut pairs = base_row();
        pairs.retain(|(name, _)| *name != "GPS Alt(m)");
        let rows = vec![canonical(&pairs)];

        let records = normalize_rows(&rows, &PipelineConfig::default()).unwrap();
        assert!(records[0].coordinate.is_none());
    }

    #[test]
    fn test_unparsable_gps_undefines_whole_coordinate() {
        let mut pairs = base_row();
        for pair in pairs.iter_mut() {
            if pair.0 == "GPS" {
                pair.1 = "not-a-fix";
            }
        }
        let rows = vec![canonical(&pairs)];

        let records = normalize_rows(&rows, &PipelineConfig::default()).unwrap();
        assert!(records[0].coordinate.is_none());
    }

    #[test]
    fn test_absent_satellite_count_is_zero() {
        let mut pairs = base_row();
        pairs.retain(|(name, _)| *name != "Sats");
        let rows = vec![canonical(&pairs)];

        let records = normalize_rows(&rows, &PipelineConfig::default()).unwrap();
        assert_eq!(records[0].satellites, 0);
    }

    #[test]
    fn test_external_ground_elevation_derives_height() {
        let config = PipelineConfig {
            ground_elevation: Some(100.0),
            ..PipelineConfig::default()
        };
        let rows = vec![canonical(&base_row())];

        let records = normalize_rows(&rows, &config).unwrap();
        let height = records[0].height_above_ground.unwrap();
        assert!((height - 20.3).abs() < 1e-9);
    }

    #[test]
    fn test_missing_timestamp_is_fatal() {
        let mut pairs = base_row();
        pairs.retain(|(name, _)| *name != "Time");
        let rows = vec![canonical(&pairs)];

        let result = normalize_rows(&rows, &PipelineConfig::default());
        assert!(matches!(
            result,
            Err(NormalizeError::MissingTimestamp { index: 1 })
        ));
    }

    #[test]
    fn test_bad_timestamp_is_fatal() {
        let mut pairs = base_row();
        for pair in pairs.iter_mut() {
            if pair.0 == "Time" {
                pair.1 = "25:99:99";
            }
        }
        let rows = vec![canonical(&pairs)];

        let result = normalize_rows(&rows, &PipelineConfig::default());
        assert!(matches!(result, Err(NormalizeError::BadTimestamp { .. })));
    }

    #[test]
    fn test_display_fields_resolved_in_config_order_source() {
        let mut pairs = base_row();
        pairs.push(("RSSI(dB)", "87"));
        let rows = vec![canonical(&pairs)];

        let records = normalize_rows(&rows, &PipelineConfig::default()).unwrap();
        assert_eq!(
            records[0].display_fields.get("RSSI(dB)").map(String::as_str),
            Some("87")
        );
    }
}
