//! Geometry and style assembly for the sanitized track.
//!
//! Turns the finalized record sequence into renderable descriptors: one
//! continuous flight-path line plus one styled marker per record. Markers
//! carry the configured display fields as metadata and use a distinct icon
//! color for interpolated points. No computation happens here beyond style
//! selection and field lookup.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::config::{LineStyle, PipelineConfig, PointStyle};
use crate::processors::normalize::TelemetryRecord;

/// Errors that can occur during geometry assembly.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("no records to assemble into a track")]
    EmptyTrack,
}

/// Result type for assembly operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// The continuous flight-path line.
#[derive(Debug, Clone)]
pub struct PathGeometry {
    /// Display name of the path.
    pub name: String,
    /// (longitude, latitude, height above ground) in sequence order.
    pub coords: Vec<[f64; 3]>,
    pub style: LineStyle,
}

/// One styled marker per record.
#[derive(Debug, Clone)]
pub struct Marker {
    /// (longitude, latitude, height above ground).
    pub coord: [f64; 3],
    pub when: NaiveDateTime,
    /// Visible label; `None` when labelling is disabled.
    pub label: Option<String>,
    /// Display-field name/value pairs, in configured display order.
    pub metadata: Vec<(String, String)>,
    /// Selects the repaired-point icon style.
    pub interpolated: bool,
}

/// Everything the exporter needs to draw one track.
#[derive(Debug, Clone)]
pub struct TrackGeometry {
    pub path: PathGeometry,
    pub markers: Vec<Marker>,
    pub point_style: PointStyle,
}

fn marker_metadata(record: &TelemetryRecord, config: &PipelineConfig) -> Vec<(String, String)> {
    config
        .displayed_fields
        .iter()
        .filter_map(|field| {
            record
                .display_value(field)
                .map(|value| (field.clone(), value))
        })
        .collect()
}

/// Assemble the path geometry and per-point markers for a track.
///
/// Altitudes use the height-above-ground value so the exporter can render
/// the track relative to terrain. Display-field order follows the
/// configuration, regardless of log column order.
pub fn assemble_track(
    name: &str,
    records: &[TelemetryRecord],
    config: &PipelineConfig,
) -> Result<TrackGeometry> {
    if records.is_empty() {
        return Err(VisualizationError::EmptyTrack);
    }

    let mut coords = Vec::with_capacity(records.len());
    let mut markers = Vec::with_capacity(records.len());

    for record in records {
        let Some(position) = record.coordinate else {
            continue;
        };
        let altitude = record.height_above_ground.unwrap_or(0.0);
        let coord = [position[0], position[1], altitude];
        coords.push(coord);

        let label = if config.point_style.label_points {
            Some(record.timestamp.format("%H:%M:%S%.3f").to_string())
        } else {
            None
        };

        markers.push(Marker {
            coord,
            when: record.timestamp,
            label,
            metadata: marker_metadata(record, config),
            interpolated: record.interpolated,
        });
    }

    if coords.is_empty() {
        return Err(VisualizationError::EmptyTrack);
    }

    Ok(TrackGeometry {
        path: PathGeometry {
            name: format!("{} Flight Path", name),
            coords,
            style: config.line_style.clone(),
        },
        markers,
        point_style: config.point_style.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use std::collections::HashMap;

    fn record(index: usize, interpolated: bool) -> TelemetryRecord {
        let mut display_fields = HashMap::new();
        display_fields.insert("Sats".to_string(), "7".to_string());
        display_fields.insert("RSSI(dB)".to_string(), "87".to_string());

        TelemetryRecord {
            index,
            timestamp: NaiveDateTime::parse_from_str(
                "2024-05-01 10:00:00.500",
                "%Y-%m-%d %H:%M:%S%.f",
            )
            .unwrap(),
            coordinate: Some([149.1, -35.0, 120.0]),
            satellites: 7,
            display_fields,
            height_above_ground: Some(20.0),
            status: "Valid GPS".to_string(),
            interpolated,
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            displayed_fields: vec![
                "Sats".to_string(),
                "Height above Ground (m)".to_string(),
                "Point Description".to_string(),
                "RSSI(dB)".to_string(),
            ],
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_path_uses_height_above_ground() {
        let records = vec![record(1, false), record(2, true)];
        let track = assemble_track("flight", &records, &config()).unwrap();

        assert_eq!(track.path.name, "flight Flight Path");
        assert_eq!(track.path.coords.len(), 2);
        assert_eq!(track.path.coords[0], [149.1, -35.0, 20.0]);
    }

    #[test]
    fn test_marker_style_variant_follows_provenance() {
        let records = vec![record(1, false), record(2, true)];
        let track = assemble_track("flight", &records, &config()).unwrap();

        assert!(!track.markers[0].interpolated);
        assert!(track.markers[1].interpolated);
    }

    #[test]
    fn test_metadata_preserves_display_order() {
        let records = vec![record(1, false)];
        let track = assemble_track("flight", &records, &config()).unwrap();

        let names: Vec<&str> = track.markers[0]
            .metadata
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "Sats",
                "Height above Ground (m)",
                "Point Description",
                "RSSI(dB)"
            ]
        );
        assert_eq!(track.markers[0].metadata[1].1, "20.0");
        assert_eq!(track.markers[0].metadata[2].1, "Valid GPS");
    }

    #[test]
    fn test_missing_display_fields_skipped() {
        let mut bare = record(1, false);
        bare.display_fields.clear();
        bare.height_above_ground = None;

        let track = assemble_track("flight", &[bare], &config()).unwrap();
        let names: Vec<&str> = track.markers[0]
            .metadata
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec!["Point Description"]);
    }

    #[test]
    fn test_labels_gated_by_config() {
        let records = vec![record(1, false)];

        let unlabeled = assemble_track("flight", &records, &config()).unwrap();
        assert!(unlabeled.markers[0].label.is_none());
        assert!(!unlabeled.markers[0].metadata.is_empty());

        let mut cfg = config();
        cfg.point_style.label_points = true;
        let labeled = assemble_track("flight", &records, &cfg).unwrap();
        assert_eq!(labeled.markers[0].label.as_deref(), Some("10:00:00.500"));
    }

    #[test]
    fn test_empty_track_rejected() {
        let result = assemble_track("flight", &[], &config());
        assert!(matches!(result, Err(VisualizationError::EmptyTrack)));
    }
}
