//! Writers for KML scenes and enhanced CSV exports.
//!
//! The KML writer serializes the assembled track geometry by hand: one
//! `<LineString>` for the flight path and one `<Placemark>` per marker,
//! with icon and label styles resolved from the point style. Altitudes
//! are rendered relative to ground.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::config::PipelineConfig;
use crate::processors::normalize::TelemetryRecord;
use crate::visualization::TrackGeometry;

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

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// Escape text for embedding in XML element content.
fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn write_kml_document<W: Write>(writer: &mut W, track: &TrackGeometry) -> io::Result<()> {
    let style = &track.point_style;

    writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(writer, r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#)?;
    writeln!(writer, "  <Document>")?;

    // Flight path line
    writeln!(writer, "    <Placemark>")?;
    writeln!(writer, "      <name>{}</name>", xml_escape(&track.path.name))?;
    writeln!(writer, "      <Style>")?;
    writeln!(writer, "        <LineStyle>")?;
    writeln!(writer, "          <color>{}</color>", track.path.style.color)?;
    writeln!(writer, "          <width>{}</width>", track.path.style.width)?;
    writeln!(writer, "        </LineStyle>")?;
    writeln!(writer, "      </Style>")?;
    writeln!(writer, "      <LineString>")?;
    writeln!(writer, "        <altitudeMode>relativeToGround</altitudeMode>")?;
    write!(writer, "        <coordinates>")?;
    for (i, coord) in track.path.coords.iter().enumerate() {
        if i > 0 {
            write!(writer, " ")?;
        }
        write!(writer, "{},{},{}", coord[0], coord[1], coord[2])?;
    }
    writeln!(writer, "</coordinates>")?;
    writeln!(writer, "      </LineString>")?;
    writeln!(writer, "    </Placemark>")?;

    // Per-point markers
    for marker in &track.markers {
        let icon_color = if marker.interpolated {
            &style.interp_icon_color
        } else {
            &style.icon_color
        };
        let description = marker
            .metadata
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect::<Vec<_>>()
            .join("\n");

        writeln!(writer, "    <Placemark>")?;
        if let Some(label) = &marker.label {
            writeln!(writer, "      <name>{}</name>", xml_escape(label))?;
        }
        writeln!(
            writer,
            "      <description>{}</description>",
            xml_escape(&description)
        )?;
        writeln!(
            writer,
            "      <TimeStamp><when>{}</when></TimeStamp>",
            marker.when.format("%Y-%m-%dT%H:%M:%S%.3f")
        )?;
        writeln!(writer, "      <Style>")?;
        writeln!(writer, "        <IconStyle>")?;
        writeln!(writer, "          <color>{}</color>", icon_color)?;
        writeln!(writer, "          <scale>{}</scale>", style.icon_scale)?;
        writeln!(
            writer,
            "          <Icon><href>{}</href></Icon>",
            xml_escape(&style.icon_href)
        )?;
        writeln!(writer, "        </IconStyle>")?;
        writeln!(writer, "        <LabelStyle>")?;
        writeln!(writer, "          <color>{}</color>", style.label_color)?;
        writeln!(writer, "          <scale>{}</scale>", style.label_scale)?;
        writeln!(writer, "        </LabelStyle>")?;
        writeln!(writer, "      </Style>")?;
        writeln!(writer, "      <Point>")?;
        writeln!(
            writer,
            "        <altitudeMode>relativeToGround</altitudeMode>"
        )?;
        writeln!(
            writer,
            "        <coordinates>{},{},{}</coordinates>",
            marker.coord[0], marker.coord[1], marker.coord[2]
        )?;
        writeln!(writer, "      </Point>")?;
        writeln!(writer, "    </Placemark>")?;
    }

    writeln!(writer, "  </Document>")?;
    writeln!(writer, "</kml>")?;
    writer.flush()
}

/// Write an assembled track to a KML file.
///
/// # Errors
///
/// Returns an error if parent directories or the file cannot be created,
/// or a write fails.
pub fn write_kml(path: &Path, track: &TrackGeometry) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;

    write_kml_document(&mut writer, track).map_err(|e| WriteError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// Write sanitized records back out as an enhanced CSV.
///
/// Columns: sequence index, timestamp, the sanitized coordinate axes, the
/// interpolation flag, then the configured display fields in display
/// order. Missing display values are written as empty cells.
pub fn write_enhanced_csv(
    path: &Path,
    records: &[TelemetryRecord],
    config: &PipelineConfig,
) -> Result<()> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let buf_writer = BufWriter::new(file);
    let mut csv_writer = csv::Writer::from_writer(buf_writer);

    let path_str = path.display().to_string();

    let mut header = vec![
        "Index".to_string(),
        "Timestamp".to_string(),
        "Longitude".to_string(),
        "Latitude".to_string(),
        "Elevation(m)".to_string(),
        "Interpolated".to_string(),
    ];
    header.extend(config.displayed_fields.iter().cloned());

    csv_writer
        .write_record(&header)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for record in records {
        let coord = record.coordinate.unwrap_or([f64::NAN; 3]);
        let mut row = vec![
            record.index.to_string(),
            record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            coord[0].to_string(),
            coord[1].to_string(),
            coord[2].to_string(),
            record.interpolated.to_string(),
        ];
        for field in &config.displayed_fields {
            row.push(record.display_value(field).unwrap_or_default());
        }

        csv_writer
            .write_record(&row)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::visualization::assemble_track;
    use chrono::NaiveDateTime;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    fn record(index: usize, interpolated: bool) -> TelemetryRecord {
        let mut display_fields = HashMap::new();
        display_fields.insert("Sats".to_string(), "7".to_string());

        TelemetryRecord {
            index,
            timestamp: NaiveDateTime::parse_from_str(
                "2024-05-01 10:00:00.000",
                "%Y-%m-%d %H:%M:%S%.f",
            )
            .unwrap() + chrono::Duration::seconds(index as i64),
            coordinate: Some([149.1 + index as f64 * 1e-4, -35.0, 120.0]),
            satellites: 7,
            display_fields,
            height_above_ground: Some(20.0),
            status: "Valid GPS".to_string(),
            interpolated,
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            displayed_fields: vec!["Sats".to_string(), "Point Description".to_string()],
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_write_kml_structure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flight.kml");

        let records = vec![record(1, false), record(2, true)];
        let track = assemble_track("flight", &records, &config()).unwrap();

        write_kml(&path, &track).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert_eq!(content.matches("<LineString>").count(), 1);
        // One point placemark per record, plus the path placemark
        assert_eq!(content.matches("<Placemark>").count(), 3);
        assert!(content.contains("<altitudeMode>relativeToGround</altitudeMode>"));
    }

    #[test]
    fn test_write_kml_interpolated_style_variant() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flight.kml");

        let records = vec![record(1, false), record(2, true)];
        let cfg = config();
        let track = assemble_track("flight", &records, &cfg).unwrap();

        write_kml(&path, &track).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let measured = format!("<color>{}</color>", cfg.point_style.icon_color);
        let repaired = format!("<color>{}</color>", cfg.point_style.interp_icon_color);
        assert_eq!(content.matches(&measured).count(), 1);
        assert_eq!(content.matches(&repaired).count(), 1);
    }

    #[test]
    fn test_write_kml_escapes_description() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flight.kml");

        let mut escaped = record(1, false);
        escaped.status = "Bad satellite count: <2>".to_string();
        let track = assemble_track("flight", &[escaped], &config()).unwrap();

        write_kml(&path, &track).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("Bad satellite count: &lt;2&gt;"));
    }

    #[test]
    fn test_write_kml_labels_only_when_enabled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flight.kml");

        let mut cfg = config();
        cfg.point_style.label_points = true;
        let track = assemble_track("flight", &[record(1, false)], &cfg).unwrap();

        write_kml(&path, &track).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("<name>10:00:01.000</name>"));
    }

    #[test]
    fn test_write_kml_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out").join("flight.kml");
        let track = assemble_track("flight", &[record(1, false)], &config()).unwrap();

        write_kml(&path, &track).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_enhanced_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flight_enhanced.csv");
        let records = vec![record(1, false), record(2, true)];

        write_enhanced_csv(&path, &records, &config()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(
            lines[0],
            "Index,Timestamp,Longitude,Latitude,Elevation(m),Interpolated,Sats,Point Description"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1,2024-05-01 10:00:01.000,"));
        assert!(lines[1].contains(",false,"));
        assert!(lines[2].contains(",true,"));
    }
}
