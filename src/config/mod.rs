//! Configuration types for the telemetry pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

/// Errors raised while loading or validating configuration.
///
/// Any of these is fatal before the pipeline runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{key}: '{value}' is not an 8-hex-digit color string")]
    InvalidColor { key: &'static str, value: String },

    #[error("validSatRange: min {min} exceeds max {max}")]
    InvalidSatRange { min: u32, max: u32 },

    #[error("{key}: {value} must be finite and non-negative")]
    InvalidThreshold { key: &'static str, value: f64 },
}

/// Line styling for the flight-path geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineStyle {
    /// 8-hex-digit color string (aabbggrr, KML convention)
    #[serde(default = "default_line_color")]
    pub color: String,

    /// Line width in pixels
    #[serde(default = "default_line_width")]
    pub width: f64,
}

fn default_line_color() -> String {
    "ff00ffff".to_string()
}

fn default_line_width() -> f64 {
    3.0
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: default_line_color(),
            width: default_line_width(),
        }
    }
}

/// Per-point marker styling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointStyle {
    /// Render visible time labels on markers
    #[serde(default)]
    pub label_points: bool,

    /// Icon scale factor
    #[serde(default = "default_icon_scale")]
    pub icon_scale: f64,

    /// Icon color for originally-measured points (aabbggrr)
    #[serde(default = "default_icon_color")]
    pub icon_color: String,

    /// Icon color for interpolated points (aabbggrr)
    #[serde(default = "default_interp_icon_color")]
    pub interp_icon_color: String,

    /// Icon image URL
    #[serde(default = "default_icon_href")]
    pub icon_href: String,

    /// Label color (aabbggrr)
    #[serde(default = "default_label_color")]
    pub label_color: String,

    /// Label scale factor
    #[serde(default = "default_label_scale")]
    pub label_scale: f64,
}

fn default_icon_scale() -> f64 {
    0.5
}

fn default_icon_color() -> String {
    "ff00ff00".to_string()
}

fn default_interp_icon_color() -> String {
    "ff0000ff".to_string()
}

fn default_icon_href() -> String {
    "http://maps.google.com/mapfiles/kml/shapes/placemark_circle.png".to_string()
}

fn default_label_color() -> String {
    "ffffffff".to_string()
}

fn default_label_scale() -> f64 {
    0.5
}

impl Default for PointStyle {
    fn default() -> Self {
        Self {
            label_points: false,
            icon_scale: default_icon_scale(),
            icon_color: default_icon_color(),
            interp_icon_color: default_interp_icon_color(),
            icon_href: default_icon_href(),
            label_color: default_label_color(),
            label_scale: default_label_scale(),
        }
    }
}

/// Main pipeline configuration.
///
/// Field resolution, outlier thresholds, and output styling. Every key has a
/// default so a partial (or absent) settings file still yields a usable
/// configuration; `validate` rejects malformed values before any record is
/// processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Canonical field name -> ordered candidate source names.
    ///
    /// Candidates are listed lowest to highest priority: the last candidate
    /// present in a row wins, so an optional higher-fidelity source shadows
    /// an always-present fallback.
    #[serde(default = "default_field_mappings")]
    pub field_mappings: HashMap<String, Vec<String>>,

    /// Field names retained as marker metadata, in display order.
    #[serde(default = "default_displayed_fields")]
    pub displayed_fields: Vec<String>,

    /// Raw duplicated column name -> replacement names.
    ///
    /// Applied while reading the CSV header, scanning right to left, so the
    /// optional later duplicate receives the last replacement name.
    #[serde(default = "default_header_renames")]
    pub header_renames: HashMap<String, Vec<String>>,

    /// Absolute deviation-from-median limits per axis [lon, lat, elev].
    #[serde(rename = "xyzLimit", default = "default_xyz_limit")]
    pub xyz_limit: [f64; 3],

    /// Per-second rate-of-change limits per axis [lon, lat, elev].
    #[serde(rename = "xyzDeltaLimit", default = "default_xyz_delta_limit")]
    pub xyz_delta_limit: [f64; 3],

    /// Output rounding in decimal places per axis [lon, lat, elev].
    #[serde(rename = "xyzRounding", default = "default_xyz_rounding")]
    pub xyz_rounding: [u32; 3],

    /// Inclusive satellite-count range [min, max] for a usable fix.
    #[serde(rename = "validSatRange", default = "default_valid_sat_range")]
    pub valid_sat_range: [u32; 2],

    /// Reference ground elevation for the height-above-ground field.
    ///
    /// When unset, the minimum sanitized elevation of the track is used.
    #[serde(default)]
    pub ground_elevation: Option<f64>,

    /// Treat exact repeats of the last accepted lon/lat as invalid fixes.
    #[serde(default)]
    pub discard_duplicate_positions: bool,

    #[serde(default)]
    pub line_style: LineStyle,

    #[serde(default)]
    pub point_style: PointStyle,
}

fn default_field_mappings() -> HashMap<String, Vec<String>> {
    let mut mappings = HashMap::new();
    mappings.insert(
        "Alt(m)".to_string(),
        vec!["GPS Alt(m)".to_string(), "Vario Alt(m)".to_string()],
    );
    mappings.insert("GPS".to_string(), vec!["GPS".to_string()]);
    mappings.insert("Sats".to_string(), vec!["Sats".to_string()]);
    mappings.insert("Date".to_string(), vec!["Date".to_string()]);
    mappings.insert("Time".to_string(), vec!["Time".to_string()]);
    mappings
}

fn default_displayed_fields() -> Vec<String> {
    [
        "Date",
        "Time",
        "Sats",
        "Alt(m)",
        "Height above Ground (m)",
        "Point Description",
        "RSSI(dB)",
        "RxBt(V)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_header_renames() -> HashMap<String, Vec<String>> {
    let mut renames = HashMap::new();
    renames.insert(
        "Alt(m)".to_string(),
        vec!["GPS Alt(m)".to_string(), "Vario Alt(m)".to_string()],
    );
    renames
}

fn default_xyz_limit() -> [f64; 3] {
    [0.1, 0.1, 500.0]
}

fn default_xyz_delta_limit() -> [f64; 3] {
    [0.001, 0.001, 20.0]
}

fn default_xyz_rounding() -> [u32; 3] {
    [6, 6, 0]
}

fn default_valid_sat_range() -> [u32; 2] {
    [4, 99]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            field_mappings: default_field_mappings(),
            displayed_fields: default_displayed_fields(),
            header_renames: default_header_renames(),
            xyz_limit: default_xyz_limit(),
            xyz_delta_limit: default_xyz_delta_limit(),
            xyz_rounding: default_xyz_rounding(),
            valid_sat_range: default_valid_sat_range(),
            ground_elevation: None,
            discard_duplicate_positions: false,
            line_style: LineStyle::default(),
            point_style: PointStyle::default(),
        }
    }
}

fn check_color(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.len() != 8 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidColor {
            key,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_threshold(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidThreshold { key, value });
    }
    Ok(())
}

impl PipelineConfig {
    /// Load configuration from a YAML file and validate it.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check threshold and style values for shape errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let [min, max] = self.valid_sat_range;
        if min > max {
            return Err(ConfigError::InvalidSatRange { min, max });
        }

        for value in self.xyz_limit {
            check_threshold("xyzLimit", value)?;
        }
        for value in self.xyz_delta_limit {
            check_threshold("xyzDeltaLimit", value)?;
        }

        check_threshold("line_style.width", self.line_style.width)?;
        check_threshold("point_style.icon_scale", self.point_style.icon_scale)?;
        check_threshold("point_style.label_scale", self.point_style.label_scale)?;

        check_color("line_style.color", &self.line_style.color)?;
        check_color("point_style.icon_color", &self.point_style.icon_color)?;
        check_color(
            "point_style.interp_icon_color",
            &self.point_style.interp_icon_color,
        )?;
        check_color("point_style.label_color", &self.point_style.label_color)?;

        Ok(())
    }
}
