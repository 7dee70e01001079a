//! Loaders for flight telemetry CSV logs.
//!
//! Telemetry logs carry heterogeneous, sometimes duplicated, column names:
//! a log with both a barometric and a GPS altitude source contains two
//! columns literally named `Alt(m)`. The loader disambiguates duplicates
//! positionally via a configured rename table before handing rows to the
//! field resolver.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use log::info;
use thiserror::Error;

/// Errors that can occur during log loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("No rows found in any input file")]
    NoData,
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One telemetry log row: field name -> raw string value.
///
/// Empty cells count as absent so downstream fallback chains skip them.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    values: HashMap<String, String>,
}

impl RawRow {
    /// Build a row from (name, value) pairs, dropping empty values.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let values = pairs
            .into_iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .collect();
        Self { values }
    }

    /// Look up a field value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether the row holds a value for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

/// Remap a CSV header to position-sensitive, non-duplicated names.
///
/// Scans the header right to left: each time a column name appears in the
/// rename table, the *last* unused replacement is taken. With a table like
/// `Alt(m) -> [GPS Alt(m), Vario Alt(m)]` the trailing (optional) duplicate
/// becomes `Vario Alt(m)` and the earlier mandatory column `GPS Alt(m)`,
/// whether or not both are present.
pub fn remap_headers(headers: &[String], renames: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut remaining: HashMap<&str, Vec<&String>> = renames
        .iter()
        .map(|(name, list)| (name.as_str(), list.iter().collect()))
        .collect();

    let mut remapped = Vec::with_capacity(headers.len());
    for header in headers.iter().rev() {
        let replacement = remaining
            .get_mut(header.as_str())
            .and_then(|list| list.pop());
        match replacement {
            Some(name) => remapped.push(name.clone()),
            None => remapped.push(header.clone()),
        }
    }

    remapped.reverse();
    remapped
}

/// Load telemetry rows from a single CSV log file.
///
/// The header row is remapped through `renames` to resolve duplicated
/// column names; every following row becomes a [`RawRow`] in file order.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains no data rows.
pub fn load_telemetry_csv<P: AsRef<Path>>(
    path: P,
    renames: &HashMap<String, Vec<String>>,
) -> Result<Vec<RawRow>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let fieldnames = remap_headers(&headers, renames);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let pairs = fieldnames
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string));
        rows.push(RawRow::from_pairs(pairs));
    }

    if rows.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(rows)
}

/// Load and concatenate telemetry rows from several CSV log files.
///
/// Files are read in argument order; rows keep their source order. Fails if
/// no file yields any rows.
pub fn load_telemetry_csvs(
    paths: &[PathBuf],
    renames: &HashMap<String, Vec<String>>,
) -> Result<Vec<RawRow>> {
    let mut rows = Vec::new();
    for path in paths {
        rows.extend(load_telemetry_csv(path, renames)?);
    }

    if rows.is_empty() {
        return Err(LoaderError::NoData);
    }

    info!("{} points read from {} CSV file(s)", rows.len(), paths.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn renames() -> HashMap<String, Vec<String>> {
        let mut renames = HashMap::new();
        renames.insert(
            "Alt(m)".to_string(),
            vec!["GPS Alt(m)".to_string(), "Vario Alt(m)".to_string()],
        );
        renames
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_remap_headers_both_duplicates_present() {
        let remapped = remap_headers(
            &headers(&["Date", "Alt(m)", "GPS", "Alt(m)", "Sats"]),
            &renames(),
        );

        // Right-to-left scan: the later duplicate takes the last replacement.
        assert_eq!(
            remapped,
            headers(&["Date", "GPS Alt(m)", "GPS", "Vario Alt(m)", "Sats"])
        );
    }

    #[test]
    fn test_remap_headers_single_occurrence_takes_last_name() {
        let remapped = remap_headers(&headers(&["Date", "Alt(m)", "GPS"]), &renames());

        assert_eq!(remapped, headers(&["Date", "Vario Alt(m)", "GPS"]));
    }

    #[test]
    fn test_remap_headers_unmapped_passthrough() {
        let input = headers(&["Date", "Time", "RSSI(dB)"]);
        let remapped = remap_headers(&input, &renames());
        assert_eq!(remapped, input);
    }

    #[test]
    fn test_raw_row_drops_empty_values() {
        let row = RawRow::from_pairs([
            ("Sats".to_string(), "7".to_string()),
            ("GPS".to_string(), "".to_string()),
            ("Alt(m)".to_string(), "  ".to_string()),
        ]);

        assert_eq!(row.get("Sats"), Some("7"));
        assert!(!row.contains("GPS"));
        assert!(!row.contains("Alt(m)"));
    }

    #[test]
    fn test_load_telemetry_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Date,Time,Sats,GPS,Alt(m),Alt(m)").unwrap();
        writeln!(
            file,
            "2024-05-01,10:00:00.000,7,-35.001 149.102,120.3,118.9"
        )
        .unwrap();
        writeln!(file, "2024-05-01,10:00:01.000,8,-35.002 149.103,121.0,").unwrap();
        file.flush().unwrap();

        let rows = load_telemetry_csv(file.path(), &renames())?;
        assert_eq!(rows.len(), 2);

        // Duplicated Alt(m) columns resolved positionally
        assert_eq!(rows[0].get("GPS Alt(m)"), Some("120.3"));
        assert_eq!(rows[0].get("Vario Alt(m)"), Some("118.9"));

        // Trailing empty cell is absent, not an empty string
        assert_eq!(rows[1].get("GPS Alt(m)"), Some("121.0"));
        assert!(!rows[1].contains("Vario Alt(m)"));

        Ok(())
    }

    #[test]
    fn test_load_telemetry_csv_empty_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Date,Time,Sats").unwrap();
        file.flush().unwrap();

        let result = load_telemetry_csv(file.path(), &renames());
        assert!(matches!(result, Err(LoaderError::EmptyFile(_))));
    }

    #[test]
    fn test_load_telemetry_csvs_concatenates_in_order() -> Result<()> {
        let mut first = NamedTempFile::new().unwrap();
        writeln!(first, "Date,Time,Sats").unwrap();
        writeln!(first, "2024-05-01,10:00:00.000,7").unwrap();
        first.flush().unwrap();

        let mut second = NamedTempFile::new().unwrap();
        writeln!(second, "Date,Time,Sats").unwrap();
        writeln!(second, "2024-05-01,10:05:00.000,8").unwrap();
        second.flush().unwrap();

        let paths = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let rows = load_telemetry_csvs(&paths, &renames())?;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Time"), Some("10:00:00.000"));
        assert_eq!(rows[1].get("Time"), Some("10:05:00.000"));

        Ok(())
    }
}
