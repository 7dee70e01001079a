//! Canonical field resolution through prioritized fallback chains.
//!
//! A telemetry row may carry the same logical quantity under several source
//! names (a mandatory low-fidelity fallback plus an optional high-fidelity
//! sensor). Each canonical field declares its candidates lowest to highest
//! priority; the last candidate present in the row wins, so the optional
//! source silently shadows the fallback whenever both exist.

use std::collections::HashMap;

use crate::core::loaders::RawRow;

/// A row reduced to canonical field names, one resolved value each.
#[derive(Debug, Clone, Default)]
pub struct CanonicalRow {
    values: HashMap<String, String>,
}

impl CanonicalRow {
    /// Look up a resolved value by canonical or display field name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether the row resolved a value for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

/// Resolve a raw row into a [`CanonicalRow`].
///
/// For each canonical name the candidate list is scanned in declared order
/// and the value of the last candidate present is kept. A canonical name
/// with no candidate present resolves to absent; that is not an error.
/// Display fields that are not canonical targets pass through unchanged;
/// all other raw fields are dropped.
pub fn resolve_row(
    raw: &RawRow,
    mappings: &HashMap<String, Vec<String>>,
    displayed_fields: &[String],
) -> CanonicalRow {
    let mut values = HashMap::new();

    for (canonical, candidates) in mappings {
        let resolved = candidates
            .iter()
            .rev()
            .find_map(|candidate| raw.get(candidate));
        if let Some(value) = resolved {
            values.insert(canonical.clone(), value.to_string());
        }
    }

    for field in displayed_fields {
        if values.contains_key(field) || mappings.contains_key(field) {
            continue;
        }
        if let Some(value) = raw.get(field) {
            values.insert(field.clone(), value.to_string());
        }
    }

    CanonicalRow { values }
}
