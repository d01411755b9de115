use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value as JsonValue;

use super::model::{MetadataValue, SpectralDataset, Spectrum};

// ---------------------------------------------------------------------------
// Metadata selection: which spectra of a dataset get measured
// ---------------------------------------------------------------------------

/// Per-column accepted values: column_name → set of accepted values.
///
/// A spectrum passes a column constraint when:
/// * the set is non-empty and holds the spectrum's value for that column;
/// * the spectrum lacks the column and `Null` is accepted.
///
/// An empty set accepts nothing. Columns without a constraint accept
/// everything, so the default selection keeps the whole dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataSelection {
    constraints: BTreeMap<String, BTreeSet<MetadataValue>>,
}

impl MetadataSelection {
    pub fn new() -> Self {
        MetadataSelection::default()
    }

    /// Accept `values` for `column`, replacing any earlier constraint.
    pub fn accept<I>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = MetadataValue>,
    {
        self.constraints
            .insert(column.to_string(), values.into_iter().collect());
        self
    }

    /// Build from the `select` block of an analysis config.
    pub fn from_json(select: &BTreeMap<String, Vec<JsonValue>>) -> Self {
        select.iter().fold(MetadataSelection::new(), |sel, (col, vals)| {
            sel.accept(col, vals.iter().map(metadata_from_json))
        })
    }

    pub fn is_unconstrained(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn matches(&self, spectrum: &Spectrum) -> bool {
        self.constraints.iter().all(|(col, accepted)| {
            let value = spectrum.metadata.get(col).unwrap_or(&MetadataValue::Null);
            accepted.contains(value)
        })
    }

    /// Indices of the spectra that pass every constraint.
    pub fn indices(&self, dataset: &SpectralDataset) -> Vec<usize> {
        dataset
            .spectra
            .iter()
            .enumerate()
            .filter(|(_, sp)| self.matches(sp))
            .map(|(i, _)| i)
            .collect()
    }
}

fn metadata_from_json(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::Null => MetadataValue::Null,
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => MetadataValue::Integer(i),
            (None, Some(f)) => MetadataValue::Float(f),
            _ => MetadataValue::String(n.to_string()),
        },
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        other => MetadataValue::String(other.to_string()),
    }
}
