use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::analysis::{Continuum, MeasureKind, PolynomialContinuum, RegionSelection};
use crate::data::filter::MetadataSelection;
use crate::error::AnalysisError;
use crate::units::{Quantity, Unit};

/// Analysis settings read from a JSON file.
///
/// ```json
/// {
///   "regions": ["6550:6575 Angstrom", "4850:4870 Angstrom"],
///   "measures": ["line-flux", "snr"],
///   "continuum": { "constant": { "value": 1.0, "unit": "ct" } },
///   "select": { "object": ["NGC 1068"] }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// `null`, one region string, or a list of region strings.
    pub regions: JsonValue,
    pub measures: Vec<MeasureKind>,
    pub continuum: Option<ContinuumConfig>,
    pub select: BTreeMap<String, Vec<JsonValue>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum ContinuumConfig {
    Constant {
        value: f64,
        #[serde(default)]
        unit: String,
    },
    Polynomial {
        coefficients: Vec<f64>,
        axis_unit: String,
        flux_unit: String,
    },
}

impl ContinuumConfig {
    pub fn to_continuum(&self) -> Result<Continuum, AnalysisError> {
        match self {
            ContinuumConfig::Constant { value, unit } => {
                Ok(Continuum::Constant(Quantity::new(*value, Unit::parse(unit)?)))
            }
            ContinuumConfig::Polynomial {
                coefficients,
                axis_unit,
                flux_unit,
            } => Ok(Continuum::model(PolynomialContinuum::new(
                coefficients.clone(),
                Unit::parse(axis_unit)?,
                Unit::parse(flux_unit)?,
            ))),
        }
    }
}

impl AnalysisConfig {
    pub fn region_selection(&self) -> Result<RegionSelection, AnalysisError> {
        RegionSelection::try_from(&self.regions)
    }

    pub fn continuum(&self) -> Result<Continuum, AnalysisError> {
        self.continuum
            .as_ref()
            .map_or_else(|| Ok(Continuum::default()), ContinuumConfig::to_continuum)
    }

    pub fn metadata_selection(&self) -> MetadataSelection {
        MetadataSelection::from_json(&self.select)
    }
}

pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: AnalysisConfig = serde_json::from_str(&content)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}
