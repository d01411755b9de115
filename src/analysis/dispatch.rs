use log::debug;
use serde_json::Value as JsonValue;

use crate::data::model::Spectrum;
use crate::error::AnalysisError;
use crate::region::SpectralRegion;

// ---------------------------------------------------------------------------
// RegionSelection – which part(s) of the spectrum a measure applies to
// ---------------------------------------------------------------------------

/// Whole spectrum, one region, or a list of independent regions.
///
/// A list is never merged: each region is evaluated on its own and the
/// results come back in the same order, even for a one-element list.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RegionSelection {
    #[default]
    Whole,
    One(SpectralRegion),
    Many(Vec<SpectralRegion>),
}

impl From<SpectralRegion> for RegionSelection {
    fn from(region: SpectralRegion) -> Self {
        RegionSelection::One(region)
    }
}

impl From<Vec<SpectralRegion>> for RegionSelection {
    fn from(regions: Vec<SpectralRegion>) -> Self {
        RegionSelection::Many(regions)
    }
}

impl TryFrom<&JsonValue> for RegionSelection {
    type Error = AnalysisError;

    /// `null` → whole spectrum, a string → one region, an array of strings
    /// → many regions. Anything else is rejected before any computation.
    fn try_from(value: &JsonValue) -> Result<Self, Self::Error> {
        match value {
            JsonValue::Null => Ok(RegionSelection::Whole),
            JsonValue::String(s) => Ok(RegionSelection::One(SpectralRegion::parse(s)?)),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => SpectralRegion::parse(s),
                    other => Err(AnalysisError::InvalidRegion(format!(
                        "list entries must be region strings, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(RegionSelection::Many),
            other => Err(AnalysisError::InvalidRegion(format!(
                "expected null, a region string or a list of region strings, got {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatched – result shape mirrors the selection shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched<T> {
    Single(T),
    Many(Vec<T>),
}

impl<T> Dispatched<T> {
    pub fn single(&self) -> Option<&T> {
        match self {
            Dispatched::Single(v) => Some(v),
            Dispatched::Many(_) => None,
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Dispatched::Single(v) => vec![v],
            Dispatched::Many(vs) => vs,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Dispatched::Single(_) => 1,
            Dispatched::Many(vs) => vs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run `compute` on the whole spectrum, on one region, or once per region.
///
/// The first failing region fails the whole call.
pub fn dispatch<T, F>(
    spectrum: &Spectrum,
    selection: &RegionSelection,
    compute: F,
) -> Result<Dispatched<T>, AnalysisError>
where
    F: Fn(&Spectrum, Option<&SpectralRegion>) -> Result<T, AnalysisError>,
{
    match selection {
        RegionSelection::Whole => compute(spectrum, None).map(Dispatched::Single),
        RegionSelection::One(region) => compute(spectrum, Some(region)).map(Dispatched::Single),
        RegionSelection::Many(regions) => {
            debug!("dispatching over {} regions", regions.len());
            regions
                .iter()
                .map(|region| compute(spectrum, Some(region)))
                .collect::<Result<Vec<_>, _>>()
                .map(Dispatched::Many)
        }
    }
}
