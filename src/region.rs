use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::data::model::Spectrum;
use crate::error::AnalysisError;
use crate::units::{Quantity, Unit};

/// One or more closed sub-intervals of a spectral axis.
///
/// Sub-intervals are kept in the order they were given; extraction
/// concatenates the samples of each one in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralRegion {
    subregions: Vec<(Quantity, Quantity)>,
}

impl SpectralRegion {
    /// Single interval `[lower, upper]`.
    pub fn new(lower: Quantity, upper: Quantity) -> Result<Self, AnalysisError> {
        SpectralRegion::from_subregions(vec![(lower, upper)])
    }

    pub fn from_subregions(subregions: Vec<(Quantity, Quantity)>) -> Result<Self, AnalysisError> {
        let Some((first, _)) = subregions.first() else {
            return Err(AnalysisError::InvalidRegion("region has no intervals".into()));
        };
        let reference = first.unit.clone();

        for (lower, upper) in &subregions {
            if !lower.value.is_finite() || !upper.value.is_finite() {
                return Err(AnalysisError::InvalidRegion(format!(
                    "non-finite bound in [{lower}, {upper}]"
                )));
            }
            if !lower.unit.is_convertible_to(&reference) || !upper.unit.is_convertible_to(&reference) {
                return Err(AnalysisError::InvalidRegion(format!(
                    "bounds of [{lower}, {upper}] do not share the dimension of '{reference}'"
                )));
            }
            if upper.value_in(&lower.unit)? < lower.value {
                return Err(AnalysisError::InvalidRegion(format!(
                    "lower bound {lower} exceeds upper bound {upper}"
                )));
            }
        }

        Ok(SpectralRegion { subregions })
    }

    pub fn subregions(&self) -> &[(Quantity, Quantity)] {
        &self.subregions
    }

    /// Indices of the samples of `spectrum` that fall inside the region.
    pub fn sample_indices(&self, spectrum: &Spectrum) -> Result<Vec<usize>, AnalysisError> {
        let axis = spectrum.spectral_axis();
        let mut indices = Vec::new();
        for (lower, upper) in &self.subregions {
            let lo = lower.value_in(axis.unit())?;
            let hi = upper.value_in(axis.unit())?;
            indices.extend(
                axis.data()
                    .iter()
                    .enumerate()
                    .filter(|&(_, &x)| x >= lo && x <= hi)
                    .map(|(i, _)| i),
            );
        }
        Ok(indices)
    }

    /// New spectrum restricted to the region's sub-intervals.
    pub fn extract(&self, spectrum: &Spectrum) -> Result<Spectrum, AnalysisError> {
        let indices = self.sample_indices(spectrum)?;
        debug!(
            "region {self} kept {} of {} samples",
            indices.len(),
            spectrum.len()
        );
        Ok(spectrum.select_samples(&indices))
    }

    /// Parse `"6550:6580 Angstrom"` or `"6550:6560,6570:6580 nm"`. Without a
    /// unit the bounds are dimensionless.
    pub fn parse(text: &str) -> Result<Self, AnalysisError> {
        let text = text.trim();
        let (intervals, unit) = match text.split_once(char::is_whitespace) {
            Some((intervals, unit)) => (intervals, Unit::parse(unit)?),
            None => (text, Unit::dimensionless()),
        };

        let bound = |s: &str| -> Result<Quantity, AnalysisError> {
            s.trim()
                .parse::<f64>()
                .map(|v| Quantity::new(v, unit.clone()))
                .map_err(|_| AnalysisError::InvalidRegion(format!("'{s}' is not a number in '{text}'")))
        };

        let subregions = intervals
            .split(',')
            .map(|interval| {
                let (lo, hi) = interval.split_once(':').ok_or_else(|| {
                    AnalysisError::InvalidRegion(format!(
                        "expected 'lower:upper', got '{interval}' in '{text}'"
                    ))
                })?;
                Ok((bound(lo)?, bound(hi)?))
            })
            .collect::<Result<Vec<_>, AnalysisError>>()?;

        SpectralRegion::from_subregions(subregions)
    }
}

impl FromStr for SpectralRegion {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpectralRegion::parse(s)
    }
}

impl fmt::Display for SpectralRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (lower, upper)) in self.subregions.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}:{}", lower.value, upper.value)?;
        }
        let unit = self.subregions[0].0.unit.to_string();
        if !unit.is_empty() {
            write!(f, " {unit}")?;
        }
        Ok(())
    }
}
