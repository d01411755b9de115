use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::AnalysisError;
use crate::units::{Quantity, QuantityArray, Unit};

// ---------------------------------------------------------------------------
// MetadataValue – a single metadata cell attached to a spectrum
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value (object name, exposure, spaxel id…).
/// Selections keep values in a `BTreeSet`, so `MetadataValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date string kept as text.
    Date(String),
    Null,
}

impl MetadataValue {
    fn rank(&self) -> u8 {
        match self {
            MetadataValue::Null => 0,
            MetadataValue::Bool(_) => 1,
            MetadataValue::Integer(_) => 2,
            MetadataValue::Float(_) => 3,
            MetadataValue::String(_) => 4,
            MetadataValue::Date(_) => 5,
        }
    }

    /// Interpret the value as text, for unit columns stored as metadata.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => Some(s),
            _ => None,
        }
    }
}

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use MetadataValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) | (Date(a), Date(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.4}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Spectrum
// ---------------------------------------------------------------------------

/// A one-dimensional spectrum: a strictly monotonic spectral axis, a flux
/// array whose last axis matches it, and an optional uncertainty of the same
/// shape as the flux.
///
/// The flux may carry a leading batch axis (several spaxels sharing one
/// spectral axis). A `Spectrum` is never mutated by the analysis routines;
/// extraction and continuum division build new spectra.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    spectral_axis: QuantityArray,
    flux: QuantityArray,
    uncertainty: Option<QuantityArray>,
    /// Free-form metadata columns: column_name → value.
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Spectrum {
    pub fn new(
        spectral_axis: QuantityArray,
        flux: QuantityArray,
        uncertainty: Option<QuantityArray>,
    ) -> Result<Self, AnalysisError> {
        if spectral_axis.batch().is_some() {
            return Err(AnalysisError::Shape {
                expected: vec![spectral_axis.len()],
                found: spectral_axis.shape().to_vec(),
            });
        }
        if flux.len() != spectral_axis.len() {
            return Err(AnalysisError::Shape {
                expected: vec![spectral_axis.len()],
                found: flux.shape().to_vec(),
            });
        }
        if let Some(unc) = &uncertainty {
            if unc.shape() != flux.shape() {
                return Err(AnalysisError::Shape {
                    expected: flux.shape().to_vec(),
                    found: unc.shape().to_vec(),
                });
            }
        }
        check_monotonic(&spectral_axis.values())?;

        Ok(Spectrum {
            spectral_axis,
            flux,
            uncertainty,
            metadata: BTreeMap::new(),
        })
    }

    /// Single spectrum from plain vectors.
    pub fn from_values(
        axis: Vec<f64>,
        axis_unit: Unit,
        flux: Vec<f64>,
        flux_unit: Unit,
    ) -> Result<Self, AnalysisError> {
        Spectrum::new(
            QuantityArray::new(axis, axis_unit),
            QuantityArray::new(flux, flux_unit),
            None,
        )
    }

    /// Attach an uncertainty array. It must match the flux shape.
    pub fn with_uncertainty(self, uncertainty: QuantityArray) -> Result<Self, AnalysisError> {
        let metadata = self.metadata;
        let mut spectrum = Spectrum::new(self.spectral_axis, self.flux, Some(uncertainty))?;
        spectrum.metadata = metadata;
        Ok(spectrum)
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, MetadataValue>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn spectral_axis(&self) -> &QuantityArray {
        &self.spectral_axis
    }

    pub fn flux(&self) -> &QuantityArray {
        &self.flux
    }

    pub fn uncertainty(&self) -> Option<&QuantityArray> {
        self.uncertainty.as_ref()
    }

    /// Number of spectral samples.
    pub fn len(&self) -> usize {
        self.spectral_axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectral_axis.is_empty()
    }

    /// New spectrum holding only the given samples, in the given order.
    /// Batch rows, uncertainty and metadata follow the selection.
    pub fn select_samples(&self, indices: &[usize]) -> Spectrum {
        Spectrum {
            spectral_axis: self.spectral_axis.select(indices),
            flux: self.flux.select(indices),
            uncertainty: self.uncertainty.as_ref().map(|u| u.select(indices)),
            metadata: self.metadata.clone(),
        }
    }

    /// `self / q`: flux and uncertainty divided by a constant.
    pub fn divide_by_quantity(&self, q: &Quantity) -> Result<Spectrum, AnalysisError> {
        Ok(Spectrum {
            spectral_axis: self.spectral_axis.clone(),
            flux: self.flux.divide_scalar(q)?,
            uncertainty: self
                .uncertainty
                .as_ref()
                .map(|u| u.divide_scalar(q))
                .transpose()?,
            metadata: self.metadata.clone(),
        })
    }

    /// `self / per_sample`: every lane divided element-wise by an array
    /// aligned with the spectral axis.
    pub fn divide_by_samples(&self, per_sample: &QuantityArray) -> Result<Spectrum, AnalysisError> {
        if per_sample.batch().is_some() || per_sample.len() != self.len() {
            return Err(AnalysisError::Shape {
                expected: vec![self.len()],
                found: per_sample.shape().to_vec(),
            });
        }
        Ok(Spectrum {
            spectral_axis: self.spectral_axis.clone(),
            flux: self.flux.divide(per_sample)?,
            uncertainty: match &self.uncertainty {
                Some(u) => Some(u.divide(per_sample)?),
                None => None,
            },
            metadata: self.metadata.clone(),
        })
    }
}

fn check_monotonic(axis: &[f64]) -> Result<(), AnalysisError> {
    let Some(first) = axis.windows(2).next() else {
        return Ok(());
    };
    let ascending = first[1] > first[0];
    for (i, w) in axis.windows(2).enumerate() {
        let ok = if ascending { w[1] > w[0] } else { w[1] < w[0] };
        if !ok {
            return Err(AnalysisError::NonMonotonicAxis(i + 1));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SpectralDataset – a loaded collection of spectra
// ---------------------------------------------------------------------------

/// The parsed contents of one input file.
#[derive(Debug, Clone)]
pub struct SpectralDataset {
    pub spectra: Vec<Spectrum>,
    /// Sorted union of metadata column names across all spectra.
    pub column_names: Vec<String>,
}

impl SpectralDataset {
    pub fn from_spectra(spectra: Vec<Spectrum>) -> Self {
        let column_names = spectra
            .iter()
            .flat_map(|sp| sp.metadata.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        SpectralDataset {
            spectra,
            column_names,
        }
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum() -> Spectrum {
        Spectrum::from_values(
            vec![1.0, 2.0, 3.0, 4.0],
            Unit::angstrom(),
            vec![5.0, 6.0, 7.0, 8.0],
            Unit::count(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = Spectrum::from_values(vec![1.0, 2.0], Unit::angstrom(), vec![1.0], Unit::count());
        assert!(matches!(err, Err(AnalysisError::Shape { .. })));
    }

    #[test]
    fn rejects_non_monotonic_axis() {
        let err = Spectrum::from_values(
            vec![1.0, 3.0, 2.0],
            Unit::angstrom(),
            vec![0.0; 3],
            Unit::count(),
        );
        assert_eq!(err, Err(AnalysisError::NonMonotonicAxis(2)));

        let flat = Spectrum::from_values(vec![1.0, 1.0], Unit::angstrom(), vec![0.0; 2], Unit::count());
        assert_eq!(flat, Err(AnalysisError::NonMonotonicAxis(1)));
    }

    #[test]
    fn accepts_descending_axis() {
        let sp = Spectrum::from_values(
            vec![4000.0, 3998.0, 3996.0],
            Unit::parse("1/cm").unwrap(),
            vec![0.1, 0.2, 0.3],
            Unit::dimensionless(),
        );
        assert!(sp.is_ok());
    }

    #[test]
    fn uncertainty_shape_must_match_flux() {
        let err = spectrum().with_uncertainty(QuantityArray::new(vec![1.0; 3], Unit::count()));
        assert!(matches!(err, Err(AnalysisError::Shape { .. })));
    }

    #[test]
    fn select_samples_restricts_every_array() {
        let sp = spectrum()
            .with_uncertainty(QuantityArray::new(vec![0.5; 4], Unit::count()))
            .unwrap();
        let sub = sp.select_samples(&[1, 2]);
        assert_eq!(sub.spectral_axis().values(), &[2.0, 3.0]);
        assert_eq!(sub.flux().values(), &[6.0, 7.0]);
        assert_eq!(sub.uncertainty().unwrap().values(), &[0.5, 0.5]);
    }

    #[test]
    fn divide_by_samples_checks_alignment() {
        let sp = spectrum();
        let continuum = QuantityArray::new(vec![5.0, 6.0, 7.0, 8.0], Unit::count());
        let normalized = sp.divide_by_samples(&continuum).unwrap();
        assert_eq!(normalized.flux().values(), &[1.0; 4]);
        assert!(normalized.flux().unit().is_unscaled_dimensionless());

        let short = QuantityArray::new(vec![1.0; 3], Unit::count());
        assert!(matches!(sp.divide_by_samples(&short), Err(AnalysisError::Shape { .. })));
    }

    #[test]
    fn metadata_ordering_groups_by_kind() {
        let mut set = BTreeSet::new();
        set.insert(MetadataValue::String("b".into()));
        set.insert(MetadataValue::Integer(3));
        set.insert(MetadataValue::Null);
        set.insert(MetadataValue::String("a".into()));
        let ordered: Vec<String> = set.iter().map(|v| v.to_string()).collect();
        assert_eq!(ordered, vec!["<null>", "3", "a", "b"]);
    }
}
