use std::fmt;
use std::sync::Arc;

use crate::data::model::Spectrum;
use crate::error::AnalysisError;
use crate::units::{Quantity, QuantityArray, Unit};

/// Anything that can be evaluated at every sample of a spectral axis.
pub trait ContinuumModel: Send + Sync {
    fn evaluate(&self, spectral_axis: &QuantityArray) -> Result<QuantityArray, AnalysisError>;
}

impl<F> ContinuumModel for F
where
    F: Fn(&QuantityArray) -> Result<QuantityArray, AnalysisError> + Send + Sync,
{
    fn evaluate(&self, spectral_axis: &QuantityArray) -> Result<QuantityArray, AnalysisError> {
        self(spectral_axis)
    }
}

/// Baseline flux used to normalise a spectrum.
///
/// The default is the dimensionless constant 1, which stands for "no
/// continuum supplied" and is replaced by 1 in the flux unit at use.
#[derive(Clone)]
pub enum Continuum {
    Constant(Quantity),
    Evaluable(Arc<dyn ContinuumModel>),
}

impl Continuum {
    pub fn model<M: ContinuumModel + 'static>(model: M) -> Self {
        Continuum::Evaluable(Arc::new(model))
    }

    /// Evaluate a model continuum on the full spectral axis. Constants pass
    /// through unchanged.
    pub(crate) fn resolve(&self, spectrum: &Spectrum) -> Result<ResolvedContinuum, AnalysisError> {
        match self {
            Continuum::Constant(q) => Ok(ResolvedContinuum::Constant(q.clone())),
            Continuum::Evaluable(model) => Ok(ResolvedContinuum::PerSample(
                model.evaluate(spectrum.spectral_axis())?,
            )),
        }
    }
}

impl Default for Continuum {
    fn default() -> Self {
        Continuum::Constant(Quantity::dimensionless(1.0))
    }
}

impl fmt::Debug for Continuum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Continuum::Constant(q) => f.debug_tuple("Constant").field(q).finish(),
            Continuum::Evaluable(_) => f.write_str("Evaluable(..)"),
        }
    }
}

/// A continuum after model evaluation.
#[derive(Debug, Clone)]
pub(crate) enum ResolvedContinuum {
    Constant(Quantity),
    PerSample(QuantityArray),
}

impl ResolvedContinuum {
    /// Swap the "no continuum" sentinel for 1 in `flux_unit`.
    pub(crate) fn or_unit_of(&self, flux_unit: &Unit) -> ResolvedContinuum {
        match self {
            ResolvedContinuum::Constant(q) if is_sentinel(q) => {
                ResolvedContinuum::Constant(Quantity::new(1.0, flux_unit.clone()))
            }
            other => other.clone(),
        }
    }

    pub(crate) fn normalize(&self, spectrum: &Spectrum) -> Result<Spectrum, AnalysisError> {
        match self {
            ResolvedContinuum::Constant(q) => spectrum.divide_by_quantity(q),
            ResolvedContinuum::PerSample(values) => spectrum.divide_by_samples(values),
        }
    }
}

fn is_sentinel(q: &Quantity) -> bool {
    q.value == 1.0 && q.unit.is_unscaled_dimensionless()
}

// ---------------------------------------------------------------------------
// PolynomialContinuum
// ---------------------------------------------------------------------------

/// `c0 + c1·x + c2·x² + …`, with `x` the spectral axis expressed in
/// `axis_unit` and the result in `flux_unit`.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialContinuum {
    pub coefficients: Vec<f64>,
    pub axis_unit: Unit,
    pub flux_unit: Unit,
}

impl PolynomialContinuum {
    pub fn new(coefficients: Vec<f64>, axis_unit: Unit, flux_unit: Unit) -> Self {
        PolynomialContinuum {
            coefficients,
            axis_unit,
            flux_unit,
        }
    }

    fn eval_at(&self, x: f64) -> f64 {
        // Horner
        self.coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
    }
}

impl ContinuumModel for PolynomialContinuum {
    fn evaluate(&self, spectral_axis: &QuantityArray) -> Result<QuantityArray, AnalysisError> {
        let axis = spectral_axis.to(&self.axis_unit)?;
        QuantityArray::from_array(axis.data().mapv(|x| self.eval_at(x)), self.flux_unit.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polynomial_evaluates_in_its_axis_unit() {
        let poly = PolynomialContinuum::new(vec![1.0, 2.0], Unit::nanometer(), Unit::count());
        let axis = QuantityArray::new(vec![10.0, 20.0], Unit::angstrom());
        let c = poly.evaluate(&axis).unwrap();
        assert_eq!(c.unit(), &Unit::count());
        assert!((c.values()[0] - 3.0).abs() < 1e-12);
        assert!((c.values()[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn polynomial_rejects_incompatible_axis() {
        let poly = PolynomialContinuum::new(vec![1.0], Unit::nanometer(), Unit::count());
        let axis = QuantityArray::new(vec![1.0], Unit::hertz());
        assert!(matches!(poly.evaluate(&axis), Err(AnalysisError::Unit(_))));
    }

    #[test]
    fn sentinel_is_replaced_by_flux_unit() {
        let resolved = ResolvedContinuum::Constant(Quantity::dimensionless(1.0));
        match resolved.or_unit_of(&Unit::jansky()) {
            ResolvedContinuum::Constant(q) => assert_eq!(q, Quantity::new(1.0, Unit::jansky())),
            other => panic!("unexpected {other:?}"),
        }

        let explicit = ResolvedContinuum::Constant(Quantity::new(1.0, Unit::count()));
        match explicit.or_unit_of(&Unit::jansky()) {
            ResolvedContinuum::Constant(q) => assert_eq!(q.unit, Unit::count()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn closures_are_models() {
        let flat = Continuum::model(|axis: &QuantityArray| {
            Ok::<_, AnalysisError>(QuantityArray::new(vec![2.0; axis.len()], Unit::count()))
        });
        let sp = Spectrum::from_values(vec![1.0, 2.0], Unit::angstrom(), vec![4.0, 6.0], Unit::count())
            .unwrap();
        let normalized = flat.resolve(&sp).unwrap().normalize(&sp).unwrap();
        assert_eq!(normalized.flux().values(), &[2.0, 3.0]);
    }
}
