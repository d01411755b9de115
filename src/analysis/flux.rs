use std::borrow::Cow;

use log::{debug, warn};

use super::continuum::{Continuum, ResolvedContinuum};
use super::dispatch::{dispatch, Dispatched, RegionSelection};
use crate::data::model::Spectrum;
use crate::error::AnalysisError;
use crate::region::SpectralRegion;
use crate::units::Measure;

/// Integrated flux of the spectrum, optionally within region(s).
///
/// The result is in flux unit × spectral-axis unit.
pub fn line_flux(
    spectrum: &Spectrum,
    region: &RegionSelection,
) -> Result<Dispatched<Measure>, AnalysisError> {
    dispatch(spectrum, region, compute_line_flux)
}

/// Naive equivalent width, `Δλ − ∫ flux / continuum dλ`, in spectral-axis
/// units.
///
/// A model continuum is evaluated once on the full spectral axis. The
/// default continuum means "none given" and is taken as 1 in the flux unit.
pub fn equivalent_width(
    spectrum: &Spectrum,
    continuum: &Continuum,
    region: &RegionSelection,
) -> Result<Dispatched<Measure>, AnalysisError> {
    let continuum = continuum.resolve(spectrum)?;
    dispatch(spectrum, region, |sp, r| {
        compute_equivalent_width(sp, &continuum, r)
    })
}

pub(crate) fn restrict<'a>(
    spectrum: &'a Spectrum,
    region: Option<&SpectralRegion>,
) -> Result<Cow<'a, Spectrum>, AnalysisError> {
    match region {
        Some(region) => Ok(Cow::Owned(region.extract(spectrum)?)),
        None => Ok(Cow::Borrowed(spectrum)),
    }
}

// Flux samples 1..M of the restricted spectrum are weighted by the spacing
// of the *unrestricted* axis, dx[0..M-1]. This only lines up when the
// extraction keeps the original sampling grid.
fn compute_line_flux(
    spectrum: &Spectrum,
    region: Option<&SpectralRegion>,
) -> Result<Measure, AnalysisError> {
    let calc = restrict(spectrum, region)?;
    let dx = spectrum.spectral_axis().diff();
    let flux = calc.flux();

    let terms = flux.len().saturating_sub(1);
    if terms != dx.len() {
        debug!(
            "line flux pairs {terms} flux samples with {} axis steps; summing {}",
            dx.len(),
            terms.min(dx.len())
        );
    }
    if flux.is_empty() {
        warn!("line flux over an empty region is zero");
    }

    let unit = flux.unit().multiply(dx.unit())?;
    Ok(flux.reduce_last_axis(unit, |lane| {
        lane.iter()
            .skip(1)
            .zip(dx.data())
            .map(|(f, d)| f * d)
            .sum()
    }))
}

fn compute_equivalent_width(
    spectrum: &Spectrum,
    continuum: &ResolvedContinuum,
    region: Option<&SpectralRegion>,
) -> Result<Measure, AnalysisError> {
    let calc = restrict(spectrum, region)?;
    let continuum = continuum.or_unit_of(calc.flux().unit());

    let axis = calc.spectral_axis();
    let last_index = axis.len().checked_sub(1);
    let (first, last) = match (axis.get(0), last_index.and_then(|i| axis.get(i))) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(AnalysisError::EmptyRegion),
    };
    let width = last.checked_sub(&first)?;

    let normalized = continuum.normalize(spectrum)?;
    let line_flux = compute_line_flux(&normalized, region)?;

    line_flux.try_map(|term| Ok(width.checked_sub(&term)?))
}
