use log::warn;

use super::dispatch::{dispatch, Dispatched, RegionSelection};
use super::flux::restrict;
use crate::data::model::Spectrum;
use crate::error::AnalysisError;
use crate::region::SpectralRegion;
use crate::units::Measure;

/// Mean signal-to-noise ratio, `mean(flux / uncertainty)`, over the whole
/// spectrum or per region.
///
/// The mean runs along the spectral axis only, so a batched flux of shape
/// `[rows, n]` gives one value per row. The spectrum must carry an
/// uncertainty; a zero uncertainty anywhere in the evaluated samples is an
/// error rather than an infinite ratio.
pub fn snr(
    spectrum: &Spectrum,
    region: &RegionSelection,
) -> Result<Dispatched<Measure>, AnalysisError> {
    dispatch(spectrum, region, compute_snr)
}

fn compute_snr(spectrum: &Spectrum, region: Option<&SpectralRegion>) -> Result<Measure, AnalysisError> {
    let unit = spectrum
        .uncertainty()
        .ok_or(AnalysisError::MissingUncertainty)?
        .unit()
        .clone();

    let calc = restrict(spectrum, region)?;
    let uncertainty = calc
        .uncertainty()
        .ok_or(AnalysisError::MissingUncertainty)?
        .with_unit(unit);

    for (row, lane) in uncertainty.lanes().enumerate() {
        if let Some(sample) = lane.iter().position(|&u| u == 0.0) {
            return Err(AnalysisError::ZeroUncertainty { row, sample });
        }
    }

    let ratio = calc.flux().divide(&uncertainty)?;
    if ratio.is_empty() {
        warn!("SNR over an empty region is NaN");
    }

    // `mean` is None for an empty lane
    Ok(ratio.reduce_last_axis(ratio.unit().clone(), |lane| {
        lane.mean().unwrap_or(f64::NAN)
    }))
}
