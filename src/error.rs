use thiserror::Error;

use crate::units::UnitError;

/// Failures raised by the spectrum model, region extraction and the
/// analysis routines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error(transparent)]
    Unit(#[from] UnitError),
    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    Shape {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("Spectral axis is not strictly monotonic at sample {0}")]
    NonMonotonicAxis(usize),
    #[error("Invalid region: {0}")]
    InvalidRegion(String),
    #[error("Spectrum has no uncertainty; SNR is undefined")]
    MissingUncertainty,
    #[error("Zero uncertainty at sample {sample} of row {row}; SNR is undefined")]
    ZeroUncertainty { row: usize, sample: usize },
    #[error("Region extracted no samples; equivalent width is undefined")]
    EmptyRegion,
}
