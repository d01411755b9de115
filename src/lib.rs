//! Line flux, equivalent width and signal-to-noise measures for
//! one-dimensional spectra.
//!
//! Every measure takes a [`Spectrum`], a [`RegionSelection`] (whole
//! spectrum, one region, or a list of regions measured independently) and
//! returns unit-tagged results shaped like the selection.
//!
//! ```no_run
//! use spectral_measures::{line_flux, RegionSelection, SpectralRegion, Spectrum, Unit};
//!
//! let spectrum = Spectrum::from_values(
//!     vec![6550.0, 6551.0, 6552.0],
//!     Unit::angstrom(),
//!     vec![1.0, 4.0, 1.0],
//!     Unit::count(),
//! )?;
//! let region = SpectralRegion::parse("6550:6552 Angstrom")?;
//! let flux = line_flux(&spectrum, &RegionSelection::One(region))?;
//! # Ok::<(), spectral_measures::AnalysisError>(())
//! ```

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod region;
pub mod report;
pub mod units;

pub use analysis::{
    equivalent_width, line_flux, snr, Continuum, ContinuumModel, Dispatched, MeasureKind,
    PolynomialContinuum, RegionSelection,
};
pub use data::model::{MetadataValue, SpectralDataset, Spectrum};
pub use error::AnalysisError;
pub use region::SpectralRegion;
pub use units::{Measure, Quantity, QuantityArray, Unit, UnitError};
