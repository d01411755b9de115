//! Analysis layer: region dispatch and the three spectral measures.
//!
//! Architecture:
//! ```text
//!   Spectrum + RegionSelection
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ dispatch  │  whole / one region / each region in order
//!   └──────────┘
//!        │  Region::extract
//!        ▼
//!   ┌──────────┐   ┌────────────────────┐   ┌─────┐
//!   │ line_flux │◄──│ equivalent_width    │   │ snr │
//!   └──────────┘   │ (continuum-normed)  │   └─────┘
//!                  └────────────────────┘
//!        │
//!        ▼
//!   Dispatched<Measure>   unit-tagged scalar or per-row array
//! ```

pub mod continuum;
pub mod dispatch;
pub mod flux;
pub mod snr;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::model::Spectrum;
use crate::error::AnalysisError;
use crate::units::Measure;

pub use continuum::{Continuum, ContinuumModel, PolynomialContinuum};
pub use dispatch::{dispatch, Dispatched, RegionSelection};
pub use flux::{equivalent_width, line_flux};
pub use snr::snr;

/// The measures that can be requested by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasureKind {
    LineFlux,
    EquivalentWidth,
    Snr,
}

impl MeasureKind {
    pub const ALL: [MeasureKind; 3] = [
        MeasureKind::LineFlux,
        MeasureKind::EquivalentWidth,
        MeasureKind::Snr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MeasureKind::LineFlux => "line-flux",
            MeasureKind::EquivalentWidth => "equivalent-width",
            MeasureKind::Snr => "snr",
        }
    }

    /// Run this measure. `continuum` is only used by the equivalent width.
    pub fn compute(
        self,
        spectrum: &Spectrum,
        continuum: &Continuum,
        region: &RegionSelection,
    ) -> Result<Dispatched<Measure>, AnalysisError> {
        match self {
            MeasureKind::LineFlux => line_flux(spectrum, region),
            MeasureKind::EquivalentWidth => equivalent_width(spectrum, continuum, region),
            MeasureKind::Snr => snr(spectrum, region),
        }
    }
}

impl fmt::Display for MeasureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MeasureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MeasureKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown measure '{s}' (expected line-flux, equivalent-width or snr)")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_names_round_trip() {
        for kind in MeasureKind::ALL {
            assert_eq!(kind.name().parse::<MeasureKind>().unwrap(), kind);
        }
        assert!("centroid".parse::<MeasureKind>().is_err());
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&MeasureKind::EquivalentWidth).unwrap();
        assert_eq!(json, "\"equivalent-width\"");
    }
}
