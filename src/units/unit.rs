use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Base dimensions
// ---------------------------------------------------------------------------

/// Number of base dimensions tracked by [`Unit`]: length, mass, time, count.
pub const BASE_DIMENSIONS: usize = 4;

/// Exponents over `[length, mass, time, count]`.
pub type Dimensions = [i8; BASE_DIMENSIONS];

const DIMENSIONLESS: Dimensions = [0, 0, 0, 0];
const LENGTH: Dimensions = [1, 0, 0, 0];
const MASS: Dimensions = [0, 1, 0, 0];
const TIME: Dimensions = [0, 0, 1, 0];
const FREQUENCY: Dimensions = [0, 0, -1, 0];
const ENERGY: Dimensions = [2, 1, -2, 0];
const POWER: Dimensions = [2, 1, -3, 0];
// W m^-2 Hz^-1
const SPECTRAL_FLUX_DENSITY: Dimensions = [0, 1, -2, 0];
const COUNT: Dimensions = [0, 0, 0, 1];

/// Relative tolerance used when comparing unit scales.
const SCALE_TOLERANCE: f64 = 1e-12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Unknown unit symbol: '{0}'")]
    Unknown(String),
    #[error("Malformed unit expression '{expr}': {reason}")]
    Malformed { expr: String, reason: String },
    #[error("Units '{from}' and '{to}' are not convertible")]
    Incompatible { from: String, to: String },
}

// ---------------------------------------------------------------------------
// Unit
// ---------------------------------------------------------------------------

/// A physical unit: a scale relative to the SI base units and a set of
/// dimension exponents.
///
/// Two units are equal when they have the same dimensions and the same
/// scale; the display symbol does not take part in the comparison.
#[derive(Debug, Clone)]
pub struct Unit {
    scale: f64,
    dims: Dimensions,
    symbol: String,
}

impl Unit {
    fn named(symbol: &str, scale: f64, dims: Dimensions) -> Self {
        Unit {
            scale,
            dims,
            symbol: symbol.to_string(),
        }
    }

    pub fn dimensionless() -> Self {
        Unit::named("", 1.0, DIMENSIONLESS)
    }

    pub fn angstrom() -> Self {
        Unit::named("Angstrom", 1e-10, LENGTH)
    }

    pub fn nanometer() -> Self {
        Unit::named("nm", 1e-9, LENGTH)
    }

    pub fn micron() -> Self {
        Unit::named("um", 1e-6, LENGTH)
    }

    pub fn hertz() -> Self {
        Unit::named("Hz", 1.0, FREQUENCY)
    }

    pub fn jansky() -> Self {
        Unit::named("Jy", 1e-26, SPECTRAL_FLUX_DENSITY)
    }

    pub fn count() -> Self {
        Unit::named("ct", 1.0, COUNT)
    }

    /// Parse a unit expression such as `"Angstrom"`, `"1/cm"` or
    /// `"erg / s / cm^2 / Angstrom"`.
    ///
    /// Factors are separated by whitespace or `*`; a `/` divides by the
    /// factor that follows it only. Exponents are written `^n` or `**n`.
    pub fn parse(text: &str) -> Result<Self, UnitError> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "1" || trimmed.eq_ignore_ascii_case("dimensionless") {
            return Ok(Unit::dimensionless());
        }

        let malformed = |reason: &str| UnitError::Malformed {
            expr: trimmed.to_string(),
            reason: reason.to_string(),
        };

        let spaced = trimmed
            .replace("**", "^")
            .replace('*', " * ")
            .replace('/', " / ");

        let mut unit = Unit::dimensionless();
        let mut divide_next = false;
        let mut expect_factor = true;

        for token in spaced.split_whitespace() {
            match token {
                "*" | "/" => {
                    if expect_factor {
                        return Err(malformed("operator without a preceding factor"));
                    }
                    divide_next = token == "/";
                    expect_factor = true;
                }
                factor => {
                    let factor = parse_factor(factor)?;
                    unit = if divide_next {
                        unit.divide(&factor)?
                    } else {
                        unit.multiply(&factor)?
                    };
                    divide_next = false;
                    expect_factor = false;
                }
            }
        }

        if expect_factor {
            return Err(malformed("expression ends with an operator"));
        }

        unit.symbol = trimmed.to_string();
        Ok(unit)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dims == DIMENSIONLESS
    }

    /// `true` for the plain dimensionless unit (no scale), e.g. the unit of
    /// a bare number.
    pub fn is_unscaled_dimensionless(&self) -> bool {
        self.is_dimensionless() && scales_match(self.scale, 1.0)
    }

    /// Whether values in `self` can be expressed in `other`.
    pub fn is_convertible_to(&self, other: &Unit) -> bool {
        self.dims == other.dims
    }

    /// Factor `f` such that `x self == (x * f) other`.
    pub fn conversion_factor(&self, other: &Unit) -> Result<f64, UnitError> {
        if !self.is_convertible_to(other) {
            return Err(UnitError::Incompatible {
                from: self.to_string(),
                to: other.to_string(),
            });
        }
        Ok(self.scale / other.scale)
    }

    /// Product of two units. Fails when a dimension exponent leaves the
    /// `i8` range.
    pub fn multiply(&self, other: &Unit) -> Result<Unit, UnitError> {
        let symbol = match (self.symbol.is_empty(), other.symbol.is_empty()) {
            (true, _) => other.symbol.clone(),
            (_, true) => self.symbol.clone(),
            _ => format!("{} {}", self.symbol, other.symbol),
        };
        let dims = combine_dims(self.dims, other.dims, i8::checked_add, &symbol)?;
        Ok(Unit {
            scale: self.scale * other.scale,
            dims,
            symbol,
        })
    }

    pub fn divide(&self, other: &Unit) -> Result<Unit, UnitError> {
        let denominator = if other.symbol.contains(' ') {
            format!("({})", other.symbol)
        } else {
            other.symbol.clone()
        };
        let symbol = match (self.symbol.is_empty(), other.symbol.is_empty()) {
            (_, true) => self.symbol.clone(),
            (true, false) => format!("1 / {denominator}"),
            (false, false) => format!("{} / {denominator}", self.symbol),
        };
        let dims = combine_dims(self.dims, other.dims, i8::checked_sub, &symbol)?;
        Ok(Unit {
            scale: self.scale / other.scale,
            dims,
            symbol,
        })
    }

    pub fn powi(&self, exponent: i8) -> Result<Unit, UnitError> {
        let symbol = match exponent {
            _ if self.symbol.is_empty() => String::new(),
            1 => self.symbol.clone(),
            n => format!("{}^{n}", self.symbol),
        };
        let mut dims = self.dims;
        for d in dims.iter_mut() {
            *d = d
                .checked_mul(exponent)
                .ok_or_else(|| exponent_out_of_range(&symbol))?;
        }
        Ok(Unit {
            scale: self.scale.powi(exponent as i32),
            dims,
            symbol,
        })
    }
}

fn combine_dims(
    lhs: Dimensions,
    rhs: Dimensions,
    op: fn(i8, i8) -> Option<i8>,
    expr: &str,
) -> Result<Dimensions, UnitError> {
    let mut dims = DIMENSIONLESS;
    for ((d, a), b) in dims.iter_mut().zip(lhs).zip(rhs) {
        *d = op(a, b).ok_or_else(|| exponent_out_of_range(expr))?;
    }
    Ok(dims)
}

fn exponent_out_of_range(expr: &str) -> UnitError {
    UnitError::Malformed {
        expr: expr.to_string(),
        reason: "dimension exponent out of range".to_string(),
    }
}

fn scales_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= SCALE_TOLERANCE * a.abs().max(b.abs())
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims && scales_match(self.scale, other.scale)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.symbol.is_empty() && !self.is_unscaled_dimensionless() {
            write!(f, "{:e}", self.scale)
        } else {
            write!(f, "{}", self.symbol)
        }
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::parse(s)
    }
}

impl Default for Unit {
    fn default() -> Self {
        Unit::dimensionless()
    }
}

// ---------------------------------------------------------------------------
// Symbol table
// ---------------------------------------------------------------------------

fn parse_factor(token: &str) -> Result<Unit, UnitError> {
    let (name, exponent) = match token.split_once('^') {
        Some((name, exp)) => {
            let exp = exp.parse::<i8>().map_err(|_| UnitError::Malformed {
                expr: token.to_string(),
                reason: format!("'{exp}' is not an integer exponent"),
            })?;
            (name, exp)
        }
        None => (token, 1),
    };

    let base = lookup(name).ok_or_else(|| UnitError::Unknown(name.to_string()))?;
    base.powi(exponent)
}

fn lookup(name: &str) -> Option<Unit> {
    let (scale, dims) = match name {
        "1" => (1.0, DIMENSIONLESS),
        // length
        "m" => (1.0, LENGTH),
        "cm" => (1e-2, LENGTH),
        "mm" => (1e-3, LENGTH),
        "um" | "µm" | "micron" => (1e-6, LENGTH),
        "nm" => (1e-9, LENGTH),
        "Angstrom" | "angstrom" | "AA" | "Å" => (1e-10, LENGTH),
        // time / frequency
        "s" => (1.0, TIME),
        "Hz" => (1.0, FREQUENCY),
        "kHz" => (1e3, FREQUENCY),
        "MHz" => (1e6, FREQUENCY),
        "GHz" => (1e9, FREQUENCY),
        "THz" => (1e12, FREQUENCY),
        // mass
        "kg" => (1.0, MASS),
        "g" => (1e-3, MASS),
        // energy / power
        "J" => (1.0, ENERGY),
        "erg" => (1e-7, ENERGY),
        "W" => (1.0, POWER),
        // flux density
        "Jy" => (1e-26, SPECTRAL_FLUX_DENSITY),
        "mJy" => (1e-29, SPECTRAL_FLUX_DENSITY),
        "uJy" | "µJy" => (1e-32, SPECTRAL_FLUX_DENSITY),
        // detector counts
        "ct" | "count" | "counts" | "adu" | "electron" => (1.0, COUNT),
        _ => return None,
    };
    Some(Unit::named(name, scale, dims))
}
