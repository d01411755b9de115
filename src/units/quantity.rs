use std::fmt;

use super::unit::{Unit, UnitError};

/// A magnitude tagged with a physical [`Unit`].
///
/// Every operation is fallible. Addition and subtraction express the result
/// in the left operand's unit; multiplication and division combine the units.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Quantity { value, unit }
    }

    pub fn dimensionless(value: f64) -> Self {
        Quantity::new(value, Unit::dimensionless())
    }

    /// Express the quantity in `unit`.
    pub fn to(&self, unit: &Unit) -> Result<Quantity, UnitError> {
        Ok(Quantity::new(self.value_in(unit)?, unit.clone()))
    }

    /// Magnitude of the quantity when expressed in `unit`.
    pub fn value_in(&self, unit: &Unit) -> Result<f64, UnitError> {
        Ok(self.value * self.unit.conversion_factor(unit)?)
    }

    pub fn checked_add(&self, rhs: &Quantity) -> Result<Quantity, UnitError> {
        Ok(Quantity::new(self.value + rhs.value_in(&self.unit)?, self.unit.clone()))
    }

    pub fn checked_sub(&self, rhs: &Quantity) -> Result<Quantity, UnitError> {
        Ok(Quantity::new(self.value - rhs.value_in(&self.unit)?, self.unit.clone()))
    }

    pub fn checked_mul(&self, rhs: &Quantity) -> Result<Quantity, UnitError> {
        Ok(Quantity::new(self.value * rhs.value, self.unit.multiply(&rhs.unit)?))
    }

    pub fn checked_div(&self, rhs: &Quantity) -> Result<Quantity, UnitError> {
        Ok(Quantity::new(self.value / rhs.value, self.unit.divide(&rhs.unit)?))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.unit.to_string();
        if unit.is_empty() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {unit}", self.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtraction_converts_to_left_unit() {
        let a = Quantity::new(100.0, Unit::angstrom());
        let b = Quantity::new(2.0, Unit::nanometer());
        let diff = a.checked_sub(&b).unwrap();
        assert_eq!(diff.unit, Unit::angstrom());
        assert!((diff.value - 80.0).abs() < 1e-9);
    }

    #[test]
    fn addition_fails_closed_on_incompatible_units() {
        let a = Quantity::new(1.0, Unit::angstrom());
        let b = Quantity::new(1.0, Unit::count());
        assert!(matches!(a.checked_add(&b), Err(UnitError::Incompatible { .. })));
    }

    #[test]
    fn product_and_ratio_carry_units() {
        let flux = Quantity::new(10.0, Unit::count());
        let width = Quantity::new(2.0, Unit::angstrom());
        let product = flux.checked_mul(&width).unwrap();
        assert_eq!(product.value, 20.0);
        assert_eq!(product.unit, Unit::count().multiply(&Unit::angstrom()).unwrap());

        let ratio = flux.checked_div(&Quantity::new(5.0, Unit::count())).unwrap();
        assert_eq!(ratio.value, 2.0);
        assert!(ratio.unit.is_unscaled_dimensionless());
    }

    #[test]
    fn display_includes_symbol() {
        assert_eq!(Quantity::new(1.5, Unit::angstrom()).to_string(), "1.5 Angstrom");
        assert_eq!(Quantity::dimensionless(3.0).to_string(), "3");
    }

    #[test]
    fn product_with_out_of_range_exponent_fails() {
        let big = Quantity::new(2.0, Unit::parse("m^100").unwrap());
        assert!(matches!(big.checked_mul(&big), Err(UnitError::Malformed { .. })));
    }
}
