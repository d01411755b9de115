//! Unit-checked quantities.
//!
//! Every magnitude that flows through the analysis carries a [`Unit`];
//! arithmetic that mixes incompatible dimensions fails with a
//! [`UnitError`] instead of silently producing a number.

pub mod array;
pub mod quantity;
pub mod unit;

pub use array::{Measure, MeasureEntry, QuantityArray};
pub use quantity::Quantity;
pub use unit::{Unit, UnitError};
