use ndarray::{Array1, Array2, ArrayD, ArrayView1, Axis, Slice};
use serde::Serialize;

use super::quantity::Quantity;
use super::unit::{Unit, UnitError};
use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// QuantityArray
// ---------------------------------------------------------------------------

/// An n-d array of magnitudes sharing one [`Unit`].
///
/// Shape is either `[n]` or `[rows, n]`; the last axis is always the
/// spectral axis, and a leading axis (when present) is a batch of spectra
/// sampled on the same grid.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityArray {
    data: ArrayD<f64>,
    unit: Unit,
}

impl QuantityArray {
    /// One-dimensional array.
    pub fn new(values: Vec<f64>, unit: Unit) -> Self {
        QuantityArray {
            data: Array1::from(values).into_dyn(),
            unit,
        }
    }

    /// Two-dimensional array from equally long rows.
    pub fn from_rows(rows: Vec<Vec<f64>>, unit: Unit) -> Result<Self, AnalysisError> {
        let n = rows.first().map(Vec::len).ok_or_else(|| AnalysisError::Shape {
            expected: vec![1, 0],
            found: vec![0],
        })?;
        if let Some(bad) = rows.iter().find(|r| r.len() != n) {
            return Err(AnalysisError::Shape {
                expected: vec![rows.len(), n],
                found: vec![rows.len(), bad.len()],
            });
        }
        let shape = (rows.len(), n);
        let data = Array2::from_shape_vec(shape, rows.into_iter().flatten().collect())
            .map_err(|_| AnalysisError::Shape {
                expected: vec![shape.0, shape.1],
                found: vec![0],
            })?;
        Ok(QuantityArray {
            data: data.into_dyn(),
            unit,
        })
    }

    /// Wrap an existing array of one or two dimensions.
    pub fn from_array(data: ArrayD<f64>, unit: Unit) -> Result<Self, AnalysisError> {
        if !(1..=2).contains(&data.ndim()) {
            return Err(AnalysisError::Shape {
                expected: vec![data.len()],
                found: data.shape().to_vec(),
            });
        }
        Ok(QuantityArray { data, unit })
    }

    /// Same values, different unit. No conversion is applied.
    pub fn with_unit(&self, unit: Unit) -> Self {
        QuantityArray {
            data: self.data.clone(),
            unit,
        }
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Elements in logical (row-major) order.
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    fn spectral(&self) -> Axis {
        Axis(self.data.ndim() - 1)
    }

    /// Length of the last (spectral) axis.
    pub fn len(&self) -> usize {
        self.data.len_of(self.spectral())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the leading batch axis, if any.
    pub fn batch(&self) -> Option<usize> {
        (self.data.ndim() == 2).then(|| self.data.len_of(Axis(0)))
    }

    /// Element `i` of a one-dimensional array.
    pub fn get(&self, i: usize) -> Option<Quantity> {
        if self.batch().is_some() {
            return None;
        }
        self.data
            .iter()
            .nth(i)
            .map(|&v| Quantity::new(v, self.unit.clone()))
    }

    /// Rows along the last axis; a one-dimensional array yields one lane.
    pub fn lanes(&self) -> impl Iterator<Item = ArrayView1<'_, f64>> + '_ {
        self.data.lanes(self.spectral()).into_iter()
    }

    /// Keep the given positions of the last axis, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        let data = if indices.is_empty() {
            let mut shape = self.data.raw_dim();
            shape[self.data.ndim() - 1] = 0;
            ArrayD::zeros(shape)
        } else {
            self.data.select(self.spectral(), indices)
        };
        QuantityArray {
            data,
            unit: self.unit.clone(),
        }
    }

    /// Successive differences `a[i+1] - a[i]` along the last axis.
    pub fn diff(&self) -> Self {
        let n = self.len();
        let data = if n < 2 {
            self.select(&[]).data
        } else {
            let axis = self.spectral();
            &self.data.slice_axis(axis, Slice::from(1..n))
                - &self.data.slice_axis(axis, Slice::from(0..n - 1))
        };
        QuantityArray {
            data,
            unit: self.unit.clone(),
        }
    }

    /// Convert every element to `unit`.
    pub fn to(&self, unit: &Unit) -> Result<Self, UnitError> {
        let factor = self.unit.conversion_factor(unit)?;
        Ok(QuantityArray {
            data: self.data.mapv(|v| v * factor),
            unit: unit.clone(),
        })
    }

    /// Element-wise division by a scalar quantity.
    pub fn divide_scalar(&self, rhs: &Quantity) -> Result<Self, UnitError> {
        Ok(QuantityArray {
            data: &self.data / rhs.value,
            unit: self.unit.divide(&rhs.unit)?,
        })
    }

    /// Element-wise division. `rhs` has either the same shape or is a
    /// one-dimensional array broadcast over every lane.
    pub fn divide(&self, rhs: &QuantityArray) -> Result<Self, AnalysisError> {
        let broadcast = rhs.batch().is_none() && rhs.len() == self.len();
        if rhs.shape() != self.shape() && !broadcast {
            return Err(AnalysisError::Shape {
                expected: self.shape().to_vec(),
                found: rhs.shape().to_vec(),
            });
        }
        Ok(QuantityArray {
            data: &self.data / &rhs.data,
            unit: self.unit.divide(&rhs.unit)?,
        })
    }

    /// Collapse the last axis with `reduce`, keeping any batch axis.
    pub fn reduce_last_axis<F>(&self, unit: Unit, reduce: F) -> Measure
    where
        F: FnMut(ArrayView1<'_, f64>) -> f64,
    {
        let reduced = self.data.map_axis(self.spectral(), reduce);
        match self.batch() {
            None => Measure::Scalar(Quantity::new(
                reduced.iter().next().copied().unwrap_or(f64::NAN),
                unit,
            )),
            Some(_) => Measure::Batch(QuantityArray {
                data: reduced,
                unit,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Measure – the result of a reduction over the spectral axis
// ---------------------------------------------------------------------------

/// One value per spectrum: a scalar for single spectra, an array of shape
/// `[rows]` when the flux carries a batch axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Measure {
    Scalar(Quantity),
    Batch(QuantityArray),
}

impl Measure {
    pub fn unit(&self) -> &Unit {
        match self {
            Measure::Scalar(q) => &q.unit,
            Measure::Batch(a) => a.unit(),
        }
    }

    pub fn values(&self) -> Vec<f64> {
        match self {
            Measure::Scalar(q) => vec![q.value],
            Measure::Batch(a) => a.values(),
        }
    }

    pub fn as_scalar(&self) -> Option<&Quantity> {
        match self {
            Measure::Scalar(q) => Some(q),
            Measure::Batch(_) => None,
        }
    }

    /// Express every value in `unit`.
    pub fn to(&self, unit: &Unit) -> Result<Measure, UnitError> {
        match self {
            Measure::Scalar(q) => Ok(Measure::Scalar(q.to(unit)?)),
            Measure::Batch(a) => Ok(Measure::Batch(a.to(unit)?)),
        }
    }

    /// Apply a fallible map to every value. The unit of the result is the
    /// unit the map produces.
    pub fn try_map<F>(&self, f: F) -> Result<Measure, AnalysisError>
    where
        F: Fn(Quantity) -> Result<Quantity, AnalysisError>,
    {
        match self {
            Measure::Scalar(q) => Ok(Measure::Scalar(f(q.clone())?)),
            Measure::Batch(a) => {
                let mapped = a
                    .data()
                    .iter()
                    .map(|&v| f(Quantity::new(v, a.unit().clone())))
                    .collect::<Result<Vec<_>, _>>()?;
                let unit = mapped
                    .first()
                    .map(|q| q.unit.clone())
                    .unwrap_or_else(|| a.unit().clone());
                let values = mapped.iter().map(|q| q.value).collect();
                Ok(Measure::Batch(QuantityArray::new(values, unit)))
            }
        }
    }

    /// Flattened `(batch index, value)` pairs for reporting.
    pub fn entries(&self) -> Vec<MeasureEntry> {
        let unit = self.unit().to_string();
        match self {
            Measure::Scalar(q) => vec![MeasureEntry {
                batch_index: None,
                value: q.value,
                unit,
            }],
            Measure::Batch(a) => a
                .data()
                .iter()
                .enumerate()
                .map(|(i, &value)| MeasureEntry {
                    batch_index: Some(i),
                    value,
                    unit: unit.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureEntry {
    pub batch_index: Option<usize>,
    pub value: f64,
    pub unit: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn lanes_of_batched_array() {
        let a = QuantityArray::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]], Unit::count())
            .unwrap();
        assert_eq!(a.shape(), &[2, 2]);
        assert_eq!(a.batch(), Some(2));
        let lanes: Vec<Vec<f64>> = a.lanes().map(|l| l.to_vec()).collect();
        assert_eq!(lanes, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = QuantityArray::from_rows(vec![vec![1.0, 2.0], vec![3.0]], Unit::count());
        assert!(matches!(err, Err(AnalysisError::Shape { .. })));
    }

    #[test]
    fn from_array_accepts_one_or_two_dimensions() {
        let cube = ArrayD::<f64>::zeros(vec![2, 2, 2]);
        assert!(QuantityArray::from_array(cube, Unit::count()).is_err());
        let rows = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let a = QuantityArray::from_array(rows, Unit::count()).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a.batch(), Some(2));
    }

    #[test]
    fn select_keeps_batch_axis() {
        let a = QuantityArray::from_rows(
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
            Unit::count(),
        )
        .unwrap();
        let s = a.select(&[0, 2]);
        assert_eq!(s.shape(), &[2, 2]);
        assert_eq!(s.values(), &[1.0, 3.0, 4.0, 6.0]);

        let empty = a.select(&[]);
        assert_eq!(empty.shape(), &[2, 0]);
        assert_eq!(empty.lanes().count(), 2);
    }

    #[test]
    fn divide_broadcasts_one_dimensional_rhs() {
        let a = QuantityArray::from_rows(vec![vec![2.0, 4.0], vec![6.0, 8.0]], Unit::count())
            .unwrap();
        let b = QuantityArray::new(vec![2.0, 4.0], Unit::count());
        let q = a.divide(&b).unwrap();
        assert_eq!(q.values(), &[1.0, 1.0, 3.0, 2.0]);
        assert!(q.unit().is_unscaled_dimensionless());

        let wrong = QuantityArray::new(vec![1.0, 2.0, 3.0], Unit::count());
        assert!(matches!(a.divide(&wrong), Err(AnalysisError::Shape { .. })));
    }

    #[test]
    fn reduce_last_axis_shapes() {
        let single = QuantityArray::new(vec![1.0, 2.0, 3.0], Unit::count());
        let m = single.reduce_last_axis(Unit::count(), |l| l.sum());
        assert_eq!(m, Measure::Scalar(Quantity::new(6.0, Unit::count())));

        let batch = QuantityArray::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]], Unit::count())
            .unwrap();
        let m = batch.reduce_last_axis(Unit::count(), |l| l.sum());
        assert_eq!(m.values(), vec![3.0, 7.0]);
        assert!(m.as_scalar().is_none());
    }

    #[test]
    fn mean_of_empty_lane_is_nan() {
        let empty = QuantityArray::new(vec![], Unit::count());
        let m = empty.reduce_last_axis(Unit::count(), |l| l.mean().unwrap_or(f64::NAN));
        assert!(m.as_scalar().unwrap().value.is_nan());
    }

    #[test]
    fn diff_of_descending_axis_is_negative() {
        let axis = QuantityArray::new(vec![30.0, 20.0, 5.0], Unit::angstrom());
        assert_eq!(axis.diff().values(), &[-10.0, -15.0]);
        assert!(QuantityArray::new(vec![1.0], Unit::angstrom()).diff().is_empty());
    }
}
