use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeListArray, ListArray, StringArray,
};
use arrow::datatypes::DataType;
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{MetadataValue, SpectralDataset, Spectrum};
use crate::error::AnalysisError;
use crate::units::{QuantityArray, Unit};

const AXIS_COLUMN: &str = "x";
const FLUX_COLUMN: &str = "y";
const UNCERTAINTY_COLUMN: &str = "uncertainty";
const AXIS_UNIT_COLUMN: &str = "x_unit";
const FLUX_UNIT_COLUMN: &str = "y_unit";
const UNCERTAINTY_UNIT_COLUMN: &str = "uncertainty_unit";

/// Units assumed for records that do not name their own.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub axis_unit: Unit,
    pub flux_unit: Unit,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            axis_unit: Unit::angstrom(),
            flux_unit: Unit::count(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a spectral dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – `x`, `y` and optional `uncertainty` list columns
/// * `.json`    – `[{ "x": [...], "y": [...], "uncertainty": [...], ...meta }, ...]`
/// * `.csv`     – `x`, `y`, `uncertainty` columns of semicolon-separated floats
///
/// Every format may carry `x_unit`, `y_unit` and `uncertainty_unit` columns;
/// missing units fall back to `options`, and the uncertainty unit to the
/// flux unit.
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<SpectralDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path, options),
        "json" => load_json(path, options),
        "csv" => load_csv(path, options),
        other => bail!("Unsupported file extension: .{other}"),
    }?;
    info!("loaded {} spectra from {}", dataset.len(), path.display());
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Record assembly shared by all formats
// ---------------------------------------------------------------------------

/// Flux or uncertainty samples: one spectrum, or a batch of rows sharing
/// the spectral axis.
#[derive(Debug, Clone, PartialEq)]
enum Samples {
    Single(Vec<f64>),
    Batch(Vec<Vec<f64>>),
}

impl Samples {
    fn into_array(self, unit: Unit) -> Result<QuantityArray, AnalysisError> {
        match self {
            Samples::Single(values) => Ok(QuantityArray::new(values, unit)),
            Samples::Batch(rows) => QuantityArray::from_rows(rows, unit),
        }
    }
}

struct RawRecord {
    x: Vec<f64>,
    y: Samples,
    uncertainty: Option<Samples>,
    metadata: BTreeMap<String, MetadataValue>,
}

impl RawRecord {
    fn into_spectrum(mut self, options: &LoadOptions, row: usize) -> Result<Spectrum> {
        let axis_unit = take_unit(&mut self.metadata, AXIS_UNIT_COLUMN, &options.axis_unit, row)?;
        let flux_unit = take_unit(&mut self.metadata, FLUX_UNIT_COLUMN, &options.flux_unit, row)?;
        let uncertainty_unit =
            take_unit(&mut self.metadata, UNCERTAINTY_UNIT_COLUMN, &flux_unit, row)?;

        let flux = self
            .y
            .into_array(flux_unit)
            .with_context(|| format!("Row {row}: invalid '{FLUX_COLUMN}'"))?;
        let uncertainty = self
            .uncertainty
            .map(|u| u.into_array(uncertainty_unit))
            .transpose()
            .with_context(|| format!("Row {row}: invalid '{UNCERTAINTY_COLUMN}'"))?;

        let spectrum = Spectrum::new(QuantityArray::new(self.x, axis_unit), flux, uncertainty)
            .with_context(|| format!("Row {row}: inconsistent spectrum"))?;
        Ok(spectrum.with_metadata(self.metadata))
    }
}

fn take_unit(
    metadata: &mut BTreeMap<String, MetadataValue>,
    column: &str,
    default: &Unit,
    row: usize,
) -> Result<Unit> {
    match metadata.remove(column) {
        None | Some(MetadataValue::Null) => Ok(default.clone()),
        Some(value) => {
            let text = value
                .as_str()
                .with_context(|| format!("Row {row}: '{column}' must be a unit string"))?;
            Unit::parse(text).with_context(|| format!("Row {row}: bad '{column}'"))
        }
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   {
///     "x": [6540.0, 6541.0, ...],
///     "y": [1.02,   0.98,   ...],
///     "uncertainty": [0.05, 0.05, ...],
///     "x_unit": "Angstrom",
///     "y_unit": "erg / s / cm^2 / Angstrom",
///     "object": "NGC 1068"
///   },
///   ...
/// ]
/// ```
///
/// `y` (and `uncertainty`) may also be an array of arrays: a batch of
/// spectra sharing the same `x`.
fn load_json(path: &Path, options: &LoadOptions) -> Result<SpectralDataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut spectra = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let x = json_array_to_f64(obj.get(AXIS_COLUMN), i, AXIS_COLUMN)?;
        let y = json_samples(obj.get(FLUX_COLUMN), i, FLUX_COLUMN)?;
        let uncertainty = match obj.get(UNCERTAINTY_COLUMN) {
            None | Some(JsonValue::Null) => None,
            some => Some(json_samples(some, i, UNCERTAINTY_COLUMN)?),
        };

        let metadata = obj
            .iter()
            .filter(|(key, _)| ![AXIS_COLUMN, FLUX_COLUMN, UNCERTAINTY_COLUMN].contains(&key.as_str()))
            .map(|(key, val)| (key.clone(), json_to_metadata(val)))
            .collect();

        let record = RawRecord {
            x,
            y,
            uncertainty,
            metadata,
        };
        spectra.push(record.into_spectrum(options, i)?);
    }

    Ok(SpectralDataset::from_spectra(spectra))
}

fn json_samples(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Samples> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    if arr.first().is_some_and(JsonValue::is_array) {
        arr.iter()
            .map(|inner| json_array_to_f64(Some(inner), row, col))
            .collect::<Result<Vec<_>>>()
            .map(Samples::Batch)
    } else {
        json_array_to_f64(val, row, col).map(Samples::Single)
    }
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number"))
        })
        .collect()
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => MetadataValue::Integer(i),
            (None, Some(f)) => MetadataValue::Float(f),
            _ => MetadataValue::String(n.to_string()),
        },
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names.
/// `x`, `y` and `uncertainty` cells hold semicolon-separated floats:
///   `"6540.0;6541.0;6542.0"`, `"1.02;0.98;1.01"`
/// A `y` or `uncertainty` cell may hold several `|`-separated rows (a batch
/// sharing `x`). An empty `uncertainty` cell means no uncertainty.
/// All other columns are treated as metadata.
fn load_csv(path: &Path, options: &LoadOptions) -> Result<SpectralDataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let x_idx = column(AXIS_COLUMN).context("CSV missing 'x' column")?;
    let y_idx = column(FLUX_COLUMN).context("CSV missing 'y' column")?;
    let unc_idx = column(UNCERTAINTY_COLUMN);

    let mut spectra = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let x = parse_semicolon_floats(record.get(x_idx).unwrap_or(""), row_no, AXIS_COLUMN)?;
        let y = parse_samples(record.get(y_idx).unwrap_or(""), row_no, FLUX_COLUMN)?;
        let uncertainty = match unc_idx.and_then(|i| record.get(i)) {
            Some(cell) if !cell.trim().is_empty() => {
                Some(parse_samples(cell, row_no, UNCERTAINTY_COLUMN)?)
            }
            _ => None,
        };

        let metadata = record
            .iter()
            .enumerate()
            .filter(|(col_idx, _)| *col_idx != x_idx && *col_idx != y_idx && Some(*col_idx) != unc_idx)
            .map(|(col_idx, value)| (headers[col_idx].clone(), guess_metadata_type(value)))
            .collect();

        let raw = RawRecord {
            x,
            y,
            uncertainty,
            metadata,
        };
        spectra.push(raw.into_spectrum(options, row_no)?);
    }

    Ok(SpectralDataset::from_spectra(spectra))
}

fn parse_samples(s: &str, row: usize, col: &str) -> Result<Samples> {
    if s.contains('|') {
        s.split('|')
            .map(|part| parse_semicolon_floats(part, row, col))
            .collect::<Result<Vec<_>>>()
            .map(Samples::Batch)
    } else {
        parse_semicolon_floats(s, row, col).map(Samples::Single)
    }
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of spectra.
///
/// Expected schema:
/// - `x`: List<Float64> or LargeList<Float64> – spectral axis
/// - `y`: List<Float64> or LargeList<Float64> – flux; a List<List<Float64>>
///   holds a batch of spectra sharing `x`
/// - `uncertainty` (optional, nullable): same layout as `y`
/// - Any other columns are metadata; string columns `x_unit`, `y_unit`,
///   `uncertainty_unit` name the units.
fn load_parquet(path: &Path, options: &LoadOptions) -> Result<SpectralDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut spectra = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let x_idx = schema
            .index_of(AXIS_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'x' column"))?;
        let y_idx = schema
            .index_of(FLUX_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'y' column"))?;
        let unc_idx = schema.index_of(UNCERTAINTY_COLUMN).ok();

        let meta_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != x_idx && *i != y_idx && Some(*i) != unc_idx)
            .map(|(i, f)| (i, f.name().clone()))
            .collect();

        for row in 0..batch.num_rows() {
            let row_no = spectra.len();
            let x = extract_f64_list(batch.column(x_idx), row)
                .with_context(|| format!("Row {row_no}: failed to read 'x'"))?;
            let y = extract_samples(batch.column(y_idx), row)
                .with_context(|| format!("Row {row_no}: failed to read 'y'"))?;
            let uncertainty = match unc_idx.map(|i| batch.column(i)) {
                Some(col) if !col.is_null(row) => Some(
                    extract_samples(col, row)
                        .with_context(|| format!("Row {row_no}: failed to read 'uncertainty'"))?,
                ),
                _ => None,
            };

            let metadata = meta_cols
                .iter()
                .map(|(col_idx, name)| {
                    (name.clone(), extract_metadata_value(batch.column(*col_idx), row))
                })
                .collect();

            let raw = RawRecord {
                x,
                y,
                uncertainty,
                metadata,
            };
            spectra.push(raw.into_spectrum(options, row_no)?);
        }
    }

    Ok(SpectralDataset::from_spectra(spectra))
}

// -- Parquet / Arrow helpers --

/// Values of a List or LargeList column at the given row.
fn list_values(col: &ArrayRef, row: usize) -> Result<ArrayRef> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    match col.data_type() {
        DataType::List(_) => Ok(col
            .as_any()
            .downcast_ref::<ListArray>()
            .context("expected ListArray")?
            .value(row)),
        DataType::LargeList(_) => Ok(col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .context("expected LargeListArray")?
            .value(row)),
        other => bail!("Expected List or LargeList column, got {other:?}"),
    }
}

fn float_values(values_array: &ArrayRef) -> Result<Vec<f64>> {
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &ArrayRef, row: usize) -> Result<Vec<f64>> {
    float_values(&list_values(col, row)?)
}

/// A list of floats is one spectrum; a list of float lists is a batch of
/// spectra sharing `x`.
fn extract_samples(col: &ArrayRef, row: usize) -> Result<Samples> {
    let values = list_values(col, row)?;
    match values.data_type() {
        DataType::List(_) | DataType::LargeList(_) => (0..values.len())
            .map(|i| extract_f64_list(&values, i))
            .collect::<Result<Vec<_>>>()
            .map(Samples::Batch),
        _ => float_values(&values).map(Samples::Single),
    }
}

/// Extract a single metadata value from an Arrow column at a given row.
fn extract_metadata_value(col: &Arc<dyn Array>, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    let any = col.as_any();
    let value = match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|a| MetadataValue::String(a.value(row).to_string())),
        DataType::LargeUtf8 => Some(MetadataValue::String(
            col.as_string::<i64>().value(row).to_string(),
        )),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| MetadataValue::Integer(a.value(row) as i64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| MetadataValue::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| MetadataValue::Float(a.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| MetadataValue::Float(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| MetadataValue::Bool(a.value(row))),
        _ => None,
    };
    value.unwrap_or_else(|| MetadataValue::String(format!("{:?}", col.data_type())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_cells_with_pipes_are_batches() {
        let s = parse_samples("1;2|3;4", 0, "y").unwrap();
        assert_eq!(s, Samples::Batch(vec![vec![1.0, 2.0], vec![3.0, 4.0]]));
        let s = parse_samples("1; 2", 0, "y").unwrap();
        assert_eq!(s, Samples::Single(vec![1.0, 2.0]));
        assert!(parse_samples("1;x", 0, "y").is_err());
    }

    #[test]
    fn unit_columns_are_consumed() {
        let mut metadata = BTreeMap::new();
        metadata.insert("x_unit".to_string(), MetadataValue::String("nm".into()));
        metadata.insert("object".to_string(), MetadataValue::String("M31".into()));
        let raw = RawRecord {
            x: vec![500.0, 501.0],
            y: Samples::Single(vec![1.0, 2.0]),
            uncertainty: None,
            metadata,
        };
        let sp = raw.into_spectrum(&LoadOptions::default(), 0).unwrap();
        assert_eq!(sp.spectral_axis().unit(), &Unit::nanometer());
        assert_eq!(sp.flux().unit(), &Unit::count());
        assert!(!sp.metadata.contains_key("x_unit"));
        assert!(sp.metadata.contains_key("object"));
    }

    #[test]
    fn non_string_unit_is_an_error() {
        let mut metadata = BTreeMap::new();
        metadata.insert("y_unit".to_string(), MetadataValue::Integer(3));
        let raw = RawRecord {
            x: vec![1.0],
            y: Samples::Single(vec![1.0]),
            uncertainty: None,
            metadata,
        };
        assert!(raw.into_spectrum(&LoadOptions::default(), 0).is_err());
    }
}
