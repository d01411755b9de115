use std::io::Write;
use std::sync::Arc;

use arrow::array::{Array, Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use spectral_measures::config::load_config;
use spectral_measures::data::loader::{load_file, LoadOptions};
use spectral_measures::{line_flux, snr, Measure, MetadataValue, RegionSelection, Unit};
use tempfile::NamedTempFile;

fn temp_with(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn json_records_carry_units_and_metadata() {
    let file = temp_with(
        ".json",
        r#"[
            {
                "x": [1.0, 2.0, 3.0],
                "y": [0.0, 10.0, 20.0],
                "uncertainty": [1.0, 2.0, 4.0],
                "x_unit": "nm",
                "y_unit": "mJy",
                "object": "NGC 1068",
                "exposure": 1200
            },
            {
                "x": [1.0, 2.0, 3.0],
                "y": [[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]]
            }
        ]"#,
    );

    let dataset = load_file(file.path(), &LoadOptions::default()).unwrap();
    assert_eq!(dataset.len(), 2);

    let first = &dataset.spectra[0];
    assert_eq!(first.spectral_axis().unit(), &Unit::nanometer());
    assert_eq!(first.flux().unit(), &Unit::parse("mJy").unwrap());
    assert_eq!(
        first.metadata.get("object"),
        Some(&MetadataValue::String("NGC 1068".into()))
    );
    assert!(!first.metadata.contains_key("x_unit"));

    let flux = line_flux(first, &RegionSelection::Whole).unwrap();
    assert_eq!(flux.single().and_then(Measure::as_scalar).unwrap().value, 30.0);

    let second = &dataset.spectra[1];
    assert_eq!(second.flux().shape(), &[2, 3]);
    assert_eq!(second.spectral_axis().unit(), &Unit::angstrom());
    assert!(second.uncertainty().is_none());
}

#[test]
fn csv_rows_become_spectra() {
    let file = temp_with(
        ".csv",
        "x,y,uncertainty,object\n\
         1;2;3;4,2;4;6;8,1;1;2;2,A\n\
         1;2;3,1;1;1|3;3;3,,B\n",
    );

    let dataset = load_file(file.path(), &LoadOptions::default()).unwrap();
    assert_eq!(dataset.len(), 2);

    let ratio = snr(&dataset.spectra[0], &RegionSelection::Whole).unwrap();
    // (2 + 4 + 3 + 4) / 4
    assert_eq!(ratio.single().unwrap().values(), vec![3.25]);

    let batch = &dataset.spectra[1];
    assert_eq!(batch.flux().shape(), &[2, 3]);
    assert!(batch.uncertainty().is_none());
    assert_eq!(batch.metadata.get("object").and_then(MetadataValue::as_str), Some("B"));
}

#[test]
fn inconsistent_record_is_reported_with_its_row() {
    let file = temp_with(".json", r#"[{ "x": [1.0, 2.0, 3.0], "y": [1.0, 2.0] }]"#);
    let err = load_file(file.path(), &LoadOptions::default()).unwrap_err();
    assert!(format!("{err:#}").contains("Row 0"), "{err:#}");
}

#[test]
fn unsupported_extension_is_rejected() {
    let file = temp_with(".fits", "SIMPLE  =                    T");
    assert!(load_file(file.path(), &LoadOptions::default()).is_err());
}

#[test]
fn config_file_drives_selection() {
    let file = temp_with(
        ".json",
        r#"{
            "regions": "2:3 Angstrom",
            "measures": ["line-flux"],
            "select": { "object": ["B"] }
        }"#,
    );
    let config = load_config(file.path()).unwrap();
    assert!(matches!(config.region_selection().unwrap(), RegionSelection::One(_)));
    assert!(!config.metadata_selection().is_unconstrained());
}

#[test]
fn parquet_nested_lists_are_batches() {
    let mut x = ListBuilder::new(Float64Builder::new());
    x.values().append_slice(&[1.0, 2.0, 3.0]);
    x.append(true);
    let x = x.finish();

    let mut y = ListBuilder::new(ListBuilder::new(Float64Builder::new()));
    for row in [[1.0, 1.0, 1.0], [2.0, 4.0, 6.0]] {
        y.values().values().append_slice(&row);
        y.values().append(true);
    }
    y.append(true);
    let y = y.finish();

    let schema = Arc::new(Schema::new(vec![
        Field::new("x", x.data_type().clone(), false),
        Field::new("y", y.data_type().clone(), false),
        Field::new("object", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(x), Arc::new(y), Arc::new(StringArray::from(vec!["cube"]))],
    )
    .unwrap();

    let file = tempfile::Builder::new()
        .suffix(".parquet")
        .tempfile()
        .expect("Failed to create temp file");
    let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let dataset = load_file(file.path(), &LoadOptions::default()).unwrap();
    assert_eq!(dataset.len(), 1);
    let spectrum = &dataset.spectra[0];
    assert_eq!(spectrum.flux().shape(), &[2, 3]);
    assert_eq!(spectrum.flux().values(), &[1.0, 1.0, 1.0, 2.0, 4.0, 6.0]);

    let flux = line_flux(spectrum, &RegionSelection::Whole).unwrap();
    assert_eq!(flux.single().unwrap().values(), vec![2.0, 10.0]);
}
