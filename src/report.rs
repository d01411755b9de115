use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::analysis::{Dispatched, MeasureKind, RegionSelection};
use crate::units::Measure;

/// One measured value: a spectrum (and batch row), a measure, a region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub spectrum: usize,
    pub label: String,
    pub measure: MeasureKind,
    pub region: Option<String>,
    pub batch_index: Option<usize>,
    pub value: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(ReportFormat::Table),
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(format!("unknown format '{other}' (expected table, json or csv)")),
        }
    }
}

/// Flatten a dispatched result into report rows. Region labels follow the
/// selection, one per dispatched element.
pub fn rows_for(
    spectrum: usize,
    label: &str,
    measure: MeasureKind,
    selection: &RegionSelection,
    result: Dispatched<Measure>,
) -> Vec<ReportRow> {
    let regions: Vec<Option<String>> = match selection {
        RegionSelection::Whole => vec![None],
        RegionSelection::One(r) => vec![Some(r.to_string())],
        RegionSelection::Many(rs) => rs.iter().map(|r| Some(r.to_string())).collect(),
    };

    result
        .into_vec()
        .into_iter()
        .zip(regions)
        .flat_map(|(m, region)| {
            m.entries().into_iter().map(move |e| ReportRow {
                spectrum,
                label: label.to_string(),
                measure,
                region: region.clone(),
                batch_index: e.batch_index,
                value: e.value,
                unit: e.unit,
            })
        })
        .collect()
}

pub fn write_report<W: Write>(rows: &[ReportRow], format: ReportFormat, mut out: W) -> Result<()> {
    match format {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut out, rows).context("writing JSON report")?;
            writeln!(out)?;
        }
        ReportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for row in rows {
                writer.serialize(row).context("writing CSV report")?;
            }
            writer.flush()?;
        }
        ReportFormat::Table => {
            writeln!(
                out,
                "{:>4}  {:<20} {:<17} {:<28} {:>5}  {:>14}  unit",
                "#", "label", "measure", "region", "row", "value"
            )?;
            for row in rows {
                writeln!(
                    out,
                    "{:>4}  {:<20} {:<17} {:<28} {:>5}  {:>14.6e}  {}",
                    row.spectrum,
                    row.label,
                    row.measure.name(),
                    row.region.as_deref().unwrap_or("<whole>"),
                    row.batch_index.map_or_else(|| "-".to_string(), |i| i.to_string()),
                    row.value,
                    row.unit,
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::SpectralRegion;
    use crate::units::{Quantity, QuantityArray, Unit};

    #[test]
    fn rows_follow_region_order() {
        let regions = vec![
            SpectralRegion::parse("5:6 Angstrom").unwrap(),
            SpectralRegion::parse("1:2 Angstrom").unwrap(),
        ];
        let result = Dispatched::Many(vec![
            Measure::Scalar(Quantity::new(1.0, Unit::angstrom())),
            Measure::Scalar(Quantity::new(2.0, Unit::angstrom())),
        ]);
        let rows = rows_for(0, "a", MeasureKind::LineFlux, &regions.into(), result);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].region.as_deref(), Some("5:6 Angstrom"));
        assert_eq!(rows[1].value, 2.0);
    }

    #[test]
    fn batch_measures_expand_to_rows() {
        let result = Dispatched::Single(Measure::Batch(QuantityArray::new(
            vec![3.0, 4.0],
            Unit::dimensionless(),
        )));
        let rows = rows_for(7, "cube", MeasureKind::Snr, &RegionSelection::Whole, result);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].batch_index, Some(1));
        assert_eq!(rows[1].region, None);
    }

    #[test]
    fn csv_report_has_header() {
        let rows = rows_for(
            0,
            "a",
            MeasureKind::Snr,
            &RegionSelection::Whole,
            Dispatched::Single(Measure::Scalar(Quantity::dimensionless(5.0))),
        );
        let mut buf = Vec::new();
        write_report(&rows, ReportFormat::Csv, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("spectrum,label,measure,region,batch_index,value,unit"));
        assert!(text.contains(",snr,"));
    }
}
