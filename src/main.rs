use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use spectral_measures::analysis::{MeasureKind, RegionSelection};
use spectral_measures::config::{load_config, AnalysisConfig};
use spectral_measures::data::loader::{load_file, LoadOptions};
use spectral_measures::report::{rows_for, write_report, ReportFormat};
use spectral_measures::{MetadataValue, SpectralRegion, Unit};

/// Measure line flux, equivalent width and SNR of the spectra in a file.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Spectra to measure (.parquet, .json or .csv)
    #[arg(long)]
    input: PathBuf,

    /// JSON analysis config (regions, measures, continuum, metadata selection)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Region such as "6550:6575 Angstrom"; repeat for several regions.
    /// Overrides the config's regions.
    #[arg(long = "region")]
    regions: Vec<String>,

    /// Measure to run; repeat for several. Defaults to the config's
    /// measures, or all of them.
    #[arg(long = "measure")]
    measures: Vec<MeasureKind>,

    /// Spectral-axis unit for records without an `x_unit`
    #[arg(long, default_value = "Angstrom")]
    axis_unit: Unit,

    /// Flux unit for records without a `y_unit`
    #[arg(long, default_value = "ct")]
    flux_unit: Unit,

    /// Output format: table, json or csv
    #[arg(long, default_value = "table")]
    format: ReportFormat,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Abort on the first spectrum that cannot be measured
    #[arg(long)]
    strict: bool,
}

fn region_selection(args: &Args, config: &AnalysisConfig) -> Result<RegionSelection> {
    if args.regions.is_empty() {
        return config.region_selection().context("config 'regions'");
    }
    let mut regions = args
        .regions
        .iter()
        .map(|r| SpectralRegion::parse(r).with_context(|| format!("--region '{r}'")))
        .collect::<Result<Vec<_>>>()?;
    Ok(if regions.len() == 1 {
        RegionSelection::One(regions.remove(0))
    } else {
        RegionSelection::Many(regions)
    })
}

fn spectrum_label(index: usize, metadata: &BTreeMap<String, MetadataValue>) -> String {
    ["name", "object", "id"]
        .iter()
        .find_map(|key| metadata.get(*key))
        .map(|v| v.to_string())
        .unwrap_or_else(|| format!("spectrum {index}"))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AnalysisConfig::default(),
    };

    let selection = region_selection(&args, &config)?;
    let continuum = config.continuum().context("config 'continuum'")?;
    let measures = match (args.measures.is_empty(), config.measures.is_empty()) {
        (false, _) => args.measures.clone(),
        (true, false) => config.measures.clone(),
        (true, true) => MeasureKind::ALL.to_vec(),
    };

    let options = LoadOptions {
        axis_unit: args.axis_unit.clone(),
        flux_unit: args.flux_unit.clone(),
    };
    let dataset = load_file(&args.input, &options)
        .with_context(|| format!("loading {}", args.input.display()))?;

    let chosen = config.metadata_selection().indices(&dataset);
    info!(
        "measuring {} of {} spectra: {}",
        chosen.len(),
        dataset.len(),
        measures.iter().map(|m| m.name()).collect::<Vec<_>>().join(", ")
    );

    let mut rows = Vec::new();
    let mut failures = 0usize;
    for &index in &chosen {
        let spectrum = &dataset.spectra[index];
        let label = spectrum_label(index, &spectrum.metadata);
        for &measure in &measures {
            match measure.compute(spectrum, &continuum, &selection) {
                Ok(result) => rows.extend(rows_for(index, &label, measure, &selection, result)),
                Err(e) if args.strict => {
                    bail!("{measure} of {label}: {e}");
                }
                Err(e) => {
                    warn!("skipping {measure} of {label}: {e}");
                    failures += 1;
                }
            }
        }
    }

    match &args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_report(&rows, args.format, &mut writer)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write_report(&rows, args.format, &mut lock)?;
            lock.flush()?;
        }
    }

    if failures > 0 {
        warn!("{failures} measurement(s) failed; see log above");
    }
    Ok(())
}
