use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Rest wavelengths (Angstrom) of the lines written into the sample.
const H_ALPHA: f64 = 6562.8;
const NII_RED: f64 = 6583.5;
const NII_BLUE: f64 = 6548.1;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

struct Observation {
    object: &'static str,
    continuum: f64,
    halpha: f64,
    nii_ratio: f64,
    sigma: f64,
}

/// Continuum plus Hα and [N II] emission, with Poisson-like noise: the
/// uncertainty of each sample is the square root of its expected counts.
fn observe(
    wavelengths: &[f64],
    obs: &Observation,
    redshift: f64,
    rng: &mut SimpleRng,
) -> (Vec<f64>, Vec<f64>) {
    wavelengths
        .iter()
        .map(|&wl| {
            let shift = 1.0 + redshift;
            let model = obs.continuum
                + gaussian(wl, H_ALPHA * shift, obs.sigma, obs.halpha)
                + gaussian(wl, NII_RED * shift, obs.sigma, obs.halpha * obs.nii_ratio)
                + gaussian(wl, NII_BLUE * shift, obs.sigma, obs.halpha * obs.nii_ratio / 3.0);
            let sigma = model.max(1.0).sqrt();
            (model + rng.gauss(0.0, sigma), sigma)
        })
        .unzip()
}

fn list_array(rows: &[Vec<f64>]) -> arrow::array::ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        builder.values().append_slice(row);
        builder.append(true);
    }
    builder.finish()
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    // 6500 → 6649.5 Angstrom, step 0.5
    let wavelengths: Vec<f64> = (0..300).map(|i| 6500.0 + i as f64 * 0.5).collect();

    let observations = [
        Observation { object: "NGC 1068", continuum: 400.0, halpha: 900.0, nii_ratio: 1.8, sigma: 3.0 },
        Observation { object: "NGC 4151", continuum: 250.0, halpha: 1500.0, nii_ratio: 0.6, sigma: 4.5 },
        Observation { object: "M 82", continuum: 120.0, halpha: 600.0, nii_ratio: 0.4, sigma: 2.0 },
    ];
    let redshifts = [0.0, 0.001, 0.002];

    let mut all_x = Vec::new();
    let mut all_y = Vec::new();
    let mut all_unc = Vec::new();
    let mut all_object = Vec::new();
    let mut all_redshift = Vec::new();

    for obs in &observations {
        for &z in &redshifts {
            let (flux, sigma) = observe(&wavelengths, obs, z, &mut rng);
            all_x.push(wavelengths.clone());
            all_y.push(flux);
            all_unc.push(sigma);
            all_object.push(obs.object);
            all_redshift.push(z);
        }
    }
    let n_rows = all_object.len();

    let list_field = |name: &str| {
        Field::new(
            name,
            DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
            false,
        )
    };
    let schema = Arc::new(Schema::new(vec![
        list_field("x"),
        list_field("y"),
        list_field("uncertainty"),
        Field::new("x_unit", DataType::Utf8, false),
        Field::new("y_unit", DataType::Utf8, false),
        Field::new("object", DataType::Utf8, false),
        Field::new("redshift", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(list_array(&all_x)),
            Arc::new(list_array(&all_y)),
            Arc::new(list_array(&all_unc)),
            Arc::new(StringArray::from(vec!["Angstrom"; n_rows])),
            Arc::new(StringArray::from(vec!["ct"; n_rows])),
            Arc::new(StringArray::from(all_object)),
            Arc::new(Float64Array::from(all_redshift)),
        ],
    )
    .context("building record batch")?;

    let output_path = "sample_spectra.parquet";
    let file = std::fs::File::create(output_path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;

    println!(
        "Wrote {n_rows} spectra ({} samples each) to {output_path}",
        wavelengths.len()
    );
    Ok(())
}
