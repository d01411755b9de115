use proptest::prelude::*;
use spectral_measures::{
    line_flux, snr, Measure, Quantity, QuantityArray, RegionSelection, SpectralRegion, Spectrum,
    Unit,
};

/// Strictly increasing axis built from positive steps, with matching flux
/// and strictly positive uncertainty.
fn spectrum_strategy() -> impl Strategy<Value = Spectrum> {
    (2usize..64).prop_flat_map(|n| {
        (
            1000.0f64..9000.0,
            prop::collection::vec(0.1f64..5.0, n - 1),
            prop::collection::vec(-100.0f64..100.0, n),
            prop::collection::vec(0.01f64..10.0, n),
        )
            .prop_map(|(start, steps, flux, unc)| {
                let mut axis = Vec::with_capacity(steps.len() + 1);
                axis.push(start);
                for step in steps {
                    let last = axis[axis.len() - 1];
                    axis.push(last + step);
                }
                Spectrum::from_values(axis, Unit::angstrom(), flux, Unit::count())
                    .unwrap()
                    .with_uncertainty(QuantityArray::new(unc, Unit::count()))
                    .unwrap()
            })
    })
}

/// A region inside the spectrum's axis range, picked by fractions of it.
fn region_at(spectrum: &Spectrum, lo: f64, width: f64) -> SpectralRegion {
    let axis = spectrum.spectral_axis().values();
    let (start, end) = (axis[0], axis[axis.len() - 1]);
    let lower = start + lo * (end - start);
    let upper = lower + width * (end - lower);
    SpectralRegion::new(
        Quantity::new(lower, Unit::angstrom()),
        Quantity::new(upper, Unit::angstrom()),
    )
    .unwrap()
}

// Property 1: line flux is a pure function of its inputs
proptest! {
    #[test]
    fn prop_line_flux_is_idempotent(
        spectrum in spectrum_strategy(),
        lo in 0.0f64..1.0,
        width in 0.0f64..1.0,
    ) {
        let selection: RegionSelection = region_at(&spectrum, lo, width).into();
        let first = line_flux(&spectrum, &selection).unwrap();
        let second = line_flux(&spectrum, &selection).unwrap();
        let bits = |m: Vec<Measure>| -> Vec<u64> {
            m.iter().flat_map(Measure::values).map(f64::to_bits).collect()
        };
        prop_assert_eq!(bits(first.into_vec()), bits(second.into_vec()));
    }
}

// Property 2: the i-th result of a region list is the result of region i alone
proptest! {
    #[test]
    fn prop_region_list_preserves_order(
        spectrum in spectrum_strategy(),
        bounds in prop::collection::vec((0.0f64..1.0, 0.0f64..1.0), 1..6),
    ) {
        let regions: Vec<SpectralRegion> = bounds
            .iter()
            .map(|&(lo, width)| region_at(&spectrum, lo, width))
            .collect();

        let together = line_flux(&spectrum, &RegionSelection::Many(regions.clone()))
            .unwrap()
            .into_vec();
        prop_assert_eq!(together.len(), regions.len());

        for (region, got) in regions.into_iter().zip(together) {
            let alone = line_flux(&spectrum, &RegionSelection::One(region)).unwrap();
            prop_assert_eq!(alone.into_vec(), vec![got]);
        }
    }
}

// Property 3: a batch of M rows gives M SNR values, each the row's own SNR
proptest! {
    #[test]
    fn prop_snr_keeps_batch_axis(
        rows in prop::collection::vec(prop::collection::vec(0.5f64..50.0, 8), 1..6),
    ) {
        let axis: Vec<f64> = (0..8).map(|i| 5000.0 + i as f64).collect();
        let unc = vec![vec![0.5; 8]; rows.len()];
        let batched = Spectrum::new(
            QuantityArray::new(axis.clone(), Unit::angstrom()),
            QuantityArray::from_rows(rows.clone(), Unit::count()).unwrap(),
            Some(QuantityArray::from_rows(unc, Unit::count()).unwrap()),
        )
        .unwrap();

        let result = snr(&batched, &RegionSelection::Whole).unwrap().into_vec();
        let values = match &result[..] {
            [Measure::Batch(values)] => values.clone(),
            other => return Err(TestCaseError::fail(format!("expected one batch, got {other:?}"))),
        };
        prop_assert_eq!(values.shape(), &[rows.len()][..]);

        for (row, value) in rows.into_iter().zip(values.values()) {
            let single = Spectrum::from_values(axis.clone(), Unit::angstrom(), row, Unit::count())
                .unwrap()
                .with_uncertainty(QuantityArray::new(vec![0.5; 8], Unit::count()))
                .unwrap();
            let expected = snr(&single, &RegionSelection::Whole).unwrap().into_vec()[0].values()[0];
            prop_assert!((value - expected).abs() <= 1e-12 * expected.abs().max(1.0));
        }
    }
}
