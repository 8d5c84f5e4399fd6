//! Packing samples into dense aligned arrays.

use chrono::NaiveDate;
use ndarray::Array2;
use terrabench_core::models::{AcquisitionDate, Band, BandInfo, PackOptions, Sample};
use terrabench_core::TerrabenchError;

fn day(d: u32) -> AcquisitionDate {
    AcquisitionDate::Day(NaiveDate::from_ymd_opt(2020, 1, d).unwrap())
}

fn band(info: BandInfo, shape: (usize, usize), value: f32, d: u32) -> Band {
    Band::new(
        Array2::<f32>::from_elem(shape, value),
        info,
        10.0,
        Some(day(d)),
    )
}

fn b02() -> BandInfo {
    BandInfo::spectral("02 - Blue", &["2", "02", "blue"], 10.0, 0.49)
}

fn b09() -> BandInfo {
    BandInfo::spectral("09 - Water vapour", &["9", "09"], 60.0, 0.945)
}

#[test]
fn packing_is_deterministic_regardless_of_insertion_order() {
    let forwards = Sample::new(
        vec![band(b02(), (4, 4), 2.0, 1), band(b09(), (4, 4), 9.0, 1)],
        None,
        "s",
    )
    .unwrap();
    let backwards = Sample::new(
        vec![band(b09(), (4, 4), 9.0, 1), band(b02(), (4, 4), 2.0, 1)],
        None,
        "s",
    )
    .unwrap();

    let (a, _, names_a) = forwards.pack_to_4d(&PackOptions::default()).unwrap();
    let (b, _, names_b) = backwards.pack_to_4d(&PackOptions::default()).unwrap();
    assert_eq!(a, b);
    assert_eq!(names_a, names_b);
    assert_eq!(names_a, vec!["02 - Blue", "09 - Water vapour"]);
}

#[test]
fn smaller_band_is_resampled_to_the_largest_shape() {
    let sample = Sample::new(
        vec![band(b02(), (10, 10), 2.0, 1), band(b09(), (5, 5), 9.0, 1)],
        None,
        "s",
    )
    .unwrap();

    let options = PackOptions {
        resample: true,
        ..Default::default()
    };
    let (array, dates, names) = sample.pack_to_4d(&options).unwrap();
    assert_eq!(array.dim(), (1, 10, 10, 2));
    assert_eq!(dates, vec![Some(day(1))]);
    assert_eq!(names, vec!["02 - Blue", "09 - Water vapour"]);

    // Constant input stays constant through resampling.
    for y in 0..10 {
        for x in 0..10 {
            assert!((array[(0, y, x, 1)] - 9.0).abs() < 1e-4);
        }
    }
}

#[test]
fn shape_mismatch_without_resampling_is_an_error() {
    let sample = Sample::new(
        vec![band(b02(), (10, 10), 2.0, 1), band(b09(), (5, 5), 9.0, 1)],
        None,
        "s",
    )
    .unwrap();

    assert!(matches!(
        sample.pack_to_4d(&PackOptions::default()),
        Err(TerrabenchError::ShapeMismatch { .. })
    ));
}

#[test]
fn missing_cell_uses_fill_value_or_fails() {
    // B09 present on day 1 only; B02 present both days.
    let sample = Sample::new(
        vec![
            band(b02(), (4, 4), 2.0, 1),
            band(b02(), (4, 4), 2.5, 2),
            band(b09(), (4, 4), 9.0, 1),
        ],
        None,
        "s",
    )
    .unwrap();

    assert!(matches!(
        sample.pack_to_4d(&PackOptions::default()),
        Err(TerrabenchError::MissingBand { .. })
    ));

    let options = PackOptions {
        fill_value: Some(0.0),
        ..Default::default()
    };
    let (array, dates, _) = sample.pack_to_4d(&options).unwrap();
    assert_eq!(array.dim(), (2, 4, 4, 2));
    assert_eq!(dates, vec![Some(day(1)), Some(day(2))]);
    assert_eq!(array[(0, 0, 0, 1)], 9.0);
    assert_eq!(array[(1, 0, 0, 1)], 0.0); // filled cell
}

#[test]
fn band_selection_accepts_aliases_and_keeps_request_order() {
    let sample = Sample::new(
        vec![band(b02(), (4, 4), 2.0, 1), band(b09(), (4, 4), 9.0, 1)],
        None,
        "s",
    )
    .unwrap();

    let options = PackOptions {
        band_names: Some(vec!["09".to_string(), "blue".to_string()]),
        ..Default::default()
    };
    let (array, _, names) = sample.pack_to_4d(&options).unwrap();
    assert_eq!(names, vec!["09 - Water vapour", "02 - Blue"]);
    assert_eq!(array[(0, 0, 0, 0)], 9.0);
    assert_eq!(array[(0, 0, 0, 1)], 2.0);

    let unknown = PackOptions {
        band_names: Some(vec!["B12".to_string()]),
        ..Default::default()
    };
    assert!(matches!(
        sample.pack_to_4d(&unknown),
        Err(TerrabenchError::UnknownBand { .. })
    ));
}

#[test]
fn date_selection_restricts_the_time_axis() {
    let sample = Sample::new(
        vec![band(b02(), (4, 4), 2.0, 1), band(b02(), (4, 4), 2.5, 2)],
        None,
        "s",
    )
    .unwrap();

    let options = PackOptions {
        dates: Some(vec![Some(day(2))]),
        ..Default::default()
    };
    let (array, dates, _) = sample.pack_to_4d(&options).unwrap();
    assert_eq!(array.dim(), (1, 4, 4, 1));
    assert_eq!(dates, vec![Some(day(2))]);
    assert_eq!(array[(0, 0, 0, 0)], 2.5);

    let unknown = PackOptions {
        dates: Some(vec![Some(day(9))]),
        ..Default::default()
    };
    assert!(matches!(
        sample.pack_to_4d(&unknown),
        Err(TerrabenchError::UnknownDate { .. })
    ));
}

#[test]
fn multi_band_fill_gets_the_full_channel_count() {
    let cube = BandInfo::multi("cube", &[], 10.0, 3);
    let sample = Sample::new(
        vec![
            band(b02(), (4, 4), 2.0, 1),
            band(b02(), (4, 4), 2.5, 2),
            Band::new(
                ndarray::Array3::<f32>::from_elem((4, 4, 3), 1.0),
                cube,
                10.0,
                Some(day(1)),
            ),
        ],
        None,
        "s",
    )
    .unwrap();

    let options = PackOptions {
        fill_value: Some(-1.0),
        ..Default::default()
    };
    let (array, _, names) = sample.pack_to_4d(&options).unwrap();
    assert_eq!(array.dim(), (2, 4, 4, 4));
    assert_eq!(names, vec!["02 - Blue", "cube", "cube", "cube"]);
    // Day 2 has no cube data: all three of its channels are filled.
    for c in 1..4 {
        assert_eq!(array[(1, 0, 0, c)], -1.0);
    }
}

#[test]
fn pack_to_3d_requires_a_single_date() {
    let single = Sample::new(vec![band(b02(), (4, 4), 2.0, 1)], None, "s").unwrap();
    let (array, names) = single.pack_to_3d(&PackOptions::default()).unwrap();
    assert_eq!(array.dim(), (4, 4, 1));
    assert_eq!(names, vec!["02 - Blue"]);

    let series = Sample::new(
        vec![band(b02(), (4, 4), 2.0, 1), band(b02(), (4, 4), 2.5, 2)],
        None,
        "s",
    )
    .unwrap();
    assert!(matches!(
        series.pack_to_3d(&PackOptions::default()),
        Err(TerrabenchError::MultipleDates { n_dates: 2, .. })
    ));
}

#[test]
fn non_uniform_zoom_is_rejected() {
    let sample = Sample::new(
        vec![band(b02(), (10, 10), 2.0, 1), band(b09(), (5, 10), 9.0, 1)],
        None,
        "s",
    )
    .unwrap();

    let options = PackOptions {
        resample: true,
        ..Default::default()
    };
    assert!(matches!(
        sample.pack_to_4d(&options),
        Err(TerrabenchError::NonUniformZoom { .. })
    ));
}
