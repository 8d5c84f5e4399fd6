//! Sample persistence round trips through both encodings.

use chrono::NaiveDate;
use ndarray::Array2;
use serde_json::json;
use tempfile::tempdir;

use terrabench_core::formats::{load_sample, write_sample};
use terrabench_core::models::{AcquisitionDate, Band, BandData, BandInfo, Label, Sample};
use terrabench_core::{SampleFormat, TerrabenchError};

fn day(d: u32) -> AcquisitionDate {
    AcquisitionDate::Day(NaiveDate::from_ymd_opt(2020, 6, d).unwrap())
}

fn make_band(name: &str, alt: &[&str], value: i16, date: Option<AcquisitionDate>) -> Band {
    Band::new(
        Array2::<i16>::from_elem((4, 4), value),
        BandInfo::plain(name, alt, 10.0),
        10.0,
        date,
    )
}

fn classification_sample(name: &str) -> Sample {
    Sample::new(
        vec![
            make_band("B02", &["blue"], 2, Some(day(1))),
            make_band("B03", &["green"], 3, Some(day(1))),
            make_band("B02", &["blue"], 20, Some(day(2))),
            make_band("B03", &["green"], 30, Some(day(2))),
        ],
        Some(Label::Value(json!(4))),
        name,
    )
    .unwrap()
}

fn band_value(band: &Band) -> i16 {
    match band.data() {
        BandData::Int16(arr) => arr[(0, 0, 0)],
        BandData::Float32(_) => panic!("expected int16 data"),
    }
}

#[test]
fn sample_round_trips_in_both_encodings() {
    for format in [SampleFormat::GeoTiff, SampleFormat::Container] {
        let dir = tempdir().unwrap();
        let sample = classification_sample("sample_042");

        let path = write_sample(&sample, dir.path(), format).unwrap();
        assert_eq!(path, format.sample_path(dir.path(), "sample_042"));

        let loaded = load_sample(&path, None, format).unwrap();
        assert_eq!(loaded.sample_name(), "sample_042");
        assert_eq!(loaded.band_names(), vec!["B02", "B03"]);
        assert_eq!(loaded.dates(), &[Some(day(1)), Some(day(2))]);
        assert_eq!(loaded.bands().len(), 4, "format {format}");

        match loaded.label() {
            Some(Label::Value(value)) => assert_eq!(value, &json!(4)),
            other => panic!("format {format}: unexpected label {other:?}"),
        }
    }
}

#[test]
fn band_selection_preserves_request_order() {
    for format in [SampleFormat::GeoTiff, SampleFormat::Container] {
        let dir = tempdir().unwrap();
        let sample = classification_sample("s");
        let path = write_sample(&sample, dir.path(), format).unwrap();

        let names = vec!["B03".to_string()];
        let loaded = load_sample(&path, Some(&names), format).unwrap();
        assert_eq!(loaded.band_names(), vec!["B03"]);
        assert_eq!(loaded.bands().len(), 2);
        assert!(loaded
            .bands()
            .iter()
            .all(|b| b.band_info().name == "B03"));

        let missing = vec!["B08".to_string()];
        assert!(matches!(
            load_sample(&path, Some(&missing), format),
            Err(TerrabenchError::UnknownBand { .. })
        ));
    }
}

#[test]
fn raster_label_round_trips() {
    for format in [SampleFormat::GeoTiff, SampleFormat::Container] {
        let dir = tempdir().unwrap();
        let label_info =
            BandInfo::segmentation_classes("label", 10.0, 4, None).unwrap();
        let label_band = Band::new(
            Array2::<i16>::from_elem((4, 4), 3),
            label_info,
            10.0,
            None,
        );
        let sample = Sample::new(
            vec![make_band("B02", &[], 7, None)],
            Some(Label::Raster(label_band)),
            "seg_sample",
        )
        .unwrap();

        let path = write_sample(&sample, dir.path(), format).unwrap();
        let loaded = load_sample(&path, None, format).unwrap();
        match loaded.label() {
            Some(Label::Raster(band)) => {
                assert!(band.band_info().is_label());
                assert_eq!(band_value(band), 3);
            }
            other => panic!("format {format}: unexpected label {other:?}"),
        }
    }
}

#[test]
fn non_label_raster_label_is_rejected() {
    for format in [SampleFormat::GeoTiff, SampleFormat::Container] {
        let dir = tempdir().unwrap();
        let sample = Sample::new(
            vec![make_band("B02", &[], 1, None)],
            Some(Label::Raster(make_band("not_a_label", &[], 0, None))),
            "bad",
        )
        .unwrap();

        assert!(matches!(
            write_sample(&sample, dir.path(), format),
            Err(TerrabenchError::InvalidLabel)
        ));
    }
}

#[test]
fn structured_label_value_round_trips() {
    let dir = tempdir().unwrap();
    let label = json!({"crop": "maize", "yield": 4.2});
    let sample = Sample::new(
        vec![make_band("B02", &[], 1, None)],
        Some(Label::Value(label.clone())),
        "s",
    )
    .unwrap();

    let path = write_sample(&sample, dir.path(), SampleFormat::Container).unwrap();
    let loaded = load_sample(&path, None, SampleFormat::Container).unwrap();
    match loaded.label() {
        Some(Label::Value(value)) => assert_eq!(value, &label),
        other => panic!("unexpected label {other:?}"),
    }
}

#[test]
fn duplicate_bands_cannot_form_a_sample() {
    let err = Sample::new(
        vec![
            make_band("B02", &[], 1, Some(day(1))),
            make_band("B02", &[], 2, Some(day(1))),
        ],
        None,
        "dup",
    )
    .unwrap_err();
    assert!(matches!(err, TerrabenchError::DuplicateBand { .. }));
}

#[test]
fn geotiff_sample_directory_layout() {
    let dir = tempdir().unwrap();
    let sample = classification_sample("layout");
    let sample_dir = write_sample(&sample, dir.path(), SampleFormat::GeoTiff).unwrap();

    assert!(sample_dir.join("band_index.json").exists());
    assert!(sample_dir.join("label.json").exists());
    assert!(sample_dir.join("B02_2020-06-01.tif").exists());
    assert!(sample_dir.join("B02_2020-06-01.meta.json").exists());
    assert!(sample_dir.join("B03_2020-06-02.tif").exists());
}
