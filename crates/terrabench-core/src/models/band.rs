//! Band data model: static band descriptors and raster slices
//!
//! A [`BandInfo`] describes the identity of a sensor band (canonical name,
//! aliases, native resolution and kind-specific fields). A [`Band`] couples
//! one raster array with its descriptor, acquisition date and georeferencing.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Result, TerrabenchError};

/// Nodata sentinel used in all persisted rasters.
pub const NODATA: i16 = 0;

/// Acquisition date of a band, either a calendar day or a full timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AcquisitionDate {
    Day(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl AcquisitionDate {
    fn sort_key(&self) -> DateTime<Utc> {
        match self {
            AcquisitionDate::Day(day) => day.and_time(NaiveTime::MIN).and_utc(),
            AcquisitionDate::Timestamp(ts) => *ts,
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            AcquisitionDate::Day(_) => 0,
            AcquisitionDate::Timestamp(_) => 1,
        }
    }
}

impl Ord for AcquisitionDate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.variant_rank().cmp(&other.variant_rank()))
    }
}

impl PartialOrd for AcquisitionDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AcquisitionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionDate::Day(day) => write!(f, "{}", day.format("%Y-%m-%d")),
            AcquisitionDate::Timestamp(ts) => {
                write!(f, "{}", ts.format("%Y-%m-%d_%H-%M-%S-UTC"))
            }
        }
    }
}

/// File-name sentinel for bands without an acquisition date.
pub const NO_DATE: &str = "NoDate";

/// Format an optional acquisition date the way persisted file names expect it.
pub fn format_date(date: Option<&AcquisitionDate>) -> String {
    match date {
        Some(date) => date.to_string(),
        None => NO_DATE.to_string(),
    }
}

/// Affine georeferencing transform, stored in GDAL coefficient order:
/// `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// Axis-aligned transform from an upper-left origin and pixel sizes.
    pub fn from_origin(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self([origin_x, pixel_width, 0.0, origin_y, 0.0, pixel_height])
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.0[0], self.0[3])
    }

    pub fn pixel_size(&self) -> (f64, f64) {
        (self.0[1], self.0[5])
    }

    pub fn is_axis_aligned(&self) -> bool {
        self.0[2] == 0.0 && self.0[4] == 0.0
    }
}

/// Kind-specific fields of a band descriptor.
///
/// The set of band kinds is closed: dispatch in [`BandInfo::expand_name`] and
/// [`BandInfo::validate`] is exhaustive over these variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BandKind {
    /// Ordinary single-channel band.
    Plain,
    /// Single-channel band with a known centre wavelength (micrometers).
    Spectral { wavelength: f64 },
    /// Binary or probability mask (e.g. cloud probability).
    Mask,
    /// 3-D band holding `n_bands` channels of the same resolution,
    /// e.g. hyperspectral cubes.
    Multi {
        n_bands: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wavelength_range: Option<(f64, f64)>,
    },
    /// Dense segmentation label with values in `[0, n_classes)`.
    /// Doubles as the label marker kind.
    SegmentationClasses {
        n_classes: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class_names: Option<Vec<String>>,
    },
}

/// Static descriptor of a band's identity.
///
/// Equality, hashing and ordering use only the canonical `name`, so
/// descriptors from different converters compare equal as long as the
/// canonical names match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandInfo {
    /// Canonical name. Defines the sort order of band collections.
    pub name: String,
    /// Alternative names usable for lookup, e.g. "red" for "04 - Red".
    pub alt_names: Vec<String>,
    /// Native resolution of the sensor, in meters.
    pub spatial_resolution: f64,
    pub kind: BandKind,
}

impl BandInfo {
    pub fn new(
        name: &str,
        alt_names: &[&str],
        spatial_resolution: f64,
        kind: BandKind,
    ) -> Self {
        Self {
            name: name.to_string(),
            alt_names: alt_names.iter().map(|s| s.to_string()).collect(),
            spatial_resolution,
            kind,
        }
    }

    pub fn plain(name: &str, alt_names: &[&str], spatial_resolution: f64) -> Self {
        Self::new(name, alt_names, spatial_resolution, BandKind::Plain)
    }

    pub fn spectral(
        name: &str,
        alt_names: &[&str],
        spatial_resolution: f64,
        wavelength: f64,
    ) -> Self {
        Self::new(
            name,
            alt_names,
            spatial_resolution,
            BandKind::Spectral { wavelength },
        )
    }

    pub fn mask(name: &str, alt_names: &[&str], spatial_resolution: f64) -> Self {
        Self::new(name, alt_names, spatial_resolution, BandKind::Mask)
    }

    pub fn multi(name: &str, alt_names: &[&str], spatial_resolution: f64, n_bands: usize) -> Self {
        Self::new(
            name,
            alt_names,
            spatial_resolution,
            BandKind::Multi {
                n_bands,
                wavelength_range: None,
            },
        )
    }

    pub fn hyperspectral(
        name: &str,
        alt_names: &[&str],
        spatial_resolution: f64,
        n_bands: usize,
        wavelength_range: (f64, f64),
    ) -> Self {
        Self::new(
            name,
            alt_names,
            spatial_resolution,
            BandKind::Multi {
                n_bands,
                wavelength_range: Some(wavelength_range),
            },
        )
    }

    /// Segmentation-label descriptor. `class_names`, when given, must have
    /// exactly `n_classes` entries.
    pub fn segmentation_classes(
        name: &str,
        spatial_resolution: f64,
        n_classes: usize,
        class_names: Option<Vec<String>>,
    ) -> Result<Self> {
        if let Some(names) = &class_names {
            if names.len() != n_classes {
                return Err(TerrabenchError::ClassNameCount {
                    got: names.len(),
                    expected: n_classes,
                });
            }
        }
        Ok(Self::new(
            name,
            &[],
            spatial_resolution,
            BandKind::SegmentationClasses {
                n_classes,
                class_names,
            },
        ))
    }

    /// Per-channel names to use when flattening this band into a flat
    /// channel axis: repeated `n_bands` times for multi-channel kinds.
    pub fn expand_name(&self) -> Vec<String> {
        match &self.kind {
            BandKind::Multi { n_bands, .. } => vec![self.name.clone(); *n_bands],
            _ => vec![self.name.clone()],
        }
    }

    /// Number of channels this band contributes to a packed array.
    pub fn n_channels(&self) -> usize {
        match &self.kind {
            BandKind::Multi { n_bands, .. } => *n_bands,
            _ => 1,
        }
    }

    /// Whether this descriptor marks a label band.
    pub fn is_label(&self) -> bool {
        matches!(self.kind, BandKind::SegmentationClasses { .. })
    }

    /// Canonical name followed by all aliases.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.alt_names.iter().map(|s| s.as_str()))
    }

    /// Check that `band` is a valid instance of this descriptor.
    ///
    /// Non-int16 data and a missing geotransform are reported as warnings;
    /// a descriptor mismatch or out-of-range segmentation values are errors.
    pub fn validate(&self, band: &Band) -> Result<()> {
        if band.band_info() != self {
            return Err(TerrabenchError::BandInfoMismatch {
                expected: self.name.clone(),
                got: band.band_info().name.clone(),
            });
        }
        if !matches!(band.data(), BandData::Int16(_)) {
            tracing::warn!(band = %self.name, "band data is expected to be int16");
        }
        if band.transform().is_none() {
            tracing::warn!(band = %self.name, "no geotransform specified");
        }
        if let BandKind::SegmentationClasses { n_classes, .. } = &self.kind {
            let (min, max) = band.data().value_range();
            if min < 0.0 || max >= *n_classes as f64 {
                return Err(TerrabenchError::ClassIndexOutOfRange {
                    band: self.name.clone(),
                    min,
                    max,
                    n_classes: *n_classes,
                });
            }
        }
        Ok(())
    }
}

impl PartialEq for BandInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for BandInfo {}

impl Hash for BandInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for BandInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BandInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for BandInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Band {} ({:.1}m resolution)",
            self.name, self.spatial_resolution
        )
    }
}

/// Pixel data of a band, always held as `[height, width, channels]`.
///
/// 2-D input gets a trailing channel axis of size one at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum BandData {
    Int16(Array3<i16>),
    Float32(Array3<f32>),
}

impl BandData {
    pub fn shape(&self) -> (usize, usize, usize) {
        let dim = match self {
            BandData::Int16(arr) => arr.dim(),
            BandData::Float32(arr) => arr.dim(),
        };
        (dim.0, dim.1, dim.2)
    }

    pub fn height(&self) -> usize {
        self.shape().0
    }

    pub fn width(&self) -> usize {
        self.shape().1
    }

    pub fn channels(&self) -> usize {
        self.shape().2
    }

    /// Pixel data cast to f32.
    pub fn to_f32(&self) -> Array3<f32> {
        match self {
            BandData::Int16(arr) => arr.mapv(|v| v as f32),
            BandData::Float32(arr) => arr.clone(),
        }
    }

    /// Minimum and maximum pixel value, as f64. Empty arrays yield (0, 0).
    pub fn value_range(&self) -> (f64, f64) {
        fn fold<T: Copy + Into<f64>>(values: impl Iterator<Item = T>) -> (f64, f64) {
            values.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
                let v: f64 = v.into();
                (min.min(v), max.max(v))
            })
        }
        let (min, max) = match self {
            BandData::Int16(arr) => fold(arr.iter().copied()),
            BandData::Float32(arr) => fold(arr.iter().copied()),
        };
        if min.is_infinite() {
            (0.0, 0.0)
        } else {
            (min, max)
        }
    }
}

impl From<Array2<i16>> for BandData {
    fn from(arr: Array2<i16>) -> Self {
        BandData::Int16(arr.insert_axis(Axis(2)))
    }
}

impl From<Array3<i16>> for BandData {
    fn from(arr: Array3<i16>) -> Self {
        BandData::Int16(arr)
    }
}

impl From<Array2<f32>> for BandData {
    fn from(arr: Array2<f32>) -> Self {
        BandData::Float32(arr.insert_axis(Axis(2)))
    }
}

impl From<Array3<f32>> for BandData {
    fn from(arr: Array3<f32>) -> Self {
        BandData::Float32(arr)
    }
}

/// One raster slice plus its descriptor, acquisition date and
/// georeferencing. Read-only after construction.
#[derive(Debug, Clone)]
pub struct Band {
    data: BandData,
    band_info: BandInfo,
    /// Current resolution of the pixels in meters. May differ from
    /// `band_info.spatial_resolution` when the data was resampled.
    spatial_resolution: f64,
    date: Option<AcquisitionDate>,
    /// Used for ordering and grouping dates in time series. Defaults to the
    /// formatted date.
    date_id: Option<String>,
    transform: Option<GeoTransform>,
    crs: Option<String>,
    meta_info: Option<serde_json::Value>,
    /// Convert float data to int16 when persisted (default). Encoding fails
    /// if the conversion would lose data.
    convert_to_int16: bool,
}

impl Band {
    pub fn new(
        data: impl Into<BandData>,
        band_info: BandInfo,
        spatial_resolution: f64,
        date: Option<AcquisitionDate>,
    ) -> Self {
        Self {
            data: data.into(),
            band_info,
            spatial_resolution,
            date,
            date_id: None,
            transform: None,
            crs: None,
            meta_info: None,
            convert_to_int16: true,
        }
    }

    pub fn with_date_id(mut self, date_id: &str) -> Self {
        self.date_id = Some(date_id.to_string());
        self
    }

    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_crs(mut self, crs: &str) -> Self {
        self.crs = Some(crs.to_string());
        self
    }

    pub fn with_meta_info(mut self, meta_info: serde_json::Value) -> Self {
        self.meta_info = Some(meta_info);
        self
    }

    /// Persist float data as f32 instead of converting to int16.
    pub fn without_int16_conversion(mut self) -> Self {
        self.convert_to_int16 = false;
        self
    }

    pub fn data(&self) -> &BandData {
        &self.data
    }

    pub fn band_info(&self) -> &BandInfo {
        &self.band_info
    }

    pub fn spatial_resolution(&self) -> f64 {
        self.spatial_resolution
    }

    pub fn date(&self) -> Option<&AcquisitionDate> {
        self.date.as_ref()
    }

    /// Date identifier used for grouping time steps. Falls back to the
    /// formatted acquisition date.
    pub fn date_id(&self) -> Option<String> {
        self.date_id
            .clone()
            .or_else(|| self.date.map(|d| d.to_string()))
    }

    pub fn transform(&self) -> Option<&GeoTransform> {
        self.transform.as_ref()
    }

    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    pub fn meta_info(&self) -> Option<&serde_json::Value> {
        self.meta_info.as_ref()
    }

    pub fn convert_to_int16(&self) -> bool {
        self.convert_to_int16
    }

    /// Persisted identity of this band: the canonical name, suffixed with
    /// the formatted acquisition date when one is present.
    pub fn descriptor(&self) -> String {
        match &self.date {
            Some(date) => format!("{}_{}", self.band_info.name, date),
            None => self.band_info.name.clone(),
        }
    }

    /// Pixel data as it will be persisted.
    ///
    /// With `convert_to_int16` (the default), float data is validated and
    /// rounded to int16: values outside `[-32768, 32767]` raise
    /// [`TerrabenchError::PixelOutOfRange`], and values in `(1e-6, 0.5]`
    /// raise [`TerrabenchError::PrecisionLoss`] because they would silently
    /// round to the nodata sentinel `0`.
    pub fn encoded_data(&self) -> Result<BandData> {
        match &self.data {
            BandData::Int16(_) => Ok(self.data.clone()),
            BandData::Float32(arr) => {
                if !self.convert_to_int16 {
                    return Ok(self.data.clone());
                }
                let (min, max) = self.data.value_range();
                if min < i16::MIN as f64 || max > i16::MAX as f64 {
                    return Err(TerrabenchError::PixelOutOfRange {
                        band: self.band_info.name.clone(),
                        min,
                        max,
                    });
                }
                if arr.iter().any(|&v| v > 1e-6 && v <= 0.5) {
                    return Err(TerrabenchError::PrecisionLoss {
                        band: self.band_info.name.clone(),
                    });
                }
                Ok(BandData::Int16(arr.mapv(|v| v.round() as i16)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn day(y: i32, m: u32, d: u32) -> AcquisitionDate {
        AcquisitionDate::Day(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn date_formatting() {
        assert_eq!(day(2020, 1, 1).to_string(), "2020-01-01");
        assert_eq!(format_date(None), "NoDate");
        let ts = AcquisitionDate::Timestamp(
            NaiveDate::from_ymd_opt(2020, 1, 1)
                .unwrap()
                .and_hms_opt(13, 5, 40)
                .unwrap()
                .and_utc(),
        );
        assert_eq!(ts.to_string(), "2020-01-01_13-05-40-UTC");
    }

    #[test]
    fn band_info_identity_is_name_only() {
        let a = BandInfo::spectral("04 - Red", &["red"], 10.0, 0.665);
        let b = BandInfo::plain("04 - Red", &[], 60.0);
        assert_eq!(a, b);
        assert!(BandInfo::plain("A", &[], 1.0) < BandInfo::plain("B", &[], 1.0));
    }

    #[test]
    fn expand_name_repeats_multi_channels() {
        let multi = BandInfo::multi("cube", &[], 30.0, 4);
        assert_eq!(multi.expand_name().len(), 4);
        assert_eq!(BandInfo::plain("x", &[], 1.0).expand_name(), vec!["x"]);
    }

    #[test]
    fn descriptor_includes_date() {
        let info = BandInfo::plain("B02", &[], 10.0);
        let band = Band::new(
            Array2::<i16>::zeros((2, 2)),
            info.clone(),
            10.0,
            Some(day(2020, 1, 1)),
        );
        assert_eq!(band.descriptor(), "B02_2020-01-01");
        let undated = Band::new(Array2::<i16>::zeros((2, 2)), info, 10.0, None);
        assert_eq!(undated.descriptor(), "B02");
    }

    #[test]
    fn class_names_must_match_count() {
        let err = BandInfo::segmentation_classes(
            "label",
            10.0,
            3,
            Some(vec!["a".into(), "b".into()]),
        );
        assert!(err.is_err());
    }
}
