//! On-disk sample encodings.
//!
//! Two interchangeable encodings persist a [`Sample`]: a directory of
//! geotiff files with JSON sidecars ([`geotiff`]) and a single-file
//! safetensors container ([`container`]). Both loaders reconstruct an
//! equivalent sample; the round trip is the core correctness property of
//! this layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, TerrabenchError};
use crate::models::band::{AcquisitionDate, Band, BandData, BandInfo, GeoTransform};
use crate::models::sample::Sample;

pub mod container;
pub mod geotiff;

/// Selects the persisted encoding of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    /// One geotiff per (band, date) in a per-sample directory, plus a
    /// band index manifest and a label file.
    GeoTiff,
    /// One safetensors file per sample holding all bands and a metadata blob.
    Container,
}

impl Default for SampleFormat {
    fn default() -> Self {
        SampleFormat::Container
    }
}

impl SampleFormat {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "geotiff" | "tif" => Ok(SampleFormat::GeoTiff),
            "container" | "safetensors" => Ok(SampleFormat::Container),
            _ => Err(TerrabenchError::ConfigInvalid {
                key: "format".to_string(),
                reason: format!("Invalid sample format: {}. Use geotiff or container", name),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::GeoTiff => "geotiff",
            SampleFormat::Container => "container",
        }
    }

    /// Path of the persisted sample named `sample_name` under `dataset_dir`.
    pub fn sample_path(&self, dataset_dir: &Path, sample_name: &str) -> PathBuf {
        match self {
            SampleFormat::GeoTiff => dataset_dir.join(sample_name),
            SampleFormat::Container => dataset_dir.join(format!("{sample_name}.safetensors")),
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Persist `sample` under `dataset_dir`; returns the sample path.
pub fn write_sample(sample: &Sample, dataset_dir: &Path, format: SampleFormat) -> Result<PathBuf> {
    match format {
        SampleFormat::GeoTiff => geotiff::write_sample_dir(sample, dataset_dir),
        SampleFormat::Container => container::write_sample_container(sample, dataset_dir),
    }
}

/// Load a persisted sample, restricted to `band_names` (canonical names)
/// when given.
pub fn load_sample(
    sample_path: &Path,
    band_names: Option<&[String]>,
    format: SampleFormat,
) -> Result<Sample> {
    match format {
        SampleFormat::GeoTiff => geotiff::load_sample_dir(sample_path, band_names),
        SampleFormat::Container => container::load_sample_container(sample_path, band_names),
    }
}

/// Non-pixel band metadata persisted next to the pixel data: the JSON
/// sidecar of a geotiff, or part of the container metadata blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BandAttrs {
    pub date: Option<AcquisitionDate>,
    pub date_id: Option<String>,
    pub spatial_resolution: f64,
    pub band_info: BandInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_info: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<GeoTransform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
}

impl BandAttrs {
    pub(crate) fn from_band(band: &Band) -> Self {
        Self {
            date: band.date().copied(),
            date_id: band.date_id(),
            spatial_resolution: band.spatial_resolution(),
            band_info: band.band_info().clone(),
            meta_info: band.meta_info().cloned(),
            transform: band.transform().copied(),
            crs: band.crs().map(|s| s.to_string()),
        }
    }

    /// Rebuild a band from these attributes and loaded pixel data.
    /// Float data is assumed to have been persisted deliberately as f32.
    pub(crate) fn into_band(self, data: BandData) -> Band {
        let keep_float = matches!(data, BandData::Float32(_));
        let mut band = Band::new(data, self.band_info, self.spatial_resolution, self.date);
        if let Some(date_id) = &self.date_id {
            band = band.with_date_id(date_id);
        }
        if let Some(transform) = self.transform {
            band = band.with_transform(transform);
        }
        if let Some(crs) = &self.crs {
            band = band.with_crs(crs);
        }
        if let Some(meta_info) = self.meta_info {
            band = band.with_meta_info(meta_info);
        }
        if keep_float {
            band = band.without_int16_conversion();
        }
        band
    }
}

/// Ordered band-name manifest: canonical name to persisted file names or
/// container keys, preserving band insertion order for stable reload.
pub(crate) type BandManifest = Vec<(String, Vec<String>)>;

pub(crate) fn manifest_entry<'a>(
    manifest: &'a BandManifest,
    name: &str,
) -> Result<&'a (String, Vec<String>)> {
    manifest
        .iter()
        .find(|(entry_name, _)| entry_name == name)
        .ok_or_else(|| TerrabenchError::UnknownBand {
            name: name.to_string(),
        })
}
