//! Geotiff band encoding and the directory-of-files sample encoding.
//!
//! Each (band, date) combination becomes one deflate-compressed multi-page
//! geotiff (one grayscale page per channel) with the nodata sentinel `0`,
//! plus a structured JSON sidecar carrying the non-pixel metadata. A sample
//! directory additionally holds a `band_index.json` manifest and the label.

use ndarray::{Array3, Axis};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, GrayI16};
use tiff::encoder::compression::Deflate;
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

use crate::error::{Result, TerrabenchError};
use crate::formats::{manifest_entry, BandAttrs, BandManifest};
use crate::models::band::{format_date, Band, BandData, BandKind};
use crate::models::sample::{Label, Sample};

const BAND_INDEX_FILE: &str = "band_index.json";
const LABEL_JSON_FILE: &str = "label.json";
const LABEL_TIF_STEM: &str = "label";

/// Write one band to `{descriptor}.tif` + `{descriptor}.meta.json` inside
/// `directory`; returns the tiff path.
pub fn write_band(band: &Band, directory: &Path) -> Result<PathBuf> {
    write_band_as(band, directory, &band.descriptor())
}

fn write_band_as(band: &Band, directory: &Path, stem: &str) -> Result<PathBuf> {
    let data = band.encoded_data()?;
    let file_path = directory.join(format!("{stem}.tif"));
    let (height, width, channels) = data.shape();

    let mut encoder = TiffEncoder::new(File::create(&file_path)?)?;
    for channel in 0..channels {
        // Zero-padded channel prefix keeps multi-channel descriptions in a
        // stable, parseable order.
        let description = if channels == 1 {
            band.band_info().name.clone()
        } else {
            format!("{channel:03}_{}", band.band_info().name)
        };
        match &data {
            BandData::Int16(arr) => {
                let plane: Vec<i16> = arr.index_axis(Axis(2), channel).iter().copied().collect();
                let mut image = encoder.new_image_with_compression::<GrayI16, Deflate>(
                    width as u32,
                    height as u32,
                    Deflate::default(),
                )?;
                write_band_tags(image.encoder(), band, &description)?;
                image.write_data(&plane)?;
            }
            BandData::Float32(arr) => {
                let plane: Vec<f32> = arr.index_axis(Axis(2), channel).iter().copied().collect();
                let mut image = encoder.new_image_with_compression::<Gray32Float, Deflate>(
                    width as u32,
                    height as u32,
                    Deflate::default(),
                )?;
                write_band_tags(image.encoder(), band, &description)?;
                image.write_data(&plane)?;
            }
        }
    }

    let meta_path = directory.join(format!("{stem}.meta.json"));
    serde_json::to_writer_pretty(File::create(meta_path)?, &BandAttrs::from_band(band))?;

    Ok(file_path)
}

fn write_band_tags<W: Write + Seek, K: TiffKind>(
    encoder: &mut DirectoryEncoder<'_, W, K>,
    band: &Band,
    description: &str,
) -> Result<()> {
    encoder.write_tag(Tag::ImageDescription, description)?;
    encoder.write_tag(Tag::GdalNodata, "0")?;
    if let Some(transform) = band.transform() {
        if transform.is_axis_aligned() {
            let (pixel_width, pixel_height) = transform.pixel_size();
            let (origin_x, origin_y) = transform.origin();
            encoder.write_tag(
                Tag::ModelPixelScaleTag,
                &[pixel_width, pixel_height.abs(), 0.0][..],
            )?;
            encoder.write_tag(
                Tag::ModelTiepointTag,
                &[0.0, 0.0, 0.0, origin_x, origin_y, 0.0][..],
            )?;
        }
    }
    Ok(())
}

/// Load one band back from its tiff and sidecar.
pub fn load_band(file_path: &Path) -> Result<Band> {
    let meta_path = file_path.with_extension("meta.json");
    let meta_file = File::open(&meta_path).map_err(|_| TerrabenchError::FormatCorruption {
        path: file_path.to_path_buf(),
        reason: format!("missing metadata sidecar {}", meta_path.display()),
    })?;
    let attrs: BandAttrs = serde_json::from_reader(meta_file)?;

    let mut decoder = Decoder::new(File::open(file_path)?)?;
    let (width, height) = decoder.dimensions()?;
    let mut int_planes: Vec<Vec<i16>> = Vec::new();
    let mut float_planes: Vec<Vec<f32>> = Vec::new();
    loop {
        let (page_width, page_height) = decoder.dimensions()?;
        if (page_width, page_height) != (width, height) {
            return Err(TerrabenchError::FormatCorruption {
                path: file_path.to_path_buf(),
                reason: "pages have inconsistent dimensions".to_string(),
            });
        }
        match decoder.read_image()? {
            DecodingResult::I16(plane) => int_planes.push(plane),
            DecodingResult::F32(plane) => float_planes.push(plane),
            _ => {
                return Err(TerrabenchError::FormatCorruption {
                    path: file_path.to_path_buf(),
                    reason: "unexpected sample format, expected int16 or float32".to_string(),
                })
            }
        }
        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }
    if !int_planes.is_empty() && !float_planes.is_empty() {
        return Err(TerrabenchError::FormatCorruption {
            path: file_path.to_path_buf(),
            reason: "pages mix int16 and float32 sample formats".to_string(),
        });
    }

    let channels = int_planes.len() + float_planes.len();
    if channels != 1 && !matches!(attrs.band_info.kind, BandKind::Multi { .. }) {
        return Err(TerrabenchError::FormatCorruption {
            path: file_path.to_path_buf(),
            reason: format!(
                "band {} is not multi-channel but has {} pages",
                attrs.band_info.name, channels
            ),
        });
    }

    let (height, width) = (height as usize, width as usize);
    let data = if float_planes.is_empty() {
        BandData::Int16(assemble_planes(&int_planes, height, width))
    } else {
        BandData::Float32(assemble_planes(&float_planes, height, width))
    };
    Ok(attrs.into_band(data))
}

/// Interleave per-channel row-major planes into `[height, width, channels]`.
fn assemble_planes<T: Copy>(planes: &[Vec<T>], height: usize, width: usize) -> Array3<T> {
    Array3::from_shape_fn((height, width, planes.len()), |(y, x, c)| {
        planes[c][y * width + x]
    })
}

/// Directory-of-files sample encoding: one geotiff per (band, date), a
/// `band_index.json` manifest preserving insertion order, and the label as
/// either `label.json` or `label.tif`.
pub fn write_sample_dir(sample: &Sample, dataset_dir: &Path) -> Result<PathBuf> {
    let dst_dir = dataset_dir.join(sample.sample_name());
    fs::create_dir_all(&dst_dir)?;

    // Reject colliding file names before anything is written.
    let mut file_names = HashSet::new();
    for band in sample.bands() {
        if !file_names.insert(format!("{}.tif", band.descriptor())) {
            return Err(TerrabenchError::DuplicateBand {
                name: band.band_info().name.clone(),
                date: format_date(band.date()),
            });
        }
    }

    let mut band_index: BandManifest = Vec::new();
    for band in sample.bands() {
        let path = write_band(band, &dst_dir)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let name = &band.band_info().name;
        match band_index.iter_mut().find(|(entry, _)| entry == name) {
            Some((_, files)) => files.push(file_name),
            None => band_index.push((name.clone(), vec![file_name])),
        }
    }
    serde_json::to_writer(File::create(dst_dir.join(BAND_INDEX_FILE))?, &band_index)?;

    match sample.label() {
        Some(Label::Raster(band)) => {
            if !band.band_info().is_label() {
                return Err(TerrabenchError::InvalidLabel);
            }
            write_band_as(band, &dst_dir, LABEL_TIF_STEM)?;
        }
        Some(Label::Value(value)) => {
            serde_json::to_writer(File::create(dst_dir.join(LABEL_JSON_FILE))?, value)?;
        }
        None => {}
    }

    Ok(dst_dir)
}

/// Load a sample from its directory, restricted to `band_names` (canonical
/// names, in the requested order) when given.
pub fn load_sample_dir(sample_dir: &Path, band_names: Option<&[String]>) -> Result<Sample> {
    let index_path = sample_dir.join(BAND_INDEX_FILE);
    let index_file = File::open(&index_path).map_err(|_| TerrabenchError::FormatCorruption {
        path: sample_dir.to_path_buf(),
        reason: format!("missing {}", BAND_INDEX_FILE),
    })?;
    let band_index: BandManifest = serde_json::from_reader(index_file)?;

    let mut bands = Vec::new();
    match band_names {
        None => {
            for (_, files) in &band_index {
                for file_name in files {
                    bands.push(load_band(&sample_dir.join(file_name))?);
                }
            }
        }
        Some(names) => {
            for name in names {
                let (_, files) = manifest_entry(&band_index, name)?;
                for file_name in files {
                    bands.push(load_band(&sample_dir.join(file_name))?);
                }
            }
        }
    }

    let label_json = sample_dir.join(LABEL_JSON_FILE);
    let label_tif = sample_dir.join(format!("{LABEL_TIF_STEM}.tif"));
    let label = if label_json.exists() {
        Some(Label::Value(serde_json::from_reader(File::open(
            label_json,
        )?)?))
    } else if label_tif.exists() {
        Some(Label::Raster(load_band(&label_tif)?))
    } else {
        None
    };

    let sample_name = sample_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TerrabenchError::FormatCorruption {
            path: sample_dir.to_path_buf(),
            reason: "sample directory has no valid name".to_string(),
        })?;

    Sample::new(bands, label, sample_name)
}
