//! Single-file container sample encoding.
//!
//! One safetensors file per sample: a named tensor per persisted band
//! (keyed by the band descriptor), an optional `label` tensor for raster
//! labels, and one JSON attribute blob in the header metadata map holding
//! the per-band metadata, the ordered band manifest and plain label values.

use ndarray::Array3;
use safetensors::tensor::SafeTensors;
use safetensors::{Dtype, View};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TerrabenchError};
use crate::formats::BandAttrs;
use crate::models::band::{format_date, BandData};
use crate::models::sample::{Label, Sample};

const ATTRS_KEY: &str = "attrs";
const LABEL_KEY: &str = "label";

/// The JSON attribute blob stored in the container header.
#[derive(Debug, Serialize, Deserialize)]
struct ContainerAttrs {
    /// Per-band attributes, in band insertion order. The entry order is the
    /// manifest: reload walks it to restore the original band order.
    bands: Vec<ContainerBandEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<ContainerLabel>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContainerBandEntry {
    /// Tensor key: the band descriptor (canonical name, date-suffixed).
    key: String,
    #[serde(flatten)]
    attrs: BandAttrs,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ContainerLabel {
    /// Raster label; pixel data lives in the `label` tensor.
    Raster { attrs: BandAttrs },
    /// Plain label value (class index, regression target, record).
    Value { value: serde_json::Value },
}

/// Owned tensor buffer handed to the safetensors serializer.
struct TensorData {
    dtype: Dtype,
    shape: Vec<usize>,
    bytes: Vec<u8>,
}

impl TensorData {
    fn from_band_data(data: &BandData) -> Self {
        let (height, width, channels) = data.shape();
        let shape = vec![height, width, channels];
        match data {
            BandData::Int16(arr) => Self {
                dtype: Dtype::I16,
                shape,
                bytes: arr.iter().flat_map(|v| v.to_le_bytes()).collect(),
            },
            BandData::Float32(arr) => Self {
                dtype: Dtype::F32,
                shape,
                bytes: arr.iter().flat_map(|v| v.to_le_bytes()).collect(),
            },
        }
    }
}

impl View for TensorData {
    fn dtype(&self) -> Dtype {
        self.dtype
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.bytes)
    }

    fn data_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Write `sample` to `{sample_name}.safetensors` under `dataset_dir`.
pub fn write_sample_container(sample: &Sample, dataset_dir: &Path) -> Result<PathBuf> {
    let path = dataset_dir.join(format!("{}.safetensors", sample.sample_name()));

    let mut tensors: Vec<(String, TensorData)> = Vec::new();
    let mut entries = Vec::new();
    let mut seen_keys = HashSet::new();
    for band in sample.bands() {
        let key = band.descriptor();
        if !seen_keys.insert(key.clone()) {
            return Err(TerrabenchError::DuplicateBand {
                name: band.band_info().name.clone(),
                date: format_date(band.date()),
            });
        }
        tensors.push((key.clone(), TensorData::from_band_data(&band.encoded_data()?)));
        entries.push(ContainerBandEntry {
            key,
            attrs: BandAttrs::from_band(band),
        });
    }

    let label = match sample.label() {
        Some(Label::Raster(band)) => {
            if !band.band_info().is_label() {
                return Err(TerrabenchError::InvalidLabel);
            }
            tensors.push((
                LABEL_KEY.to_string(),
                TensorData::from_band_data(&band.encoded_data()?),
            ));
            Some(ContainerLabel::Raster {
                attrs: BandAttrs::from_band(band),
            })
        }
        Some(Label::Value(value)) => Some(ContainerLabel::Value {
            value: value.clone(),
        }),
        None => None,
    };

    let attrs = ContainerAttrs {
        bands: entries,
        label,
    };
    let mut metadata = HashMap::new();
    metadata.insert(ATTRS_KEY.to_string(), serde_json::to_string(&attrs)?);

    let bytes = safetensors::serialize(tensors, &Some(metadata))?;
    fs::write(&path, bytes)?;
    Ok(path)
}

/// Load a sample from its container file, restricted to `band_names`
/// (canonical names, in the requested order) when given.
pub fn load_sample_container(path: &Path, band_names: Option<&[String]>) -> Result<Sample> {
    let buffer = fs::read(path)?;

    let (_, header) = SafeTensors::read_metadata(&buffer)?;
    let attrs_json = header
        .metadata()
        .as_ref()
        .and_then(|meta| meta.get(ATTRS_KEY))
        .ok_or_else(|| TerrabenchError::FormatCorruption {
            path: path.to_path_buf(),
            reason: format!("missing {} entry in container metadata", ATTRS_KEY),
        })?;
    let attrs: ContainerAttrs = serde_json::from_str(attrs_json)?;

    let tensors = SafeTensors::deserialize(&buffer)?;

    let selected: Vec<&ContainerBandEntry> = match band_names {
        None => attrs.bands.iter().collect(),
        Some(names) => {
            let mut selected = Vec::new();
            for name in names {
                let matches: Vec<_> = attrs
                    .bands
                    .iter()
                    .filter(|entry| &entry.attrs.band_info.name == name)
                    .collect();
                if matches.is_empty() {
                    return Err(TerrabenchError::UnknownBand { name: name.clone() });
                }
                selected.extend(matches);
            }
            selected
        }
    };

    let mut bands = Vec::with_capacity(selected.len());
    for entry in selected {
        let view = tensors.tensor(&entry.key)?;
        let data = band_data_from_view(&view, path)?;
        bands.push(entry.attrs.clone().into_band(data));
    }

    let label = match attrs.label {
        Some(ContainerLabel::Raster { attrs }) => {
            let view = tensors.tensor(LABEL_KEY)?;
            Some(Label::Raster(attrs.into_band(band_data_from_view(
                &view, path,
            )?)))
        }
        Some(ContainerLabel::Value { value }) => Some(Label::Value(value)),
        None => None,
    };

    let sample_name = path
        .file_stem()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TerrabenchError::FormatCorruption {
            path: path.to_path_buf(),
            reason: "container file has no valid name".to_string(),
        })?;

    Sample::new(bands, label, sample_name)
}

fn band_data_from_view(
    view: &safetensors::tensor::TensorView<'_>,
    path: &Path,
) -> Result<BandData> {
    let shape = view.shape();
    if shape.len() != 3 {
        return Err(TerrabenchError::FormatCorruption {
            path: path.to_path_buf(),
            reason: format!("band tensor has rank {}, expected 3", shape.len()),
        });
    }
    let dim = (shape[0], shape[1], shape[2]);
    let bytes = view.data();
    match view.dtype() {
        Dtype::I16 => {
            let values: Vec<i16> = bytes
                .chunks_exact(2)
                .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
                .collect();
            Ok(BandData::Int16(Array3::from_shape_vec(dim, values)?))
        }
        Dtype::F32 => {
            let values: Vec<f32> = bytes
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect();
            Ok(BandData::Float32(Array3::from_shape_vec(dim, values)?))
        }
        other => Err(TerrabenchError::FormatCorruption {
            path: path.to_path_buf(),
            reason: format!("unsupported tensor dtype {:?}", other),
        }),
    }
}
