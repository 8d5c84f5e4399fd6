//! Per-band distributional statistics, persisted as `band_stats.json` and
//! used for image normalization in training pipelines.

use rand::seq::index;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::dataset::Dataset;
use crate::models::sample::Label;

pub const BAND_STATS_FILE: &str = "band_stats.json";

/// Distribution summary of one band (or of the label values).
/// All fields are f64 to avoid serialization surprises with int16 pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub median: f64,
    pub percentile_0_1: f64,
    pub percentile_1: f64,
    pub percentile_5: f64,
    pub percentile_95: f64,
    pub percentile_99: f64,
    pub percentile_99_9: f64,
}

/// Summarize a set of values. Percentiles use linear interpolation between
/// the closest ranks. An empty input yields all-zero statistics.
pub fn compute_stats(values: &[f64]) -> BandStats {
    if values.is_empty() {
        tracing::warn!("computing statistics over an empty value set");
        return BandStats {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            std: 0.0,
            median: 0.0,
            percentile_0_1: 0.0,
            percentile_1: 0.0,
            percentile_5: 0.0,
            percentile_95: 0.0,
            percentile_99: 0.0,
            percentile_99_9: 0.0,
        };
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    BandStats {
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        mean,
        std: variance.sqrt(),
        median: percentile(&sorted, 50.0),
        percentile_0_1: percentile(&sorted, 0.1),
        percentile_1: percentile(&sorted, 1.0),
        percentile_5: percentile(&sorted, 5.0),
        percentile_95: percentile(&sorted, 95.0),
        percentile_99: percentile(&sorted, 99.0),
        percentile_99_9: percentile(&sorted, 99.9),
    }
}

/// Linear-interpolated percentile of an ascending-sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Compute per-band statistics over a dataset by sampling pixel values.
///
/// `n_value_per_image` caps the number of values drawn from each band of
/// each sample (random, without replacement); `n_samples` caps the number of
/// samples visited. Raster and scalar labels are accumulated under the
/// reserved name `"label"`.
pub fn compute_dataset_statistics(
    dataset: &Dataset,
    n_value_per_image: Option<usize>,
    n_samples: Option<usize>,
) -> Result<HashMap<String, BandStats>> {
    let mut rng = rand::rng();
    let indices: Vec<usize> = match n_samples {
        Some(count) if count < dataset.len() => {
            index::sample(&mut rng, dataset.len(), count).into_vec()
        }
        _ => (0..dataset.len()).collect(),
    };

    let mut accumulator: HashMap<String, Vec<f64>> = HashMap::new();
    for idx in indices {
        let sample = dataset.get(idx)?;

        for band in sample.bands() {
            let values = subsample(band.data().to_f32().iter().map(|&v| v as f64).collect(),
                n_value_per_image, &mut rng);
            accumulator
                .entry(band.band_info().name.clone())
                .or_default()
                .extend(values);
        }

        match sample.label() {
            Some(Label::Raster(band)) => {
                let values = subsample(band.data().to_f32().iter().map(|&v| v as f64).collect(),
                    n_value_per_image, &mut rng);
                accumulator.entry("label".to_string()).or_default().extend(values);
            }
            Some(Label::Value(value)) => {
                if let Some(v) = value.as_f64() {
                    accumulator.entry("label".to_string()).or_default().push(v);
                } else {
                    tracing::debug!(sample = sample.sample_name(), "skipping non-numeric label");
                }
            }
            None => {}
        }
    }

    Ok(accumulator
        .into_iter()
        .map(|(name, values)| (name, compute_stats(&values)))
        .collect())
}

fn subsample(values: Vec<f64>, max_count: Option<usize>, rng: &mut impl rand::Rng) -> Vec<f64> {
    match max_count {
        Some(count) if count < values.len() => index::sample(rng, values.len(), count)
            .into_iter()
            .map(|i| values[i])
            .collect(),
        _ => values,
    }
}

/// Persist statistics as `band_stats.json` under the dataset directory.
pub fn write_band_stats(
    dataset_dir: &Path,
    stats: &HashMap<String, BandStats>,
) -> Result<PathBuf> {
    let path = dataset_dir.join(BAND_STATS_FILE);
    serde_json::to_writer_pretty(File::create(&path)?, stats)?;
    Ok(path)
}
