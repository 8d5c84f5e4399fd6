//! Dataset access: task specification, partition handling and sample loading.
//!
//! A converted dataset is a flat directory of persisted samples plus three
//! kinds of metadata files: `task_specs.json` (what the dataset is),
//! `*_partition.json` (train/valid/test memberships, `default_partition.json`
//! being the one loaded when the caller does not choose) and
//! `band_stats.json` (per-band normalization statistics).

use rand::seq::index;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{Result, TerrabenchError};
use crate::formats::{self, SampleFormat};
use crate::models::band::BandInfo;
use crate::models::partition::{Partition, Split, DEFAULT_PARTITION_NAME};
use crate::models::sample::Sample;
use crate::models::stats::{BandStats, BAND_STATS_FILE};

pub const TASK_SPECS_FILE: &str = "task_specs.json";

const PARTITION_FILE_SUFFIX: &str = "_partition.json";

/// What the label of each sample is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LabelType {
    /// Scalar class index in `[0, n_classes)`.
    Classification {
        n_classes: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class_names: Option<Vec<String>>,
    },
    /// Scalar regression target.
    Regression,
    /// Dense raster label described by a segmentation band descriptor.
    Segmentation { band_info: BandInfo },
}

/// Static description of a converted dataset, persisted as `task_specs.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpecs {
    pub dataset_name: String,
    /// Descriptors of every band a sample may hold, in canonical order.
    pub bands_info: Vec<BandInfo>,
    /// Expected (height, width) of each sample.
    pub patch_size: (usize, usize),
    /// Number of acquisition dates per sample; 1 for single-date datasets.
    pub n_time_steps: usize,
    pub label_type: LabelType,
}

impl TaskSpecs {
    pub fn save(&self, dataset_dir: &Path) -> Result<PathBuf> {
        let path = dataset_dir.join(TASK_SPECS_FILE);
        serde_json::to_writer_pretty(File::create(&path)?, self)?;
        Ok(path)
    }

    pub fn load(dataset_dir: &Path) -> Result<Self> {
        let path = dataset_dir.join(TASK_SPECS_FILE);
        let file = File::open(&path).map_err(|_| TerrabenchError::FormatCorruption {
            path: path.clone(),
            reason: format!("missing {}", TASK_SPECS_FILE),
        })?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Map every canonical name and alias of `bands_info` to its canonical
    /// name. Covers the whole band vocabulary so lookups stay O(1).
    pub fn band_name_lookup(&self) -> HashMap<String, String> {
        let mut lookup = HashMap::new();
        for info in &self.bands_info {
            for alias in info.all_names() {
                lookup.insert(alias.to_string(), info.name.clone());
            }
        }
        lookup
    }

    /// Resolve `band_names` (canonical names or aliases) to canonical names.
    pub fn resolve_band_names(&self, band_names: &[&str]) -> Result<Vec<String>> {
        let lookup = self.band_name_lookup();
        band_names
            .iter()
            .map(|name| {
                lookup
                    .get(*name)
                    .cloned()
                    .ok_or_else(|| TerrabenchError::UnknownBand {
                        name: name.to_string(),
                    })
            })
            .collect()
    }
}

/// Most-recently-used partition cache. Partitions of large datasets are
/// sizeable JSON files; callers that alternate between a few partitions
/// should not re-parse them on every switch. Capacity is fixed and small.
struct PartitionCache {
    entries: Vec<(String, Partition)>,
    capacity: usize,
}

impl PartitionCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    fn get(&mut self, name: &str) -> Option<Partition> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        let entry = self.entries.remove(pos);
        let partition = entry.1.clone();
        self.entries.insert(0, entry);
        Some(partition)
    }

    fn insert(&mut self, name: &str, partition: Partition) {
        self.entries.retain(|(n, _)| n != name);
        self.entries.insert(0, (name.to_string(), partition));
        self.entries.truncate(self.capacity);
    }
}

const PARTITION_CACHE_CAPACITY: usize = 3;

/// Per-sample post-load hook, e.g. augmentation or tensor conversion.
pub type Transform = Box<dyn Fn(Sample) -> Sample>;

/// Options for [`Dataset::open`].
#[derive(Default)]
pub struct DatasetOptions {
    /// Partition to activate; `None` means `default`.
    pub partition_name: Option<String>,
    /// Active split; `None` exposes all samples of the partition.
    pub split: Option<Split>,
    pub format: SampleFormat,
    pub transform: Option<Transform>,
}

/// A converted dataset rooted at one directory.
///
/// Single-threaded by design: interior mutability covers only lazily loaded
/// metadata (partition cache, band statistics).
pub struct Dataset {
    dataset_dir: PathBuf,
    format: SampleFormat,
    task_specs: TaskSpecs,
    /// Canonical names of the bands each loaded sample is restricted to.
    band_names: Vec<String>,
    /// Alias to canonical name, over the whole band vocabulary.
    band_name_lookup: HashMap<String, String>,
    partition_paths: HashMap<String, PathBuf>,
    active_partition_name: String,
    active_partition: Partition,
    /// Sample names of the active partition across all splits.
    sample_names: Vec<String>,
    split: Option<Split>,
    transform: Option<Transform>,
    partition_cache: RefCell<PartitionCache>,
    band_stats: RefCell<Option<HashMap<String, BandStats>>>,
}

impl Dataset {
    /// Open the dataset at `dataset_dir`, restricted to `band_names`
    /// (canonical names or aliases).
    ///
    /// Scans the directory for `*_partition.json` files and activates
    /// `options.partition_name` (default: `default`).
    pub fn open(dataset_dir: &Path, band_names: &[&str], options: DatasetOptions) -> Result<Self> {
        let task_specs = TaskSpecs::load(dataset_dir)?;
        let band_names = task_specs.resolve_band_names(band_names)?;
        let band_name_lookup = task_specs.band_name_lookup();

        let mut partition_paths = HashMap::new();
        for entry in std::fs::read_dir(dataset_dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(PARTITION_FILE_SUFFIX) {
                partition_paths.insert(name.to_string(), path);
            }
        }
        if partition_paths.is_empty() {
            tracing::warn!(
                dataset_dir = %dataset_dir.display(),
                "no partition files found in dataset directory"
            );
        }

        let mut dataset = Self {
            dataset_dir: dataset_dir.to_path_buf(),
            format: options.format,
            task_specs,
            band_names,
            band_name_lookup,
            partition_paths,
            active_partition_name: String::new(),
            active_partition: Partition::new(),
            sample_names: Vec::new(),
            split: options.split,
            transform: options.transform,
            partition_cache: RefCell::new(PartitionCache::new(PARTITION_CACHE_CAPACITY)),
            band_stats: RefCell::new(None),
        };
        let partition_name = options
            .partition_name
            .as_deref()
            .unwrap_or(DEFAULT_PARTITION_NAME);
        dataset.set_partition(partition_name)?;
        Ok(dataset)
    }

    pub fn dataset_dir(&self) -> &Path {
        &self.dataset_dir
    }

    pub fn task_specs(&self) -> &TaskSpecs {
        &self.task_specs
    }

    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Canonical name of a band, looked up by canonical name or alias.
    pub fn canonical_band_name(&self, name: &str) -> Result<&str> {
        self.band_name_lookup
            .get(name)
            .map(|s| s.as_str())
            .ok_or_else(|| TerrabenchError::UnknownBand {
                name: name.to_string(),
            })
    }

    /// Names of the partitions found on disk, sorted.
    pub fn list_partitions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.partition_paths.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn list_splits(&self) -> Vec<Split> {
        Split::ALL.to_vec()
    }

    /// Load a partition by name through the cache.
    pub fn load_partition(&self, partition_name: &str) -> Result<Partition> {
        if let Some(partition) = self.partition_cache.borrow_mut().get(partition_name) {
            return Ok(partition);
        }
        let path = self.partition_paths.get(partition_name).ok_or_else(|| {
            TerrabenchError::PartitionNotFound {
                name: partition_name.to_string(),
            }
        })?;
        let partition = Partition::load(path)?;
        self.partition_cache
            .borrow_mut()
            .insert(partition_name, partition.clone());
        Ok(partition)
    }

    /// Switch the active partition; rebuilds the sample name list.
    pub fn set_partition(&mut self, partition_name: &str) -> Result<()> {
        let partition = self.load_partition(partition_name)?;
        self.sample_names = partition.all_names();
        self.active_partition = partition;
        self.active_partition_name = partition_name.to_string();
        Ok(())
    }

    pub fn active_partition_name(&self) -> &str {
        &self.active_partition_name
    }

    pub fn active_partition(&self) -> &Partition {
        &self.active_partition
    }

    /// Restrict (or un-restrict, with `None`) iteration to one split.
    pub fn set_split(&mut self, split: Option<Split>) {
        self.split = split;
    }

    pub fn split(&self) -> Option<Split> {
        self.split
    }

    /// Sample names visible through the active split selection.
    pub fn sample_names(&self) -> &[String] {
        match self.split {
            None => &self.sample_names,
            Some(split) => self.active_partition.names(split),
        }
    }

    pub fn len(&self) -> usize {
        self.sample_names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_names().is_empty()
    }

    /// Load the sample at `index` of the active split selection, restricted
    /// to the opened band names, with the transform applied when set.
    pub fn get(&self, index: usize) -> Result<Sample> {
        let names = self.sample_names();
        let sample_name =
            names
                .get(index)
                .ok_or_else(|| TerrabenchError::SampleIndexOutOfRange {
                    index,
                    len: names.len(),
                })?;
        let path = self.format.sample_path(&self.dataset_dir, sample_name);
        let sample = formats::load_sample(&path, Some(&self.band_names), self.format)?;
        Ok(match &self.transform {
            Some(transform) => transform(sample),
            None => sample,
        })
    }

    /// Iterate over at most `max_count` samples in random order without
    /// replacement. `None` visits every sample.
    pub fn iter_samples(&self, max_count: Option<usize>) -> DatasetIter<'_> {
        let len = self.len();
        let count = max_count.map_or(len, |c| c.min(len));
        let indices = index::sample(&mut rand::rng(), len, count).into_vec();
        DatasetIter {
            dataset: self,
            indices,
            pos: 0,
        }
    }

    /// Per-band statistics, loaded lazily from `band_stats.json`.
    pub fn band_stats(&self) -> Result<HashMap<String, BandStats>> {
        if let Some(stats) = self.band_stats.borrow().as_ref() {
            return Ok(stats.clone());
        }
        let path = self.dataset_dir.join(BAND_STATS_FILE);
        let file = File::open(&path).map_err(|_| TerrabenchError::FormatCorruption {
            path: path.clone(),
            reason: format!("missing {}", BAND_STATS_FILE),
        })?;
        let stats: HashMap<String, BandStats> = serde_json::from_reader(file)?;
        *self.band_stats.borrow_mut() = Some(stats.clone());
        Ok(stats)
    }

    /// (means, stds) of the opened bands, in band order, for normalization.
    pub fn normalization_stats(&self) -> Result<(Vec<f64>, Vec<f64>)> {
        let stats = self.band_stats()?;
        let mut means = Vec::with_capacity(self.band_names.len());
        let mut stds = Vec::with_capacity(self.band_names.len());
        for name in &self.band_names {
            let band_stats = stats
                .get(name)
                .ok_or_else(|| TerrabenchError::StatsNotFound { name: name.clone() })?;
            means.push(band_stats.mean);
            stds.push(band_stats.std);
        }
        Ok((means, stds))
    }

    /// (means, stds) of the red, green and blue bands, trying the spectral
    /// sentinel-2 style names before the plain color names.
    pub fn rgb_stats(&self) -> Result<([f64; 3], [f64; 3])> {
        let stats = self.band_stats()?;
        let mut means = [0.0; 3];
        let mut stds = [0.0; 3];
        let candidates = [
            ["04 - Red", "03 - Green", "02 - Blue"],
            ["Red", "Green", "Blue"],
        ];
        for (i, fallback) in candidates[1].iter().enumerate() {
            let band_stats = stats
                .get(candidates[0][i])
                .or_else(|| stats.get(*fallback))
                .ok_or_else(|| TerrabenchError::StatsNotFound {
                    name: fallback.to_string(),
                })?;
            means[i] = band_stats.mean;
            stds[i] = band_stats.std;
        }
        Ok((means, stds))
    }
}

/// Random-order sample iterator returned by [`Dataset::iter_samples`].
pub struct DatasetIter<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
    pos: usize,
}

impl Iterator for DatasetIter<'_> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = *self.indices.get(self.pos)?;
        self.pos += 1;
        Some(self.dataset.get(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.indices.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DatasetIter<'_> {}
