//! Integrity audits for partitions and converted datasets.
//!
//! Audits collect findings into an [`IntegrityReport`] instead of failing on
//! the first problem, so a converter author sees every issue in one run.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::band::BandData;
use crate::models::dataset::{Dataset, LabelType};
use crate::models::partition::{Partition, Split};
use crate::models::sample::{Label, Sample};

/// Findings of an integrity audit. Errors make the subject unusable;
/// warnings flag conditions worth reviewing.
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn merge(&mut self, other: IntegrityReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Audit one partition: names must be unique within each split and no name
/// may appear in more than one split. An empty split is only a warning
/// (test-only benchmark datasets exist).
pub fn check_partition(partition: &Partition, partition_name: &str) -> IntegrityReport {
    let mut report = IntegrityReport::default();
    let mut all_names: HashSet<&str> = HashSet::new();

    for split in Split::ALL {
        let names = partition.names(split);
        if names.is_empty() {
            report
                .warnings
                .push(format!("{split} split of partition {partition_name} is empty"));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for name in names {
            if !seen.insert(name) {
                report.errors.push(format!(
                    "duplicate sample {name} in {split} split of partition {partition_name}"
                ));
            } else if !all_names.insert(name) {
                report.errors.push(format!(
                    "sample {name} of partition {partition_name} appears in more than one split"
                ));
            }
        }
    }

    report
}

/// Audit a converted dataset: every partition on disk, then up to
/// `max_count` randomly chosen samples against the task specification.
pub fn check_dataset(dataset: &Dataset, max_count: Option<usize>) -> Result<IntegrityReport> {
    let mut report = IntegrityReport::default();

    for partition_name in dataset.list_partitions() {
        tracing::info!(partition = %partition_name, "checking partition integrity");
        let partition = dataset.load_partition(&partition_name)?;
        report.merge(check_partition(&partition, &partition_name));
    }

    for sample in dataset.iter_samples(max_count) {
        let sample = sample?;
        report.merge(check_sample(&sample, dataset));
    }

    Ok(report)
}

/// Audit one sample against the dataset's task specification.
fn check_sample(sample: &Sample, dataset: &Dataset) -> IntegrityReport {
    let mut report = IntegrityReport::default();
    let specs = dataset.task_specs();
    let sample_name = sample.sample_name();

    let mut max_shape = (0usize, 0usize);
    for band in sample.bands() {
        let name = &band.band_info().name;
        match specs.bands_info.iter().find(|info| &info.name == name) {
            Some(info) => {
                if let Err(err) = info.validate(band) {
                    report
                        .errors
                        .push(format!("sample {sample_name}: {err}"));
                }
            }
            None => report.errors.push(format!(
                "sample {sample_name}: band {name} is not in the task specification"
            )),
        }
        let (height, width, _) = band.data().shape();
        max_shape = (max_shape.0.max(height), max_shape.1.max(width));
    }

    if max_shape != specs.patch_size {
        report.errors.push(format!(
            "sample {sample_name}: largest band shape {:?} does not match patch size {:?}",
            max_shape, specs.patch_size
        ));
    }

    let n_dates = sample.dates().len();
    if n_dates != specs.n_time_steps {
        report.warnings.push(format!(
            "sample {sample_name}: {n_dates} dates, task specifies {} time steps",
            specs.n_time_steps
        ));
    }

    // The (date x band) grid must be dense: every band present on every date.
    match sample.get_band_array(None, None) {
        Ok((rows, dates, names)) => {
            for (row, date) in rows.iter().zip(&dates) {
                for (cell, name) in row.iter().zip(&names) {
                    if cell.is_none() {
                        report.errors.push(format!(
                            "sample {sample_name}: band {name} is missing for date {}",
                            crate::models::band::format_date(date.as_ref())
                        ));
                    }
                }
            }
        }
        Err(err) => report
            .errors
            .push(format!("sample {sample_name}: {err}")),
    }

    report.merge(check_label(sample, &specs.label_type));
    report
}

/// Audit a sample's label against the declared label type.
fn check_label(sample: &Sample, label_type: &LabelType) -> IntegrityReport {
    let mut report = IntegrityReport::default();
    let sample_name = sample.sample_name();

    match (label_type, sample.label()) {
        (_, None) => report
            .errors
            .push(format!("sample {sample_name}: missing label")),
        (LabelType::Classification { n_classes, .. }, Some(Label::Value(value))) => {
            match value.as_u64() {
                Some(class) if (class as usize) < *n_classes => {}
                Some(class) => report.errors.push(format!(
                    "sample {sample_name}: class index {class} is outside [0, {n_classes})"
                )),
                None => report.errors.push(format!(
                    "sample {sample_name}: classification label is not a non-negative integer"
                )),
            }
        }
        (LabelType::Regression, Some(Label::Value(value))) => {
            if value.as_f64().is_none() {
                report.errors.push(format!(
                    "sample {sample_name}: regression label is not numeric"
                ));
            }
        }
        (LabelType::Segmentation { band_info }, Some(Label::Raster(band))) => {
            if let Err(err) = band_info.validate(band) {
                report
                    .errors
                    .push(format!("sample {sample_name}: label {err}"));
            }
            if !matches!(band.data(), BandData::Int16(_)) {
                report.warnings.push(format!(
                    "sample {sample_name}: segmentation label is not int16"
                ));
            }
        }
        (_, Some(_)) => report.errors.push(format!(
            "sample {sample_name}: label does not match the declared label type"
        )),
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_overlap_is_an_error() {
        let mut partition = Partition::new();
        partition.add(Split::Train, "s1");
        partition.add(Split::Valid, "s1");
        partition.add(Split::Test, "s2");

        let report = check_partition(&partition, "default");
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("more than one split"));
    }

    #[test]
    fn partition_duplicate_within_split_is_an_error() {
        let mut partition = Partition::new();
        partition.add(Split::Train, "s1");
        partition.add(Split::Train, "s1");

        let report = check_partition(&partition, "default");
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("duplicate sample s1"));
    }

    #[test]
    fn empty_split_is_only_a_warning() {
        let mut partition = Partition::new();
        partition.add(Split::Train, "s1");

        let report = check_partition(&partition, "default");
        assert!(report.is_valid());
        assert!(report.has_warnings());
        assert_eq!(report.warnings.len(), 2); // valid and test are empty
    }
}
