//! Train/valid/test partition of sample names, persisted as JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{Result, TerrabenchError};

/// The fixed set of split names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "train" => Ok(Split::Train),
            "valid" => Ok(Split::Valid),
            "test" => Ok(Split::Test),
            _ => Err(TerrabenchError::InvalidSplit {
                name: name.to_string(),
            }),
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File name of the partition named `partition_name`.
pub fn partition_file_name(partition_name: &str) -> String {
    format!("{partition_name}_partition.json")
}

/// Name of the partition a dataset loads when the caller does not specify one.
pub const DEFAULT_PARTITION_NAME: &str = "default";

/// Ordered train/valid/test membership lists.
///
/// `add` appends without deduplicating; consistency (unique names, no
/// overlap between splits) is audited separately by
/// [`crate::validation::check_partition`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Partition {
    train: Vec<String>,
    valid: Vec<String>,
    test: Vec<String>,
}

impl Partition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, split: Split, sample_name: &str) {
        self.names_mut(split).push(sample_name.to_string());
    }

    pub fn names(&self, split: Split) -> &[String] {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
            Split::Test => &self.test,
        }
    }

    fn names_mut(&mut self, split: Split) -> &mut Vec<String> {
        match split {
            Split::Train => &mut self.train,
            Split::Valid => &mut self.valid,
            Split::Test => &mut self.test,
        }
    }

    /// Sample names across all splits, in train/valid/test order.
    pub fn all_names(&self) -> Vec<String> {
        Split::ALL
            .iter()
            .flat_map(|&split| self.names(split).iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        Split::ALL.iter().map(|&split| self.names(split).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize to `{partition_name}_partition.json` under `directory`.
    ///
    /// With `as_default`, also point the `default_partition.json` alias at
    /// this partition (a symlink where supported, a copy elsewhere),
    /// replacing any existing alias.
    pub fn save(&self, directory: &Path, partition_name: &str, as_default: bool) -> Result<PathBuf> {
        let file_path = directory.join(partition_file_name(partition_name));
        serde_json::to_writer_pretty(File::create(&file_path)?, self)?;

        if as_default {
            let default_path = directory.join(partition_file_name(DEFAULT_PARTITION_NAME));
            if default_path.exists() || default_path.is_symlink() {
                std::fs::remove_file(&default_path)?;
            }
            #[cfg(unix)]
            std::os::unix::fs::symlink(&file_path, &default_path)?;
            #[cfg(not(unix))]
            std::fs::copy(&file_path, &default_path)?;
        }

        Ok(file_path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_reader(File::open(path)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_names_round_trip() {
        for split in Split::ALL {
            assert_eq!(Split::from_name(split.as_str()).unwrap(), split);
        }
        assert!(matches!(
            Split::from_name("eval"),
            Err(TerrabenchError::InvalidSplit { .. })
        ));
    }

    #[test]
    fn add_appends_without_dedup() {
        let mut partition = Partition::new();
        partition.add(Split::Train, "s1");
        partition.add(Split::Train, "s1");
        assert_eq!(partition.names(Split::Train), ["s1", "s1"]);
        assert_eq!(partition.len(), 2);
    }
}
