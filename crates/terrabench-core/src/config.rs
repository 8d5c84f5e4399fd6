//! Layered toolkit configuration.
//!
//! Directories and the sample format come from explicit configuration with
//! a fixed precedence: defaults, then a TOML file, then `TERRABENCH_*`
//! environment variables, then CLI overrides. Every value remembers which
//! layer set it, which makes "why is it reading from there?" debuggable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TerrabenchError};
use crate::formats::SampleFormat;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for the toolkit.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// Directory holding the raw, pre-conversion datasets.
    pub source_dir: ConfigValue<PathBuf>,
    /// Directory holding converted datasets.
    pub converted_dir: ConfigValue<PathBuf>,
    /// Sample encoding converters write by default.
    pub default_format: ConfigValue<SampleFormat>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            source_dir: ConfigValue::new(PathBuf::from("dataset/source"), ConfigSource::Default),
            converted_dir: ConfigValue::new(
                PathBuf::from("dataset/converted"),
                ConfigSource::Default,
            ),
            default_format: ConfigValue::new(SampleFormat::default(), ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| TerrabenchError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| TerrabenchError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(source_dir) = file_config.source_dir {
            self.source_dir.update(source_dir, ConfigSource::File);
        }

        if let Some(converted_dir) = file_config.converted_dir {
            self.converted_dir.update(converted_dir, ConfigSource::File);
        }

        if let Some(format) = file_config.default_format {
            self.default_format
                .update(SampleFormat::from_name(&format)?, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        if let Ok(source_dir) = env::var("TERRABENCH_SOURCE_DIR") {
            self.source_dir
                .update(PathBuf::from(source_dir), ConfigSource::Environment);
        }

        if let Ok(converted_dir) = env::var("TERRABENCH_CONVERTED_DIR") {
            self.converted_dir
                .update(PathBuf::from(converted_dir), ConfigSource::Environment);
        }

        if let Ok(format_str) = env::var("TERRABENCH_FORMAT") {
            match SampleFormat::from_name(&format_str) {
                Ok(format) => self.default_format.update(format, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid TERRABENCH_FORMAT value '{}': expected geotiff or container",
                    format_str
                ),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(source_dir) = overrides.source_dir {
            self.source_dir.update(source_dir, ConfigSource::Cli);
        }

        if let Some(converted_dir) = overrides.converted_dir {
            self.converted_dir.update(converted_dir, ConfigSource::Cli);
        }

        if let Some(format) = overrides.default_format {
            self.default_format.update(format, ConfigSource::Cli);
        }
    }

    /// Directory of one converted dataset.
    pub fn dataset_dir(&self, dataset_name: &str) -> PathBuf {
        self.converted_dir.value.join(dataset_name)
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "source_dir".to_string(),
            (
                self.source_dir.value.display().to_string(),
                self.source_dir.source,
            ),
        );

        map.insert(
            "converted_dir".to_string(),
            (
                self.converted_dir.value.display().to_string(),
                self.converted_dir.source,
            ),
        );

        map.insert(
            "default_format".to_string(),
            (
                self.default_format.value.to_string(),
                self.default_format.source,
            ),
        );

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    source_dir: Option<PathBuf>,
    converted_dir: Option<PathBuf>,
    default_format: Option<String>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub source_dir: Option<PathBuf>,
    pub converted_dir: Option<PathBuf>,
    pub default_format: Option<SampleFormat>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.source_dir.value, PathBuf::from("dataset/source"));
        assert_eq!(config.source_dir.source, ConfigSource::Default);
        assert_eq!(config.default_format.value, SampleFormat::Container);
    }

    #[test]
    fn config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);
        assert_eq!(value.source, ConfigSource::File);

        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);

        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
source_dir = "/data/source"
converted_dir = "/data/converted"
default_format = "geotiff"
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults()
            .load_from_file(file.path())
            .unwrap();

        assert_eq!(config.source_dir.value, PathBuf::from("/data/source"));
        assert_eq!(config.source_dir.source, ConfigSource::File);
        assert_eq!(config.default_format.value, SampleFormat::GeoTiff);
    }

    #[test]
    fn invalid_format_in_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"default_format = "hdf5""#).unwrap();

        let result = LayeredConfig::with_defaults().load_from_file(file.path());
        assert!(matches!(
            result,
            Err(TerrabenchError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn cli_overrides() {
        let mut config = LayeredConfig::with_defaults();

        config.update_from_cli(CliConfigOverrides {
            converted_dir: Some(PathBuf::from("/tmp/converted")),
            ..Default::default()
        });

        assert_eq!(config.converted_dir.value, PathBuf::from("/tmp/converted"));
        assert_eq!(config.converted_dir.source, ConfigSource::Cli);
        assert_eq!(config.source_dir.source, ConfigSource::Default);
    }

    #[test]
    fn dataset_dir_joins_converted_dir() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(
            config.dataset_dir("eurosat"),
            PathBuf::from("dataset/converted/eurosat")
        );
    }
}
