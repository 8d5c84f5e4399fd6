//! Layered configuration precedence across file, environment and CLI.

use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use terrabench_core::config::{CliConfigOverrides, ConfigSource, LayeredConfig};
use terrabench_core::SampleFormat;

fn clear_env() {
    std::env::remove_var("TERRABENCH_SOURCE_DIR");
    std::env::remove_var("TERRABENCH_CONVERTED_DIR");
    std::env::remove_var("TERRABENCH_FORMAT");
}

#[test]
#[serial]
fn environment_overrides_file() {
    clear_env();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
converted_dir = "/from/file"
default_format = "geotiff"
"#
    )
    .unwrap();

    std::env::set_var("TERRABENCH_CONVERTED_DIR", "/from/env");

    let config = LayeredConfig::with_defaults()
        .load_from_file(file.path())
        .unwrap()
        .load_from_env();

    assert_eq!(config.converted_dir.value, PathBuf::from("/from/env"));
    assert_eq!(config.converted_dir.source, ConfigSource::Environment);
    // Untouched by env: keeps the file value.
    assert_eq!(config.default_format.value, SampleFormat::GeoTiff);
    assert_eq!(config.default_format.source, ConfigSource::File);

    clear_env();
}

#[test]
#[serial]
fn cli_overrides_environment() {
    clear_env();
    std::env::set_var("TERRABENCH_SOURCE_DIR", "/from/env");

    let mut config = LayeredConfig::with_defaults().load_from_env();
    config.update_from_cli(CliConfigOverrides {
        source_dir: Some(PathBuf::from("/from/cli")),
        ..Default::default()
    });

    assert_eq!(config.source_dir.value, PathBuf::from("/from/cli"));
    assert_eq!(config.source_dir.source, ConfigSource::Cli);

    clear_env();
}

#[test]
#[serial]
fn invalid_format_env_var_is_ignored_with_a_warning() {
    clear_env();
    std::env::set_var("TERRABENCH_FORMAT", "hdf5");

    let config = LayeredConfig::with_defaults().load_from_env();
    assert_eq!(config.default_format.value, SampleFormat::default());
    assert_eq!(config.default_format.source, ConfigSource::Default);

    clear_env();
}

#[test]
#[serial]
fn defaults_apply_without_any_layer() {
    clear_env();
    let config = LayeredConfig::with_defaults().load_from_env();
    assert_eq!(config.source_dir.source, ConfigSource::Default);
    assert_eq!(config.converted_dir.source, ConfigSource::Default);
    assert_eq!(config.default_format.value, SampleFormat::Container);
}
