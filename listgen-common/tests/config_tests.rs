//! Tests for config-file resolution and graceful degradation
//!
//! Tests that touch `LISTGEN_TEST_CONFIG` are marked #[serial] so they do not
//! race each other on the process environment.

use listgen_common::config::{load_toml_config, resolve_config_path, LoggingConfig};
use listgen_common::Error;
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
struct SampleConfig {
    port: u16,
    image_root: Option<String>,
    logging: LoggingConfig,
}

const ENV_VAR: &str = "LISTGEN_TEST_CONFIG";

#[test]
#[serial]
fn test_cli_argument_wins_over_environment() {
    env::set_var(ENV_VAR, "/tmp/from-env.toml");

    let resolved = resolve_config_path(Some(Path::new("/tmp/from-cli.toml")), ENV_VAR, "x.toml");
    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-cli.toml")));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_environment_used_without_cli_argument() {
    env::set_var(ENV_VAR, "/tmp/from-env.toml");

    let resolved = resolve_config_path(None, ENV_VAR, "x.toml");
    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-env.toml")));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_blank_environment_value_is_ignored() {
    env::set_var(ENV_VAR, "   ");

    let resolved = resolve_config_path(None, ENV_VAR, "listgen-nonexistent-test-file.toml");
    assert_eq!(resolved, None);

    env::remove_var(ENV_VAR);
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let config: SampleConfig =
        load_toml_config(Some(Path::new("/nonexistent/listgen/config.toml"))).unwrap();
    assert_eq!(config, SampleConfig::default());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_no_path_falls_back_to_defaults() {
    let config: SampleConfig = load_toml_config(None).unwrap();
    assert_eq!(config.port, 0);
}

#[test]
fn test_partial_file_keeps_defaults_for_missing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("listgen.toml");
    std::fs::write(&path, "port = 5740\n[logging]\nlevel = \"debug\"\n").unwrap();

    let config: SampleConfig = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.port, 5740);
    assert_eq!(config.image_root, None);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "port = [unterminated").unwrap();

    let result: Result<SampleConfig, Error> = load_toml_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}
