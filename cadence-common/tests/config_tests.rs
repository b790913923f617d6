//! Integration tests for config file resolution and loading
//!
//! Tests that manipulate `CADENCE_CONFIG` are marked with #[serial] so they
//! never race on the process environment.

use cadence_common::config::{load_toml_or_default, resolve_config_path, CONFIG_ENV_VAR};
use cadence_common::Error;
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};

#[derive(Debug, Default, Deserialize, PartialEq)]
struct PlayerSection {
    #[serde(default)]
    shuffle_seed: Option<u64>,
    #[serde(default)]
    logging: Logging,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
struct Logging {
    #[serde(default)]
    level: String,
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");
    let resolved = resolve_config_path(None, CONFIG_ENV_VAR);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-env.toml")));
}

#[test]
#[serial]
fn test_cli_arg_overrides_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");
    let cli = PathBuf::from("/tmp/from-cli.toml");
    let resolved = resolve_config_path(Some(&cli), CONFIG_ENV_VAR);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(cli));
}

#[test]
fn test_load_existing_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "shuffle_seed = 99\n[logging]\nlevel = \"trace\"").unwrap();

    let config: PlayerSection = load_toml_or_default(Some(file.path())).unwrap();

    assert_eq!(config.shuffle_seed, Some(99));
    assert_eq!(config.logging.level, "trace");
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let config: PlayerSection = load_toml_or_default(Some(&missing)).unwrap();

    assert_eq!(config, PlayerSection::default());
}

#[test]
fn test_broken_file_is_a_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "shuffle_seed = [not toml").unwrap();

    let result: Result<PlayerSection, Error> = load_toml_or_default(Some(file.path()));

    assert!(matches!(result, Err(Error::Config(_))));
}
