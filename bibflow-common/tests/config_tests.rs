//! Configuration loading tests
//!
//! Covers file resolution order, graceful fallback to defaults and environment
//! overrides applied on top of a loaded file.
//!
//! Note: Uses serial_test to prevent ENV variable race conditions. Tests that
//! touch BIBFLOW_* variables are marked with #[serial].

use bibflow_common::config::{
    write_toml_config, TomlConfig, CONFIG_ENV_VAR, KEYWORD_DELIMITER_ENV_VAR,
    UNPAYWALL_EMAIL_ENV_VAR,
};
use bibflow_common::Error;
use serial_test::serial;
use std::env;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(CONFIG_ENV_VAR);
    env::remove_var(KEYWORD_DELIMITER_ENV_VAR);
    env::remove_var(UNPAYWALL_EMAIL_ENV_VAR);
}

#[test]
#[serial]
fn test_load_from_cli_path() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bibflow.toml");
    std::fs::write(
        &path,
        r#"
        add_creation_date = true

        [logging]
        level = "debug"

        [fetch]
        search_max_results = 10
        "#,
    )
    .unwrap();

    let config = TomlConfig::load(Some(&path)).unwrap();

    assert!(config.add_creation_date);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.fetch.search_max_results, 10);
    assert_eq!(config.keyword_delimiter, ',');
}

#[test]
#[serial]
fn test_env_var_selects_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("from-env.toml");
    let mut written = TomlConfig::default();
    written.keyword_delimiter = ';';
    write_toml_config(&written, &path).unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let config = TomlConfig::load(None);
    clear_env();

    assert_eq!(config.unwrap().keyword_delimiter, ';');
}

#[test]
#[serial]
fn test_explicit_missing_file_is_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");

    assert!(matches!(
        TomlConfig::load(Some(&missing)),
        Err(Error::Config(_))
    ));
}

#[test]
#[serial]
fn test_env_overrides_apply_after_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bibflow.toml");
    std::fs::write(&path, "keyword_delimiter = \";\"\n").unwrap();

    env::set_var(KEYWORD_DELIMITER_ENV_VAR, "|");
    env::set_var(UNPAYWALL_EMAIL_ENV_VAR, "  ");
    let config = TomlConfig::load(Some(&path));
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.keyword_delimiter, '|');
    // blank email is ignored rather than configured
    assert_eq!(config.fetch.unpaywall_email, None);
}
