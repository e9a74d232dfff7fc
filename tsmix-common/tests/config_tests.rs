//! Config file resolution tests
//!
//! Uses serial_test because several tests manipulate TSMIX_TEST_CONFIG.

use serial_test::serial;
use std::env;
use std::io::Write;
use tsmix_common::config::{load_toml, ConfigResolver, LoggingConfig};
use tsmix_common::Error;

const APP: &str = "tsmix-test";
const ENV_VAR: &str = "TSMIX_TEST_CONFIG";

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_cli_path_has_highest_priority() {
    let cli_file = write_config("level = \"debug\"");
    let env_file = write_config("level = \"warn\"");
    env::set_var(ENV_VAR, env_file.path());

    let resolved = ConfigResolver::new(APP)
        .resolve(Some(cli_file.path()))
        .unwrap();
    assert_eq!(resolved.as_deref(), Some(cli_file.path()));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_missing_cli_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let err = ConfigResolver::new(APP).resolve(Some(&missing)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_path() {
    let env_file = write_config("level = \"trace\"");
    env::set_var(ENV_VAR, env_file.path());

    let resolved = ConfigResolver::new(APP).resolve(None).unwrap();
    assert_eq!(resolved.as_deref(), Some(env_file.path()));

    let logging: LoggingConfig = load_toml(resolved.as_deref()).unwrap();
    assert_eq!(logging.level, "trace");

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_pointing_to_missing_file_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    env::set_var(ENV_VAR, dir.path().join("gone.toml"));

    // Falls through to platform locations, which don't exist for this app name
    let resolved = ConfigResolver::new(APP).resolve(None).unwrap();
    assert!(resolved.is_none());

    env::remove_var(ENV_VAR);
}

#[test]
fn test_load_toml_reports_parse_errors() {
    let file = write_config("level = [");
    let err = load_toml::<LoggingConfig>(Some(file.path())).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_load_toml_reports_unreadable_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_toml::<LoggingConfig>(Some(&dir.path().join("nope.toml"))).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
