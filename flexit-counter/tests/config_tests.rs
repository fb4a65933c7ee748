//! Bootstrap config loading tests
//!
//! Tests touching FLEXIT_API_TOKEN or FLEXIT_CONFIG are marked #[serial].

use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;

use flexit_common::config::{ConfigSource, CONFIG_ENV_VAR};
use flexit_counter::config::{ApiConfig, API_TOKEN_ENV_VAR};
use flexit_counter::{Backpressure, Error, TomlConfig};

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

#[test]
#[serial]
fn test_load_from_cli_path() {
    let file = config_file(
        r#"
        [session]
        on_full = "drop"

        [exercises.lunge]
        display_name = "Lunge"
        joints = { single = ["left_hip", "left_knee", "left_ankle"] }
        down_angle = 100.0
        up_angle = 160.0
        "#,
    );

    let (config, source) = TomlConfig::load(Some(file.path())).unwrap();
    assert_eq!(source, ConfigSource::CommandLine(file.path().to_path_buf()));
    assert_eq!(config.session.on_full, Backpressure::Drop);

    let registry = config.registry().unwrap();
    assert_eq!(registry.len(), 4);
    assert_eq!(registry.lookup("lunge").unwrap().display_name, "Lunge");
}

#[test]
#[serial]
fn test_load_from_env_var() {
    let file = config_file("[logging]\nlevel = \"warn\"\n");
    env::set_var(CONFIG_ENV_VAR, file.path());

    let (config, source) = TomlConfig::load(None).unwrap();
    assert_eq!(config.logging.level, "warn");
    assert!(matches!(source, ConfigSource::Environment(_)));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_zero_capacity_fails_load() {
    let file = config_file("[session]\nframe_queue_capacity = 0\n");
    assert!(matches!(
        TomlConfig::load(Some(file.path())),
        Err(Error::Config(_))
    ));
}

#[test]
#[serial]
fn test_missing_named_file_fails_load() {
    let missing = PathBuf::from("/nonexistent/flexit/config.toml");
    assert!(matches!(
        TomlConfig::load(Some(missing.as_path())),
        Err(Error::Common(flexit_common::Error::Config(_)))
    ));
}

#[test]
#[serial]
fn test_token_falls_back_to_env_var() {
    env::set_var(API_TOKEN_ENV_VAR, "from-env");

    let mut api = ApiConfig::default();
    assert_eq!(api.resolved_token().as_deref(), Some("from-env"));

    api.token = Some("from-file".to_string());
    assert_eq!(api.resolved_token().as_deref(), Some("from-file"));

    env::remove_var(API_TOKEN_ENV_VAR);
    api.token = None;
    assert!(api.resolved_token().is_none());
}
