//! Config file resolution tests
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate FLEXIT_CONFIG are marked with #[serial].

use flexit_common::config::{
    default_config_path, load_config, resolve_config_source, ConfigSource, CONFIG_ENV_VAR,
};
use flexit_common::Error;
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize, PartialEq)]
struct Bootstrap {
    #[serde(default)]
    api_url: Option<String>,
}

#[test]
#[serial]
fn test_env_var_used_without_cli_arg() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/flexit-env-config.toml");

    let source = resolve_config_source(None);
    assert_eq!(
        source,
        ConfigSource::Environment(PathBuf::from("/tmp/flexit-env-config.toml"))
    );

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_arg_takes_precedence_over_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/flexit-env-config.toml");

    let source = resolve_config_source(Some(Path::new("/tmp/flexit-cli.toml")));
    assert_eq!(
        source,
        ConfigSource::CommandLine(PathBuf::from("/tmp/flexit-cli.toml"))
    );

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_empty_env_var_ignored() {
    env::set_var(CONFIG_ENV_VAR, "  ");

    let source = resolve_config_source(None);
    assert!(!matches!(source, ConfigSource::Environment(_)));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_no_overrides_falls_back_to_default_location() {
    env::remove_var(CONFIG_ENV_VAR);

    match (resolve_config_source(None), default_config_path()) {
        (ConfigSource::DefaultLocation(path), Some(expected)) => assert_eq!(path, expected),
        (ConfigSource::BuiltIn, None) => {}
        (source, expected) => panic!("Unexpected resolution {:?} (default {:?})", source, expected),
    }
}

#[test]
#[serial]
fn test_env_var_file_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "api_url = \"http://localhost:5000/api\"").unwrap();
    env::set_var(CONFIG_ENV_VAR, file.path());

    let (config, source): (Bootstrap, _) = load_config(None).unwrap();
    assert_eq!(config.api_url.as_deref(), Some("http://localhost:5000/api"));
    assert_eq!(source.path(), Some(file.path()));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_naming_missing_file_is_error() {
    env::set_var(CONFIG_ENV_VAR, "/nonexistent/flexit.toml");

    let result: flexit_common::Result<(Bootstrap, _)> = load_config(None);
    assert!(matches!(result, Err(Error::Config(_))));

    env::remove_var(CONFIG_ENV_VAR);
}
