//! Configuration file resolution and loading
//!
//! Config file priority order:
//! 1. Command-line path (highest priority)
//! 2. `FLEXIT_CONFIG` environment variable
//! 3. `<platform config dir>/flexit/config.toml`
//! 4. Built-in defaults (fallback)
//!
//! An explicitly named file (1 or 2) must exist. A missing default file only
//! logs a warning and the built-in defaults are used.

use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "FLEXIT_CONFIG";

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    DefaultLocation(PathBuf),
    BuiltIn,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::CommandLine(p)
            | ConfigSource::Environment(p)
            | ConfigSource::DefaultLocation(p) => Some(p),
            ConfigSource::BuiltIn => None,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::CommandLine(p) => write!(f, "{} (command line)", p.display()),
            ConfigSource::Environment(p) => write!(f, "{} ({})", p.display(), CONFIG_ENV_VAR),
            ConfigSource::DefaultLocation(p) => write!(f, "{} (default location)", p.display()),
            ConfigSource::BuiltIn => write!(f, "built-in defaults"),
        }
    }
}

/// Platform default config file path, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("flexit").join("config.toml"))
}

/// Resolve which config file applies, without reading it
pub fn resolve_config_source(cli_arg: Option<&Path>) -> ConfigSource {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return ConfigSource::CommandLine(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return ConfigSource::Environment(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    if let Some(path) = default_config_path() {
        return ConfigSource::DefaultLocation(path);
    }

    ConfigSource::BuiltIn
}

/// Parse a TOML config file into `T`
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Resolve and load the effective configuration
///
/// Returns the parsed config together with where it came from.
pub fn load_config<T: DeserializeOwned + Default>(cli_arg: Option<&Path>) -> Result<(T, ConfigSource)> {
    let source = resolve_config_source(cli_arg);

    match &source {
        ConfigSource::CommandLine(path) | ConfigSource::Environment(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            let config = load_toml_file(path)?;
            info!("Loaded configuration from {}", source);
            Ok((config, source))
        }
        ConfigSource::DefaultLocation(path) => {
            if path.exists() {
                let config = load_toml_file(path)?;
                info!("Loaded configuration from {}", source);
                Ok((config, source))
            } else {
                warn!(
                    "No config file at {}, using built-in defaults",
                    path.display()
                );
                Ok((T::default(), ConfigSource::BuiltIn))
            }
        }
        ConfigSource::BuiltIn => {
            warn!("No config directory on this platform, using built-in defaults");
            Ok((T::default(), source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        name: String,
        #[serde(default)]
        level: u32,
    }

    #[test]
    fn test_cli_path_wins() {
        let source = resolve_config_source(Some(Path::new("/tmp/explicit.toml")));
        assert_eq!(
            source,
            ConfigSource::CommandLine(PathBuf::from("/tmp/explicit.toml"))
        );
        assert_eq!(source.path(), Some(Path::new("/tmp/explicit.toml")));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"flexit\"\nlevel = 3").unwrap();

        let (config, source): (Sample, _) = load_config(Some(file.path())).unwrap();
        assert_eq!(
            config,
            Sample {
                name: "flexit".to_string(),
                level: 3
            }
        );
        assert!(matches!(source, ConfigSource::CommandLine(_)));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result: Result<(Sample, _)> =
            load_config(Some(Path::new("/nonexistent/flexit/config.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "level = \"not a number\"").unwrap();

        let result: Result<(Sample, _)> = load_config(Some(file.path()));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
