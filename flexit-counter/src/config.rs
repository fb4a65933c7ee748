//! Bootstrap configuration for flexit-counter
//!
//! Loaded once at start-up from TOML (see [`flexit_common::config`] for
//! how the file is located). Every field has a built-in default, so an
//! absent file yields a runnable configuration.
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [api]
//! base_url = "http://localhost:8000"
//! timeout_secs = 5
//!
//! [session]
//! frame_queue_capacity = 32
//! on_full = "drop"
//!
//! [exercises.squat]
//! down_angle = 120.0
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flexit_common::config::{load_config, ConfigSource};
use flexit_common::profile::ProfileOverride;
use flexit_common::ProfileRegistry;

use crate::error::{Error, Result};
use crate::runner::Backpressure;

/// Environment variable holding the backend API token
pub const API_TOKEN_ENV_VAR: &str = "FLEXIT_API_TOKEN";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Per-exercise profile overrides, keyed by exercise id
    #[serde(default)]
    pub exercises: BTreeMap<String, ProfileOverride>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Workout backend
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Backend base URL; records go to the local JSONL file when unset
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured token, falling back to `FLEXIT_API_TOKEN`
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var(API_TOKEN_ENV_VAR).ok())
            .filter(|t| !t.trim().is_empty())
    }
}

/// Session task settings
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_frame_queue_capacity")]
    pub frame_queue_capacity: usize,

    /// Frame queue policy when the session falls behind the pose source
    #[serde(default)]
    pub on_full: Backpressure,

    /// JSONL file used when no backend is configured
    #[serde(default = "default_records_path")]
    pub records_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_queue_capacity: default_frame_queue_capacity(),
            on_full: Backpressure::default(),
            records_path: default_records_path(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_frame_queue_capacity() -> usize {
    64
}

fn default_records_path() -> PathBuf {
    PathBuf::from("workouts.jsonl")
}

impl TomlConfig {
    /// Locate, parse and validate the configuration
    pub fn load(cli_path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let (config, source): (Self, _) = load_config(cli_path)?;
        config.validate()?;
        Ok((config, source))
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.frame_queue_capacity == 0 {
            return Err(Error::Config(
                "session.frame_queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::Config("api.timeout_secs must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Built-in profiles with this file's overrides applied
    pub fn registry(&self) -> Result<ProfileRegistry> {
        Ok(ProfileRegistry::with_overrides(&self.exercises)?)
    }
}
