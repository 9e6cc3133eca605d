//! RON configuration file for the `insight` binary.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use insight_engine::ClientSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILENAME: &str = "insight.ron";
pub const API_KEY_ENV: &str = "INSIGHT_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Every field is optional; unset fields keep the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: Option<String>,
    pub ws_base_url: Option<String>,
    pub api_key: Option<String>,
    pub user_id: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub log_file: Option<PathBuf>,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_base_url: Option<String>,
    pub ws_base_url: Option<String>,
    pub api_key: Option<String>,
}

impl ClientConfig {
    /// Loads `explicit` if given (it must exist), otherwise `./insight.ron`
    /// when present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path(explicit) {
            Some(path) => Self::read(&path),
            None => Ok(Self::default()),
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = ron::from_str(&text).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(config)
    }

    /// Builds engine settings. Precedence: flags, then file, then
    /// `env_api_key`, then defaults.
    pub fn to_settings(&self, overrides: &Overrides, env_api_key: Option<String>) -> ClientSettings {
        let defaults = ClientSettings::default();
        ClientSettings {
            api_base_url: pick(&overrides.api_base_url, &self.api_base_url)
                .unwrap_or(defaults.api_base_url),
            ws_base_url: pick(&overrides.ws_base_url, &self.ws_base_url)
                .unwrap_or(defaults.ws_base_url),
            api_key: pick(&overrides.api_key, &self.api_key)
                .or(env_api_key)
                .filter(|key| !key.trim().is_empty()),
            poll_interval: positive_secs(self.poll_interval_secs).unwrap_or(defaults.poll_interval),
            request_timeout: positive_secs(self.request_timeout_secs)
                .unwrap_or(defaults.request_timeout),
            ..defaults
        }
    }
}

/// The file [`ClientConfig::load`] reads, if any.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILENAME);
            path.exists().then_some(path)
        }
    }
}

/// Zero means "unset": a zero period or timeout is never usable.
fn positive_secs(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|secs| *secs > 0).map(Duration::from_secs)
}

fn pick(first: &Option<String>, second: &Option<String>) -> Option<String> {
    first.clone().or_else(|| second.clone())
}
