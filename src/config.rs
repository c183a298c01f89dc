use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            room_id: None,
            session_key: None,
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("config validation error: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server_url must not be empty".to_string(),
            ));
        }
        match reqwest::Url::parse(&self.server_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => {
                return Err(ConfigError::Validation(format!(
                    "server_url must use http or https, got '{}'",
                    url.scheme()
                )));
            }
            Err(err) => {
                return Err(ConfigError::Validation(format!(
                    "server_url is not a valid URL: {err}"
                )));
            }
        }
        if self.poll_interval_secs < 1 {
            return Err(ConfigError::Validation(
                "poll_interval_secs must be >= 1".to_string(),
            ));
        }
        if self.request_timeout_secs < 1 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be >= 1".to_string(),
            ));
        }
        if self.max_retries < 1 {
            return Err(ConfigError::Validation(
                "max_retries must be >= 1".to_string(),
            ));
        }
        if self.failure_threshold < 1 {
            return Err(ConfigError::Validation(
                "failure_threshold must be >= 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn default_server_url() -> String {
    "http://localhost:5001".to_string()
}

const fn default_poll_interval_secs() -> u64 {
    5
}

const fn default_request_timeout_secs() -> u64 {
    10
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_delay_secs() -> u64 {
    5
}

const fn default_failure_threshold() -> u32 {
    5
}
