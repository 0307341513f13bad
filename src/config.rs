//! Configuration management for the OpenSong bridge
//!
//! The file is read into an all-optional [`RawConfig`] and then validated
//! into an immutable [`Config`] that is built once and passed by reference.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable that points at an alternate config file
pub const CONFIG_PATH_ENV: &str = "OPENSONG_OBS_CONFIG";

const CONFIG_FILE_NAME: &str = "config.toml";

const TEMPLATE: &str = r#"# opensong-obs-bridge configuration

[opensong]
# Host and port of the OpenSong automation server
host = ""
port = 8082
# reconnect_delay_ms = 500
# request_timeout_secs = 10

[obs]
# Files read by the OBS text sources
title_file = ""
verse_file = ""

[logging]
# file = false
# directory = "/path/to/logs"
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Config file {path:?} is incomplete: {}", .problems.join("; "))]
    Invalid { path: PathBuf, problems: Vec<String> },
    #[error("No config file found, wrote a template to {path:?}; fill it in and restart")]
    Template { path: PathBuf },
    #[error("Failed to determine the config directory")]
    NoConfigDir,
}

/// Config file as written, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    pub opensong: Option<RawOpenSongConfig>,
    pub obs: Option<RawObsConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOpenSongConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub reconnect_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawObsConfig {
    pub title_file: Option<PathBuf>,
    pub verse_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Also log to a daily rolling file
    #[serde(default)]
    pub file: bool,

    /// Override for the log directory
    pub directory: Option<PathBuf>,
}

/// Validated configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub opensong: OpenSongConfig,
    pub output: OutputDestination,
    pub logging: LoggingConfig,
    config_path: PathBuf,
}

/// Where the OpenSong automation server lives and how to talk to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSongConfig {
    pub host: String,
    pub port: u16,
    /// Pause between a lost connection and the next attempt
    pub reconnect_delay: Duration,
    /// Per-request timeout for REST calls (none when unset)
    pub request_timeout: Option<Duration>,
}

/// Files read by the OBS text sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDestination {
    pub title_file: PathBuf,
    pub verse_file: PathBuf,
}

fn default_reconnect_delay_ms() -> u64 {
    500
}

impl OpenSongConfig {
    /// WebSocket endpoint for presentation notifications
    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}/ws", self.host, self.port)
    }

    /// Base URI of the REST API
    pub fn api_base(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl RawConfig {
    /// Read and parse a config file without validating it
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check every required key and build the immutable config.
    ///
    /// All problems are collected so the operator can fix them in one pass.
    pub fn validate(self, path: &Path) -> Result<Config, ConfigError> {
        let mut problems = Vec::new();

        let opensong = match self.opensong {
            Some(section) => Some(section),
            None => {
                problems.push("Config is missing section 'opensong'".to_string());
                None
            }
        };
        let obs = match self.obs {
            Some(section) => Some(section),
            None => {
                problems.push("Config is missing section 'obs'".to_string());
                None
            }
        };

        let host = opensong
            .as_ref()
            .and_then(|s| s.host.clone())
            .filter(|h| !h.trim().is_empty());
        let port = opensong.as_ref().and_then(|s| s.port).filter(|p| *p != 0);
        if opensong.is_some() {
            if host.is_none() {
                problems.push(missing("opensong", "host"));
            }
            if port.is_none() {
                problems.push(missing("opensong", "port"));
            }
        }

        let title_file = obs
            .as_ref()
            .and_then(|s| s.title_file.clone())
            .filter(|p| !p.as_os_str().is_empty());
        let verse_file = obs
            .as_ref()
            .and_then(|s| s.verse_file.clone())
            .filter(|p| !p.as_os_str().is_empty());
        if obs.is_some() {
            if title_file.is_none() {
                problems.push(missing("obs", "title_file"));
            }
            if verse_file.is_none() {
                problems.push(missing("obs", "verse_file"));
            }
        }

        match (host, port, title_file, verse_file) {
            (Some(host), Some(port), Some(title_file), Some(verse_file)) if problems.is_empty() => {
                let reconnect_delay_ms = opensong
                    .as_ref()
                    .and_then(|s| s.reconnect_delay_ms)
                    .unwrap_or_else(default_reconnect_delay_ms);
                let request_timeout = opensong
                    .as_ref()
                    .and_then(|s| s.request_timeout_secs)
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs);

                Ok(Config {
                    opensong: OpenSongConfig {
                        host: host.trim().to_string(),
                        port,
                        reconnect_delay: Duration::from_millis(reconnect_delay_ms),
                        request_timeout,
                    },
                    output: OutputDestination {
                        title_file,
                        verse_file,
                    },
                    logging: self.logging,
                    config_path: path.to_path_buf(),
                })
            }
            _ => Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                problems,
            }),
        }
    }
}

fn missing(section: &str, key: &str) -> String {
    format!(
        "Config key '{}' is missing or has an empty value for sub-item '{}'",
        section, key
    )
}

impl Config {
    /// Load and validate the config at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        RawConfig::read(path)?.validate(path)
    }

    /// Resolve the config file location.
    ///
    /// Order: explicit path, `OPENSONG_OBS_CONFIG`, `./config.toml`, then the
    /// platform config directory. A template is written at the platform
    /// location when nothing exists yet.
    pub fn locate(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        if let Some(path) = explicit {
            return Ok(path);
        }

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Ok(local);
        }

        let path = Self::default_config_path()?;
        if !path.exists() {
            write_template(&path)?;
            return Err(ConfigError::Template { path });
        }
        Ok(path)
    }

    /// Get the config file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf, ConfigError> {
        let proj_dirs = directories::ProjectDirs::from("dev", "opensong-obs", "bridge")
            .ok_or(ConfigError::NoConfigDir)?;

        Ok(proj_dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}

fn write_template(path: &Path) -> Result<(), ConfigError> {
    let to_read_error = |source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(to_read_error)?;
    }
    std::fs::write(path, TEMPLATE).map_err(to_read_error)
}
