//! Configuration file handling for guide-cam.
//!
//! Loads configuration from `<config dir>/guide-cam/config.toml` or a custom path.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::camera::CameraFacing;
use crate::detection::{resolve_endpoint, ENDPOINT_ENV};

/// Origin used when none is configured.
pub const DEFAULT_ORIGIN: &str = "http://localhost:8000";

/// Configuration file structure for guide-cam.
#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Origin the detection route is resolved against
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Full endpoint URL, bypassing resolution
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Which camera driver to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Synthetic moving gradient
    #[default]
    TestPattern,
    /// Physical camera (requires the `native-camera` feature)
    Native,
}

#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct CameraConfig {
    #[serde(default)]
    pub facing: CameraFacing,
    #[serde(default)]
    pub backend: BackendKind,
    /// Device index of the user-facing camera
    #[serde(default)]
    pub user_device: Option<u32>,
    /// Device index of the environment-facing camera
    #[serde(default)]
    pub environment_device: Option<u32>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct SpeechConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_speech_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_speech_command(),
            args: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_speech_command() -> String {
    if cfg!(target_os = "macos") {
        "say".to_string()
    } else {
        "espeak".to_string()
    }
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Endpoint to post frames to.
    ///
    /// Precedence: `GUIDE_CAM_ENDPOINT`, then `server.endpoint`, then the
    /// endpoint resolved from `server.origin`.
    pub fn endpoint(&self) -> String {
        self.endpoint_with_env(std::env::var(ENDPOINT_ENV).ok())
    }

    fn endpoint_with_env(&self, env_override: Option<String>) -> String {
        env_override
            .filter(|e| !e.is_empty())
            .or_else(|| self.server.endpoint.clone())
            .unwrap_or_else(|| resolve_endpoint(&self.server.origin))
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("guide-cam").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/guide-cam/config.toml")
        })
}

/// Contents written by `config init`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# guide-cam configuration

[server]
# Origin the /detect route is resolved against.
# localhost / 127.0.0.1 origins use http://127.0.0.1:5000/detect
origin = "http://localhost:8000"
# Full endpoint URL, overrides origin
# endpoint = "https://guide.example.com/detect"
timeout_secs = 30

[camera]
# "environment" or "user"
facing = "environment"
# "test-pattern" or "native"
backend = "test-pattern"
# Device indices for the native backend (see `guide-cam list-cameras`)
# user_device = 1
# environment_device = 0

[speech]
enabled = true
command = "espeak"
args = []
"#;
