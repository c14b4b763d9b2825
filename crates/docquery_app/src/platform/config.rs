//! Optional RON configuration file.
//!
//! ```ron
//! (
//!     base_url: Some("http://localhost:8000/api"),
//!     export_dir: "exports",
//!     stream_by_default: true,
//!     log: file,
//!     log_level: "info",
//! )
//! ```
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use docquery_engine::{ApiError, ClientConfig, DEFAULT_BASE_URL};
use docquery_logging::dq_info;
use serde::Deserialize;

use super::logging::LogDestination;

pub const DEFAULT_CONFIG_FILE: &str = "docquery.ron";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: Option<String>,
    pub export_dir: PathBuf,
    pub stream_by_default: bool,
    pub log: LogDestination,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            export_dir: PathBuf::from("exports"),
            stream_by_default: true,
            log: LogDestination::File,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Backend settings; an explicit `--base-url` beats the file value.
    pub fn client_config(&self, base_url_override: Option<&str>) -> Result<ClientConfig, ApiError> {
        let base_url = base_url_override
            .or(self.base_url.as_deref())
            .unwrap_or(DEFAULT_BASE_URL);
        ClientConfig::new(base_url)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
}

/// Loads `explicit` (which must exist) or `./docquery.ron` (which may not).
pub fn load(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound && !required => {
            return Ok(AppConfig::default());
        }
        Err(source) => return Err(ConfigError::Read { path, source }),
    };
    let config = parse(&text, &path)?;
    dq_info!("Loaded config from {:?}", path);
    Ok(config)
}

pub fn parse(text: &str, path: &Path) -> Result<AppConfig, ConfigError> {
    ron::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
