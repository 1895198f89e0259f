//! Monitoring configuration: the persisted document and its lifecycle.
//!
//! The document is permissive on load: out-of-range fields are coerced to
//! defaults and reported back as a list of corrections for the caller to
//! log. A missing document is synthesized; a malformed one is a hard error.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

pub const DEFAULT_CHECK_INTERVAL: i64 = 30;
pub const DEFAULT_RETENTION_DAYS: i64 = 7;
pub const DEFAULT_TIMEOUT_SECS: i64 = 10;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A monitored endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub method: String,
    /// Total request deadline in seconds.
    #[serde(default)]
    pub timeout: i64,
}

/// The full monitoring configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Seconds between check cycles.
    #[serde(default)]
    pub check_interval: i64,
    /// History horizon in days; 0 or negative disables cleanup.
    #[serde(default)]
    pub retention_days: i64,
    #[serde(default)]
    pub sites: Vec<Site>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            retention_days: DEFAULT_RETENTION_DAYS,
            sites: vec![
                Site {
                    name: "Google".to_string(),
                    url: "https://google.com".to_string(),
                    method: "GET".to_string(),
                    timeout: DEFAULT_TIMEOUT_SECS,
                },
                Site {
                    name: "GitHub".to_string(),
                    url: "https://github.com".to_string(),
                    method: "GET".to_string(),
                    timeout: DEFAULT_TIMEOUT_SECS,
                },
            ],
        }
    }
}

/// Configuration shared between the engine surface and the scheduler loop.
pub type SharedConfig = Arc<RwLock<MonitorConfig>>;

/// Coerce out-of-range fields to defaults, returning the corrected config
/// and one message per correction applied.
pub fn normalize(mut cfg: MonitorConfig) -> (MonitorConfig, Vec<String>) {
    let mut corrections = Vec::new();

    if cfg.check_interval <= 0 {
        corrections.push(format!(
            "invalid checkInterval {}, using default {} seconds",
            cfg.check_interval, DEFAULT_CHECK_INTERVAL
        ));
        cfg.check_interval = DEFAULT_CHECK_INTERVAL;
    }

    // Zero is meaningful (cleanup disabled); only negatives are coerced.
    if cfg.retention_days < 0 {
        corrections.push(format!(
            "invalid retentionDays {}, using default {} days",
            cfg.retention_days, DEFAULT_RETENTION_DAYS
        ));
        cfg.retention_days = DEFAULT_RETENTION_DAYS;
    }

    for site in &mut cfg.sites {
        if site.timeout <= 0 {
            corrections.push(format!(
                "invalid timeout for site {}, using default {} seconds",
                site.name, DEFAULT_TIMEOUT_SECS
            ));
            site.timeout = DEFAULT_TIMEOUT_SECS;
        }
        if site.method.is_empty() {
            site.method = "GET".to_string();
        }
    }

    (cfg, corrections)
}

/// Handle on the persisted configuration document.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load and normalize the document.
    ///
    /// A missing file synthesizes and persists the default configuration.
    /// An unreadable or malformed file is an error.
    pub fn load(&self) -> Result<(MonitorConfig, Vec<String>), ConfigError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let cfg = MonitorConfig::default();
                self.save(&cfg)?;
                return Ok((cfg, Vec::new()));
            }
            Err(e) => return Err(e.into()),
        };

        let cfg: MonitorConfig = serde_json::from_slice(&bytes)?;
        Ok(normalize(cfg))
    }

    /// Persist the full document. The write goes to a temp file which is
    /// renamed over the target, so readers never see a partial document.
    pub fn save(&self, cfg: &MonitorConfig) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(cfg)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Host-process settings loaded from environment variables.
///
/// - `STATUSWATCH_CONFIG_PATH`: configuration document path (default: "config.json")
/// - `STATUSWATCH_DB_PATH`: SQLite database path (default: "status.db")
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_path: String,
    pub db_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_path: "config.json".to_string(),
            db_path: "status.db".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(path) = env::var("STATUSWATCH_CONFIG_PATH") {
            cfg.config_path = path;
        }
        if let Ok(path) = env::var("STATUSWATCH_DB_PATH") {
            cfg.db_path = path;
        }

        cfg
    }
}
