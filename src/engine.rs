//! The engine context: one object owning configuration, history, and the
//! scheduler, exposing the query/mutation surface consumed by the
//! presentation layer.

use std::path::Path;
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::config::{ConfigError, ConfigFile, MonitorConfig, SharedConfig, Site};
use crate::db::{CheckRecord, DbError, Store};
use crate::probe::ConnectivityGate;
use crate::scheduler::Scheduler;
use crate::stats::{self, GlobalStats, SiteDetail, SiteStatusDetail};

const HISTORY_LIMIT: i64 = 50;

/// Construction failures. Anything past construction degrades gracefully
/// instead of failing the engine.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Db(#[from] DbError),
}

pub struct Engine {
    config: SharedConfig,
    config_file: ConfigFile,
    store: Store,
    scheduler: Arc<Scheduler>,
}

impl Engine {
    /// Load configuration, open the store, and wire the scheduler. The
    /// scheduler stays stopped until `start`.
    pub fn new<P: AsRef<Path>>(config_file: ConfigFile, db_path: P) -> Result<Self, StartupError> {
        Self::with_gate(config_file, db_path, ConnectivityGate::default())
    }

    /// Same as `new`, with an injected connectivity gate.
    pub fn with_gate<P: AsRef<Path>>(
        config_file: ConfigFile,
        db_path: P,
        gate: ConnectivityGate,
    ) -> Result<Self, StartupError> {
        let (cfg, corrections) = config_file.load()?;
        for correction in &corrections {
            tracing::warn!("{}", correction);
        }

        let store = Store::new(db_path)?;
        let config: SharedConfig = Arc::new(RwLock::new(cfg));
        let scheduler = Arc::new(Scheduler::new(store.clone(), config.clone(), gate));

        Ok(Self {
            config,
            config_file,
            store,
            scheduler,
        })
    }

    pub fn start(&self) {
        self.scheduler.start();
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    // --- query surface ---

    /// Current status plus daily rollups for every site with history.
    pub fn all_status(&self) -> Result<Vec<SiteStatusDetail>, DbError> {
        stats::all_status(&self.store)
    }

    /// The most recent checks for one site, newest first.
    pub fn site_history(&self, name: &str) -> Result<Vec<CheckRecord>, DbError> {
        self.store.recent(name, HISTORY_LIMIT)
    }

    /// Configured sites joined with their latest check.
    pub fn sites(&self) -> Result<Vec<SiteDetail>, DbError> {
        let cfg = self.config.read().unwrap().clone();
        stats::sites_with_latest(&self.store, &cfg)
    }

    /// Store-wide summary.
    pub fn global_stats(&self) -> Result<GlobalStats, DbError> {
        let cfg = self.config.read().unwrap().clone();
        stats::global_stats(&self.store, &cfg)
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> MonitorConfig {
        self.config.read().unwrap().clone()
    }

    // --- mutations ---

    /// Append a site and persist the document. Duplicate names are
    /// permitted; downstream lookups address the first match.
    pub fn add_site(
        &self,
        name: &str,
        url: &str,
        method: &str,
        timeout: i64,
    ) -> Result<(), ConfigError> {
        let cfg = {
            let mut cfg = self.config.write().unwrap();
            cfg.sites.push(Site {
                name: name.to_string(),
                url: url.to_string(),
                method: method.to_string(),
                timeout,
            });
            cfg.clone()
        };
        self.config_file.save(&cfg)
    }

    /// Remove the first site with the given name, delete its history, and
    /// persist the document. An unknown name is a logged no-op.
    pub fn remove_site(&self, name: &str) -> Result<(), ConfigError> {
        let cfg = {
            let mut cfg = self.config.write().unwrap();
            match cfg.sites.iter().position(|s| s.name == name) {
                Some(index) => {
                    cfg.sites.remove(index);
                    Some(cfg.clone())
                }
                None => None,
            }
        };

        let Some(cfg) = cfg else {
            tracing::warn!("site {} not found in configuration", name);
            return Ok(());
        };

        // History removal is best-effort; the config save still proceeds.
        match self.store.delete_for_site(name) {
            Ok(0) => {}
            Ok(removed) => tracing::info!("removed {} history records for site {}", removed, name),
            Err(e) => tracing::error!("failed to remove history for site {}: {}", name, e),
        }

        self.config_file.save(&cfg)
    }

    /// Overwrite both schedule fields and persist. Ranges are not
    /// validated here; load-time normalization covers the next startup.
    pub fn update_schedule(
        &self,
        check_interval: i64,
        retention_days: i64,
    ) -> Result<(), ConfigError> {
        let cfg = {
            let mut cfg = self.config.write().unwrap();
            cfg.check_interval = check_interval;
            cfg.retention_days = retention_days;
            cfg.clone()
        };
        self.config_file.save(&cfg)
    }

    /// Trigger one off-cadence check for the named site.
    pub async fn manual_check(&self, name: &str) {
        self.scheduler.manual_check(name).await;
    }
}
