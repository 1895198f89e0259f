//! Retention sweep for aging out old history.

use chrono::{Duration as ChronoDuration, Utc};

use crate::config::SharedConfig;
use crate::db::Store;

/// Delete history older than the configured horizon.
///
/// A horizon of zero or less means cleanup is disabled. Storage failures
/// are logged and the sweep carries on; the next daily tick retries
/// naturally.
pub fn sweep(store: &Store, config: &SharedConfig) {
    let retention_days = {
        let cfg = config.read().unwrap();
        cfg.retention_days
    };

    if retention_days <= 0 {
        tracing::debug!("retention cleanup disabled (retentionDays <= 0)");
        return;
    }

    let cutoff = Utc::now() - ChronoDuration::days(retention_days);
    match store.delete_older_than(cutoff) {
        Ok(0) => {}
        Ok(removed) => tracing::info!(
            "retention sweep removed {} records older than {} days",
            removed,
            retention_days
        ),
        Err(e) => tracing::error!("retention sweep failed: {}", e),
    }
}
