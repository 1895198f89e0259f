//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome classification for a single check.
///
/// `Unknown` is a view-layer sentinel for configured sites with no history
/// yet; it is never written to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Up,
    Down,
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Up => "up",
            Status::Down => "down",
            Status::Unknown => "unknown",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "up" => Status::Up,
            "down" => Status::Down,
            _ => Status::Unknown,
        }
    }
}

/// One immutable probe outcome.
///
/// The site URL is denormalized at check time so history stays meaningful
/// after a site is renamed or removed from the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRecord {
    pub id: i64,
    pub site_name: String,
    pub site_url: String,
    pub status: Status,
    /// HTTP status code, 0 when the request never completed.
    pub status_code: i32,
    /// Wall-clock latency in milliseconds.
    pub response_time: i64,
    pub checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Daily aggregate of checks for one site.
///
/// `date` is "YYYY-MM-DD", or "total" for the lifetime rollup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBucket {
    pub date: String,
    pub total_checks: i64,
    pub up_checks: i64,
    pub down_checks: i64,
    pub uptime_percent: f64,
}

impl DailyBucket {
    /// Uptime percentage, 0 for an empty set.
    pub fn percent(up: i64, total: i64) -> f64 {
        if total > 0 {
            up as f64 / total as f64 * 100.0
        } else {
            0.0
        }
    }
}

/// Lifetime per-site counters for the global stats view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStats {
    pub site_name: String,
    pub total_checks: i64,
    pub up_checks: i64,
    pub down_checks: i64,
    pub uptime_percent: f64,
    pub avg_response_time: f64,
}
