//! Read-side aggregation over history and configuration.
//!
//! Everything here is derived and stateless: each query recomputes its view
//! from the store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::MonitorConfig;
use crate::db::{DailyBucket, DbError, SiteStats, Status, Store};

const DAILY_WINDOW_DAYS: i64 = 30;

/// Latest known state plus daily rollups for one site with history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatusDetail {
    pub site_name: String,
    pub site_url: String,
    pub last_status: Status,
    pub last_status_code: i32,
    pub last_response_time: i64,
    pub last_checked: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
    pub daily_stats: Vec<DailyBucket>,
    pub total_stats: DailyBucket,
}

/// A configured site joined with its most recent check, if any.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDetail {
    pub name: String,
    pub url: String,
    pub method: String,
    pub timeout: i64,
    pub status: Status,
    pub status_code: i32,
    pub response_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub is_active: bool,
}

/// Store-wide summary for the stats view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_records: i64,
    pub oldest_record: Option<DateTime<Utc>>,
    pub newest_record: Option<DateTime<Utc>>,
    pub retention_days: i64,
    pub check_interval: i64,
    pub site_stats: Vec<SiteStats>,
    pub generated_at: DateTime<Utc>,
}

/// Per-site current status with 30-day buckets and a lifetime-of-window
/// "total" rollup, for every site that has at least one record.
pub fn all_status(store: &Store) -> Result<Vec<SiteStatusDetail>, DbError> {
    let mut details = Vec::new();

    for latest in store.latest_per_site()? {
        let daily = store.daily_buckets(&latest.site_name, DAILY_WINDOW_DAYS)?;

        let (mut total, mut up, mut down) = (0, 0, 0);
        for bucket in &daily {
            total += bucket.total_checks;
            up += bucket.up_checks;
            down += bucket.down_checks;
        }

        details.push(SiteStatusDetail {
            site_name: latest.site_name,
            site_url: latest.site_url,
            last_status: latest.status,
            last_status_code: latest.status_code,
            last_response_time: latest.response_time,
            last_checked: latest.checked_at,
            last_error_message: latest.error_message,
            daily_stats: daily,
            total_stats: DailyBucket {
                date: "total".to_string(),
                total_checks: total,
                up_checks: up,
                down_checks: down,
                uptime_percent: DailyBucket::percent(up, total),
            },
        });
    }

    Ok(details)
}

/// Configured sites in document order, each joined with its most recent
/// record. A site with no history yet reports status `Unknown`.
pub fn sites_with_latest(
    store: &Store,
    config: &MonitorConfig,
) -> Result<Vec<SiteDetail>, DbError> {
    let mut sites = Vec::with_capacity(config.sites.len());

    for site in &config.sites {
        let latest = store.recent(&site.name, 1)?.into_iter().next();

        let detail = match latest {
            Some(record) => SiteDetail {
                name: site.name.clone(),
                url: site.url.clone(),
                method: site.method.clone(),
                timeout: site.timeout,
                status: record.status,
                status_code: record.status_code,
                response_time: record.response_time,
                last_checked: Some(record.checked_at),
                error_message: record.error_message,
                is_active: true,
            },
            None => SiteDetail {
                name: site.name.clone(),
                url: site.url.clone(),
                method: site.method.clone(),
                timeout: site.timeout,
                status: Status::Unknown,
                status_code: 0,
                response_time: 0,
                last_checked: None,
                error_message: None,
                is_active: true,
            },
        };
        sites.push(detail);
    }

    Ok(sites)
}

/// Store-wide record counts, time bounds, and per-site lifetime stats.
pub fn global_stats(store: &Store, config: &MonitorConfig) -> Result<GlobalStats, DbError> {
    let total_records = store.count_records()?;
    let (oldest_record, newest_record) = store.time_bounds()?;

    Ok(GlobalStats {
        total_records,
        oldest_record,
        newest_record,
        retention_days: config.retention_days,
        check_interval: config.check_interval,
        site_stats: store.all_stats_by_site()?,
        generated_at: Utc::now(),
    })
}
