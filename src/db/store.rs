//! SQLite store for check history.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::*;

const DB_TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Thread-safe history store.
///
/// Append is the only concurrent write; the connection mutex serializes it
/// against sweeps and reads.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("schema init failed: {}", e)))?;
        Ok(())
    }

    /// Append one check record and return its id.
    ///
    /// The record's own `checked_at` is written so the stored timestamp is
    /// the moment the probe started, not the moment the row landed.
    pub fn append(&self, record: &CheckRecord) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO status_checks (site_name, site_url, status, status_code, response_time, checked_at, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.site_name,
                record.site_url,
                record.status.as_str(),
                record.status_code,
                record.response_time,
                record.checked_at.format(DB_TIME_FMT).to_string(),
                record.error_message,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The most recent record for every site name with at least one record.
    ///
    /// Ties on `checked_at` are broken by the higher id.
    pub fn latest_per_site(&self) -> Result<Vec<CheckRecord>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, site_name, site_url, status, status_code, response_time, checked_at, error_message
             FROM status_checks AS s
             WHERE s.id = (
                 SELECT s2.id FROM status_checks s2
                 WHERE s2.site_name = s.site_name
                 ORDER BY s2.checked_at DESC, s2.id DESC
                 LIMIT 1
             )
             ORDER BY s.site_name",
        )?;

        let records = stmt
            .query_map([], row_to_record)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(records)
    }

    /// Up to `limit` most recent records for one site, newest first.
    pub fn recent(&self, site_name: &str, limit: i64) -> Result<Vec<CheckRecord>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, site_name, site_url, status, status_code, response_time, checked_at, error_message
             FROM status_checks
             WHERE site_name = ?1
             ORDER BY checked_at DESC, id DESC
             LIMIT ?2",
        )?;

        let records = stmt
            .query_map(params![site_name, limit], row_to_record)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(records)
    }

    /// One bucket per calendar date with at least one record in the
    /// trailing window, newest date first.
    pub fn daily_buckets(
        &self,
        site_name: &str,
        window_days: i64,
    ) -> Result<Vec<DailyBucket>, DbError> {
        let cutoff = (Utc::now() - ChronoDuration::days(window_days))
            .format("%Y-%m-%d")
            .to_string();

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DATE(checked_at) AS check_date,
                    COUNT(*) AS total_checks,
                    SUM(CASE WHEN status = 'up' THEN 1 ELSE 0 END) AS up_checks,
                    SUM(CASE WHEN status = 'down' THEN 1 ELSE 0 END) AS down_checks
             FROM status_checks
             WHERE site_name = ?1 AND checked_at >= ?2
             GROUP BY DATE(checked_at)
             ORDER BY check_date DESC",
        )?;

        let buckets = stmt
            .query_map(params![site_name, cutoff], |row| {
                let total: i64 = row.get(1)?;
                let up: i64 = row.get(2)?;
                Ok(DailyBucket {
                    date: row.get(0)?,
                    total_checks: total,
                    up_checks: up,
                    down_checks: row.get(3)?,
                    uptime_percent: DailyBucket::percent(up, total),
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(buckets)
    }

    /// Delete all records strictly older than the cutoff. Records stamped
    /// exactly at the cutoff are retained. Returns the count removed.
    pub fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM status_checks WHERE checked_at < ?1",
            params![cutoff.format(DB_TIME_FMT).to_string()],
        )?;
        Ok(removed)
    }

    /// Delete all records for one site. Returns the count removed.
    pub fn delete_for_site(&self, site_name: &str) -> Result<usize, DbError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM status_checks WHERE site_name = ?1",
            params![site_name],
        )?;
        Ok(removed)
    }

    /// Lifetime totals and mean latency per site name, across all history.
    pub fn all_stats_by_site(&self) -> Result<Vec<SiteStats>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT site_name,
                    COUNT(*) AS total_checks,
                    SUM(CASE WHEN status = 'up' THEN 1 ELSE 0 END) AS up_checks,
                    SUM(CASE WHEN status = 'down' THEN 1 ELSE 0 END) AS down_checks,
                    AVG(response_time) AS avg_response_time
             FROM status_checks
             GROUP BY site_name
             ORDER BY site_name",
        )?;

        let stats = stmt
            .query_map([], |row| {
                let total: i64 = row.get(1)?;
                let up: i64 = row.get(2)?;
                Ok(SiteStats {
                    site_name: row.get(0)?,
                    total_checks: total,
                    up_checks: up,
                    down_checks: row.get(3)?,
                    uptime_percent: DailyBucket::percent(up, total),
                    avg_response_time: row.get(4)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(stats)
    }

    /// Total number of stored records.
    pub fn count_records(&self) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM status_checks", [], |r| r.get(0))?)
    }

    /// Oldest and newest record timestamps, `None` when the store is empty.
    pub fn time_bounds(
        &self,
    ) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), DbError> {
        let conn = self.conn.lock().unwrap();
        let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(checked_at), MAX(checked_at) FROM status_checks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((
            oldest.as_deref().and_then(parse_db_time),
            newest.as_deref().and_then(parse_db_time),
        ))
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> SqlResult<CheckRecord> {
    let status: String = row.get(3)?;
    let checked_at: String = row.get(6)?;
    Ok(CheckRecord {
        id: row.get(0)?,
        site_name: row.get(1)?,
        site_url: row.get(2)?,
        status: Status::from_db(&status),
        status_code: row.get(4)?,
        response_time: row.get(5)?,
        checked_at: parse_db_time(&checked_at).unwrap_or_else(Utc::now),
        error_message: row.get(7)?,
    })
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [DB_TIME_FMT, "%Y-%m-%d %H:%M:%S%.f"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn record(
        name: &str,
        status: Status,
        code: i32,
        ms: i64,
        at: DateTime<Utc>,
    ) -> CheckRecord {
        CheckRecord {
            id: 0,
            site_name: name.to_string(),
            site_url: format!("https://{}.example", name),
            status,
            status_code: code,
            response_time: ms,
            checked_at: at,
            error_message: None,
        }
    }

    fn open_store() -> (NamedTempFile, Store) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        (tmp, store)
    }

    #[test]
    fn append_and_recent_ordering() {
        let (_tmp, store) = open_store();
        let now = Utc::now();

        for i in 0..3 {
            let r = record("a", Status::Up, 200, 10 + i, now - ChronoDuration::minutes(3 - i));
            store.append(&r).unwrap();
        }
        store
            .append(&record("b", Status::Down, 0, 5, now))
            .unwrap();

        let recent = store.recent("a", 50).unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[0].checked_at > recent[1].checked_at);
        assert_eq!(recent[0].response_time, 12);

        let limited = store.recent("a", 2).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn latest_per_site_prefers_newest_then_highest_id() {
        let (_tmp, store) = open_store();
        let now = Utc::now();

        store
            .append(&record("a", Status::Down, 500, 20, now - ChronoDuration::hours(1)))
            .unwrap();
        // Two records sharing a timestamp: the later insert (higher id) wins.
        store.append(&record("a", Status::Down, 503, 30, now)).unwrap();
        store.append(&record("a", Status::Up, 200, 40, now)).unwrap();
        store
            .append(&record("b", Status::Up, 204, 15, now - ChronoDuration::days(2)))
            .unwrap();

        let latest = store.latest_per_site().unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].site_name, "a");
        assert_eq!(latest[0].status, Status::Up);
        assert_eq!(latest[0].status_code, 200);
        assert_eq!(latest[1].site_name, "b");
        assert_eq!(latest[1].status_code, 204);
    }

    #[test]
    fn daily_buckets_compute_exact_percentages() {
        let (_tmp, store) = open_store();
        let now = Utc::now();
        let yesterday = now - ChronoDuration::days(1);

        store.append(&record("a", Status::Up, 200, 10, now)).unwrap();
        store.append(&record("a", Status::Up, 200, 10, now)).unwrap();
        store.append(&record("a", Status::Down, 0, 10, now)).unwrap();
        store.append(&record("a", Status::Up, 200, 10, yesterday)).unwrap();

        let buckets = store.daily_buckets("a", 30).unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].total_checks, 3);
        assert_eq!(buckets[0].up_checks, 2);
        assert_eq!(buckets[0].down_checks, 1);
        assert!((buckets[0].uptime_percent - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(buckets[1].total_checks, 1);
        assert_eq!(buckets[1].uptime_percent, 100.0);

        // Dates outside the window never produce buckets.
        store
            .append(&record("a", Status::Down, 0, 10, now - ChronoDuration::days(60)))
            .unwrap();
        assert_eq!(store.daily_buckets("a", 30).unwrap().len(), 2);
    }

    #[test]
    fn delete_older_than_is_strict_at_the_cutoff() {
        let (_tmp, store) = open_store();
        let cutoff = Utc::now() - ChronoDuration::days(1);

        store
            .append(&record("a", Status::Up, 200, 10, cutoff - ChronoDuration::seconds(1)))
            .unwrap();
        store.append(&record("a", Status::Up, 200, 10, cutoff)).unwrap();
        store
            .append(&record("a", Status::Up, 200, 10, cutoff + ChronoDuration::hours(1)))
            .unwrap();

        let removed = store.delete_older_than(cutoff).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.recent("a", 50).unwrap().len(), 2);
        assert_eq!(store.delete_older_than(cutoff).unwrap(), 0);
    }

    #[test]
    fn delete_for_site_leaves_others_alone() {
        let (_tmp, store) = open_store();
        let now = Utc::now();

        store.append(&record("a", Status::Up, 200, 10, now)).unwrap();
        store.append(&record("a", Status::Down, 0, 10, now)).unwrap();
        store.append(&record("b", Status::Up, 200, 10, now)).unwrap();

        assert_eq!(store.delete_for_site("a").unwrap(), 2);
        assert!(store.recent("a", 50).unwrap().is_empty());
        assert_eq!(store.recent("b", 50).unwrap().len(), 1);
        assert_eq!(store.delete_for_site("missing").unwrap(), 0);
    }

    #[test]
    fn lifetime_stats_average_latency() {
        let (_tmp, store) = open_store();
        let now = Utc::now();

        store.append(&record("a", Status::Up, 200, 100, now)).unwrap();
        store.append(&record("a", Status::Up, 200, 300, now)).unwrap();
        store.append(&record("a", Status::Down, 0, 200, now)).unwrap();

        let stats = store.all_stats_by_site().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_checks, 3);
        assert_eq!(stats[0].up_checks, 2);
        assert_eq!(stats[0].down_checks, 1);
        assert!((stats[0].avg_response_time - 200.0).abs() < 1e-9);
        assert!((stats[0].uptime_percent - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn time_bounds_and_count() {
        let (_tmp, store) = open_store();
        assert_eq!(store.count_records().unwrap(), 0);
        let (oldest, newest) = store.time_bounds().unwrap();
        assert!(oldest.is_none() && newest.is_none());

        let early = Utc::now() - ChronoDuration::days(3);
        let late = Utc::now();
        store.append(&record("a", Status::Up, 200, 10, early)).unwrap();
        store.append(&record("a", Status::Up, 200, 10, late)).unwrap();

        assert_eq!(store.count_records().unwrap(), 2);
        let (oldest, newest) = store.time_bounds().unwrap();
        assert!(oldest.unwrap() < newest.unwrap());
    }
}
