//! HTTP check implementation.

use chrono::Utc;
use reqwest::Method;
use std::time::{Duration, Instant};

use crate::config::{Site, DEFAULT_TIMEOUT_SECS};
use crate::db::{CheckRecord, Status};

/// Run one check against a site.
///
/// Failures are classified, never returned: transport errors (DNS,
/// connection refused, timeout, malformed request) become a "down" record
/// with code 0 and the error text preserved; a completed response with a
/// code of 400 or higher is "down" with that code and no error message.
/// Latency is measured from request start to completion, or to the point
/// of failure.
pub async fn check_site(site: &Site) -> CheckRecord {
    let checked_at = Utc::now();
    let start = Instant::now();

    let timeout_secs = if site.timeout > 0 {
        site.timeout as u64
    } else {
        DEFAULT_TIMEOUT_SECS as u64
    };

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
    {
        Ok(client) => client,
        Err(e) => return failure(site, checked_at, 0, e.to_string()),
    };

    let method = Method::from_bytes(site.method.as_bytes()).unwrap_or(Method::GET);
    let result = client.request(method, &site.url).send().await;
    let elapsed_ms = start.elapsed().as_millis() as i64;

    match result {
        Ok(response) => {
            let code = response.status().as_u16() as i32;
            let status = if code >= 400 { Status::Down } else { Status::Up };
            CheckRecord {
                id: 0,
                site_name: site.name.clone(),
                site_url: site.url.clone(),
                status,
                status_code: code,
                response_time: elapsed_ms,
                checked_at,
                error_message: None,
            }
        }
        Err(e) => failure(site, checked_at, elapsed_ms, e.to_string()),
    }
}

fn failure(
    site: &Site,
    checked_at: chrono::DateTime<Utc>,
    elapsed_ms: i64,
    message: String,
) -> CheckRecord {
    CheckRecord {
        id: 0,
        site_name: site.name.clone(),
        site_url: site.url.clone(),
        status: Status::Down,
        status_code: 0,
        response_time: elapsed_ms,
        checked_at,
        error_message: Some(message),
    }
}
