//! Local connectivity preflight.

use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Well-known public resolvers used as reachability witnesses.
const DEFAULT_HOSTS: [&str; 3] = ["8.8.8.8:53", "1.1.1.1:53", "208.67.222.222:53"];

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Cheap preflight that distinguishes "the monitored site is down" from
/// "this host has no network path at all". The host list is injectable so
/// both outcomes can be simulated deterministically.
#[derive(Debug, Clone)]
pub struct ConnectivityGate {
    hosts: Vec<String>,
    attempt_timeout: Duration,
}

impl Default for ConnectivityGate {
    fn default() -> Self {
        Self {
            hosts: DEFAULT_HOSTS.iter().map(|h| h.to_string()).collect(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

impl ConnectivityGate {
    pub fn with_hosts(hosts: Vec<String>, attempt_timeout: Duration) -> Self {
        Self {
            hosts,
            attempt_timeout,
        }
    }

    /// True on the first host that accepts a TCP connection, false when
    /// every attempt fails. A false negative suppresses one check cycle.
    pub async fn has_connectivity(&self) -> bool {
        for host in &self.hosts {
            if let Ok(Ok(_conn)) =
                timeout(self.attempt_timeout, TcpStream::connect(host.as_str())).await
            {
                return true;
            }
        }

        tracing::warn!("no internet connectivity detected");
        false
    }
}
