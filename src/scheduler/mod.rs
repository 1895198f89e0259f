//! Scheduler driving periodic check cycles and retention sweeps.

mod retention;

pub use retention::*;

use crate::config::{SharedConfig, Site};
use crate::db::Store;
use crate::probe::{check_site, ConnectivityGate};

use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on the random delay applied to each scheduled probe so a
/// cycle does not hit every site at the same instant.
const DISPATCH_JITTER_MS: u64 = 250;

/// Drives the check loop and the slower retention loop against a single
/// stop signal. Stopped until `start` is called; `stop` lets in-flight
/// probes finish and still record.
pub struct Scheduler {
    store: Store,
    config: SharedConfig,
    gate: ConnectivityGate,
    stop: Mutex<Option<broadcast::Sender<()>>>,
}

impl Scheduler {
    pub fn new(store: Store, config: SharedConfig, gate: ConnectivityGate) -> Self {
        Self {
            store,
            config,
            gate,
            stop: Mutex::new(None),
        }
    }

    /// Start the background loop. No-op when already running.
    ///
    /// The check interval is fixed at start; the site list is re-read on
    /// every tick, so configuration changes apply from the next cycle.
    pub fn start(&self) {
        let mut stop = self.stop.lock().unwrap();
        if stop.is_some() {
            return;
        }

        let (tx, rx) = broadcast::channel(1);
        *stop = Some(tx);

        let interval_secs = {
            let cfg = self.config.read().unwrap();
            cfg.check_interval.max(1) as u64
        };
        tracing::info!("starting monitor loop, checking every {}s", interval_secs);

        tokio::spawn(run_loop(
            self.store.clone(),
            self.config.clone(),
            self.gate.clone(),
            interval_secs,
            rx,
        ));
    }

    /// Signal the loop to exit.
    pub fn stop(&self) {
        if let Some(tx) = self.stop.lock().unwrap().take() {
            let _ = tx.send(());
            tracing::info!("monitor loop stopping");
        }
    }

    /// Dispatch one off-cadence check for the named site, subject to the
    /// same connectivity policy as a scheduled cycle. An unknown name is a
    /// no-op.
    pub async fn manual_check(&self, name: &str) {
        if !self.gate.has_connectivity().await {
            tracing::warn!("skipping manual check for {}: no connectivity", name);
            return;
        }

        let site = {
            let cfg = self.config.read().unwrap();
            cfg.sites.iter().find(|s| s.name == name).cloned()
        };

        match site {
            Some(site) => {
                let store = self.store.clone();
                tokio::spawn(async move {
                    run_check(store, site, 0).await;
                });
            }
            None => tracing::debug!("manual check requested for unknown site {}", name),
        }
    }
}

async fn run_loop(
    store: Store,
    config: SharedConfig,
    gate: ConnectivityGate,
    interval_secs: u64,
    mut stop_rx: broadcast::Receiver<()>,
) {
    // Both intervals fire immediately on entry: one initial cycle, one
    // initial sweep.
    let mut check = tokio::time::interval(Duration::from_secs(interval_secs));
    check.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sweep = tokio::time::interval(RETENTION_SWEEP_INTERVAL);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                tracing::info!("monitor loop stopped");
                break;
            }
            _ = check.tick() => {
                run_cycle(&store, &config, &gate).await;
            }
            _ = sweep.tick() => {
                retention::sweep(&store, &config);
            }
        }
    }
}

/// One round of checks: gate first, then one fire-and-forget probe task per
/// site. The cycle never waits for its probes.
pub(crate) async fn run_cycle(store: &Store, config: &SharedConfig, gate: &ConnectivityGate) {
    if !gate.has_connectivity().await {
        tracing::warn!("no connectivity, skipping check cycle");
        return;
    }

    let sites = {
        let cfg = config.read().unwrap();
        cfg.sites.clone()
    };

    for site in sites {
        let store = store.clone();
        let jitter_ms = rand::random::<u64>() % DISPATCH_JITTER_MS;
        tokio::spawn(async move {
            run_check(store, site, jitter_ms).await;
        });
    }
}

async fn run_check(store: Store, site: Site, jitter_ms: u64) {
    if jitter_ms > 0 {
        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
    }

    let record = check_site(&site).await;
    // A failed append is dropped, not retried; the next tick is the retry.
    if let Err(e) = store.append(&record) {
        tracing::error!("failed to record check for {}: {}", site.name, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use std::sync::{Arc, RwLock};
    use tempfile::NamedTempFile;

    fn shared(sites: Vec<Site>) -> SharedConfig {
        Arc::new(RwLock::new(MonitorConfig {
            check_interval: 30,
            retention_days: 7,
            sites,
        }))
    }

    fn site(name: &str, url: &str) -> Site {
        Site {
            name: name.to_string(),
            url: url.to_string(),
            method: "GET".to_string(),
            timeout: 2,
        }
    }

    async fn local_gate() -> ConnectivityGate {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });
        ConnectivityGate::with_hosts(vec![addr], Duration::from_secs(1))
    }

    fn closed_gate() -> ConnectivityGate {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        ConnectivityGate::with_hosts(vec![addr], Duration::from_millis(200))
    }

    async fn wait_for_records(store: &Store, site: &str, count: usize) -> bool {
        for _ in 0..100 {
            if store.recent(site, 50).unwrap().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test]
    async fn cycle_records_every_site() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(200)
            .expect_at_least(1)
            .create_async()
            .await;

        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let config = shared(vec![site("ok", &server.url())]);
        let gate = local_gate().await;

        run_cycle(&store, &config, &gate).await;

        assert!(wait_for_records(&store, "ok", 1).await);
        let records = store.recent("ok", 50).unwrap();
        assert_eq!(records[0].status_code, 200);
    }

    #[tokio::test]
    async fn cycle_is_skipped_without_connectivity() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let config = shared(vec![site("ok", "http://127.0.0.1:1")]);

        run_cycle(&store, &config, &closed_gate()).await;
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(store.recent("ok", 50).unwrap().is_empty());
    }

    #[tokio::test]
    async fn manual_check_records_one_result() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(200)
            .create_async()
            .await;

        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let config = shared(vec![site("ok", &server.url())]);

        let scheduler = Scheduler::new(store.clone(), config, local_gate().await);
        scheduler.manual_check("ok").await;

        assert!(wait_for_records(&store, "ok", 1).await);
    }

    #[tokio::test]
    async fn manual_check_for_unknown_site_is_a_noop() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let config = shared(Vec::new());

        let scheduler = Scheduler::new(store.clone(), config, local_gate().await);
        scheduler.manual_check("missing").await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.count_records().unwrap(), 0);
    }

    #[tokio::test]
    async fn start_twice_then_stop_is_safe() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let config = shared(Vec::new());

        let scheduler = Scheduler::new(store, config, closed_gate());
        scheduler.start();
        scheduler.start();
        scheduler.stop();
        scheduler.stop();
    }
}
