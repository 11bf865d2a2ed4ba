//! Background polling of the backend API
//!
//! One task per query key (engines, summary, health), each on its own
//! interval. Tasks are independent: a slow or failing query never delays the
//! others. Results land in a shared snapshot; a version counter on a watch
//! channel tells the renderer when something changed.

use crate::client::{ApiClient, ApiError};
use crate::models::{DashboardSummary, Engine, HealthReport};
use crate::settings::PollingSettings;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Last outcome of one query; previous data is kept when a refresh fails
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub fetches: u64,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            updated_at: None,
            fetches: 0,
        }
    }
}

impl<T> QueryState<T> {
    pub fn record(&mut self, result: Result<T, ApiError>) {
        self.fetches += 1;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
                self.updated_at = Some(Utc::now());
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.fetches == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardSnapshot {
    pub engines: QueryState<Vec<Engine>>,
    pub summary: QueryState<DashboardSummary>,
    pub health: Option<HealthReport>,
}

impl DashboardSnapshot {
    pub fn engines(&self) -> &[Engine] {
        self.engines.data.as_deref().unwrap_or(&[])
    }
}

pub type SharedSnapshot = Arc<Mutex<DashboardSnapshot>>;

pub struct Poller {
    client: ApiClient,
    polling: PollingSettings,
    engines_limit: Option<u32>,
    snapshot: SharedSnapshot,
    version: watch::Sender<u64>,
}

impl Poller {
    pub fn new(client: ApiClient, polling: PollingSettings, engines_limit: Option<u32>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            client,
            polling,
            engines_limit,
            snapshot: Arc::new(Mutex::new(DashboardSnapshot::default())),
            version,
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.lock().clone()
    }

    pub fn shared(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    /// Bumped after every completed fetch
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Spawns the three polling tasks; they stop when `shutdown` turns true
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        info!(
            "polling {} (engines {}s, summary {}s, health {}s)",
            self.client.api_base(),
            self.polling.engines_secs,
            self.polling.summary_secs,
            self.polling.health_secs
        );

        let client = self.client.clone();
        let limit = self.engines_limit;
        let engines = spawn_query(
            "engines",
            secs(self.polling.engines_secs),
            shutdown.clone(),
            self.snapshot.clone(),
            self.version.clone(),
            move || {
                let client = client.clone();
                async move { client.engines(limit).await }
            },
            |snap, result| snap.engines.record(result),
        );

        let client = self.client.clone();
        let summary = spawn_query(
            "summary",
            secs(self.polling.summary_secs),
            shutdown.clone(),
            self.snapshot.clone(),
            self.version.clone(),
            move || {
                let client = client.clone();
                async move { client.dashboard_summary().await }
            },
            |snap, result| snap.summary.record(result),
        );

        let client = self.client.clone();
        let health = spawn_query(
            "health",
            secs(self.polling.health_secs),
            shutdown,
            self.snapshot.clone(),
            self.version.clone(),
            move || {
                let client = client.clone();
                async move { Ok::<_, ApiError>(client.health().await) }
            },
            |snap, result: Result<HealthReport, ApiError>| snap.health = result.ok(),
        );

        vec![engines, summary, health]
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n.max(1))
}

fn spawn_query<T, F, Fut, A>(
    name: &'static str,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
    snapshot: SharedSnapshot,
    version: watch::Sender<u64>,
    fetch: F,
    apply: A,
) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    A: Fn(&mut DashboardSnapshot, Result<T, ApiError>) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let result = fetch().await;
                    match &result {
                        Ok(_) => debug!("{name} refreshed"),
                        Err(e) => warn!("{name} fetch failed: {e}"),
                    }
                    apply(&mut snapshot.lock(), result);
                    version.send_modify(|v| *v += 1);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("{name} poller stopped");
                        break;
                    }
                }
            }
        }
    })
}
