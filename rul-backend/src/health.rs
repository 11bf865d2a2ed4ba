use crate::store::EngineStore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize)]
pub struct BackendHealth {
    pub uptime_seconds: u64,
    pub engines_tracked: u32,
    /// Absent quand la plateforme ne l'expose pas
    pub memory_usage_mb: Option<f32>,
    pub ml_status: String,
    pub ml_failures: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    ml_failures: Arc<AtomicU32>,
    ml_status: Arc<parking_lot::Mutex<String>>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            ml_failures: Arc::new(AtomicU32::new(0)),
            ml_status: Arc::new(parking_lot::Mutex::new("unknown".to_string())),
        }
    }

    pub fn mark_ml_online(&self) {
        *self.ml_status.lock() = "online".to_string();
    }

    pub fn mark_ml_failed(&self) {
        self.ml_failures.fetch_add(1, Ordering::Relaxed);
        *self.ml_status.lock() = "offline".to_string();
    }

    pub fn ml_status(&self) -> String {
        self.ml_status.lock().clone()
    }

    pub fn get_health(&self, store: &EngineStore) -> BackendHealth {
        BackendHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            engines_tracked: store.count() as u32,
            memory_usage_mb: resident_memory_mb(),
            ml_status: self.ml_status(),
            ml_failures: self.ml_failures.load(Ordering::Relaxed),
        }
    }
}

/// RSS du processus en Mo, lu dans /proc ; None hors Linux ou si illisible
fn resident_memory_mb() -> Option<f32> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let kb: u64 = status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kb as f32 / 1024.0)
}
