//! Summary card figures, derived client-side from the engine list.

use crate::models::{DashboardSummary, Engine, EngineStatus};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub total: usize,
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
    /// Active engines with a RUL value, the basis the server uses too
    pub active: usize,
    /// Over active engines with a RUL value, 2 decimals; 0 when none
    pub average_rul: f64,
    pub healthy_pct: f64,
    pub warning_pct: f64,
    pub critical_pct: f64,
}

impl DashboardMetrics {
    pub fn from_engines(engines: &[Engine]) -> Self {
        let count = |status: EngineStatus| engines.iter().filter(|e| e.status == status).count();
        let total = engines.len();
        let healthy = count(EngineStatus::Healthy);
        let warning = count(EngineStatus::Warning);
        let critical = count(EngineStatus::Critical);

        let ruls: Vec<f64> = engines
            .iter()
            .filter(|e| e.is_active)
            .filter_map(|e| e.current_rul)
            .collect();
        let active = ruls.len();
        let average_rul = if ruls.is_empty() {
            0.0
        } else {
            round2(ruls.iter().sum::<f64>() / ruls.len() as f64)
        };

        Self {
            total,
            healthy,
            warning,
            critical,
            active,
            average_rul,
            healthy_pct: percent(healthy, total),
            warning_pct: percent(warning, total),
            critical_pct: percent(critical, total),
        }
    }

    pub fn count_for(&self, status: EngineStatus) -> usize {
        match status {
            EngineStatus::Healthy => self.healthy,
            EngineStatus::Warning => self.warning,
            EngineStatus::Critical => self.critical,
        }
    }

    pub fn percent_for(&self, status: EngineStatus) -> f64 {
        match status {
            EngineStatus::Healthy => self.healthy_pct,
            EngineStatus::Warning => self.warning_pct,
            EngineStatus::Critical => self.critical_pct,
        }
    }

    /// Counts must be equal and averages within a rounding step
    pub fn matches_server(&self, server: &DashboardSummary) -> bool {
        self.total == server.total_engines
            && self.healthy == server.healthy_engines
            && self.warning == server.warning_engines
            && self.critical == server.critical_engines
            && self.active == server.active_engines
            && (self.average_rul - server.average_rul).abs() < 0.011
    }
}

/// Floored to one decimal, so the three shares never sum above 100
fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((part * 1000) / total) as f64 / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
