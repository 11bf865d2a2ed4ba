//! Fleet analytics: status distribution, RUL bands, confidence.

use crate::metrics::DashboardMetrics;
use crate::models::{Engine, EngineStatus};
use serde::Serialize;

/// Upper bounds of the critical and warning bands, in cycles
pub const CRITICAL_BAND: f64 = 50.0;
pub const WARNING_BAND: f64 = 100.0;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RulBuckets {
    pub below_50: usize,
    pub from_50_to_100: usize,
    pub at_least_100: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEngine {
    pub id: u32,
    pub name: String,
    pub rul: f64,
    pub status: EngineStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetAnalytics {
    /// (status, count, percent of total), critical first
    pub distribution: Vec<(EngineStatus, usize, f64)>,
    pub buckets: RulBuckets,
    pub mean_confidence: Option<f64>,
    pub lowest_rul: Vec<RankedEngine>,
}

impl FleetAnalytics {
    pub fn is_empty(&self) -> bool {
        self.distribution.iter().all(|(_, n, _)| *n == 0)
    }
}

pub fn analyze(engines: &[Engine], top_n: usize) -> FleetAnalytics {
    let metrics = DashboardMetrics::from_engines(engines);
    let distribution = EngineStatus::ALL
        .iter()
        .map(|&s| (s, metrics.count_for(s), metrics.percent_for(s)))
        .collect();

    let mut buckets = RulBuckets::default();
    for engine in engines {
        match engine.current_rul {
            None => buckets.unknown += 1,
            Some(r) if r < CRITICAL_BAND => buckets.below_50 += 1,
            Some(r) if r < WARNING_BAND => buckets.from_50_to_100 += 1,
            Some(_) => buckets.at_least_100 += 1,
        }
    }

    let confidences: Vec<f64> = engines.iter().filter_map(|e| e.confidence).collect();
    let mean_confidence = (!confidences.is_empty())
        .then(|| confidences.iter().map(|c| c.clamp(0.0, 1.0)).sum::<f64>() / confidences.len() as f64);

    let mut ranked: Vec<RankedEngine> = engines
        .iter()
        .filter(|e| e.is_active)
        .filter_map(|e| {
            e.current_rul.map(|rul| RankedEngine {
                id: e.id,
                name: e.name.clone(),
                rul,
                status: e.status,
            })
        })
        .collect();
    ranked.sort_by(|a, b| a.rul.total_cmp(&b.rul).then(a.id.cmp(&b.id)));
    ranked.truncate(top_n);

    FleetAnalytics {
        distribution,
        buckets,
        mean_confidence,
        lowest_rul: ranked,
    }
}
