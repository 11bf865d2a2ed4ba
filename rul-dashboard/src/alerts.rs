//! Alerts panel
//!
//! Alerts are synthesized from the current engine list on every render.
//! They are not persisted, deduplicated across polls or acknowledged.

use crate::models::{Engine, EngineStatus};
use crate::settings::AlertSettings;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    CriticalRul,
    MaintenanceDue,
    LowConfidence,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::CriticalRul => "critical_rul",
            AlertKind::MaintenanceDue => "maintenance_due",
            AlertKind::LowConfidence => "low_confidence",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// `"{engine_id}-{kind}"`, stable across polls
    pub id: String,
    pub engine_id: u32,
    pub engine_name: String,
    pub severity: Severity,
    pub kind: AlertKind,
    pub message: String,
    pub rul: Option<f64>,
    pub raised_at: DateTime<Utc>,
}

/// Status-driven level, escalated when the RUL already crosses the configured thresholds
fn rul_level(engine: &Engine, thresholds: &AlertSettings) -> EngineStatus {
    let from_rul = match engine.current_rul {
        Some(rul) if rul < thresholds.critical_rul => EngineStatus::Critical,
        Some(rul) if rul < thresholds.warning_rul => EngineStatus::Warning,
        _ => EngineStatus::Healthy,
    };
    if from_rul.severity() > engine.status.severity() {
        from_rul
    } else {
        engine.status
    }
}

fn fmt_rul(rul: Option<f64>) -> String {
    rul.map(|r| format!("{r:.0} cycles")).unwrap_or_else(|| "unknown".to_string())
}

pub fn synthesize(engines: &[Engine], thresholds: &AlertSettings, now: DateTime<Utc>) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for engine in engines.iter().filter(|e| e.is_active) {
        let raised_at = engine.last_updated.unwrap_or(now);
        let mut push = |severity, kind: AlertKind, message: String| {
            alerts.push(Alert {
                id: format!("{}-{}", engine.id, kind.as_str()),
                engine_id: engine.id,
                engine_name: engine.name.clone(),
                severity,
                kind,
                message,
                rul: engine.current_rul,
                raised_at,
            });
        };

        match rul_level(engine, thresholds) {
            EngineStatus::Critical => push(
                Severity::Critical,
                AlertKind::CriticalRul,
                format!(
                    "{} requires immediate maintenance (RUL {})",
                    engine.name,
                    fmt_rul(engine.current_rul)
                ),
            ),
            EngineStatus::Warning => push(
                Severity::Warning,
                AlertKind::MaintenanceDue,
                format!(
                    "{} approaching maintenance window (RUL {})",
                    engine.name,
                    fmt_rul(engine.current_rul)
                ),
            ),
            EngineStatus::Healthy => {}
        }

        if let Some(confidence) = engine.confidence {
            if confidence < thresholds.low_confidence {
                push(
                    Severity::Info,
                    AlertKind::LowConfidence,
                    format!(
                        "Low prediction confidence for {} ({:.0}%)",
                        engine.name,
                        confidence.clamp(0.0, 1.0) * 100.0
                    ),
                );
            }
        }
    }

    alerts.sort_by(compare);
    alerts
}

/// Severity first, then lowest RUL (missing last), then id
fn compare(a: &Alert, b: &Alert) -> Ordering {
    a.severity
        .rank()
        .cmp(&b.severity.rank())
        .then_with(|| match (a.rul, b.rul) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.id.cmp(&b.id))
}

/// (critical, warning, info)
pub fn count_by_severity(alerts: &[Alert]) -> (usize, usize, usize) {
    alerts.iter().fold((0, 0, 0), |(c, w, i), a| match a.severity {
        Severity::Critical => (c + 1, w, i),
        Severity::Warning => (c, w + 1, i),
        Severity::Info => (c, w, i + 1),
    })
}
