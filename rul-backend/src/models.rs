use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Plafond de RUL utilisé par le modèle (cycles)
pub const RUL_MAX: f64 = 125.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Healthy,
    Warning,
    Critical,
}

impl EngineStatus {
    /// Seuils du modèle : < 50 critique, < 100 alerte, sinon sain
    pub fn from_rul(rul: f64) -> Self {
        if rul < 50.0 {
            EngineStatus::Critical
        } else if rul < 100.0 {
            EngineStatus::Warning
        } else {
            EngineStatus::Healthy
        }
    }
}

impl Default for EngineStatus {
    fn default() -> Self {
        EngineStatus::Healthy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    pub id: u32,
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub status: EngineStatus,
    pub current_rul: Option<f64>,
    pub confidence: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub last_updated: Option<OffsetDateTime>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub engine_id: u32,
    pub cycle: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub settings: [f64; 3],
    pub sensors: Vec<f64>, // sensor_1 .. sensor_21
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulPrediction {
    pub id: String,
    pub engine_id: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub predicted_rul: f64,
    pub confidence: f64,
    pub model_version: String,
    pub prediction_time_ms: Option<f64>,
}

/// Réponse de GET /api/v1/engines/{id}/rul
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineRulView {
    pub engine_id: u32,
    pub engine_name: String,
    pub rul: Option<f64>,
    pub confidence: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    pub model_version: String,
    pub prediction_time_ms: Option<f64>,
    pub status: EngineStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_engines: usize,
    pub healthy_engines: usize,
    pub warning_engines: usize,
    pub critical_engines: usize,
    pub average_rul: f64,
    pub active_engines: usize,
}

impl DashboardSummary {
    /// Agrégat serveur : la moyenne ne porte que sur les moteurs actifs avec un RUL connu
    pub fn from_engines(engines: &[Engine]) -> Self {
        let count = |s: EngineStatus| engines.iter().filter(|e| e.status == s).count();
        let active: Vec<f64> = engines
            .iter()
            .filter(|e| e.is_active)
            .filter_map(|e| e.current_rul)
            .collect();
        let average = if active.is_empty() {
            0.0
        } else {
            active.iter().sum::<f64>() / active.len() as f64
        };

        Self {
            total_engines: engines.len(),
            healthy_engines: count(EngineStatus::Healthy),
            warning_engines: count(EngineStatus::Warning),
            critical_engines: count(EngineStatus::Critical),
            average_rul: round2(average),
            active_engines: active.len(),
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(id: u32, status: EngineStatus, rul: Option<f64>, active: bool) -> Engine {
        Engine {
            id,
            name: format!("Engine_{id:03}"),
            model: "CFM56-7B".into(),
            status,
            current_rul: rul,
            confidence: Some(0.9),
            last_updated: None,
            is_active: active,
        }
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(EngineStatus::from_rul(0.0), EngineStatus::Critical);
        assert_eq!(EngineStatus::from_rul(49.99), EngineStatus::Critical);
        assert_eq!(EngineStatus::from_rul(50.0), EngineStatus::Warning);
        assert_eq!(EngineStatus::from_rul(99.9), EngineStatus::Warning);
        assert_eq!(EngineStatus::from_rul(100.0), EngineStatus::Healthy);
    }

    #[test]
    fn test_summary_counts_and_average() {
        let engines = vec![
            engine(1, EngineStatus::Healthy, Some(120.0), true),
            engine(2, EngineStatus::Warning, Some(70.0), true),
            engine(3, EngineStatus::Critical, Some(10.0), false),
            engine(4, EngineStatus::Critical, None, true),
        ];
        let s = DashboardSummary::from_engines(&engines);
        assert_eq!(s.total_engines, 4);
        assert_eq!(s.healthy_engines, 1);
        assert_eq!(s.warning_engines, 1);
        assert_eq!(s.critical_engines, 2);
        assert_eq!(s.active_engines, 2);
        assert_eq!(s.average_rul, 95.0);
    }

    #[test]
    fn test_summary_empty() {
        let s = DashboardSummary::from_engines(&[]);
        assert_eq!(s.total_engines, 0);
        assert_eq!(s.average_rul, 0.0);
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&EngineStatus::Warning).unwrap(), "\"warning\"");
        let parsed: EngineStatus = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(parsed, EngineStatus::Critical);
    }
}
