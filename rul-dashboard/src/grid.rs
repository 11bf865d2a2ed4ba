//! Engine grid cards.

use crate::models::{Engine, EngineStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// RUL cap used by the model; full bar at this value
pub const DEFAULT_MAX_RUL: f64 = 125.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineCard {
    pub id: u32,
    pub name: String,
    pub model: String,
    pub status: EngineStatus,
    pub rul: Option<f64>,
    pub confidence_pct: Option<u8>,
    /// 0..=100
    pub progress: f64,
    pub is_active: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl EngineCard {
    pub fn from_engine(engine: &Engine, max_rul: f64) -> Self {
        Self {
            id: engine.id,
            name: engine.name.clone(),
            model: engine.model.clone(),
            status: engine.status,
            rul: engine.current_rul,
            confidence_pct: engine.confidence.map(confidence_pct),
            progress: progress(engine.current_rul, max_rul),
            is_active: engine.is_active,
            last_updated: engine.last_updated,
        }
    }
}

pub fn build_grid(engines: &[Engine], max_rul: f64) -> Vec<EngineCard> {
    engines.iter().map(|e| EngineCard::from_engine(e, max_rul)).collect()
}

pub fn progress(rul: Option<f64>, max_rul: f64) -> f64 {
    match rul {
        Some(rul) if max_rul > 0.0 && rul.is_finite() => (rul / max_rul * 100.0).clamp(0.0, 100.0),
        _ => 0.0,
    }
}

pub fn confidence_pct(confidence: f64) -> u8 {
    (confidence.clamp(0.0, 1.0) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(progress(Some(62.5), DEFAULT_MAX_RUL), 50.0);
        assert_eq!(progress(Some(300.0), DEFAULT_MAX_RUL), 100.0);
        assert_eq!(progress(Some(-4.0), DEFAULT_MAX_RUL), 0.0);
        assert_eq!(progress(None, DEFAULT_MAX_RUL), 0.0);
        assert_eq!(progress(Some(10.0), 0.0), 0.0);
    }

    #[test]
    fn test_confidence_pct() {
        assert_eq!(confidence_pct(0.856), 86);
        assert_eq!(confidence_pct(1.4), 100);
        assert_eq!(confidence_pct(-0.1), 0);
    }

    #[test]
    fn test_build_grid() {
        let engine = Engine {
            id: 7,
            name: "Engine_007".into(),
            model: "CFM56-7B".into(),
            status: EngineStatus::Warning,
            current_rul: Some(75.0),
            confidence: Some(0.81),
            last_updated: None,
            is_active: true,
        };
        let cards = build_grid(&[engine], 150.0);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].progress, 50.0);
        assert_eq!(cards[0].confidence_pct, Some(81));
        assert!(build_grid(&[], DEFAULT_MAX_RUL).is_empty());
    }
}
