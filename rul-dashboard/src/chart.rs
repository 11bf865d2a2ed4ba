//! RUL trend chart
//!
//! No history endpoint exists yet: the series is a placeholder fabricated
//! from the current RUL. Points trend down towards the current value with
//! +/- `NOISE` cycles of jitter. The random source is passed in so callers
//! and tests can seed it.

use crate::models::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;

pub const HISTORY_HOURS: usize = 24;
pub const NOISE: f64 = 5.0;
/// Assumed cycles consumed per hour of the placeholder window
pub const DRIFT_PER_HOUR: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub at: DateTime<Utc>,
    pub rul: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSeries {
    pub engine_id: u32,
    pub engine_name: String,
    pub points: Vec<ChartPoint>,
}

/// 24 hourly points ending at `now`; empty when the engine has no RUL
pub fn synthesize_series<R: Rng>(engine: &Engine, now: DateTime<Utc>, rng: &mut R) -> EngineSeries {
    let points = match engine.current_rul {
        Some(current) if current.is_finite() => (0..HISTORY_HOURS)
            .map(|i| {
                let hours_ago = (HISTORY_HOURS - 1 - i) as i64;
                let rul = if hours_ago == 0 {
                    current
                } else {
                    current + hours_ago as f64 * DRIFT_PER_HOUR + rng.gen_range(-NOISE..=NOISE)
                };
                ChartPoint {
                    at: now - Duration::hours(hours_ago),
                    rul: rul.max(0.0),
                }
            })
            .collect(),
        _ => Vec::new(),
    };
    EngineSeries {
        engine_id: engine.id,
        engine_name: engine.name.clone(),
        points,
    }
}

/// Series for the first `max_engines` active engines that have a RUL
pub fn synthesize_all<R: Rng>(
    engines: &[Engine],
    max_engines: usize,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<EngineSeries> {
    engines
        .iter()
        .filter(|e| e.is_active && e.current_rul.is_some())
        .take(max_engines)
        .map(|e| synthesize_series(e, now, rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EngineStatus;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn engine(id: u32, rul: Option<f64>) -> Engine {
        Engine {
            id,
            name: format!("Engine_{id:03}"),
            model: "CFM56-7B".into(),
            status: EngineStatus::Critical,
            current_rul: rul,
            confidence: None,
            last_updated: None,
            is_active: true,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_series_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let series = synthesize_series(&engine(1, Some(80.0)), now(), &mut rng);
        assert_eq!(series.points.len(), HISTORY_HOURS);
        assert_eq!(series.points.last().unwrap().at, now());
        assert_eq!(series.points.last().unwrap().rul, 80.0);
        assert_eq!(series.points[0].at, now() - Duration::hours(23));
        for (i, p) in series.points.iter().enumerate() {
            let hours_ago = (HISTORY_HOURS - 1 - i) as f64;
            let base = 80.0 + hours_ago * DRIFT_PER_HOUR;
            assert!((p.rul - base).abs() <= NOISE + 1e-9);
        }
    }

    #[test]
    fn test_never_negative() {
        let mut rng = StdRng::seed_from_u64(1);
        let series = synthesize_series(&engine(1, Some(0.0)), now(), &mut rng);
        assert!(series.points.iter().all(|p| p.rul >= 0.0));
    }

    #[test]
    fn test_seeded_output_is_reproducible() {
        let e = engine(1, Some(50.0));
        let a = synthesize_series(&e, now(), &mut StdRng::seed_from_u64(42));
        let b = synthesize_series(&e, now(), &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_engines_without_rul_are_skipped() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(synthesize_series(&engine(1, None), now(), &mut rng).points.is_empty());

        let engines = vec![engine(1, None), engine(2, Some(10.0)), engine(3, Some(20.0)), engine(4, Some(30.0))];
        let all = synthesize_all(&engines, 2, now(), &mut rng);
        let ids: Vec<u32> = all.iter().map(|s| s.engine_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(synthesize_all(&[], 4, now(), &mut rng).is_empty());
    }
}
