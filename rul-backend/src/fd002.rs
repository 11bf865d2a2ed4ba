/**
 * FD002 LOADER - Initialisation de la flotte depuis le jeu C-MAPSS FD002
 *
 * RÔLE :
 * Au premier démarrage, transforme le fichier de test FD002 (NASA C-MAPSS)
 * en moteurs + relevés capteurs pour peupler le store.
 *
 * FORMAT :
 * Texte, colonnes séparées par des espaces, une ligne par cycle :
 * unit_number cycle setting_1..3 sensor_1..21 (colonnes supplémentaires ignorées)
 *
 * RÈGLES :
 * - RUL d'un cycle = min(125, cycle_max - cycle), le RUL courant est celui du dernier cycle
 * - Confiance = écart-type (échantillon) des 5 derniers cycles, moyenné sur les 21 capteurs,
 *   ramené dans [0.6, 0.95] via 1 - moyenne/1000
 * - Statut dérivé du RUL (voir EngineStatus::from_rul)
 */

use crate::config::BackendConfig;
use crate::models::{Engine, EngineStatus, SensorReading, RUL_MAX};
use crate::store::{EngineStore, StoreError};
use std::collections::BTreeMap;
use std::path::Path;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

pub const COLUMN_COUNT: usize = 26;
pub const SENSOR_COUNT: usize = 21;
pub const ENGINE_MODEL: &str = "CFM56-7B";
const CONFIDENCE_WINDOW: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum Fd002Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleRecord {
    pub unit: u32,
    pub cycle: u32,
    pub settings: [f64; 3],
    pub sensors: [f64; SENSOR_COUNT],
}

pub fn parse(text: &str) -> Result<Vec<CycleRecord>, Fd002Error> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < COLUMN_COUNT {
            return Err(Fd002Error::Parse {
                line: line_no,
                reason: format!("expected {COLUMN_COUNT} columns, got {}", fields.len()),
            });
        }
        let values = fields[..COLUMN_COUNT]
            .iter()
            .map(|f| f.parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|e| Fd002Error::Parse { line: line_no, reason: e.to_string() })?;

        let unit = as_index(values[0]).ok_or_else(|| Fd002Error::Parse {
            line: line_no,
            reason: format!("invalid unit number {}", fields[0]),
        })?;
        let cycle = as_index(values[1]).ok_or_else(|| Fd002Error::Parse {
            line: line_no,
            reason: format!("invalid cycle {}", fields[1]),
        })?;

        let mut sensors = [0.0; SENSOR_COUNT];
        sensors.copy_from_slice(&values[5..COLUMN_COUNT]);
        records.push(CycleRecord {
            unit,
            cycle,
            settings: [values[2], values[3], values[4]],
            sensors,
        });
    }
    Ok(records)
}

fn as_index(value: f64) -> Option<u32> {
    (value.fract() == 0.0 && value >= 0.0 && value <= u32::MAX as f64).then_some(value as u32)
}

/// RUL de chaque cycle d'un moteur (records triés ou non)
pub fn rul_by_cycle(records: &[&CycleRecord]) -> BTreeMap<u32, f64> {
    let max_cycle = records.iter().map(|r| r.cycle).max().unwrap_or(0);
    records
        .iter()
        .map(|r| (r.cycle, f64::from(max_cycle - r.cycle).min(RUL_MAX)))
        .collect()
}

/// Records triés par cycle
pub fn confidence(records: &[&CycleRecord]) -> f64 {
    let window = &records[records.len().saturating_sub(CONFIDENCE_WINDOW)..];
    if window.len() < 2 {
        return 0.95;
    }
    let n = window.len() as f64;
    let total_std: f64 = (0..SENSOR_COUNT)
        .map(|s| {
            let mean = window.iter().map(|r| r.sensors[s]).sum::<f64>() / n;
            let var = window.iter().map(|r| (r.sensors[s] - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        })
        .sum();
    let mean_std = total_std / SENSOR_COUNT as f64;
    (1.0 - mean_std / 1000.0).clamp(0.6, 0.95)
}

/// Construit moteurs + derniers relevés à partir des cycles parsés
pub fn build_fleet(
    records: &[CycleRecord],
    readings_per_engine: usize,
    now: OffsetDateTime,
) -> (Vec<Engine>, Vec<SensorReading>) {
    let mut by_unit: BTreeMap<u32, Vec<&CycleRecord>> = BTreeMap::new();
    for r in records {
        by_unit.entry(r.unit).or_default().push(r);
    }

    let mut engines = Vec::with_capacity(by_unit.len());
    let mut readings = Vec::new();
    for (unit, mut cycles) in by_unit {
        cycles.sort_by_key(|r| r.cycle);
        let ruls = rul_by_cycle(&cycles);
        let latest = cycles[cycles.len() - 1].cycle;
        let current_rul = ruls.get(&latest).copied().unwrap_or(0.0);
        let confidence = confidence(&cycles);
        let status = EngineStatus::from_rul(current_rul);

        let engine = Engine {
            id: unit,
            name: format!("Engine_{unit:03}"),
            model: ENGINE_MODEL.into(),
            status,
            current_rul: Some(current_rul),
            confidence: Some(confidence),
            last_updated: Some(now),
            is_active: true,
        };
        debug!(
            "created engine {}: RUL={:.1}, status={:?}, confidence={:.3}",
            engine.name, current_rul, status, confidence
        );
        engines.push(engine);

        let start = cycles.len().saturating_sub(readings_per_engine);
        readings.extend(cycles[start..].iter().map(|r| SensorReading {
            engine_id: unit,
            cycle: r.cycle,
            timestamp: now,
            settings: r.settings,
            sensors: r.sensors.to_vec(),
        }));
    }
    (engines, readings)
}

pub async fn load_file(path: &Path) -> Result<Vec<CycleRecord>, Fd002Error> {
    let text = tokio::fs::read_to_string(path).await?;
    let records = parse(&text)?;
    let units: std::collections::HashSet<u32> = records.iter().map(|r| r.unit).collect();
    info!("loaded FD002 data: {} records, {} engines", records.len(), units.len());
    Ok(records)
}

/// Peuple le store si vide (ou toujours si `force_reload`). Retourne le nombre de moteurs créés.
pub async fn initialize(
    store: &EngineStore,
    cfg: &BackendConfig,
    force_reload: bool,
) -> Result<usize, Fd002Error> {
    let existing = store.count();
    if existing > 0 && !force_reload {
        info!("store already has {existing} engines, skipping FD002 initialization");
        return Ok(0);
    }
    let Some(path) = cfg.find_data_file() else {
        warn!("FD002 data file not found (searched {:?})", cfg.data_files);
        return Ok(0);
    };

    info!("initializing FD002 data from {}", path.display());
    let records = load_file(path).await?;
    let (engines, readings) = build_fleet(&records, cfg.readings_per_engine, OffsetDateTime::now_utc());
    let created = engines.len();
    let reading_count = readings.len();
    store.replace_all(engines, readings)?;
    info!("FD002 initialization completed: {created} engines, {reading_count} sensor readings");
    Ok(created)
}
