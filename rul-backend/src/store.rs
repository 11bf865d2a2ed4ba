/**
 * ENGINE STORE - Persistance des moteurs, relevés capteurs et prédictions RUL
 *
 * RÔLE :
 * Source de vérité du backend : liste des moteurs servie par l'API,
 * derniers relevés capteurs par moteur et historique des prédictions ML.
 *
 * FONCTIONNEMENT :
 * - Cache mémoire protégé par mutex, chargé depuis un fichier JSON au démarrage
 * - Chaque mutation réécrit le fichier complet (pas de WAL) : les prédictions
 *   d'une même requête sont enregistrées en lot, une seule écriture par lot
 * - Mode mémoire pur (sans fichier) pour les tests
 * - Historique des prédictions borné par moteur
 */

use crate::models::{Engine, RulPrediction, SensorReading};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Prédictions conservées par moteur (les plus anciennes sont purgées)
pub const MAX_PREDICTIONS_PER_ENGINE: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreData {
    engines: Vec<Engine>,
    #[serde(default)]
    readings: Vec<SensorReading>,
    #[serde(default)]
    predictions: Vec<RulPrediction>,
}

pub struct EngineStore {
    /// None = stockage purement mémoire
    storage_path: Option<PathBuf>,
    cache: Mutex<StoreData>,
    writes: AtomicU64,
}

impl EngineStore {
    /// Ouvre (ou crée) le fichier de stockage et charge son contenu
    pub fn open<P: Into<PathBuf>>(storage_path: P) -> Result<Self, StoreError> {
        let path = storage_path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            storage_path: Some(path.clone()),
            cache: Mutex::new(StoreData::default()),
            writes: AtomicU64::new(0),
        };
        store.load_from_disk()?;
        info!("engine store initialized at {:?} ({} engines)", path, store.count());
        Ok(store)
    }

    pub fn in_memory() -> Self {
        Self {
            storage_path: None,
            cache: Mutex::new(StoreData::default()),
            writes: AtomicU64::new(0),
        }
    }

    fn load_from_disk(&self) -> Result<(), StoreError> {
        let Some(path) = &self.storage_path else { return Ok(()) };
        if !path.exists() {
            let empty = serde_json::to_string_pretty(&StoreData::default())?;
            fs::write(path, empty)?;
        }
        let content = fs::read_to_string(path)?;
        let data: StoreData = if content.trim().is_empty() {
            StoreData::default()
        } else {
            serde_json::from_str(&content)?
        };
        *self.cache.lock() = data;
        Ok(())
    }

    fn save_to_disk(&self) -> Result<(), StoreError> {
        let Some(path) = &self.storage_path else { return Ok(()) };
        let cache = self.cache.lock();
        let json = serde_json::to_string_pretty(&*cache)?;
        drop(cache);
        fs::write(path, json)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Nombre de réécritures du fichier depuis l'ouverture
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn count(&self) -> usize {
        self.cache.lock().engines.len()
    }

    /// Moteurs triés par id, tronqués à `limit`
    pub fn list(&self, limit: usize) -> Vec<Engine> {
        let mut engines = self.cache.lock().engines.clone();
        engines.sort_by_key(|e| e.id);
        engines.truncate(limit);
        engines
    }

    pub fn all(&self) -> Vec<Engine> {
        self.list(usize::MAX)
    }

    pub fn get(&self, id: u32) -> Option<Engine> {
        self.cache.lock().engines.iter().find(|e| e.id == id).cloned()
    }

    /// Remplace tout le contenu (rechargement forcé) ; l'historique de prédictions est vidé
    pub fn replace_all(
        &self,
        engines: Vec<Engine>,
        readings: Vec<SensorReading>,
    ) -> Result<(), StoreError> {
        {
            let mut cache = self.cache.lock();
            cache.engines = engines;
            cache.readings = readings;
            cache.predictions.clear();
        }
        self.save_to_disk()
    }

    pub fn record_prediction(&self, prediction: RulPrediction) -> Result<(), StoreError> {
        self.record_predictions(vec![prediction])
    }

    /// Ajoute un lot de prédictions, purge l'historique par moteur, puis une seule écriture
    pub fn record_predictions(&self, batch: Vec<RulPrediction>) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let recorded = batch.len();
        {
            let mut cache = self.cache.lock();
            let mut touched: Vec<u32> = batch.iter().map(|p| p.engine_id).collect();
            touched.sort_unstable();
            touched.dedup();
            cache.predictions.extend(batch);

            for engine_id in touched {
                let count = cache.predictions.iter().filter(|p| p.engine_id == engine_id).count();
                if count <= MAX_PREDICTIONS_PER_ENGINE {
                    continue;
                }
                let mut excess = count - MAX_PREDICTIONS_PER_ENGINE;
                // insertion chronologique : les premières du moteur sont les plus anciennes
                cache.predictions.retain(|p| {
                    if excess > 0 && p.engine_id == engine_id {
                        excess -= 1;
                        false
                    } else {
                        true
                    }
                });
            }
        }
        debug!("recorded {recorded} prediction(s)");
        self.save_to_disk()
    }

    pub fn latest_prediction(&self, engine_id: u32) -> Option<RulPrediction> {
        self.cache
            .lock()
            .predictions
            .iter()
            .filter(|p| p.engine_id == engine_id)
            .max_by_key(|p| p.timestamp)
            .cloned()
    }

    pub fn readings(&self, engine_id: u32) -> Vec<SensorReading> {
        let mut readings: Vec<SensorReading> = self
            .cache
            .lock()
            .readings
            .iter()
            .filter(|r| r.engine_id == engine_id)
            .cloned()
            .collect();
        readings.sort_by_key(|r| r.cycle);
        readings
    }

    /// Vérifie que le fichier de persistance est toujours accessible
    pub fn check(&self) -> Result<(), StoreError> {
        let Some(path) = &self.storage_path else { return Ok(()) };
        let meta = fs::metadata(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        if meta.permissions().readonly() {
            return Err(StoreError::Unavailable(format!("{} is read-only", path.display())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EngineStatus;
    use time::{Duration, OffsetDateTime};

    fn engine(id: u32) -> Engine {
        Engine {
            id,
            name: format!("Engine_{id:03}"),
            model: "CFM56-7B".into(),
            status: EngineStatus::Healthy,
            current_rul: Some(110.0),
            confidence: Some(0.9),
            last_updated: Some(OffsetDateTime::now_utc()),
            is_active: true,
        }
    }

    fn prediction(engine_id: u32, rul: f64, age_secs: i64) -> RulPrediction {
        RulPrediction {
            id: uuid::Uuid::new_v4().to_string(),
            engine_id,
            timestamp: OffsetDateTime::now_utc() - Duration::seconds(age_secs),
            predicted_rul: rul,
            confidence: 0.8,
            model_version: "test".into(),
            prediction_time_ms: Some(3.0),
        }
    }

    #[test]
    fn test_list_sorted_and_limited() {
        let store = EngineStore::in_memory();
        store.replace_all(vec![engine(3), engine(1), engine(2)], vec![]).unwrap();
        let ids: Vec<u32> = store.list(2).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.count(), 3);
        assert!(store.get(2).is_some());
        assert!(store.get(42).is_none());
    }

    #[test]
    fn test_latest_prediction() {
        let store = EngineStore::in_memory();
        store.replace_all(vec![engine(1)], vec![]).unwrap();
        store.record_prediction(prediction(1, 80.0, 60)).unwrap();
        store.record_prediction(prediction(1, 75.0, 0)).unwrap();
        store.record_prediction(prediction(2, 10.0, 0)).unwrap();
        assert_eq!(store.latest_prediction(1).unwrap().predicted_rul, 75.0);
        assert!(store.latest_prediction(3).is_none());
    }

    #[test]
    fn test_prediction_history_is_bounded() {
        let store = EngineStore::in_memory();
        for i in 0..(MAX_PREDICTIONS_PER_ENGINE + 5) {
            store.record_prediction(prediction(1, i as f64, 0)).unwrap();
        }
        store.record_prediction(prediction(2, 1.0, 0)).unwrap();
        let cache = store.cache.lock();
        assert_eq!(cache.predictions.iter().filter(|p| p.engine_id == 1).count(), MAX_PREDICTIONS_PER_ENGINE);
        // les plus anciennes ont été purgées
        assert_eq!(cache.predictions[0].predicted_rul, 5.0);
    }

    #[test]
    fn test_batch_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = EngineStore::open(dir.path().join("engines.json")).unwrap();
        store.replace_all(vec![engine(1), engine(2)], vec![]).unwrap();
        let before = store.writes();

        let mut batch: Vec<RulPrediction> = (0..MAX_PREDICTIONS_PER_ENGINE + 3)
            .map(|i| prediction(1, i as f64, 0))
            .collect();
        batch.push(prediction(2, 12.0, 0));
        store.record_predictions(batch).unwrap();
        store.record_predictions(vec![]).unwrap();

        assert_eq!(store.writes(), before + 1);
        let reopened = EngineStore::open(dir.path().join("engines.json")).unwrap();
        assert_eq!(reopened.latest_prediction(2).map(|p| p.predicted_rul), Some(12.0));
        let cache = reopened.cache.lock();
        assert_eq!(cache.predictions.iter().filter(|p| p.engine_id == 1).count(), MAX_PREDICTIONS_PER_ENGINE);
        assert_eq!(cache.predictions[0].predicted_rul, 3.0);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("engines.json");
        {
            let store = EngineStore::open(&path).unwrap();
            assert_eq!(store.count(), 0);
            store.replace_all(vec![engine(1), engine(2)], vec![]).unwrap();
        }
        let reopened = EngineStore::open(&path).unwrap();
        assert_eq!(reopened.count(), 2);
        assert!(reopened.check().is_ok());
    }

    #[test]
    fn test_check_fails_when_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engines.json");
        let store = EngineStore::open(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(store.check(), Err(StoreError::Unavailable(_))));
    }
}
