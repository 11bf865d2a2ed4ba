/**
 * ML CLIENT - Accès au service de prédiction RUL externe
 *
 * RÔLE :
 * Le modèle (transformer FD002) tourne dans un service séparé. Le backend
 * l'interroge moteur par moteur pour enrichir GET /api/v1/engines et sonde
 * périodiquement sa disponibilité pour /system/health.
 *
 * CONTRAT :
 * POST {ML_SERVICE_URL}/predict  {"unit_number": id, "use_real_data": true}
 *   -> {"predicted_rul", "confidence", "status", "timestamp", "model_version"}
 * GET  {ML_SERVICE_URL}/health
 */

use crate::health::HealthTracker;
use crate::models::EngineStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum MlError {
    #[error("ML request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ML service returned {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    unit_number: u32,
    use_real_data: bool,
}

/// Champs absents = on garde la valeur stockée
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MlPrediction {
    pub predicted_rul: Option<f64>,
    pub confidence: Option<f64>,
    pub status: Option<EngineStatus>,
    pub model_version: Option<String>,
}

#[derive(Clone)]
pub struct MlClient {
    http: reqwest::Client,
    base_url: String,
}

impl MlClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MlError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn predict_unit(&self, unit_number: u32) -> Result<MlPrediction, MlError> {
        let resp = self
            .http
            .post(format!("{}/predict", self.base_url))
            .json(&PredictRequest { unit_number, use_real_data: true })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(MlError::Status(resp.status()));
        }
        Ok(resp.json().await?)
    }

    pub async fn probe(&self) -> Result<(), MlError> {
        let resp = self.http.get(format!("{}/health", self.base_url)).send().await?;
        if !resp.status().is_success() {
            return Err(MlError::Status(resp.status()));
        }
        Ok(())
    }
}

/// Sonde le service ML à intervalle fixe jusqu'au signal d'arrêt
pub fn spawn_ml_probe(
    client: MlClient,
    tracker: HealthTracker,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match client.probe().await {
                        Ok(()) => {
                            debug!("ML service reachable at {}", client.base_url());
                            tracker.mark_ml_online();
                        }
                        Err(e) => {
                            warn!("ML probe failed: {e}");
                            tracker.mark_ml_failed();
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_partial_payload() {
        let p: MlPrediction = serde_json::from_str(r#"{"predicted_rul": 42.5}"#).unwrap();
        assert_eq!(p.predicted_rul, Some(42.5));
        assert_eq!(p.confidence, None);
        assert_eq!(p.status, None);
    }

    #[test]
    fn test_base_url_trimmed() {
        let c = MlClient::new("http://ml:8001/", Duration::from_secs(1)).unwrap();
        assert_eq!(c.base_url(), "http://ml:8001");
    }

    #[tokio::test]
    async fn test_probe_marks_offline_when_unreachable() {
        let url = rul_devkit::test_utils::unreachable_url();
        let client = MlClient::new(&url, Duration::from_millis(500)).unwrap();
        let tracker = HealthTracker::new();
        let (tx, rx) = watch::channel(false);
        let handle = spawn_ml_probe(client, tracker.clone(), Duration::from_secs(60), rx);

        for _ in 0..50 {
            if tracker.ml_status() == "offline" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(tracker.ml_status(), "offline");

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
