//! HTTP client for the RUL backend API and the ML prediction service
//!
//! Every query is retried exactly once, with no backoff. Health checks never
//! fail: transport or status errors are folded into an `offline` report.

use crate::models::{
    DashboardSummary, Engine, EngineRul, HealthReport, PredictionRequest, PredictionResponse, ServiceStatus,
};
use crate::settings::Settings;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_base: String,
    ml_base: String,
}

impl ApiClient {
    pub fn new(api_base: &str, ml_base: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rul-dashboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            ml_base: ml_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        Self::new(
            &settings.api.base_url,
            &settings.api.ml_url,
            Duration::from_secs(settings.api.timeout_secs),
        )
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn ml_base(&self) -> &str {
        &self.ml_base
    }

    pub async fn dashboard_summary(&self) -> Result<DashboardSummary, ApiError> {
        let url = format!("{}/api/v1/dashboard/summary", self.api_base);
        with_retry(&url, || self.get_json(&url)).await
    }

    /// `limit` is forwarded as-is; the backend applies its own default when absent
    pub async fn engines(&self, limit: Option<u32>) -> Result<Vec<Engine>, ApiError> {
        let url = match limit {
            Some(n) => format!("{}/api/v1/engines?limit={n}", self.api_base),
            None => format!("{}/api/v1/engines", self.api_base),
        };
        with_retry(&url, || self.get_json(&url)).await
    }

    pub async fn engine(&self, id: u32) -> Result<Engine, ApiError> {
        let url = format!("{}/api/v1/engines/{id}", self.api_base);
        with_retry(&url, || self.get_json(&url)).await
    }

    pub async fn engine_rul(&self, id: u32) -> Result<EngineRul, ApiError> {
        let url = format!("{}/api/v1/engines/{id}/rul", self.api_base);
        with_retry(&url, || self.get_json(&url)).await
    }

    /// Single-shot POST to the ML service; predictions are not retried
    pub async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse, ApiError> {
        let url = format!("{}/predict", self.ml_base);
        let resp = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|source| ApiError::Transport { url: url.clone(), source })?;
        decode(&url, resp).await
    }

    pub async fn health(&self) -> HealthReport {
        self.probe(&self.api_base).await
    }

    pub async fn ml_health(&self) -> HealthReport {
        self.probe(&self.ml_base).await
    }

    async fn probe(&self, base: &str) -> HealthReport {
        let url = format!("{base}/health");
        let started = Instant::now();
        match with_retry(&url, || self.get_json::<HealthBody>(&url)).await {
            Ok(body) => HealthReport {
                status: ServiceStatus::Online,
                version: body.version,
                latency_ms: Some(started.elapsed().as_millis() as u64),
                error: None,
                checked_at: Utc::now(),
            },
            Err(e) => {
                debug!("health check {url} failed: {e}");
                HealthReport::offline(e.to_string())
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ApiError::Transport { url: url.to_string(), source })?;
        decode(url, resp).await
    }
}

async fn decode<T: DeserializeOwned>(url: &str, resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(ApiError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    resp.json::<T>().await.map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

/// One attempt, then one retry on any error
async fn with_retry<T, F, Fut>(url: &str, mut attempt: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    match attempt().await {
        Ok(value) => Ok(value),
        Err(first) => {
            warn!("GET {url} failed ({first}), retrying once");
            attempt().await
        }
    }
}
