/*!
Stub HTTP pour développement sans backend ni service ML

Joue à la fois l'API backend (/api/v1/..., /health) et le service ML
(POST /predict) sur un port local éphémère. Enregistre toutes les requêtes
reçues et permet d'injecter des pannes (HTTP 500) par chemin.
*/

use crate::fixtures;
use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct StubData {
    engines: Vec<Value>,
    summary: Option<Value>,
    default_prediction: Option<Value>,
    predictions: HashMap<u64, Value>, // par unit_number / engine_id
    fail_next: HashMap<String, usize>,
    health_down: bool,
    requests: Vec<RecordedRequest>,
}

/// Stub API partagé entre le test et le serveur
#[derive(Clone, Default)]
pub struct StubApi {
    data: Arc<Mutex<StubData>>,
}

/// Serveur lancé ; arrêté au drop
pub struct StubServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl StubApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engines(self, engines: Vec<Value>) -> Self {
        self.set_engines(engines);
        self
    }

    pub fn set_engines(&self, engines: Vec<Value>) {
        self.data.lock().engines = engines;
    }

    /// Résumé figé ; sinon calculé à partir des moteurs
    pub fn set_summary(&self, summary: Value) {
        self.data.lock().summary = Some(summary);
    }

    pub fn set_default_prediction(&self, prediction: Value) {
        self.data.lock().default_prediction = Some(prediction);
    }

    pub fn set_prediction(&self, unit: u64, prediction: Value) {
        self.data.lock().predictions.insert(unit, prediction);
    }

    /// Les `times` prochaines requêtes sur `path` répondent 500
    pub fn fail_next(&self, path: &str, times: usize) {
        self.data.lock().fail_next.insert(path.to_string(), times);
    }

    pub fn set_health(&self, up: bool) {
        self.data.lock().health_down = !up;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.data.lock().requests.clone()
    }

    pub fn requests_to(&self, path: &str) -> usize {
        self.data.lock().requests.iter().filter(|r| r.path == path).count()
    }

    pub fn last_body(&self, path: &str) -> Option<Value> {
        self.data
            .lock()
            .requests
            .iter()
            .rev()
            .find(|r| r.path == path)
            .and_then(|r| r.body.clone())
    }

    /// Lance le serveur sur 127.0.0.1 (port éphémère)
    pub async fn spawn(&self) -> Result<StubServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = Router::new().fallback(dispatch).with_state(self.clone());
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("stub server stopped: {e}");
            }
        });
        tracing::debug!("stub API listening on {addr}");
        Ok(StubServer {
            base_url: format!("http://{addr}"),
            handle,
        })
    }
}

async fn dispatch(State(stub): State<StubApi>, method: Method, uri: Uri, body: Bytes) -> Response {
    let path = uri.path().to_string();
    let body_json = serde_json::from_slice::<Value>(&body).ok();

    let mut data = stub.data.lock();
    data.requests.push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(String::from),
        body: body_json.clone(),
    });

    if let Some(remaining) = data.fail_next.get_mut(&path) {
        if *remaining > 0 {
            *remaining -= 1;
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "injected failure"})))
                .into_response();
        }
    }

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match (method.as_str(), segments.as_slice()) {
        ("GET", ["health"]) => {
            if data.health_down {
                (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"detail": "Service unhealthy"}))).into_response()
            } else {
                Json(json!({
                    "status": "healthy",
                    "database": "connected",
                    "version": "1.0.0",
                    "timestamp": chrono::Utc::now().to_rfc3339()
                }))
                .into_response()
            }
        }
        ("GET", ["api", "v1", "engines"]) => {
            let limit = uri
                .query()
                .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("limit=")))
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(usize::MAX);
            let engines: Vec<Value> = data.engines.iter().take(limit).cloned().collect();
            Json(Value::Array(engines)).into_response()
        }
        ("GET", ["api", "v1", "engines", id]) => match find_engine(&data.engines, id) {
            Some(engine) => Json(engine.clone()).into_response(),
            None => not_found(),
        },
        ("GET", ["api", "v1", "engines", id, "rul"]) => match find_engine(&data.engines, id) {
            Some(e) => Json(json!({
                "engine_id": e["id"],
                "engine_name": e["name"],
                "rul": e["current_rul"],
                "confidence": e["confidence"],
                "timestamp": e["last_updated"],
                "model_version": "current",
                "prediction_time_ms": null,
                "status": e["status"]
            }))
            .into_response(),
            None => not_found(),
        },
        ("GET", ["api", "v1", "dashboard", "summary"]) => {
            let summary = data
                .summary
                .clone()
                .unwrap_or_else(|| fixtures::summary_for(&data.engines));
            Json(summary).into_response()
        }
        ("POST", ["predict"]) => {
            let unit = body_json
                .as_ref()
                .and_then(|b| b.get("unit_number").or_else(|| b.get("engine_id")))
                .and_then(Value::as_u64);
            let prediction = unit
                .and_then(|u| data.predictions.get(&u).cloned())
                .or_else(|| data.default_prediction.clone())
                .unwrap_or_else(|| fixtures::prediction_json(87.5, 0.83));
            Json(prediction).into_response()
        }
        _ => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not Found"}))).into_response(),
    }
}

fn find_engine<'a>(engines: &'a [Value], id: &str) -> Option<&'a Value> {
    let id: u64 = id.parse().ok()?;
    engines.iter().find(|e| e["id"].as_u64() == Some(id))
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"detail": "Engine not found"}))).into_response()
}
