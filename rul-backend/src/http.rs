/**
 * API REST RUL - Serveur HTTP consommé par le dashboard
 *
 * RÔLE :
 * Expose les moteurs, le résumé de flotte et la santé du service.
 * Interface unique entre le dashboard (et outils externes) et le store.
 *
 * ROUTES :
 * - GET /                               bannière du service
 * - GET /health                         liveness (503 si le stockage est inaccessible)
 * - GET /system/health                  état détaillé (uptime, mémoire, service ML)
 * - GET /api/v1/health                  liveness de l'API v1
 * - GET /api/v1/engines?limit=N         moteurs enrichis par le service ML (1..=100, défaut 7)
 * - GET /api/v1/engines/{id}            moteur stocké
 * - GET /api/v1/engines/{id}/rul        dernière prédiction (ou RUL courant)
 * - GET /api/v1/dashboard/summary       agrégat de la flotte
 *
 * BORDURE :
 * - CORS : Access-Control-Allow-Origin pour les origines autorisées, preflight OPTIONS en 204
 *   (400 si l'origine du preflight n'est pas autorisée)
 * - Trusted hosts : Host hors liste => 400 (sauf liste contenant "*")
 * - Erreurs au format {"detail": "..."} ; paramètre mal formé (limit, id) => 422
 */

use crate::config::BackendConfig;
use crate::health::{BackendHealth, HealthTracker};
use crate::ml::MlClient;
use crate::models::{round2, DashboardSummary, Engine, EngineRulView, RulPrediction};
use crate::store::EngineStore;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tracing::{info, warn};

pub const API_VERSION: &str = "1.0.0";
pub const DEFAULT_ENGINE_LIMIT: i64 = 7;
pub const MAX_ENGINE_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EngineStore>,
    pub cfg: Arc<BackendConfig>,
    pub health_tracker: HealthTracker,
    pub ml: MlClient,
}

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn detail(code: StatusCode, msg: impl Into<String>) -> ApiError {
    (code, Json(json!({ "detail": msg.into() })))
}

/// Origines CORS et hôtes de confiance, figés au démarrage
#[derive(Debug, Clone)]
pub struct EdgePolicy {
    allowed_origins: Vec<String>,
    allowed_hosts: Vec<String>,
}

impl EdgePolicy {
    pub fn from_config(cfg: &BackendConfig) -> Self {
        Self {
            allowed_origins: cfg.allowed_origins.clone(),
            allowed_hosts: cfg.allowed_hosts.clone(),
        }
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == "*" || o == origin)
    }

    pub fn host_allowed(&self, host: Option<&str>) -> bool {
        if self.allowed_hosts.iter().any(|h| h == "*") {
            return true;
        }
        let Some(host) = host else { return false };
        let name = strip_port(host);
        self.allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(name))
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 littéral : [::1]:8000
        return host.split(']').next().map(|h| &host[..h.len() + 1]).unwrap_or(host);
    }
    host.rsplit_once(':').map(|(name, _)| name).unwrap_or(host)
}

async fn edge_policy(State(policy): State<Arc<EdgePolicy>>, req: Request, next: Next) -> Response {
    let host = req.headers().get(header::HOST).and_then(|v| v.to_str().ok());
    if !policy.host_allowed(host) {
        warn!("rejected request with untrusted host {:?}", host);
        return (StatusCode::BAD_REQUEST, "Invalid host header").into_response();
    }

    let has_origin = req.headers().contains_key(header::ORIGIN);
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| HeaderValue::to_str(v).ok())
        .filter(|o| policy.origin_allowed(o))
        .map(str::to_string);

    let is_preflight = req.method() == Method::OPTIONS
        && has_origin
        && req.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
    if is_preflight {
        let Some(origin) = &origin else {
            warn!("rejected preflight from disallowed origin");
            return (StatusCode::BAD_REQUEST, "Disallowed CORS origin").into_response();
        };
        let requested = req
            .headers()
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("*"));
        let mut resp = StatusCode::NO_CONTENT.into_response();
        let headers = resp.headers_mut();
        add_cors_headers(headers, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
        );
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested);
        return resp;
    }

    let mut resp = next.run(req).await;
    if let Some(origin) = &origin {
        add_cors_headers(resp.headers_mut(), origin);
    }
    resp
}

fn add_cors_headers(headers: &mut HeaderMap, origin: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }
}

pub fn build_router(app_state: AppState) -> Router {
    let policy = Arc::new(EdgePolicy::from_config(&app_state.cfg));
    let api = Router::new()
        .route("/health", get(api_health))
        .route("/engines", get(get_engines))
        .route("/engines/{id}", get(get_engine))
        .route("/engines/{id}/rul", get(get_engine_rul))
        .route("/dashboard/summary", get(get_summary));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/system/health", get(get_system_health))
        .nest("/api/v1", api)
        .with_state(app_state)
        .layer(middleware::from_fn_with_state(policy, edge_policy))
}

// GET /
async fn root() -> Json<Value> {
    Json(json!({
        "message": "RUL Dashboard API",
        "version": API_VERSION,
        "status": "operational"
    }))
}

// GET /health (vérifie l'accès au stockage)
async fn health_check(State(app): State<AppState>) -> ApiResult<Value> {
    if let Err(e) = app.store.check() {
        warn!("health check failed: {e}");
        return Err(detail(StatusCode::SERVICE_UNAVAILABLE, "Service unhealthy"));
    }
    Ok(Json(json!({
        "status": "healthy",
        "database": "connected",
        "version": API_VERSION,
        "timestamp": now_rfc3339(),
    })))
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<BackendHealth> {
    Json(app.health_tracker.get_health(&app.store))
}

// GET /api/v1/health
async fn api_health() -> Json<Value> {
    Json(json!({ "status": "healthy", "api": "v1" }))
}

#[derive(Debug, Deserialize)]
struct EnginesParams {
    limit: Option<i64>,
}

fn invalid_param(name: &str, reason: impl std::fmt::Display) -> ApiError {
    detail(StatusCode::UNPROCESSABLE_ENTITY, format!("invalid {name}: {reason}"))
}

fn engine_id(path: Result<Path<u32>, PathRejection>) -> Result<u32, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|rej| invalid_param("engine id", rej.body_text()))
}

// GET /api/v1/engines (enrichissement ML, fallback sur les valeurs stockées)
async fn get_engines(
    State(app): State<AppState>,
    params: Result<Query<EnginesParams>, QueryRejection>,
) -> ApiResult<Vec<Engine>> {
    let Query(params) = params.map_err(|rej| invalid_param("limit", rej.body_text()))?;
    let limit = params.limit.unwrap_or(DEFAULT_ENGINE_LIMIT);
    if !(1..=MAX_ENGINE_LIMIT).contains(&limit) {
        return Err(detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("limit must be between 1 and {MAX_ENGINE_LIMIT}"),
        ));
    }
    info!("GET /engines called (limit={limit})");

    let engines = app.store.list(limit as usize);
    let mut enriched = Vec::with_capacity(engines.len());
    let mut records = Vec::new();
    for mut engine in engines {
        let started = Instant::now();
        match app.ml.predict_unit(engine.id).await {
            Ok(pred) => {
                app.health_tracker.mark_ml_online();
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                if let Some(rul) = pred.predicted_rul {
                    engine.current_rul = Some(rul);
                    records.push(RulPrediction {
                        id: uuid::Uuid::new_v4().to_string(),
                        engine_id: engine.id,
                        timestamp: OffsetDateTime::now_utc(),
                        predicted_rul: rul,
                        confidence: pred.confidence.or(engine.confidence).unwrap_or(0.0),
                        model_version: pred.model_version.clone().unwrap_or_else(|| "unknown".into()),
                        prediction_time_ms: Some(round2(elapsed_ms)),
                    });
                }
                if let Some(confidence) = pred.confidence {
                    engine.confidence = Some(confidence);
                }
                if let Some(status) = pred.status {
                    engine.status = status;
                }
            }
            Err(e) => {
                app.health_tracker.mark_ml_failed();
                warn!(engine_id = engine.id, "ML call failed, using stored values: {e}");
            }
        }
        enriched.push(engine);
    }

    // une seule réécriture du fichier par requête, hors des workers tokio
    if !records.is_empty() {
        let store = app.store.clone();
        match tokio::task::spawn_blocking(move || store.record_predictions(records)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("failed to record predictions: {e}"),
            Err(e) => warn!("prediction writer task failed: {e}"),
        }
    }
    Ok(Json(enriched))
}

// GET /api/v1/engines/{id}
async fn get_engine(
    State(app): State<AppState>,
    id: Result<Path<u32>, PathRejection>,
) -> ApiResult<Engine> {
    let id = engine_id(id)?;
    app.store
        .get(id)
        .map(Json)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Engine not found"))
}

// GET /api/v1/engines/{id}/rul
async fn get_engine_rul(
    State(app): State<AppState>,
    id: Result<Path<u32>, PathRejection>,
) -> ApiResult<EngineRulView> {
    let id = engine_id(id)?;
    let engine = app
        .store
        .get(id)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Engine not found"))?;

    let view = match app.store.latest_prediction(id) {
        Some(latest) => EngineRulView {
            engine_id: id,
            engine_name: engine.name,
            rul: Some(latest.predicted_rul),
            confidence: Some(latest.confidence),
            timestamp: Some(latest.timestamp),
            model_version: latest.model_version,
            prediction_time_ms: latest.prediction_time_ms,
            status: engine.status,
        },
        None => EngineRulView {
            engine_id: id,
            engine_name: engine.name,
            rul: engine.current_rul,
            confidence: engine.confidence,
            timestamp: engine.last_updated,
            model_version: "current".into(),
            prediction_time_ms: None,
            status: engine.status,
        },
    };
    Ok(Json(view))
}

// GET /api/v1/dashboard/summary
async fn get_summary(State(app): State<AppState>) -> Json<DashboardSummary> {
    Json(DashboardSummary::from_engines(&app.store.all()))
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
