use reqwest::StatusCode;
use rul_backend::config::BackendConfig;
use rul_backend::health::HealthTracker;
use rul_backend::http::{build_router, AppState};
use rul_backend::ml::MlClient;
use rul_backend::models::{Engine, EngineStatus};
use rul_backend::store::EngineStore;
use rul_backend::fd002;
use rul_devkit::fixtures;
use rul_devkit::test_utils::{init_tracing, unreachable_url};
use rul_devkit::StubApi;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::net::TcpListener;

fn engine(id: u32, status: EngineStatus, rul: Option<f64>, active: bool) -> Engine {
    Engine {
        id,
        name: format!("Engine_{id:03}"),
        model: "CFM56-7B".into(),
        status,
        current_rul: rul,
        confidence: Some(0.9),
        last_updated: Some(OffsetDateTime::now_utc()),
        is_active: active,
    }
}

fn fleet(n: u32) -> Vec<Engine> {
    (1..=n)
        .map(|id| {
            let rul = 20.0 * id as f64;
            engine(id, EngineStatus::from_rul(rul), Some(rul), true)
        })
        .collect()
}

struct TestApi {
    base_url: String,
    store: Arc<EngineStore>,
    tracker: HealthTracker,
    http: reqwest::Client,
}

impl TestApi {
    async fn get(&self, path: &str) -> reqwest::Response {
        self.http.get(format!("{}{}", self.base_url, path)).send().await.unwrap()
    }

    async fn get_json(&self, path: &str) -> Value {
        let resp = self.get(path).await;
        assert!(resp.status().is_success(), "{path} -> {}", resp.status());
        resp.json().await.unwrap()
    }
}

async fn start_api(store: EngineStore, ml_url: &str, cfg: BackendConfig) -> TestApi {
    init_tracing();
    let store = Arc::new(store);
    let tracker = HealthTracker::new();
    let ml = MlClient::new(ml_url, Duration::from_secs(2)).unwrap();
    let app = build_router(AppState {
        store: store.clone(),
        cfg: Arc::new(cfg),
        health_tracker: tracker.clone(),
        ml,
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestApi {
        base_url: format!("http://{addr}"),
        store,
        tracker,
        http: reqwest::Client::new(),
    }
}

fn seeded_store(engines: Vec<Engine>) -> EngineStore {
    let store = EngineStore::in_memory();
    store.replace_all(engines, vec![]).unwrap();
    store
}

#[tokio::test]
async fn engines_are_enriched_by_ml_service() {
    let ml = StubApi::new();
    ml.set_prediction(1, fixtures::prediction_json(42.0, 0.71));
    let ml_server = ml.spawn().await.unwrap();
    let api = start_api(seeded_store(fleet(3)), &ml_server.base_url, BackendConfig::default()).await;

    let engines = api.get_json("/api/v1/engines?limit=2").await;
    let engines = engines.as_array().unwrap();
    assert_eq!(engines.len(), 2);
    assert_eq!(engines[0]["current_rul"], 42.0);
    assert_eq!(engines[0]["status"], "critical");
    assert_eq!(engines[0]["confidence"], 0.71);
    // prédiction par défaut du stub
    assert_eq!(engines[1]["current_rul"], 87.5);
    assert_eq!(engines[1]["status"], "warning");

    assert_eq!(ml.requests_to("/predict"), 2);
    let body = ml.last_body("/predict").unwrap();
    assert_eq!(body["unit_number"], 2);
    assert_eq!(body["use_real_data"], true);

    let rul = api.get_json("/api/v1/engines/1/rul").await;
    assert_eq!(rul["rul"], 42.0);
    assert_eq!(rul["model_version"], "transformer_fd002_exact_v2.1");
    assert!(rul["prediction_time_ms"].as_f64().is_some());
    assert_eq!(api.tracker.ml_status(), "online");
}

#[tokio::test]
async fn engines_fall_back_to_stored_values_when_ml_is_down() {
    let api = start_api(seeded_store(fleet(2)), &unreachable_url(), BackendConfig::default()).await;

    let engines = api.get_json("/api/v1/engines").await;
    let engines = engines.as_array().unwrap();
    assert_eq!(engines.len(), 2);
    assert_eq!(engines[0]["current_rul"], 20.0);
    assert_eq!(engines[0]["status"], "critical");
    assert_eq!(engines[1]["current_rul"], 40.0);

    let health = api.get_json("/system/health").await;
    assert_eq!(health["ml_status"], "offline");
    assert_eq!(health["ml_failures"], 2);
    assert_eq!(health["engines_tracked"], 2);
}

#[tokio::test]
async fn engines_limit_is_validated() {
    let api = start_api(seeded_store(fleet(10)), &unreachable_url(), BackendConfig::default()).await;

    let default = api.get_json("/api/v1/engines").await;
    assert_eq!(default.as_array().unwrap().len(), 7);

    for bad in ["0", "101", "-3", "abc", ""] {
        let resp = api.get(&format!("/api/v1/engines?limit={bad}")).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "limit={bad}");
        let body: Value = resp.json().await.unwrap();
        assert!(body["detail"].as_str().unwrap().contains("limit"));
    }

    let all = api.get_json("/api/v1/engines?limit=100").await;
    assert_eq!(all.as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn malformed_engine_id_is_422() {
    let api = start_api(seeded_store(fleet(1)), &unreachable_url(), BackendConfig::default()).await;

    for path in ["/api/v1/engines/abc", "/api/v1/engines/abc/rul", "/api/v1/engines/-1"] {
        let resp = api.get(path).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{path}");
        let body: Value = resp.json().await.unwrap();
        assert!(body["detail"].as_str().unwrap().contains("engine id"), "{path}: {body}");
    }
}

#[tokio::test]
async fn engines_request_writes_store_once() {
    let ml = StubApi::new();
    let ml_server = ml.spawn().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engines.json");
    let store = EngineStore::open(&path).unwrap();
    store.replace_all(fleet(5), vec![]).unwrap();
    let api = start_api(store, &ml_server.base_url, BackendConfig::default()).await;

    let before = api.store.writes();
    let engines = api.get_json("/api/v1/engines?limit=5").await;
    assert_eq!(engines.as_array().unwrap().len(), 5);
    assert_eq!(api.store.writes(), before + 1);

    for id in 1..=5 {
        assert_eq!(api.store.latest_prediction(id).unwrap().predicted_rul, 87.5);
    }
    let reopened = EngineStore::open(&path).unwrap();
    assert!(reopened.latest_prediction(5).is_some());
}

#[tokio::test]
async fn unknown_engine_is_404() {
    let api = start_api(seeded_store(fleet(1)), &unreachable_url(), BackendConfig::default()).await;

    for path in ["/api/v1/engines/9", "/api/v1/engines/9/rul"] {
        let resp = api.get(path).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["detail"], "Engine not found");
    }

    let engine = api.get_json("/api/v1/engines/1").await;
    assert_eq!(engine["name"], "Engine_001");
    assert_eq!(engine["is_active"], true);
}

#[tokio::test]
async fn rul_without_prediction_uses_current_value() {
    let api = start_api(seeded_store(fleet(1)), &unreachable_url(), BackendConfig::default()).await;
    let rul = api.get_json("/api/v1/engines/1/rul").await;
    assert_eq!(rul["rul"], 20.0);
    assert_eq!(rul["model_version"], "current");
    assert_eq!(rul["prediction_time_ms"], Value::Null);
    assert_eq!(rul["engine_name"], "Engine_001");
}

#[tokio::test]
async fn summary_aggregates_whole_fleet() {
    let engines = vec![
        engine(1, EngineStatus::Healthy, Some(120.0), true),
        engine(2, EngineStatus::Warning, Some(61.0), true),
        engine(3, EngineStatus::Critical, Some(10.0), false),
        engine(4, EngineStatus::Critical, None, true),
    ];
    let api = start_api(seeded_store(engines), &unreachable_url(), BackendConfig::default()).await;

    let summary = api.get_json("/api/v1/dashboard/summary").await;
    assert_eq!(summary["total_engines"], 4);
    assert_eq!(summary["healthy_engines"], 1);
    assert_eq!(summary["warning_engines"], 1);
    assert_eq!(summary["critical_engines"], 2);
    assert_eq!(summary["active_engines"], 2);
    assert_eq!(summary["average_rul"], 90.5);
}

#[tokio::test]
async fn health_reports_store_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engines.json");
    let api = start_api(EngineStore::open(&path).unwrap(), &unreachable_url(), BackendConfig::default()).await;

    let health = api.get_json("/health").await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["database"], "connected");

    std::fs::remove_file(&path).unwrap();
    let resp = api.get("/health").await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let v1 = api.get_json("/api/v1/health").await;
    assert_eq!(v1["api"], "v1");
    let root = api.get_json("/").await;
    assert_eq!(root["status"], "operational");
}

#[tokio::test]
async fn cors_headers_for_allowed_origins() {
    let api = start_api(seeded_store(fleet(1)), &unreachable_url(), BackendConfig::default()).await;

    let resp = api
        .http
        .get(format!("{}/api/v1/dashboard/summary", api.base_url))
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:3000"
    );

    let resp = api
        .http
        .get(format!("{}/api/v1/dashboard/summary", api.base_url))
        .header("Origin", "http://evil.example")
        .send()
        .await
        .unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());

    let preflight = api
        .http
        .request(reqwest::Method::OPTIONS, format!("{}/api/v1/engines", api.base_url))
        .header("Origin", "http://127.0.0.1:3000")
        .header("Access-Control-Request-Method", "GET")
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), StatusCode::NO_CONTENT);
    assert!(preflight.headers().get("access-control-allow-methods").is_some());

    let rejected = api
        .http
        .request(reqwest::Method::OPTIONS, format!("{}/api/v1/engines", api.base_url))
        .header("Origin", "http://evil.example")
        .header("Access-Control-Request-Method", "GET")
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    assert!(rejected.headers().get("access-control-allow-origin").is_none());
    assert_eq!(rejected.text().await.unwrap(), "Disallowed CORS origin");
}

#[tokio::test]
async fn untrusted_host_is_rejected() {
    let mut cfg = BackendConfig::default();
    cfg.allowed_hosts = vec!["api.local".into()];
    let api = start_api(seeded_store(fleet(1)), &unreachable_url(), cfg).await;

    let resp = api.get("/api/v1/health").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = api
        .http
        .get(format!("{}/api/v1/health", api.base_url))
        .header("Host", "api.local")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn fd002_seed_is_served() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("test_FD002.txt");
    std::fs::write(&data, fixtures::fd002_text(&[(1, 40), (2, 12), (3, 5)])).unwrap();

    let mut cfg = BackendConfig::default();
    cfg.data_files = vec![data];
    let store = EngineStore::open(dir.path().join("engines.json")).unwrap();
    assert_eq!(fd002::initialize(&store, &cfg, false).await.unwrap(), 3);

    let api = start_api(store, &unreachable_url(), cfg).await;
    let summary = api.get_json("/api/v1/dashboard/summary").await;
    assert_eq!(summary["total_engines"], 3);
    assert_eq!(summary["critical_engines"], 3);
    assert_eq!(api.store.readings(1).len(), 20);

    let engine = api.get_json("/api/v1/engines/2").await;
    assert_eq!(engine["name"], "Engine_002");
    assert_eq!(engine["model"], "CFM56-7B");
}
