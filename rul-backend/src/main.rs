/**
 * RUL BACKEND - Point d'entrée du serveur API
 *
 * RÔLE : Orchestration des modules : config, store, chargement FD002, sonde ML, HTTP.
 * Bootstrap complet avec gestion d'erreurs et logging.
 */

use anyhow::{Context, Result};
use rul_backend::config::load_config;
use rul_backend::health::HealthTracker;
use rul_backend::http::{build_router, AppState};
use rul_backend::ml::{spawn_ml_probe, MlClient};
use rul_backend::store::EngineStore;
use rul_backend::fd002;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    let cfg = load_config().await;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("rul_backend={}", cfg.log_level))),
        )
        .init();

    info!("RUL backend v{} starting", rul_backend::http::API_VERSION);

    let store = Arc::new(
        EngineStore::open(&cfg.store_path)
            .with_context(|| format!("failed to open store at {}", cfg.store_path.display()))?,
    );

    // peuplement initial depuis FD002 si le store est vide
    match fd002::initialize(&store, &cfg, false).await {
        Ok(0) => {}
        Ok(n) => info!("seeded {n} engines from FD002"),
        Err(e) => error!("failed to initialize FD002 data: {e}"),
    }

    let health_tracker = HealthTracker::new();
    let ml = MlClient::new(&cfg.ml_service_url, Duration::from_secs(cfg.ml_timeout_secs))
        .context("failed to build ML client")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let probe = spawn_ml_probe(
        ml.clone(),
        health_tracker.clone(),
        Duration::from_secs(cfg.ml_probe_interval_secs.max(1)),
        shutdown_rx,
    );

    let addr = cfg.bind_addr();
    let app = build_router(AppState {
        store,
        cfg: Arc::new(cfg),
        health_tracker,
        ml,
    });

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .context("HTTP server failed")?;

    shutdown_tx.send(true).ok();
    probe.await.ok();
    info!("RUL backend stopped");
    Ok(())
}
