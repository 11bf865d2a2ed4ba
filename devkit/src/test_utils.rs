/*!
Test Harness pour le backend et le dashboard

Facilite l'écriture de tests avec:
- Démarrage automatique du stub API
- Initialisation du logging de test (une seule fois)
- Attente active bornée sur une condition
*/

use crate::api_stub::{StubApi, StubServer};
use crate::fixtures;
use anyhow::Result;
use std::time::Duration;

/// Harness de test : stub API lancé + URL de base
pub struct TestHarness {
    pub stub: StubApi,
    server: StubServer,
}

impl TestHarness {
    /// Stub vide (aucun moteur)
    pub async fn start() -> Result<Self> {
        Self::start_with(StubApi::new()).await
    }

    /// Stub peuplé avec la flotte d'exemple
    pub async fn with_sample_fleet() -> Result<Self> {
        Self::start_with(StubApi::new().with_engines(fixtures::sample_fleet())).await
    }

    pub async fn start_with(stub: StubApi) -> Result<Self> {
        init_tracing();
        let server = stub.spawn().await?;
        tracing::info!("test harness ready at {}", server.base_url);
        Ok(Self { stub, server })
    }

    pub fn base_url(&self) -> &str {
        &self.server.base_url
    }
}

/// Logging pour les tests (RUST_LOG), sans échouer si déjà initialisé
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Attend que `cond` devienne vraie, au plus `timeout`
pub async fn wait_until<F: FnMut() -> bool>(mut cond: F, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

/// Adresse locale sur laquelle rien n'écoute (connexion refusée)
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}
