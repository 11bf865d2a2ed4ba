use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub api_host: String,
    pub api_port: u16,
    pub ml_service_url: String,
    pub ml_timeout_secs: u64,
    pub ml_probe_interval_secs: u64,
    pub allowed_origins: Vec<String>,
    pub allowed_hosts: Vec<String>,
    pub store_path: PathBuf,
    pub data_files: Vec<PathBuf>, // candidats test_FD002.txt, premier existant retenu
    pub readings_per_engine: usize,
    pub log_level: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_host: "127.0.0.1".into(),
            api_port: 8000,
            ml_service_url: "http://localhost:8001".into(),
            ml_timeout_secs: 10,
            ml_probe_interval_secs: 30,
            allowed_origins: vec![
                "http://localhost:3000".into(),
                "http://127.0.0.1:3000".into(),
            ],
            allowed_hosts: vec!["*".into()],
            store_path: PathBuf::from("./data/engines.json"),
            data_files: vec![
                PathBuf::from("data/test_FD002.txt"),
                PathBuf::from("../data/test_FD002.txt"),
            ],
            readings_per_engine: 20,
            log_level: "info".into(),
        }
    }
}

impl BackendConfig {
    /// Surcharge par variables d'environnement (après lecture du YAML)
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("API_HOST") {
            self.api_host = v;
        }
        if let Some(v) = get("API_PORT") {
            match v.parse() {
                Ok(port) => self.api_port = port,
                Err(_) => warn!("API_PORT invalide: {v}"),
            }
        }
        if let Some(v) = get("ML_SERVICE_URL") {
            self.ml_service_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("ALLOWED_ORIGINS") {
            self.allowed_origins = split_list(&v);
        }
        if let Some(v) = get("ALLOWED_HOSTS") {
            self.allowed_hosts = split_list(&v);
        }
        if let Some(v) = get("RUL_STORE_PATH") {
            self.store_path = PathBuf::from(v);
        }
        if let Some(v) = get("FD002_DATA_FILE") {
            // le fichier explicite passe devant les candidats par défaut
            self.data_files.insert(0, PathBuf::from(v));
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v.to_lowercase();
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Premier fichier FD002 existant parmi les candidats
    pub fn find_data_file(&self) -> Option<&Path> {
        self.data_files.iter().map(PathBuf::as_path).find(|p| p.exists())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub async fn load_config() -> BackendConfig {
    let path = std::env::var("RUL_BACKEND_CONFIG").unwrap_or_else(|_| "rul-backend.yaml".into());
    let mut cfg = load_config_file(Path::new(&path)).await;
    cfg.apply_env(|key| std::env::var(key).ok());
    cfg
}

async fn load_config_file(path: &Path) -> BackendConfig {
    if !path.exists() {
        info!("pas de {}, usage config par défaut", path.display());
        return BackendConfig::default();
    }
    let txt = fs::read_to_string(path).await.unwrap_or_default();
    if txt.trim().is_empty() {
        return BackendConfig::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        warn!("config invalide {}: {e}", path.display());
        BackendConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("API_PORT", "9000"),
            ("ML_SERVICE_URL", "http://ml:8001/"),
            ("ALLOWED_ORIGINS", "http://a, http://b ,"),
            ("FD002_DATA_FILE", "/srv/fd002.txt"),
        ]
        .into_iter()
        .collect();

        let mut cfg = BackendConfig::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.api_port, 9000);
        assert_eq!(cfg.ml_service_url, "http://ml:8001");
        assert_eq!(cfg.allowed_origins, vec!["http://a", "http://b"]);
        assert_eq!(cfg.data_files[0], PathBuf::from("/srv/fd002.txt"));
        assert_eq!(cfg.bind_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_bad_port_keeps_default() {
        let mut cfg = BackendConfig::default();
        cfg.apply_env(|k| (k == "API_PORT").then(|| "nope".to_string()));
        assert_eq!(cfg.api_port, 8000);
    }

    #[tokio::test]
    async fn test_yaml_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rul-backend.yaml");
        std::fs::write(&path, "api_port: 8100\nallowed_hosts: [\"api.local\"]\n").unwrap();

        let cfg = load_config_file(&path).await;
        assert_eq!(cfg.api_port, 8100);
        assert_eq!(cfg.allowed_hosts, vec!["api.local"]);
        assert_eq!(cfg.ml_service_url, "http://localhost:8001");
    }

    #[tokio::test]
    async fn test_missing_config_file() {
        let cfg = load_config_file(Path::new("/nonexistent/rul-backend.yaml")).await;
        assert_eq!(cfg.api_port, 8000);
    }
}
