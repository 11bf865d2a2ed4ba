//! Dashboard settings with TOML persistence
//!
//! Handles:
//! - API and ML service base URLs
//! - Polling intervals per query
//! - Alert thresholds and chart scale
//! - Cross-platform storage (`<config dir>/rul-dashboard/config.toml`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_ML_URL: &str = "http://localhost:8001";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not find a config directory")]
    NoConfigDir,
    #[error("settings I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: String, reason: String },
    #[error("unknown setting '{0}'")]
    UnknownKey(String),
}

fn invalid(field: &str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub polling: PollingSettings,
    pub alerts: AlertSettings,
    pub display: DisplaySettings,
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub ml_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub engines_secs: u64,
    pub summary_secs: u64,
    pub health_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub critical_rul: f64,
    pub warning_rul: f64,
    pub low_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub max_rul: f64,
    /// Forwarded as `?limit=`; `None` lets the backend pick its default
    pub engines_limit: Option<u32>,
    pub chart_engines: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub email: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            ml_url: DEFAULT_ML_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            engines_secs: 10,
            summary_secs: 30,
            health_secs: 30,
        }
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            critical_rul: 50.0,
            warning_rul: 100.0,
            low_confidence: 0.7,
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            max_rul: 125.0,
            engines_limit: None,
            chart_engines: 4,
        }
    }
}

impl Settings {
    /// Load from the OS config location, defaults when the file is missing
    pub async fn load() -> Result<Self, SettingsError> {
        Self::load_from(&Self::config_file_path()?).await
    }

    pub async fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            debug!("no settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path).await.map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate then write to the OS config location
    pub async fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::config_file_path()?;
        self.save_to(&path).await?;
        Ok(path)
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        self.validate()?;
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await.map_err(io_err)?;
        info!("settings saved to {}", path.display());
        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf, SettingsError> {
        let mut path = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        path.push("rul-dashboard");
        path.push("config.toml");
        Ok(path)
    }

    /// `RUL_API_URL` / `RUL_ML_URL` take precedence over the file
    pub fn apply_env<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = get("RUL_API_URL").filter(|v| !v.trim().is_empty()) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(url) = get("RUL_ML_URL").filter(|v| !v.trim().is_empty()) {
            self.api.ml_url = url.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for (field, url) in [("api.base_url", &self.api.base_url), ("api.ml_url", &self.api.ml_url)] {
            let parsed = reqwest::Url::parse(url).map_err(|e| invalid(field, e.to_string()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(invalid(field, format!("unsupported scheme '{}'", parsed.scheme())));
            }
        }
        if self.api.timeout_secs == 0 {
            return Err(invalid("api.timeout_secs", "must be at least 1 second"));
        }
        for (field, secs) in [
            ("polling.engines_secs", self.polling.engines_secs),
            ("polling.summary_secs", self.polling.summary_secs),
            ("polling.health_secs", self.polling.health_secs),
        ] {
            if secs < 1 {
                return Err(invalid(field, "must be at least 1 second"));
            }
        }
        let a = &self.alerts;
        if !(a.critical_rul >= 0.0 && a.critical_rul < a.warning_rul) {
            return Err(invalid(
                "alerts.critical_rul",
                format!("must be >= 0 and below alerts.warning_rul ({})", a.warning_rul),
            ));
        }
        if !(0.0..=1.0).contains(&a.low_confidence) {
            return Err(invalid("alerts.low_confidence", "must be between 0 and 1"));
        }
        if !(self.display.max_rul > 0.0) {
            return Err(invalid("display.max_rul", "must be positive"));
        }
        if self.display.engines_limit.is_some_and(|n| !(1..=100).contains(&n)) {
            return Err(invalid("display.engines_limit", "must be between 1 and 100"));
        }
        if self.notifications.enabled
            && self.notifications.email.as_deref().is_some_and(|e| !e.contains('@'))
        {
            return Err(invalid("notifications.email", "not an email address"));
        }
        Ok(())
    }

    /// Set one field from its dotted key; the result is validated as a whole
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let value = value.trim();
        match key {
            "api.base_url" => self.api.base_url = value.to_string(),
            "api.ml_url" => self.api.ml_url = value.to_string(),
            "api.timeout_secs" => self.api.timeout_secs = parse(key, value)?,
            "polling.engines_secs" => self.polling.engines_secs = parse(key, value)?,
            "polling.summary_secs" => self.polling.summary_secs = parse(key, value)?,
            "polling.health_secs" => self.polling.health_secs = parse(key, value)?,
            "alerts.critical_rul" => self.alerts.critical_rul = parse(key, value)?,
            "alerts.warning_rul" => self.alerts.warning_rul = parse(key, value)?,
            "alerts.low_confidence" => self.alerts.low_confidence = parse(key, value)?,
            "display.max_rul" => self.display.max_rul = parse(key, value)?,
            "display.engines_limit" => {
                self.display.engines_limit = match value {
                    "" | "none" | "default" => None,
                    v => Some(parse(key, v)?),
                }
            }
            "display.chart_engines" => self.display.chart_engines = parse(key, value)?,
            "notifications.enabled" => self.notifications.enabled = parse(key, value)?,
            "notifications.email" => {
                self.notifications.email = (!value.is_empty()).then(|| value.to_string())
            }
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        self.validate()
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, SettingsError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| invalid(key, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.api.base_url, "http://localhost:8000");
        assert_eq!(settings.polling.engines_secs, 10);
        assert_eq!(settings.alerts.low_confidence, 0.7);
    }

    #[test]
    fn test_config_file_path() {
        if let Ok(path) = Settings::config_file_path() {
            assert!(path.to_string_lossy().contains("rul-dashboard"));
            assert!(path.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [("RUL_API_URL", "http://api.example:9000"), ("RUL_ML_URL", " ")].into();
        let mut settings = Settings::default();
        settings.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.api.base_url, "http://api.example:9000");
        assert_eq!(settings.api.ml_url, DEFAULT_ML_URL);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut s = Settings::default();
        s.polling.summary_secs = 0;
        assert!(matches!(s.validate(), Err(SettingsError::Invalid { ref field, .. }) if field == "polling.summary_secs"));

        let mut s = Settings::default();
        s.alerts.critical_rul = 120.0;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.alerts.low_confidence = 1.5;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.api.base_url = "not a url".into();
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.api.ml_url = "ftp://ml".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_set_by_key() {
        let mut s = Settings::default();
        s.set("polling.engines_secs", "5").unwrap();
        s.set("display.engines_limit", "25").unwrap();
        s.set("notifications.enabled", "true").unwrap();
        assert_eq!(s.polling.engines_secs, 5);
        assert_eq!(s.display.engines_limit, Some(25));
        assert!(s.notifications.enabled);

        assert!(matches!(s.set("polling.bogus", "1"), Err(SettingsError::UnknownKey(_))));
        assert!(s.set("alerts.warning_rul", "abc").is_err());
        s.set("display.engines_limit", "none").unwrap();
        assert_eq!(s.display.engines_limit, None);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert_eq!(Settings::load_from(&path).await.unwrap(), Settings::default());

        let mut s = Settings::default();
        s.api.base_url = "http://rul.internal:8000".into();
        s.alerts.low_confidence = 0.5;
        s.save_to(&path).await.unwrap();

        let loaded = Settings::load_from(&path).await.unwrap();
        assert_eq!(loaded, s);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[polling]\nengines_secs = 3\n").unwrap();

        let loaded = Settings::load_from(&path).await.unwrap();
        assert_eq!(loaded.polling.engines_secs, 3);
        assert_eq!(loaded.polling.summary_secs, 30);
        assert_eq!(loaded.api.base_url, DEFAULT_API_URL);
    }

    #[tokio::test]
    async fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[alerts]\ncritical_rul = 200.0\n").unwrap();
        assert!(matches!(Settings::load_from(&path).await, Err(SettingsError::Invalid { .. })));

        std::fs::write(&path, "polling = 3").unwrap();
        assert!(matches!(Settings::load_from(&path).await, Err(SettingsError::Parse(_))));
    }
}
