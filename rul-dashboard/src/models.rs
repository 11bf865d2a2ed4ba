//! Wire types shared with the backend API and the ML service.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Engine health label, derived upstream from RUL and confidence thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Healthy,
    Warning,
    Critical,
}

impl EngineStatus {
    pub const ALL: [EngineStatus; 3] = [EngineStatus::Critical, EngineStatus::Warning, EngineStatus::Healthy];

    /// Higher is worse
    pub fn severity(self) -> u8 {
        match self {
            EngineStatus::Healthy => 0,
            EngineStatus::Warning => 1,
            EngineStatus::Critical => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineStatus::Healthy => "healthy",
            EngineStatus::Warning => "warning",
            EngineStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "healthy" => Ok(EngineStatus::Healthy),
            "warning" => Ok(EngineStatus::Warning),
            "critical" => Ok(EngineStatus::Critical),
            other => Err(format!("unknown engine status '{other}' (expected healthy, warning or critical)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    pub id: u32,
    pub name: String,
    pub model: String,
    pub status: EngineStatus,
    pub current_rul: Option<f64>,
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_engines: usize,
    pub healthy_engines: usize,
    pub warning_engines: usize,
    pub critical_engines: usize,
    pub average_rul: f64,
    pub active_engines: usize,
}

/// Latest prediction for one engine (`GET /api/v1/engines/{id}/rul`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRul {
    pub engine_id: u32,
    pub engine_name: String,
    pub rul: Option<f64>,
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    pub model_version: String,
    pub prediction_time_ms: Option<f64>,
    pub status: EngineStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub engine_id: u32,
    pub sensor_data: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_rul: f64,
    pub confidence: f64,
    pub status: EngineStatus,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    pub model_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Online,
    Offline,
}

/// Liveness result; an unreachable service is reported, never raised
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: ServiceStatus,
    pub version: Option<String>,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn offline(error: impl Into<String>) -> Self {
        Self {
            status: ServiceStatus::Offline,
            version: None,
            latency_ms: None,
            error: Some(error.into()),
            checked_at: Utc::now(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == ServiceStatus::Online
    }
}

/// Accepts RFC 3339 and offset-less ISO-8601 (taken as UTC), `null` or absent.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{s}'"))),
    }
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
