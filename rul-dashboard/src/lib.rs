//! RUL Dashboard - terminal monitoring for turbofan engine remaining useful life
//!
//! Polls the backend API for engines and fleet summary, derives the
//! dashboard figures client-side and renders them as text panels:
//! - Summary cards and engine grid
//! - Alerts synthesized from status and confidence
//! - Placeholder RUL trend chart
//! - Engines page filters and fleet analytics

pub mod alerts;
pub mod analytics;
pub mod chart;
pub mod client;
pub mod filter;
pub mod grid;
pub mod metrics;
pub mod models;
pub mod poller;
pub mod render;
pub mod settings;

pub use client::{ApiClient, ApiError};
pub use models::{DashboardSummary, Engine, EngineStatus};
pub use settings::{Settings, SettingsError};
