//! RUL backend: engine store, FD002 bootstrap, ML enrichment and the REST API
//! consumed by the dashboard.

pub mod config;
pub mod fd002;
pub mod health;
pub mod http;
pub mod ml;
pub mod models;
pub mod store;
