//! `rul-dashboard` - terminal client for the RUL backend
//!
//! `watch` polls the API in the background and redraws on every change;
//! the other subcommands fetch once and print one panel.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rul_dashboard::alerts::synthesize;
use rul_dashboard::analytics::analyze;
use rul_dashboard::chart::synthesize_all;
use rul_dashboard::filter::{sort_engines, EngineFilter, SortKey};
use rul_dashboard::grid::build_grid;
use rul_dashboard::metrics::DashboardMetrics;
use rul_dashboard::models::{EngineStatus, PredictionRequest};
use rul_dashboard::poller::{DashboardSnapshot, Poller};
use rul_dashboard::render::{self, DashboardView};
use rul_dashboard::{ApiClient, Settings};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "rul-dashboard", version, about = "Turbofan engine RUL dashboard")]
struct Cli {
    /// Settings file (default: <config dir>/rul-dashboard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend API base URL (overrides RUL_API_URL and the settings file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// ML service base URL (overrides RUL_ML_URL and the settings file)
    #[arg(long, global = true)]
    ml_url: Option<String>,

    /// Print JSON instead of text panels
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Live dashboard, redrawn as polls complete
    Watch {
        /// Render a single frame and exit
        #[arg(long)]
        once: bool,
        /// Seed for the simulated trend chart
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Fleet summary cards
    Summary,
    /// Engine list with filters
    Engines {
        #[arg(long)]
        status: Option<EngineStatus>,
        /// Case-insensitive match on name or model, exact match on id
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        active_only: bool,
        /// id, name, rul or severity
        #[arg(long, default_value = "id")]
        sort: SortKey,
        /// Number of engines requested from the API (1-100)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Latest prediction for one engine
    Engine { id: u32 },
    /// Alerts derived from the current engine list
    Alerts,
    /// Status distribution, RUL bands and lowest-RUL engines
    Analytics {
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
    /// API and ML service liveness
    Health,
    /// Ask the ML service for a prediction
    Predict {
        #[arg(long)]
        engine_id: u32,
        /// Sensor reading as name=value, repeatable
        #[arg(long = "sensor", value_parser = parse_sensor)]
        sensors: Vec<(String, f64)>,
    },
    /// Show or change persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print effective settings
    Show,
    /// Print the settings file location
    Path,
    /// Set a value by dotted key, e.g. `polling.engines_secs 5`
    Set { key: String, value: String },
    /// Restore defaults
    Reset,
}

fn parse_sensor(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{s}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for {name}: {e}"))?;
    Ok((name.trim().to_string(), value))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rul_dashboard=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings_path = match &cli.config {
        Some(p) => p.clone(),
        None => Settings::config_file_path()?,
    };
    let mut settings = Settings::load_from(&settings_path)
        .await
        .with_context(|| format!("loading settings from {}", settings_path.display()))?;

    if let Command::Settings { action } = &cli.command {
        return run_settings(action, settings, &settings_path, cli.json).await;
    }

    settings.apply_env(|k| std::env::var(k).ok());
    if let Some(url) = &cli.api_url {
        settings.api.base_url = url.clone();
    }
    if let Some(url) = &cli.ml_url {
        settings.api.ml_url = url.clone();
    }
    settings.validate().context("invalid settings")?;

    let client = ApiClient::from_settings(&settings).context("creating HTTP client")?;

    match cli.command {
        Command::Watch { once, seed } => {
            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
            if once {
                let snapshot = fetch_snapshot(&client, &settings).await;
                println!("{}", dashboard_frame(&snapshot, &settings, &mut rng));
                Ok(())
            } else {
                watch_loop(client, &settings, &mut rng).await
            }
        }
        Command::Summary => {
            let engines = client
                .engines(settings.display.engines_limit)
                .await
                .context("fetching engines")?;
            let server = match client.dashboard_summary().await {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!("server summary unavailable: {e}");
                    None
                }
            };
            let metrics = DashboardMetrics::from_engines(&engines);
            emit(cli.json, &metrics, || render::render_summary(&metrics, server.as_ref()))
        }
        Command::Engines {
            status,
            search,
            active_only,
            sort,
            limit,
        } => {
            let engines = client
                .engines(limit.or(settings.display.engines_limit))
                .await
                .context("fetching engines")?;
            let filter = EngineFilter {
                status,
                search,
                active_only,
            };
            let mut shown = filter.apply(&engines);
            sort_engines(&mut shown, sort);
            emit(cli.json, &shown, || {
                render::render_grid(&build_grid(&shown, settings.display.max_rul))
            })
        }
        Command::Engine { id } => {
            let rul = match client.engine_rul(id).await {
                Ok(r) => r,
                Err(e) if e.is_not_found() => bail!("engine {id} not found"),
                Err(e) => return Err(e).context("fetching engine RUL"),
            };
            emit(cli.json, &rul, || render::render_engine_rul(&rul))
        }
        Command::Alerts => {
            let engines = client
                .engines(settings.display.engines_limit)
                .await
                .context("fetching engines")?;
            let alerts = synthesize(&engines, &settings.alerts, Utc::now());
            emit(cli.json, &alerts, || render::render_alerts(&alerts))
        }
        Command::Analytics { top } => {
            let engines = client
                .engines(settings.display.engines_limit)
                .await
                .context("fetching engines")?;
            let analytics = analyze(&engines, top);
            emit(cli.json, &analytics, || render::render_analytics(&analytics))
        }
        Command::Health => {
            let (api, ml) = tokio::join!(client.health(), client.ml_health());
            emit(cli.json, &BTreeMap::from([("api", &api), ("ml", &ml)]), || {
                format!(
                    "{}\n{}",
                    render::render_health("API", &api),
                    render::render_health("ML service", &ml)
                )
            })
        }
        Command::Predict { engine_id, sensors } => {
            let request = PredictionRequest {
                engine_id,
                sensor_data: sensors.into_iter().collect(),
            };
            let prediction = client.predict(&request).await.context("requesting prediction")?;
            emit(cli.json, &prediction, || render::render_prediction(engine_id, &prediction))
        }
        // handled before the client is built
        Command::Settings { .. } => Ok(()),
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text());
    }
    Ok(())
}

async fn run_settings(action: &SettingsAction, mut settings: Settings, path: &Path, json: bool) -> Result<()> {
    match action {
        SettingsAction::Show => {
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                print!("{}", toml::to_string_pretty(&settings)?);
            }
        }
        SettingsAction::Path => println!("{}", path.display()),
        SettingsAction::Set { key, value } => {
            settings.set(key, value)?;
            settings.save_to(path).await?;
            println!("{key} = {value}");
        }
        SettingsAction::Reset => {
            Settings::default().save_to(path).await?;
            println!("settings reset ({})", path.display());
        }
    }
    Ok(())
}

async fn fetch_snapshot(client: &ApiClient, settings: &Settings) -> DashboardSnapshot {
    let (engines, summary, health) = tokio::join!(
        client.engines(settings.display.engines_limit),
        client.dashboard_summary(),
        client.health()
    );
    let mut snapshot = DashboardSnapshot::default();
    snapshot.engines.record(engines);
    snapshot.summary.record(summary);
    snapshot.health = Some(health);
    snapshot
}

fn dashboard_frame(snapshot: &DashboardSnapshot, settings: &Settings, rng: &mut StdRng) -> String {
    let now = Utc::now();
    let engines = snapshot.engines();
    let metrics = DashboardMetrics::from_engines(engines);
    let cards = build_grid(engines, settings.display.max_rul);
    let alerts = synthesize(engines, &settings.alerts, now);
    let series = synthesize_all(engines, settings.display.chart_engines, now, rng);
    render::render_dashboard(&DashboardView {
        snapshot,
        metrics: &metrics,
        cards: &cards,
        alerts: &alerts,
        series: &series,
        now,
    })
}

async fn watch_loop(client: ApiClient, settings: &Settings, rng: &mut StdRng) -> Result<()> {
    let poller = Poller::new(client, settings.polling.clone(), settings.display.engines_limit);
    let mut updates = poller.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = poller.spawn(shutdown_rx);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let frame = dashboard_frame(&poller.snapshot(), settings, rng);
                print!("\x1b[2J\x1b[H{frame}");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping pollers");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sensor() {
        assert_eq!(parse_sensor("T30=1589.7").unwrap(), ("T30".to_string(), 1589.7));
        assert!(parse_sensor("T30").is_err());
        assert!(parse_sensor("T30=hot").is_err());
    }

    #[test]
    fn test_cli_parses_engines_filters() {
        let cli = Cli::try_parse_from([
            "rul-dashboard",
            "engines",
            "--status",
            "critical",
            "--sort",
            "rul",
            "--active-only",
        ])
        .unwrap();
        match cli.command {
            Command::Engines {
                status, sort, active_only, ..
            } => {
                assert_eq!(status, Some(EngineStatus::Critical));
                assert_eq!(sort, SortKey::Rul);
                assert!(active_only);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_status() {
        assert!(Cli::try_parse_from(["rul-dashboard", "engines", "--status", "fine"]).is_err());
    }
}
