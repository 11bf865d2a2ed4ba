//! Text panels for the terminal dashboard
//!
//! Each panel is a plain `String` so the CLI can print it and tests can
//! assert on it. Every panel has an explicit empty state.

use crate::alerts::{count_by_severity, Alert};
use crate::analytics::FleetAnalytics;
use crate::chart::EngineSeries;
use crate::grid::EngineCard;
use crate::metrics::DashboardMetrics;
use crate::models::{DashboardSummary, EngineRul, EngineStatus, HealthReport, PredictionResponse};
use crate::poller::DashboardSnapshot;
use chrono::{DateTime, Utc};
use std::fmt::Write;

pub const NO_ENGINES: &str = "No engines available";
pub const NO_ALERTS: &str = "No active alerts";
pub const NO_CHART: &str = "No RUL data to chart";
const BAR_WIDTH: usize = 20;
const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn badge(status: EngineStatus) -> &'static str {
    match status {
        EngineStatus::Healthy => "[ OK ]",
        EngineStatus::Warning => "[WARN]",
        EngineStatus::Critical => "[CRIT]",
    }
}

fn fmt_rul(rul: Option<f64>) -> String {
    rul.map(|r| format!("{r:.1}")).unwrap_or_else(|| "--".to_string())
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "== {title} ==");
}

pub fn progress_bar(progress: f64, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

pub fn render_summary(metrics: &DashboardMetrics, server: Option<&DashboardSummary>) -> String {
    let mut out = String::new();
    heading(&mut out, "Fleet summary");
    if metrics.total == 0 {
        let _ = writeln!(out, "{NO_ENGINES}");
    } else {
        let _ = writeln!(out, "Total engines   {:>6}   Active {:>4}", metrics.total, metrics.active);
        for status in EngineStatus::ALL {
            let _ = writeln!(
                out,
                "{:<8} {:>4}  {:>5.1}%",
                status.as_str(),
                metrics.count_for(status),
                metrics.percent_for(status)
            );
        }
        let _ = writeln!(out, "Average RUL     {:>8.2} cycles", metrics.average_rul);
    }
    if let Some(server) = server {
        if !metrics.matches_server(server) {
            let _ = writeln!(
                out,
                "Server summary: {} engines ({} healthy, {} warning, {} critical), {} active, avg RUL {:.2}",
                server.total_engines,
                server.healthy_engines,
                server.warning_engines,
                server.critical_engines,
                server.active_engines,
                server.average_rul
            );
        }
    }
    out
}

pub fn render_grid(cards: &[EngineCard]) -> String {
    let mut out = String::new();
    heading(&mut out, "Engines");
    if cards.is_empty() {
        let _ = writeln!(out, "{NO_ENGINES}");
        return out;
    }
    for card in cards {
        let confidence = card
            .confidence_pct
            .map(|c| format!("{c:>3}%"))
            .unwrap_or_else(|| "  --".to_string());
        let _ = writeln!(
            out,
            "{} {:<12} {:<10} RUL {:>6} {} conf {}{}",
            badge(card.status),
            card.name,
            card.model,
            fmt_rul(card.rul),
            progress_bar(card.progress, BAR_WIDTH),
            confidence,
            if card.is_active { "" } else { "  (inactive)" }
        );
    }
    out
}

pub fn render_alerts(alerts: &[Alert]) -> String {
    let mut out = String::new();
    heading(&mut out, "Alerts");
    if alerts.is_empty() {
        let _ = writeln!(out, "{NO_ALERTS}");
        return out;
    }
    let (critical, warning, info) = count_by_severity(alerts);
    let _ = writeln!(out, "{critical} critical, {warning} warning, {info} info");
    for alert in alerts {
        let _ = writeln!(
            out,
            "{:<8} {}  {}",
            alert.severity.to_string(),
            alert.raised_at.format("%Y-%m-%d %H:%M"),
            alert.message
        );
    }
    out
}

/// One sparkline per engine, scaled to the series' own range
pub fn sparkline(values: &[f64]) -> String {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = max - min;
    values
        .iter()
        .map(|&v| {
            let idx = if span > 0.0 {
                (((v - min) / span) * (SPARK.len() - 1) as f64).round() as usize
            } else {
                SPARK.len() / 2
            };
            SPARK[idx.min(SPARK.len() - 1)]
        })
        .collect()
}

pub fn render_chart(series: &[EngineSeries]) -> String {
    let mut out = String::new();
    heading(&mut out, "RUL trend (24h, simulated)");
    let drawable: Vec<&EngineSeries> = series.iter().filter(|s| !s.points.is_empty()).collect();
    if drawable.is_empty() {
        let _ = writeln!(out, "{NO_CHART}");
        return out;
    }
    for s in drawable {
        let values: Vec<f64> = s.points.iter().map(|p| p.rul).collect();
        let first = values.first().copied().unwrap_or_default();
        let last = values.last().copied().unwrap_or_default();
        let _ = writeln!(
            out,
            "{:<12} {} {:>6.1} -> {:>6.1}",
            s.engine_name,
            sparkline(&values),
            first,
            last
        );
    }
    out
}

pub fn render_analytics(analytics: &FleetAnalytics) -> String {
    let mut out = String::new();
    heading(&mut out, "Analytics");
    if analytics.is_empty() {
        let _ = writeln!(out, "{NO_ENGINES}");
        return out;
    }
    for (status, count, pct) in &analytics.distribution {
        let _ = writeln!(
            out,
            "{:<8} {:>4} {:>5.1}% {}",
            status.as_str(),
            count,
            pct,
            progress_bar(*pct, BAR_WIDTH)
        );
    }
    let b = &analytics.buckets;
    let _ = writeln!(
        out,
        "RUL bands: <50: {}  50-100: {}  >=100: {}  unknown: {}",
        b.below_50, b.from_50_to_100, b.at_least_100, b.unknown
    );
    match analytics.mean_confidence {
        Some(c) => {
            let _ = writeln!(out, "Mean confidence: {:.1}%", c * 100.0);
        }
        None => {
            let _ = writeln!(out, "Mean confidence: --");
        }
    }
    if !analytics.lowest_rul.is_empty() {
        let _ = writeln!(out, "Lowest RUL:");
        for r in &analytics.lowest_rul {
            let _ = writeln!(out, "  {} {:<12} {:>6.1}", badge(r.status), r.name, r.rul);
        }
    }
    out
}

pub fn render_health(label: &str, report: &HealthReport) -> String {
    match (&report.error, report.is_online()) {
        (_, true) => format!(
            "{label}: online{}{}",
            report.version.as_deref().map(|v| format!(" (v{v})")).unwrap_or_default(),
            report.latency_ms.map(|ms| format!(" {ms} ms")).unwrap_or_default()
        ),
        (Some(e), false) => format!("{label}: offline ({e})"),
        (None, false) => format!("{label}: offline"),
    }
}

pub fn render_engine_rul(rul: &EngineRul) -> String {
    let mut out = String::new();
    heading(&mut out, &format!("{} (#{})", rul.engine_name, rul.engine_id));
    let _ = writeln!(out, "Status       {}", rul.status);
    let _ = writeln!(out, "RUL          {} cycles", fmt_rul(rul.rul));
    let _ = writeln!(
        out,
        "Confidence   {}",
        rul.confidence
            .map(|c| format!("{:.0}%", c.clamp(0.0, 1.0) * 100.0))
            .unwrap_or_else(|| "--".into())
    );
    let _ = writeln!(out, "Model        {}", rul.model_version);
    if let Some(ts) = rul.timestamp {
        let _ = writeln!(out, "Updated      {}", ts.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(ms) = rul.prediction_time_ms {
        let _ = writeln!(out, "Latency      {ms:.1} ms");
    }
    out
}

pub fn render_prediction(engine_id: u32, p: &PredictionResponse) -> String {
    format!(
        "Engine #{engine_id}: {} RUL {:.1} cycles, confidence {:.0}%{}",
        badge(p.status),
        p.predicted_rul,
        p.confidence.clamp(0.0, 1.0) * 100.0,
        p.model_version.as_deref().map(|m| format!(" [{m}]")).unwrap_or_default()
    )
}

/// Panels assembled for the watch screen
pub struct DashboardView<'a> {
    pub snapshot: &'a DashboardSnapshot,
    pub metrics: &'a DashboardMetrics,
    pub cards: &'a [EngineCard],
    pub alerts: &'a [Alert],
    pub series: &'a [EngineSeries],
    pub now: DateTime<Utc>,
}

pub fn render_dashboard(view: &DashboardView<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "RUL Dashboard  {}", view.now.format("%Y-%m-%d %H:%M:%S UTC"));
    match &view.snapshot.health {
        Some(h) => {
            let _ = writeln!(out, "{}", render_health("API", h));
        }
        None => {
            let _ = writeln!(out, "API: checking...");
        }
    }
    let engines = &view.snapshot.engines;
    if engines.is_loading() {
        let _ = writeln!(out, "Loading engines...");
    } else if let Some(err) = &engines.error {
        let _ = writeln!(out, "! engines unavailable: {err}");
    }
    if let Some(err) = &view.snapshot.summary.error {
        let _ = writeln!(out, "! summary unavailable: {err}");
    }
    out.push('\n');
    out.push_str(&render_summary(view.metrics, view.snapshot.summary.data.as_ref()));
    out.push('\n');
    out.push_str(&render_grid(view.cards));
    out.push('\n');
    out.push_str(&render_alerts(view.alerts));
    out.push('\n');
    out.push_str(&render_chart(view.series));
    out
}
