/*!
Fixtures JSON conformes aux contrats de l'API RUL

Les payloads sont construits en `serde_json::Value` pour rester indépendants
des types Rust de chaque crate (le stub ne connaît que le format filaire).
*/

use serde_json::{json, Value};

/// Moteur au format GET /api/v1/engines
pub fn engine_json(id: u32, status: &str, rul: f64, confidence: f64) -> Value {
    json!({
        "id": id,
        "name": format!("Engine_{id:03}"),
        "model": "CFM56-7B",
        "status": status,
        "current_rul": rul,
        "confidence": confidence,
        "last_updated": chrono::Utc::now().to_rfc3339(),
        "is_active": true
    })
}

pub fn inactive(mut engine: Value) -> Value {
    engine["is_active"] = Value::Bool(false);
    engine
}

/// Flotte mixte : 2 sains, 2 en alerte, 1 critique, dont un moteur inactif
pub fn sample_fleet() -> Vec<Value> {
    vec![
        engine_json(1, "healthy", 118.0, 0.92),
        engine_json(2, "warning", 74.5, 0.81),
        engine_json(3, "critical", 23.0, 0.66),
        engine_json(4, "healthy", 105.0, 0.88),
        inactive(engine_json(5, "warning", 60.0, 0.9)),
    ]
}

/// Résumé tel que le calcule le backend
pub fn summary_for(engines: &[Value]) -> Value {
    let count = |s: &str| engines.iter().filter(|e| e["status"] == s).count();
    let active: Vec<f64> = engines
        .iter()
        .filter(|e| e["is_active"].as_bool().unwrap_or(false))
        .filter_map(|e| e["current_rul"].as_f64())
        .collect();
    let average = if active.is_empty() {
        0.0
    } else {
        active.iter().sum::<f64>() / active.len() as f64
    };
    json!({
        "total_engines": engines.len(),
        "healthy_engines": count("healthy"),
        "warning_engines": count("warning"),
        "critical_engines": count("critical"),
        "average_rul": (average * 100.0).round() / 100.0,
        "active_engines": active.len()
    })
}

/// Réponse POST /predict du service ML
pub fn prediction_json(rul: f64, confidence: f64) -> Value {
    let status = if rul < 50.0 {
        "critical"
    } else if rul < 100.0 {
        "warning"
    } else {
        "healthy"
    };
    json!({
        "predicted_rul": rul,
        "confidence": confidence,
        "status": status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "model_version": "transformer_fd002_exact_v2.1"
    })
}

/// Une ligne C-MAPSS (26 colonnes) avec des capteurs constants
pub fn fd002_line(unit: u32, cycle: u32, sensor_value: f64) -> String {
    let mut cols = vec![
        unit.to_string(),
        cycle.to_string(),
        "35.0019".to_string(),
        "0.8400".to_string(),
        "100.0".to_string(),
    ];
    cols.extend((1..=21).map(|s| format!("{:.4}", sensor_value + s as f64)));
    cols.join(" ")
}

/// Fichier FD002 synthétique : (unit, nombre de cycles)
pub fn fd002_text(units: &[(u32, u32)]) -> String {
    let mut out = String::new();
    for &(unit, cycles) in units {
        for cycle in 1..=cycles {
            out.push_str(&fd002_line(unit, cycle, 500.0));
            out.push('\n');
        }
    }
    out
}
