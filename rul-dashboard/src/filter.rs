//! Engines page filtering and sorting.

use crate::models::{Engine, EngineStatus};
use std::cmp::Ordering;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Id,
    Name,
    /// Ascending, engines without RUL last
    Rul,
    /// Critical first
    Severity,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(SortKey::Id),
            "name" => Ok(SortKey::Name),
            "rul" => Ok(SortKey::Rul),
            "severity" | "status" => Ok(SortKey::Severity),
            other => Err(format!("unknown sort key '{other}' (expected id, name, rul or severity)")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineFilter {
    pub status: Option<EngineStatus>,
    pub search: Option<String>,
    pub active_only: bool,
}

impl EngineFilter {
    pub fn matches(&self, engine: &Engine) -> bool {
        if self.active_only && !engine.is_active {
            return false;
        }
        if self.status.is_some_and(|s| s != engine.status) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let needle = term.to_lowercase();
                engine.name.to_lowercase().contains(&needle)
                    || engine.model.to_lowercase().contains(&needle)
                    || term.parse::<u32>().is_ok_and(|id| id == engine.id)
            }
        }
    }

    pub fn apply(&self, engines: &[Engine]) -> Vec<Engine> {
        engines.iter().filter(|e| self.matches(e)).cloned().collect()
    }
}

pub fn sort_engines(engines: &mut [Engine], key: SortKey) {
    engines.sort_by(|a, b| match key {
        SortKey::Id => a.id.cmp(&b.id),
        SortKey::Name => a.name.cmp(&b.name).then(a.id.cmp(&b.id)),
        SortKey::Rul => compare_rul(a.current_rul, b.current_rul).then(a.id.cmp(&b.id)),
        SortKey::Severity => b
            .status
            .severity()
            .cmp(&a.status.severity())
            .then_with(|| compare_rul(a.current_rul, b.current_rul))
            .then(a.id.cmp(&b.id)),
    });
}

fn compare_rul(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
