//! 80/20 breakdown: which entities account for the bulk of a value.

use serde::{Deserialize, Serialize};

/// Cumulative share (percent) that defines the "top" entities.
pub const PARETO_CUTOFF_PCT: f64 = 80.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoEntry {
    pub entity: String,
    pub value: f64,
    pub cumulative_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoReport {
    /// Entities whose cumulative share stays within the cutoff, largest first.
    pub top_entities: Vec<String>,
    pub top_entity_count: usize,
    pub total_entity_count: usize,
    /// Share of entities that are "top", in percent.
    pub top_entity_pct: f64,
    /// Share of total value the top entities cover, in percent.
    pub top_value_pct: f64,
    /// Every entity, sorted by value descending.
    pub entries: Vec<ParetoEntry>,
}

/// Rank entities by value and find the ones covering up to 80% of the total.
///
/// Returns `None` when there is nothing to rank or the total is not positive.
pub fn pareto_analysis(values: &[(String, f64)]) -> Option<ParetoReport> {
    let total: f64 = values.iter().map(|(_, v)| v).sum();
    if values.is_empty() || total.is_nan() || total <= 0.0 {
        return None;
    }

    let mut sorted: Vec<&(String, f64)> = values.iter().collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut running = 0.0;
    let entries: Vec<ParetoEntry> = sorted
        .into_iter()
        .map(|(entity, value)| {
            running += value;
            ParetoEntry {
                entity: entity.clone(),
                value: *value,
                cumulative_pct: running / total * 100.0,
            }
        })
        .collect();

    let top: Vec<&ParetoEntry> = entries
        .iter()
        .take_while(|e| e.cumulative_pct <= PARETO_CUTOFF_PCT)
        .collect();

    let top_value_pct = top.last().map(|e| e.cumulative_pct).unwrap_or(0.0);

    Some(ParetoReport {
        top_entities: top.iter().map(|e| e.entity.clone()).collect(),
        top_entity_count: top.len(),
        total_entity_count: entries.len(),
        top_entity_pct: top.len() as f64 / entries.len() as f64 * 100.0,
        top_value_pct,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revenue() -> Vec<(String, f64)> {
        vec![
            ("Facebook".to_string(), 200.0),
            ("Google Search".to_string(), 500.0),
            ("Campus Radio".to_string(), 50.0),
            ("YouTube".to_string(), 150.0),
            ("TikTok".to_string(), 100.0),
        ]
    }

    #[test]
    fn test_top_entities_within_cutoff() {
        let report = pareto_analysis(&revenue()).unwrap();
        // 50%, 70%, 85%, ...
        assert_eq!(report.top_entities, vec!["Google Search", "Facebook"]);
        assert_eq!(report.top_entity_count, 2);
        assert_eq!(report.total_entity_count, 5);
        assert!((report.top_entity_pct - 40.0).abs() < 1e-9);
        assert!((report.top_value_pct - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_cumulative_ends_at_hundred() {
        let report = pareto_analysis(&revenue()).unwrap();
        let last = report.entries.last().unwrap();
        assert!((last.cumulative_pct - 100.0).abs() < 1e-9);
        assert_eq!(last.entity, "Campus Radio");
    }

    #[test]
    fn test_dominant_entity_leaves_top_empty() {
        let values = vec![("Google Search".to_string(), 90.0), ("TikTok".to_string(), 10.0)];
        let report = pareto_analysis(&values).unwrap();
        assert!(report.top_entities.is_empty());
        assert_eq!(report.top_value_pct, 0.0);
    }

    #[test]
    fn test_empty_or_zero_total() {
        assert!(pareto_analysis(&[]).is_none());
        assert!(pareto_analysis(&[("TikTok".to_string(), 0.0)]).is_none());
    }
}
