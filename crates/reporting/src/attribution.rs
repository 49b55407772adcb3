//! Conversion-value attribution. Splits each user's journey value across
//! channels under several attribution rules and compares the results.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use spend_core::{AnalysisConfig, JourneyTable, SpendError, SpendResult, Touchpoint, ValueColumn};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionModel {
    LastTouch,
    FirstTouch,
    Linear,
    TimeDecay,
}

impl AttributionModel {
    pub const ALL: [AttributionModel; 4] = [
        AttributionModel::LastTouch,
        AttributionModel::FirstTouch,
        AttributionModel::Linear,
        AttributionModel::TimeDecay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastTouch => "last_touch",
            Self::FirstTouch => "first_touch",
            Self::Linear => "linear",
            Self::TimeDecay => "time_decay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributionConfig {
    pub value_column: ValueColumn,
    /// Time constant of the exponential decay, in days.
    pub decay_half_life_days: f64,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for AttributionConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            value_column: config.value_column,
            decay_half_life_days: config.decay_half_life_days,
        }
    }
}

/// Attributed value per channel under one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAttribution {
    pub model: AttributionModel,
    pub by_channel: BTreeMap<String, f64>,
    pub total_value: f64,
}

/// One channel's attributed value under every model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAttribution {
    pub channel: String,
    pub last_touch: f64,
    pub first_touch: f64,
    pub linear: f64,
    pub time_decay: f64,
    /// Sample variance across the four models.
    pub variance: f64,
    pub mean: f64,
}

impl ChannelAttribution {
    pub fn value(&self, model: AttributionModel) -> f64 {
        match model {
            AttributionModel::LastTouch => self.last_touch,
            AttributionModel::FirstTouch => self.first_touch,
            AttributionModel::Linear => self.linear,
            AttributionModel::TimeDecay => self.time_decay,
        }
    }
}

/// Pearson correlation between models, computed over the channel dimension.
///
/// A cell is `None` when either model's channel vector has no variance or
/// fewer than two channels exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub models: [AttributionModel; 4],
    pub values: [[Option<f64>; 4]; 4],
}

impl CorrelationMatrix {
    pub fn get(&self, a: AttributionModel, b: AttributionModel) -> Option<f64> {
        let i = self.models.iter().position(|m| *m == a)?;
        let j = self.models.iter().position(|m| *m == b)?;
        self.values[i][j]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionComparison {
    pub value_column: ValueColumn,
    pub model_results: Vec<ModelAttribution>,
    pub channels: Vec<ChannelAttribution>,
    pub correlation: CorrelationMatrix,
}

pub struct AttributionEngine {
    config: AttributionConfig,
}

impl AttributionEngine {
    pub fn new(config: AttributionConfig) -> SpendResult<Self> {
        if !config.decay_half_life_days.is_finite() || config.decay_half_life_days <= 0.0 {
            return Err(SpendError::Configuration(format!(
                "decay half-life must be positive, got {}",
                config.decay_half_life_days
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &AttributionConfig {
        &self.config
    }

    /// Value carried by a row; missing or non-finite values count as zero.
    pub fn row_value(&self, row: &Touchpoint) -> f64 {
        let value = match self.config.value_column {
            ValueColumn::ConversionValue => row.conversion_value.unwrap_or(0.0),
            ValueColumn::Cost => row.cost,
        };
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }

    /// Per-row credit under `model`, aligned with the journey's rows.
    pub fn weights(&self, journey: &JourneyTable, model: AttributionModel) -> Vec<f64> {
        match model {
            AttributionModel::LastTouch => vec![1.0; journey.len()],
            AttributionModel::FirstTouch => self.first_touch_weights(journey),
            AttributionModel::Linear => self.linear_weights(journey),
            AttributionModel::TimeDecay => self.time_decay_weights(journey),
        }
    }

    /// 1.0 for each user's chronologically first row (earliest row in input
    /// order on ties), 0.0 elsewhere.
    pub fn first_touch_weights(&self, journey: &JourneyTable) -> Vec<f64> {
        let rows = journey.rows();
        let mut weights = vec![0.0; rows.len()];
        for indices in partition_by_user(journey).values() {
            let first = indices
                .iter()
                .copied()
                .min_by_key(|&i| (rows[i].impression_at, i));
            if let Some(i) = first {
                weights[i] = 1.0;
            }
        }
        weights
    }

    /// Each of a user's rows gets `1 / rows_for_user`.
    pub fn linear_weights(&self, journey: &JourneyTable) -> Vec<f64> {
        let mut weights = vec![0.0; journey.len()];
        for indices in partition_by_user(journey).values() {
            let share = 1.0 / indices.len() as f64;
            for &i in indices {
                weights[i] = share;
            }
        }
        weights
    }

    /// `exp(-days_to_conversion / half_life)`, normalized per user.
    ///
    /// `days_to_conversion` is the whole number of days between the row's
    /// impression and the user's latest conversion, floored at zero. Users
    /// who never converted get equal weights.
    pub fn time_decay_weights(&self, journey: &JourneyTable) -> Vec<f64> {
        let rows = journey.rows();
        let half_life = self.config.decay_half_life_days;
        let mut weights = vec![0.0; rows.len()];

        for indices in partition_by_user(journey).values() {
            if let [only] = indices.as_slice() {
                weights[*only] = 1.0;
                continue;
            }

            let converted_at = indices.iter().filter_map(|&i| rows[i].conversion_at).max();
            let raw: Vec<f64> = indices
                .iter()
                .map(|&i| {
                    let days = converted_at
                        .map(|at| (at - rows[i].impression_at).num_days().max(0))
                        .unwrap_or(0);
                    (-(days as f64) / half_life).exp()
                })
                .collect();

            let total: f64 = raw.iter().sum();
            for (&i, w) in indices.iter().zip(raw) {
                weights[i] = if total > 0.0 {
                    w / total
                } else {
                    1.0 / indices.len() as f64
                };
            }
        }
        weights
    }

    /// Value credited to each row under `model`, aligned with the journey's rows.
    ///
    /// Linear credit splits the user's whole journey value; the other models
    /// weight each row's own value.
    pub fn row_credits(&self, journey: &JourneyTable, model: AttributionModel) -> Vec<f64> {
        let weights = self.weights(journey, model);
        let values: Vec<f64> = match model {
            AttributionModel::Linear => self.user_total_values(journey),
            _ => journey.iter().map(|row| self.row_value(row)).collect(),
        };
        values.iter().zip(&weights).map(|(v, w)| v * w).collect()
    }

    /// For every row, the summed value of all rows belonging to its user.
    fn user_total_values(&self, journey: &JourneyTable) -> Vec<f64> {
        let rows = journey.rows();
        let mut totals = vec![0.0; rows.len()];
        for indices in partition_by_user(journey).values() {
            let total: f64 = indices.iter().map(|&i| self.row_value(&rows[i])).sum();
            for &i in indices {
                totals[i] = total;
            }
        }
        totals
    }

    /// Attributed value per channel under one model.
    ///
    /// Every channel in the journey appears, with `0.0` when it earned nothing.
    pub fn attribute(&self, journey: &JourneyTable, model: AttributionModel) -> ModelAttribution {
        let credits = self.row_credits(journey, model);
        let mut by_channel: BTreeMap<String, f64> = BTreeMap::new();

        for (row, credit) in journey.iter().zip(credits) {
            *by_channel.entry(row.channel.clone()).or_insert(0.0) += credit;
        }

        let total_value = by_channel.values().sum();
        debug!(model = model.as_str(), total_value, "Computed attribution");

        ModelAttribution {
            model,
            by_channel,
            total_value,
        }
    }

    /// Run every model and compare them channel by channel.
    pub fn compare(&self, journey: &JourneyTable) -> AttributionComparison {
        let model_results: Vec<ModelAttribution> = AttributionModel::ALL
            .iter()
            .map(|m| self.attribute(journey, *m))
            .collect();

        let channel_names: BTreeSet<&String> = model_results
            .iter()
            .flat_map(|r| r.by_channel.keys())
            .collect();

        let value_of = |model: AttributionModel, channel: &str| {
            model_results
                .iter()
                .find(|r| r.model == model)
                .and_then(|r| r.by_channel.get(channel).copied())
                .unwrap_or(0.0)
        };

        let channels: Vec<ChannelAttribution> = channel_names
            .into_iter()
            .map(|channel| {
                let values = AttributionModel::ALL.map(|m| value_of(m, channel));
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                ChannelAttribution {
                    channel: channel.clone(),
                    last_touch: values[0],
                    first_touch: values[1],
                    linear: values[2],
                    time_decay: values[3],
                    variance: sample_variance(&values),
                    mean,
                }
            })
            .collect();

        let correlation = correlation_matrix(&channels);

        info!(
            rows = journey.len(),
            channels = channels.len(),
            value_column = %self.config.value_column,
            "Attribution comparison complete"
        );

        AttributionComparison {
            value_column: self.config.value_column,
            model_results,
            channels,
            correlation,
        }
    }
}

/// Row indices grouped by user, each group in input order.
fn partition_by_user(journey: &JourneyTable) -> BTreeMap<&str, Vec<usize>> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, row) in journey.iter().enumerate() {
        groups.entry(row.user_id.as_str()).or_default().push(i);
    }
    groups
}

fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

fn correlation_matrix(channels: &[ChannelAttribution]) -> CorrelationMatrix {
    let models = AttributionModel::ALL;
    let columns: Vec<Vec<f64>> = models
        .iter()
        .map(|m| channels.iter().map(|c| c.value(*m)).collect())
        .collect();

    let mut values = [[None; 4]; 4];
    for i in 0..models.len() {
        for j in 0..models.len() {
            values[i][j] = pearson(&columns[i], &columns[j]);
        }
    }
    CorrelationMatrix { models, values }
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const EPS: f64 = 1e-9;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap()
    }

    fn engine() -> AttributionEngine {
        AttributionEngine::new(AttributionConfig::default()).unwrap()
    }

    /// u1 sees Display (day 0), Facebook (day 7), then converts on Google Search
    /// (day 14) for 140. u2 converts on Facebook for 60 after one touchpoint.
    fn journey() -> JourneyTable {
        JourneyTable::new(vec![
            Touchpoint::impression("i1", "Display Network", "u1", t0(), 0.04),
            Touchpoint::impression("i2", "Facebook", "u1", t0() + Duration::days(7), 0.08),
            Touchpoint::impression("i3", "Google Search", "u1", t0() + Duration::days(14), 0.15)
                .with_click("c3", t0() + Duration::days(14) + Duration::seconds(30))
                .with_conversion("v3", t0() + Duration::days(14) + Duration::hours(1), 140.0),
            Touchpoint::impression("i4", "Facebook", "u2", t0(), 0.08)
                .with_click("c4", t0() + Duration::seconds(12))
                .with_conversion("v4", t0() + Duration::hours(3), 60.0),
        ])
    }

    // 1. Individual models -------------------------------------------------------

    #[test]
    fn test_last_touch_regroups_row_values() {
        let r = engine().attribute(&journey(), AttributionModel::LastTouch);
        assert!((r.by_channel["Google Search"] - 140.0).abs() < EPS);
        assert!((r.by_channel["Facebook"] - 60.0).abs() < EPS);
        assert!(r.by_channel["Display Network"].abs() < EPS);
        assert!((r.total_value - 200.0).abs() < EPS);
    }

    #[test]
    fn test_first_touch_credits_only_first_row() {
        let e = engine();
        let weights = e.first_touch_weights(&journey());
        assert_eq!(weights, vec![1.0, 0.0, 0.0, 1.0]);

        // u1's first row carries no value of its own, so only u2 contributes.
        let r = e.attribute(&journey(), AttributionModel::FirstTouch);
        assert!(r.by_channel["Display Network"].abs() < EPS);
        assert!(r.by_channel["Google Search"].abs() < EPS);
        assert!((r.by_channel["Facebook"] - 60.0).abs() < EPS);
    }

    #[test]
    fn test_first_touch_uses_timestamps_not_input_order() {
        let rows = vec![
            Touchpoint::impression("late", "TikTok", "u9", t0() + Duration::days(2), 0.06)
                .with_click("c", t0() + Duration::days(2))
                .with_conversion("v", t0() + Duration::days(3), 50.0),
            Touchpoint::impression("early", "YouTube", "u9", t0(), 0.12),
        ];
        let weights = engine().first_touch_weights(&JourneyTable::new(rows));
        assert_eq!(weights, vec![0.0, 1.0]);
    }

    #[test]
    fn test_linear_splits_user_value_across_touchpoints() {
        let r = engine().attribute(&journey(), AttributionModel::Linear);
        // u1's 140 is shared by three rows; u2 keeps its 60.
        assert!((r.by_channel["Display Network"] - 140.0 / 3.0).abs() < EPS);
        assert!((r.by_channel["Google Search"] - 140.0 / 3.0).abs() < EPS);
        assert!((r.by_channel["Facebook"] - (140.0 / 3.0 + 60.0)).abs() < EPS);
        assert!((r.total_value - 200.0).abs() < EPS);
    }

    #[test]
    fn test_linear_row_credits_conserve_user_value() {
        let credits = engine().row_credits(&journey(), AttributionModel::Linear);
        assert!((credits[..3].iter().sum::<f64>() - 140.0).abs() < EPS);
        assert!((credits[3] - 60.0).abs() < EPS);
    }

    #[test]
    fn test_time_decay_weights() {
        let weights = engine().time_decay_weights(&journey());

        // u1: 14, 7 and 0 days before conversion.
        let raw = [(-2.0f64).exp(), (-1.0f64).exp(), 1.0];
        let total: f64 = raw.iter().sum();
        for (w, r) in weights[..3].iter().zip(raw) {
            assert!((w - r / total).abs() < EPS);
        }
        assert!((weights[..3].iter().sum::<f64>() - 1.0).abs() < EPS);

        // u2 has a single touchpoint.
        assert_eq!(weights[3], 1.0);
    }

    #[test]
    fn test_time_decay_without_conversion_is_uniform() {
        let rows = vec![
            Touchpoint::impression("a", "Campus TV", "u7", t0(), 0.2),
            Touchpoint::impression("b", "Campus TV", "u7", t0() + Duration::days(9), 0.2),
        ];
        let weights = engine().time_decay_weights(&JourneyTable::new(rows));
        assert!((weights[0] - 0.5).abs() < EPS);
        assert!((weights[1] - 0.5).abs() < EPS);
    }

    // 2. Single-touchpoint agreement ----------------------------------------------

    #[test]
    fn test_all_models_agree_on_single_touchpoint() {
        let journey = JourneyTable::new(vec![Touchpoint::impression(
            "i1", "Instagram", "solo", t0(), 0.09,
        )
        .with_click("c1", t0() + Duration::seconds(5))
        .with_conversion("v1", t0() + Duration::days(2), 100.0)]);

        let e = engine();
        for model in AttributionModel::ALL {
            let r = e.attribute(&journey, model);
            assert!(
                (r.by_channel["Instagram"] - 100.0).abs() < EPS,
                "{} disagreed",
                model.as_str()
            );
        }
    }

    // 3. Value column -------------------------------------------------------------

    #[test]
    fn test_cost_value_column() {
        let e = AttributionEngine::new(AttributionConfig {
            value_column: ValueColumn::Cost,
            decay_half_life_days: 7.0,
        })
        .unwrap();
        let r = e.attribute(&journey(), AttributionModel::LastTouch);
        assert!((r.by_channel["Facebook"] - 0.16).abs() < EPS);
    }

    #[test]
    fn test_non_positive_half_life_rejected() {
        let cfg = AttributionConfig {
            value_column: ValueColumn::ConversionValue,
            decay_half_life_days: 0.0,
        };
        assert!(matches!(
            AttributionEngine::new(cfg),
            Err(SpendError::Configuration(_))
        ));
    }

    // 4. Comparison ---------------------------------------------------------------

    #[test]
    fn test_compare_table() {
        let cmp = engine().compare(&journey());
        assert_eq!(cmp.model_results.len(), 4);
        assert_eq!(cmp.channels.len(), 3);

        let fb = cmp.channels.iter().find(|c| c.channel == "Facebook").unwrap();
        assert!((fb.first_touch - 60.0).abs() < EPS);
        assert!((fb.last_touch - 60.0).abs() < EPS);

        for c in &cmp.channels {
            let values = AttributionModel::ALL.map(|m| c.value(m));
            let mean = values.iter().sum::<f64>() / 4.0;
            assert!((c.mean - mean).abs() < EPS);
            assert!(c.variance >= 0.0);
        }

        let gs = cmp.channels.iter().find(|c| c.channel == "Google Search").unwrap();
        // Values 140, 0, 140/3, w*140: variance is strictly positive.
        assert!(gs.variance > 0.0);
    }

    #[test]
    fn test_correlation_matrix() {
        let cmp = engine().compare(&journey());
        let corr = &cmp.correlation;

        let diag = corr.get(AttributionModel::LastTouch, AttributionModel::LastTouch);
        assert!((diag.unwrap() - 1.0).abs() < EPS);

        let lt_lin = corr.get(AttributionModel::LastTouch, AttributionModel::Linear);
        let lin_lt = corr.get(AttributionModel::Linear, AttributionModel::LastTouch);
        assert_eq!(lt_lin, lin_lt);
        assert!((-1.0..=1.0).contains(&lt_lin.unwrap()));

        // Time decay keeps most of u1's value on the converting channel.
        let lt_td = corr.get(AttributionModel::LastTouch, AttributionModel::TimeDecay);
        assert!(lt_td.unwrap() > 0.9);
    }

    #[test]
    fn test_pearson_zero_variance_is_missing() {
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        let r = pearson(&[1.0, 2.0, 3.0], &[6.0, 4.0, 2.0]).unwrap();
        assert!((r + 1.0).abs() < EPS);
    }

    #[test]
    fn test_empty_journey_compares_to_empty_table() {
        let cmp = engine().compare(&JourneyTable::default());
        assert!(cmp.channels.is_empty());
        assert!(cmp.correlation.values.iter().flatten().all(|v| v.is_none()));
    }

    #[test]
    fn test_sample_variance() {
        assert!((sample_variance(&[2.0, 4.0, 4.0, 6.0]) - 8.0 / 3.0).abs() < EPS);
        assert_eq!(sample_variance(&[5.0]), 0.0);
    }
}
