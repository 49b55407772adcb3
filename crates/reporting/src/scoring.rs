//! Composite channel efficiency scoring.
//!
//! Four metrics (ROAS, cost efficiency, conversion rate, CTR) are min-max
//! normalized across the channel set being scored and blended with fixed
//! weights. Scores are relative to the set: adding or removing a channel
//! changes every other channel's score.
//!
//! A metric that is missing for a channel (zero denominator upstream) does not
//! take part in that metric's min/max and is floored to `0.0` for the channel.
//! Cost efficiency is `1 / cost_per_conversion` and is treated as missing when
//! the channel has no conversions or no spend.

use serde::{Deserialize, Serialize};
use spend_core::{ScoringWeights, SpendError, SpendResult};
use tracing::debug;

use crate::metrics::ChannelMetrics;

/// Value assigned to every channel when a metric has no spread.
pub const NO_VARIANCE_SCORE: f64 = 0.5;

/// Value assigned to a channel whose metric is missing.
pub const MISSING_METRIC_SCORE: f64 = 0.0;

/// Normalized scoring components, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub roas: f64,
    pub cost_efficiency: f64,
    pub conversion_rate: f64,
    pub ctr: f64,
}

/// A channel's metrics joined with its efficiency score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChannel {
    #[serde(flatten)]
    pub metrics: ChannelMetrics,
    /// Raw `1 / cost_per_conversion`, before normalization.
    pub cost_efficiency: Option<f64>,
    pub normalized: ScoreComponents,
    pub efficiency_score: f64,
}

/// Scores a channel set with a validated set of weights.
#[derive(Debug, Clone)]
pub struct EfficiencyScorer {
    weights: ScoringWeights,
}

impl EfficiencyScorer {
    /// Fails with a configuration error unless the weights sum to 1.0.
    pub fn new(weights: ScoringWeights) -> SpendResult<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn score(&self, channels: &[ChannelMetrics]) -> SpendResult<Vec<ScoredChannel>> {
        if channels.len() < 2 {
            return Err(SpendError::InsufficientData(format!(
                "efficiency scoring needs at least 2 channels, got {}",
                channels.len()
            )));
        }

        let cost_efficiency: Vec<Option<f64>> =
            channels.iter().map(cost_efficiency).collect();

        let roas = min_max_normalize(&channels.iter().map(|c| c.roas).collect::<Vec<_>>());
        let cost_eff = min_max_normalize(&cost_efficiency);
        let conversion_rate = min_max_normalize(
            &channels.iter().map(|c| c.conversion_rate).collect::<Vec<_>>(),
        );
        let ctr = min_max_normalize(&channels.iter().map(|c| c.ctr).collect::<Vec<_>>());

        let w = &self.weights;
        let scored: Vec<ScoredChannel> = channels
            .iter()
            .enumerate()
            .map(|(i, metrics)| {
                let normalized = ScoreComponents {
                    roas: roas[i],
                    cost_efficiency: cost_eff[i],
                    conversion_rate: conversion_rate[i],
                    ctr: ctr[i],
                };
                let efficiency_score = normalized.roas * w.roas
                    + normalized.cost_efficiency * w.cost_efficiency
                    + normalized.conversion_rate * w.conversion_rate
                    + normalized.ctr * w.ctr;
                ScoredChannel {
                    metrics: metrics.clone(),
                    cost_efficiency: cost_efficiency[i],
                    normalized,
                    efficiency_score,
                }
            })
            .collect();

        debug!(channels = scored.len(), "Computed efficiency scores");
        Ok(scored)
    }
}

fn cost_efficiency(metrics: &ChannelMetrics) -> Option<f64> {
    metrics
        .cost_per_conversion
        .filter(|cpa| *cpa > 0.0)
        .map(|cpa| 1.0 / cpa)
}

/// Min-max normalize the present values; missing values score
/// [`MISSING_METRIC_SCORE`], and a zero range scores [`NO_VARIANCE_SCORE`].
pub fn min_max_normalize(values: &[Option<f64>]) -> Vec<f64> {
    let present = values.iter().flatten().copied();
    let (min, max) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    values
        .iter()
        .map(|v| match v {
            None => MISSING_METRIC_SCORE,
            Some(_) if max == min => NO_VARIANCE_SCORE,
            Some(v) => ((v - min) / (max - min)).clamp(0.0, 1.0),
        })
        .collect()
}
