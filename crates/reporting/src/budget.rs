//! Budget reallocation driven by channel efficiency scores, with a
//! per-channel minimum spend floor.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use spend_core::{SpendError, SpendResult};
use tracing::{debug, info};

use crate::scoring::ScoredChannel;

/// Change (in percent) beyond which a channel is flagged for increase or
/// decrease.
pub const RECOMMENDATION_THRESHOLD_PCT: f64 = 10.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub total_budget: f64,
    /// Fraction of the total budget every channel is guaranteed.
    pub min_budget_pct: f64,
}

impl BudgetConfig {
    pub fn new(total_budget: f64) -> Self {
        Self {
            total_budget,
            min_budget_pct: 0.05,
        }
    }

    pub fn min_budget(&self) -> f64 {
        self.total_budget * self.min_budget_pct
    }
}

/// What to do with a channel's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Increase,
    Decrease,
    Maintain,
}

impl Recommendation {
    /// Strictly beyond ±10% moves the budget; a missing change maintains.
    pub fn from_change_pct(change_pct: Option<f64>) -> Self {
        match change_pct {
            Some(pct) if pct > RECOMMENDATION_THRESHOLD_PCT => Self::Increase,
            Some(pct) if pct < -RECOMMENDATION_THRESHOLD_PCT => Self::Decrease,
            _ => Self::Maintain,
        }
    }
}

/// Current versus recommended spend for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub channel: String,
    pub current_budget: f64,
    pub optimal_budget: f64,
    pub change_amount: f64,
    /// `None` when the channel currently has no budget.
    pub change_pct: Option<f64>,
    pub efficiency_score: f64,
    pub current_roas: Option<f64>,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPlan {
    pub total_budget: f64,
    pub min_budget: f64,
    /// Sorted by `change_pct`, largest first; channels without one last.
    pub allocations: Vec<BudgetAllocation>,
    /// Channels raised to the minimum budget.
    pub clamped_channels: Vec<String>,
    /// `Σ(change · score) / Σ current · 100`. A linear proxy for the effect of
    /// the reallocation, not a forecast.
    pub expected_improvement_pct: f64,
}

// ---------------------------------------------------------------------------
// BudgetOptimizer
// ---------------------------------------------------------------------------

pub struct BudgetOptimizer {
    config: BudgetConfig,
}

impl BudgetOptimizer {
    pub fn new(config: BudgetConfig) -> SpendResult<Self> {
        if !config.total_budget.is_finite() || config.total_budget <= 0.0 {
            return Err(SpendError::InvalidBudget(format!(
                "total budget must be positive, got {}",
                config.total_budget
            )));
        }
        if !(0.0..1.0).contains(&config.min_budget_pct) {
            return Err(SpendError::Configuration(format!(
                "min_budget_pct must be in [0, 1), got {}",
                config.min_budget_pct
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Reallocate the total budget across `channels` by efficiency score.
    ///
    /// Channels whose score share falls below the minimum budget are raised
    /// to it and the rest of the budget is split over the remaining channels
    /// by score, in a single pass. A channel pushed under the minimum by that
    /// redistribution is left there.
    pub fn optimize(&self, channels: &[ScoredChannel]) -> SpendResult<BudgetPlan> {
        let total_budget = self.config.total_budget;
        let min_budget = self.config.min_budget();

        if channels.is_empty() {
            return Err(SpendError::InsufficientData(
                "no channels to allocate budget to".to_string(),
            ));
        }
        if channels.len() as f64 * min_budget > total_budget {
            return Err(SpendError::ConstraintInfeasible(format!(
                "{} channels at a minimum of {min_budget:.2} exceed the total budget {total_budget:.2}",
                channels.len()
            )));
        }

        let total_cost: f64 = channels.iter().map(|c| c.metrics.cost).sum();
        if total_cost <= 0.0 {
            return Err(SpendError::InsufficientData(
                "channels have no recorded spend".to_string(),
            ));
        }
        let total_score: f64 = channels.iter().map(|c| c.efficiency_score).sum();
        if total_score <= 0.0 {
            return Err(SpendError::InsufficientData(
                "all efficiency scores are zero".to_string(),
            ));
        }

        let current: Vec<f64> = channels
            .iter()
            .map(|c| c.metrics.cost / total_cost * total_budget)
            .collect();

        let mut optimal: Vec<f64> = channels
            .iter()
            .map(|c| c.efficiency_score / total_score * total_budget)
            .collect();

        let clamped: Vec<bool> = optimal.iter().map(|v| *v < min_budget).collect();
        let clamped_count = clamped.iter().filter(|c| **c).count();

        if clamped_count > 0 {
            let remaining_budget = total_budget - clamped_count as f64 * min_budget;
            let remaining_score: f64 = channels
                .iter()
                .zip(&clamped)
                .filter(|(_, c)| !**c)
                .map(|(ch, _)| ch.efficiency_score)
                .sum();

            for (i, ch) in channels.iter().enumerate() {
                optimal[i] = if clamped[i] {
                    min_budget
                } else {
                    ch.efficiency_score / remaining_score * remaining_budget
                };
                if !clamped[i] && optimal[i] < min_budget {
                    debug!(
                        channel = %ch.metrics.channel,
                        optimal = optimal[i],
                        min_budget,
                        "Channel fell below minimum budget after redistribution"
                    );
                }
            }
        }

        let mut allocations: Vec<BudgetAllocation> = channels
            .iter()
            .enumerate()
            .map(|(i, ch)| {
                let change_amount = optimal[i] - current[i];
                let change_pct = if current[i] == 0.0 {
                    None
                } else {
                    Some(change_amount / current[i] * 100.0)
                };
                BudgetAllocation {
                    channel: ch.metrics.channel.clone(),
                    current_budget: current[i],
                    optimal_budget: optimal[i],
                    change_amount,
                    change_pct,
                    efficiency_score: ch.efficiency_score,
                    current_roas: ch.metrics.roas,
                    recommendation: Recommendation::from_change_pct(change_pct),
                }
            })
            .collect();

        let weighted_change: f64 = allocations
            .iter()
            .map(|a| a.change_amount * a.efficiency_score)
            .sum();
        let current_total: f64 = current.iter().sum();
        let expected_improvement_pct = weighted_change / current_total * 100.0;

        allocations.sort_by(|a, b| by_change_pct_desc(a.change_pct, b.change_pct));

        let clamped_channels: Vec<String> = channels
            .iter()
            .zip(&clamped)
            .filter(|(_, c)| **c)
            .map(|(ch, _)| ch.metrics.channel.clone())
            .collect();

        info!(
            channels = allocations.len(),
            total_budget,
            min_budget,
            clamped = clamped_channels.len(),
            expected_improvement_pct,
            "Budget optimization complete"
        );

        Ok(BudgetPlan {
            total_budget,
            min_budget,
            allocations,
            clamped_channels,
            expected_improvement_pct,
        })
    }
}

fn by_change_pct_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
