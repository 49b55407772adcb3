//! End-to-end channel analysis: metrics → efficiency scores → budget plan,
//! with attribution and a revenue Pareto breakdown reported alongside.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spend_core::{AnalysisConfig, JourneyTable, SpendResult};
use tracing::info;

use crate::attribution::{AttributionComparison, AttributionConfig, AttributionEngine};
use crate::budget::{BudgetConfig, BudgetOptimizer, BudgetPlan};
use crate::metrics::{aggregate_channel_metrics, ChannelMetrics};
use crate::pareto::{pareto_analysis, ParetoReport};
use crate::scoring::{EfficiencyScorer, ScoredChannel};

/// Every result table produced for one journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub config: AnalysisConfig,
    pub channel_metrics: Vec<ChannelMetrics>,
    pub efficiency_scores: Vec<ScoredChannel>,
    pub attribution: AttributionComparison,
    pub budget: BudgetPlan,
    pub revenue_pareto: Option<ParetoReport>,
}

pub struct ChannelAnalyzer {
    config: AnalysisConfig,
    scorer: EfficiencyScorer,
    attribution: AttributionEngine,
}

impl ChannelAnalyzer {
    pub fn new(config: AnalysisConfig) -> SpendResult<Self> {
        config.validate()?;
        let scorer = EfficiencyScorer::new(config.scoring_weights)?;
        let attribution = AttributionEngine::new(AttributionConfig::from(&config))?;
        Ok(Self {
            config,
            scorer,
            attribution,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn channel_metrics(&self, journey: &JourneyTable) -> Vec<ChannelMetrics> {
        aggregate_channel_metrics(journey)
    }

    pub fn efficiency_scores(&self, metrics: &[ChannelMetrics]) -> SpendResult<Vec<ScoredChannel>> {
        self.scorer.score(metrics)
    }

    pub fn attribution_comparison(&self, journey: &JourneyTable) -> AttributionComparison {
        self.attribution.compare(journey)
    }

    /// Plan against the configured budget, or the channels' combined spend
    /// when none is configured.
    pub fn optimize_budget(&self, scored: &[ScoredChannel]) -> SpendResult<BudgetPlan> {
        let total_budget = self
            .config
            .total_budget
            .unwrap_or_else(|| scored.iter().map(|s| s.metrics.cost).sum());
        let optimizer = BudgetOptimizer::new(BudgetConfig {
            total_budget,
            min_budget_pct: self.config.min_budget_pct,
        })?;
        optimizer.optimize(scored)
    }

    pub fn revenue_pareto(&self, metrics: &[ChannelMetrics]) -> Option<ParetoReport> {
        let revenue: Vec<(String, f64)> = metrics
            .iter()
            .map(|m| (m.channel.clone(), m.revenue))
            .collect();
        pareto_analysis(&revenue)
    }

    pub fn analyze(&self, journey: &JourneyTable) -> SpendResult<AnalysisReport> {
        info!(rows = journey.len(), "Starting channel analysis");

        let channel_metrics = self.channel_metrics(journey);
        let efficiency_scores = self.efficiency_scores(&channel_metrics)?;
        let budget = self.optimize_budget(&efficiency_scores)?;
        let attribution = self.attribution_comparison(journey);
        let revenue_pareto = self.revenue_pareto(&channel_metrics);

        info!(
            channels = channel_metrics.len(),
            expected_improvement_pct = budget.expected_improvement_pct,
            "Channel analysis complete"
        );

        Ok(AnalysisReport {
            generated_at: Utc::now(),
            config: self.config.clone(),
            channel_metrics,
            efficiency_scores,
            attribution,
            budget,
            revenue_pareto,
        })
    }
}
