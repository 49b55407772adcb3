//! Channel spend analytics: per-channel metrics, efficiency scoring,
//! multi-model conversion attribution, and budget reallocation.

pub mod analyzer;
pub mod attribution;
pub mod budget;
pub mod metrics;
pub mod pareto;
pub mod scoring;
pub mod significance;

pub use analyzer::{AnalysisReport, ChannelAnalyzer};
pub use attribution::{AttributionComparison, AttributionEngine, AttributionModel};
pub use budget::{BudgetOptimizer, BudgetPlan, Recommendation};
pub use metrics::{aggregate_channel_metrics, ChannelMetrics};
pub use pareto::{pareto_analysis, ParetoReport};
pub use scoring::{EfficiencyScorer, ScoredChannel};
pub use significance::{two_sample_test, SignificanceResult};
