//! Per-channel aggregation of the journey table: counts, spend, revenue and
//! the ratio metrics derived from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use spend_core::JourneyTable;
use tracing::debug;

/// Aggregated performance of one channel.
///
/// Ratios are `None` when their denominator is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub channel: String,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub cost: f64,
    pub revenue: f64,
    /// `clicks / impressions`.
    pub ctr: Option<f64>,
    /// `conversions / clicks`.
    pub conversion_rate: Option<f64>,
    pub cost_per_click: Option<f64>,
    pub cost_per_conversion: Option<f64>,
    /// `revenue / cost`.
    pub roas: Option<f64>,
    pub profit: f64,
}

impl ChannelMetrics {
    /// Build a metrics row from raw totals, deriving every ratio.
    pub fn from_totals(
        channel: impl Into<String>,
        impressions: u64,
        clicks: u64,
        conversions: u64,
        cost: f64,
        revenue: f64,
    ) -> Self {
        Self {
            channel: channel.into(),
            impressions,
            clicks,
            conversions,
            cost,
            revenue,
            ctr: ratio(clicks as f64, impressions as f64),
            conversion_rate: ratio(conversions as f64, clicks as f64),
            cost_per_click: ratio(cost, clicks as f64),
            cost_per_conversion: ratio(cost, conversions as f64),
            roas: ratio(revenue, cost),
            profit: revenue - cost,
        }
    }
}

/// `numerator / denominator`, or `None` for a zero denominator.
pub(crate) fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let value = numerator / denominator;
    value.is_finite().then_some(value)
}

#[derive(Default)]
struct Totals {
    impressions: u64,
    clicks: u64,
    conversions: u64,
    cost: f64,
    revenue: f64,
}

/// Group the journey by channel and compute totals and ratios.
///
/// Output is ordered by channel name.
pub fn aggregate_channel_metrics(journey: &JourneyTable) -> Vec<ChannelMetrics> {
    let mut by_channel: BTreeMap<&str, Totals> = BTreeMap::new();

    for row in journey {
        let totals = by_channel.entry(row.channel.as_str()).or_default();
        totals.impressions += 1;
        if row.clicked() {
            totals.clicks += 1;
        }
        if row.converted() {
            totals.conversions += 1;
        }
        totals.cost += row.cost;
        totals.revenue += row.conversion_value.unwrap_or(0.0);
    }

    debug!(
        rows = journey.len(),
        channels = by_channel.len(),
        "Aggregated channel metrics"
    );

    by_channel
        .into_iter()
        .map(|(channel, t)| {
            ChannelMetrics::from_totals(
                channel,
                t.impressions,
                t.clicks,
                t.conversions,
                t.cost,
                t.revenue,
            )
        })
        .collect()
}
