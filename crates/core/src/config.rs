use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SpendError, SpendResult};

/// Tolerance used when checking that scoring weights sum to one.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Root analysis configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `SPEND_ANALYZER__`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub value_column: ValueColumn,
    #[serde(default = "default_decay_half_life_days")]
    pub decay_half_life_days: f64,
    #[serde(default)]
    pub scoring_weights: ScoringWeights,
    /// Budget to reallocate. When unset, the observed total spend is used.
    #[serde(default)]
    pub total_budget: Option<f64>,
    #[serde(default = "default_min_budget_pct")]
    pub min_budget_pct: f64,
}

/// Journey column whose value is split between touchpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueColumn {
    #[default]
    ConversionValue,
    Cost,
}

/// Weights of the composite efficiency score. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_roas_weight")]
    pub roas: f64,
    #[serde(default = "default_cost_efficiency_weight")]
    pub cost_efficiency: f64,
    #[serde(default = "default_conversion_rate_weight")]
    pub conversion_rate: f64,
    #[serde(default = "default_ctr_weight")]
    pub ctr: f64,
}

// Default functions
fn default_decay_half_life_days() -> f64 {
    7.0
}
fn default_min_budget_pct() -> f64 {
    0.05
}
fn default_roas_weight() -> f64 {
    0.40
}
fn default_cost_efficiency_weight() -> f64 {
    0.30
}
fn default_conversion_rate_weight() -> f64 {
    0.20
}
fn default_ctr_weight() -> f64 {
    0.10
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            roas: default_roas_weight(),
            cost_efficiency: default_cost_efficiency_weight(),
            conversion_rate: default_conversion_rate_weight(),
            ctr: default_ctr_weight(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            value_column: ValueColumn::default(),
            decay_half_life_days: default_decay_half_life_days(),
            scoring_weights: ScoringWeights::default(),
            total_budget: None,
            min_budget_pct: default_min_budget_pct(),
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.roas + self.cost_efficiency + self.conversion_rate + self.ctr
    }

    pub fn validate(&self) -> SpendResult<()> {
        let all = [self.roas, self.cost_efficiency, self.conversion_rate, self.ctr];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(SpendError::Configuration(format!(
                "scoring weights must be finite and non-negative, got {all:?}"
            )));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(SpendError::Configuration(format!(
                "scoring weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

impl ValueColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConversionValue => "conversion_value",
            Self::Cost => "cost",
        }
    }
}

impl fmt::Display for ValueColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueColumn {
    type Err = SpendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conversion_value" => Ok(Self::ConversionValue),
            "cost" => Ok(Self::Cost),
            other => Err(SpendError::Configuration(format!(
                "unknown value column '{other}'"
            ))),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from environment variables and an optional config file.
    ///
    /// Unparseable values are returned as errors; absent keys take their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::load_with_env(path, None)
    }

    /// `env` replaces the process environment when given.
    fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("SPEND_ANALYZER")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Reject settings the analysis cannot run with.
    pub fn validate(&self) -> SpendResult<()> {
        self.scoring_weights.validate()?;
        if !self.decay_half_life_days.is_finite() || self.decay_half_life_days <= 0.0 {
            return Err(SpendError::Configuration(format!(
                "decay_half_life_days must be positive, got {}",
                self.decay_half_life_days
            )));
        }
        if !(0.0..1.0).contains(&self.min_budget_pct) {
            return Err(SpendError::Configuration(format!(
                "min_budget_pct must be in [0, 1), got {}",
                self.min_budget_pct
            )));
        }
        if let Some(budget) = self.total_budget {
            if !budget.is_finite() || budget <= 0.0 {
                return Err(SpendError::InvalidBudget(format!(
                    "total budget must be positive, got {budget}"
                )));
            }
        }
        Ok(())
    }
}
