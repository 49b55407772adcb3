//! Shared types for channel spend analysis: the journey table, analysis
//! configuration, and the error taxonomy.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AnalysisConfig, ScoringWeights, ValueColumn};
pub use error::{SpendError, SpendResult};
pub use types::{JourneyTable, Touchpoint};
