use thiserror::Error;

pub type SpendResult<T> = Result<T, SpendError>;

#[derive(Error, Debug)]
pub enum SpendError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid budget: {0}")]
    InvalidBudget(String),

    #[error("Budget constraints infeasible: {0}")]
    ConstraintInfeasible(String),

    #[error("Invalid journey record {impression_id}: {reason}")]
    InvalidJourney {
        impression_id: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
