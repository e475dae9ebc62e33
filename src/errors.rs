/// Domain-specific error types for the scoring core.
/// Only loading and construction boundaries fail. The batch itself must:
/// - Degrade on sparse or malformed metric values (omit, never abort)
/// - Fail fast on an unusable catalog or configuration
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("duplicate metric definition: {0}")]
    DuplicateMetric(String),

    #[error("invalid weight for metric {key}: {weight}")]
    InvalidWeight { key: String, weight: f64 },

    #[error("empty population: {0}")]
    EmptyPopulation(String),

    #[error("batch task failed: {0}")]
    Task(String),
}

impl From<std::io::Error> for ScoringError {
    fn from(e: std::io::Error) -> Self {
        ScoringError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ScoringError {
    fn from(e: serde_json::Error) -> Self {
        ScoringError::Parse(e.to_string())
    }
}

pub type ScoringResult<T> = Result<T, ScoringError>;
