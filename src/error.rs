use thiserror::Error;

/// Errors that abort a backtest before or during the run. A failed run never
/// yields a partial result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BacktestError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Unknown strategy type: {0}")]
    UnknownStrategy(String),
}

pub type EngineResult<T> = std::result::Result<T, BacktestError>;
