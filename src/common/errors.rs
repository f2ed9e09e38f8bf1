//! Error types for the runtime

use thiserror::Error;

use super::types::Indicator;

/// Result type alias using our StrategyError
pub type Result<T> = std::result::Result<T, StrategyError>;

/// Main error type for strategy construction and operation
#[derive(Error, Debug)]
pub enum StrategyError {
    /// Invalid thresholds, ratios or rotation parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Indicator collaborator failures
    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    /// Executor collaborator failures
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Bar routed to a symbol outside the scheduler's universe
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
}

/// Errors reported by an [`IndicatorSuite`](crate::common::traits::IndicatorSuite).
///
/// These are expected during warm-up and are never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndicatorError {
    /// Not enough bars to produce a value yet
    #[error("{indicator} needs {needed} bars, has {available}")]
    InsufficientHistory {
        indicator: Indicator,
        available: usize,
        needed: usize,
    },

    /// Bar rejected by the indicator (negative volume, high < low, ...)
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Errors reported by an [`Executor`](crate::common::traits::Executor).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// Order refused by the broker or paper ledger
    #[error("order rejected: {0}")]
    Rejected(String),

    /// Order failed basic sanity checks before reaching the ledger
    #[error("invalid order: {0}")]
    InvalidOrder(String),
}

impl From<config::ConfigError> for StrategyError {
    fn from(err: config::ConfigError) -> Self {
        StrategyError::Configuration(err.to_string())
    }
}
