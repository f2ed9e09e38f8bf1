//! Collaborator contracts the runtime is built against

use super::errors::{ExecutionError, IndicatorError};
use super::types::{Bar, Divergence, Indicator, Order, Position};

/// Order router / position ledger
///
/// Implementations own positions and equity; the runtime only reads them
/// through this trait and never keeps a copy.
///
/// # Implementation Notes
///
/// - `submit` is expected to return quickly (paper fill or fast broker call)
/// - A rejection that mimics a broker refusal may be reported as `Ok(())`
///   with no fill; callers re-read `position` when they need certainty
/// - The rotation scheduler only calls an executor while holding its own
///   lock, so implementations need no internal ordering guarantees beyond
///   `Send + Sync`
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync {
    /// Submit an order for execution
    fn submit(&self, order: &Order) -> Result<(), ExecutionError>;

    /// Current equity available for sizing
    fn equity(&self) -> f64;

    /// Current signed position and average entry price for a symbol
    fn position(&self, symbol: &str) -> Position;
}

/// Technical-indicator collaborator for a single symbol
///
/// Errors typically mean "insufficient history" and are never fatal:
/// strategies log them and fall back to their own price statistics.
#[cfg_attr(test, mockall::automock)]
pub trait IndicatorSuite: Send {
    /// Feed a new bar to every indicator in the suite
    fn add(&mut self, bar: &Bar) -> Result<(), IndicatorError>;

    /// Whether the indicator line just crossed above its reference line
    fn is_bullish_crossover(&self, indicator: Indicator) -> Result<bool, IndicatorError>;

    /// Whether the indicator line just crossed below its reference line
    fn is_bearish_crossover(&self, indicator: Indicator) -> Result<bool, IndicatorError>;

    /// Latest indicator value
    fn calculate(&self, indicator: Indicator) -> Result<f64, IndicatorError>;

    /// Divergence between price and the indicator, if any
    ///
    /// Default implementation reports none.
    fn divergence(&self, _indicator: Indicator) -> Option<Divergence> {
        None
    }
}

/// Metrics sink injected into strategies at construction
///
/// Replaces process-wide counters: every strategy records into whatever
/// recorder it was given.
pub trait MetricsRecorder: Send + Sync {
    /// An order was accepted by the executor
    fn order_submitted(&self, tag: &str);

    /// An order was refused by the executor
    fn order_failed(&self, _tag: &str) {}

    /// A rotation rebalance completed with `held` open positions
    fn rebalanced(&self, _held: usize) {}
}

/// Boxed indicator suite for dynamic dispatch
pub type BoxedIndicatorSuite = Box<dyn IndicatorSuite>;
