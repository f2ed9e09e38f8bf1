use crate::common::types::Bar;
use crate::strategy::runtime::StrategyRuntime;

/// Core single-symbol strategy trait
///
/// Strategies receive bars one at a time and act through the
/// [`StrategyRuntime`] they own. They never see an error: collaborator
/// failures are logged by the runtime and the bar's action is skipped.
///
/// # Implementation Notes
///
/// - `process_bar` should be fast, with no blocking I/O beyond the executor call
/// - Internal state (FSM, counters) is owned by the strategy
/// - Position and equity come from the executor via the runtime
///
/// # Example
///
/// ```ignore
/// struct Breakout {
///     runtime: StrategyRuntime,
/// }
///
/// impl Strategy for Breakout {
///     fn name(&self) -> &str { "breakout" }
///
///     fn runtime(&self) -> &StrategyRuntime { &self.runtime }
///
///     fn process_bar(&mut self, bar: &Bar) {
///         if !self.runtime.ingest(bar) || !self.runtime.has_history(20) {
///             return;
///         }
///         if self.runtime.bullish_fallback() && self.runtime.position().is_flat() {
///             self.runtime.open_position(Side::Buy, bar.close, "breakout_long");
///         }
///     }
/// }
/// ```
pub trait Strategy: Send {
    /// Unique identifier for this strategy
    fn name(&self) -> &str;

    /// The runtime this strategy trades through
    fn runtime(&self) -> &StrategyRuntime;

    /// Instrument this strategy trades
    fn symbol(&self) -> &str {
        self.runtime().symbol()
    }

    /// Called once per closed bar, in chronological order
    fn process_bar(&mut self, bar: &Bar);
}

/// Boxed strategy for dynamic dispatch
pub type BoxedStrategy = Box<dyn Strategy>;
