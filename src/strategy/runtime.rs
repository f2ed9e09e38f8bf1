use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::common::errors::{Result, StrategyError};
use crate::common::metrics::NoopMetrics;
use crate::common::traits::{BoxedIndicatorSuite, Executor, IndicatorSuite, MetricsRecorder};
use crate::common::types::{Bar, Indicator, Order, Position, Side};
use crate::config::StrategyConfig;
use crate::strategy::price_buffer::PriceBuffer;
use crate::strategy::size_calculator::calc_qty;

/// Volatility above this fraction of price is treated as implausible
const MAX_VOLATILITY_FRACTION: f64 = 0.10;

/// Substitute volatility, as a fraction of price, when nothing better exists
const FALLBACK_VOLATILITY_FRACTION: f64 = 0.02;

/// Floor for any sanitized volatility
const MIN_VOLATILITY: f64 = 1e-8;

/// Shared machinery beneath every concrete strategy
///
/// Owns the indicator suite, the rolling price buffer and the validated
/// config, and is the only path through which a strategy opens, closes or
/// adjusts a position. Strategies own a runtime and delegate to it.
///
/// # Implementation Notes
///
/// - Positions are always read back from the executor, never cached
/// - Collaborator errors are logged and swallowed; a bar never fails
/// - Volatility from the indicator suite is sanitized before it reaches a
///   stop or target computation
pub struct StrategyRuntime {
    symbol: String,
    config: StrategyConfig,
    executor: Arc<dyn Executor>,
    suite: BoxedIndicatorSuite,
    prices: PriceBuffer,
    metrics: Arc<dyn MetricsRecorder>,
}

impl StrategyRuntime {
    /// Validate the config and assemble the runtime
    ///
    /// Fails with [`StrategyError::Configuration`] if the config is invalid;
    /// no runtime is created in that case.
    pub fn new(
        symbol: impl Into<String>,
        config: StrategyConfig,
        executor: Arc<dyn Executor>,
        suite: BoxedIndicatorSuite,
    ) -> Result<Self> {
        config.validate()?;
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(StrategyError::Configuration(
                "symbol cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            symbol,
            config,
            executor,
            suite,
            prices: PriceBuffer::default(),
            metrics: Arc::new(NoopMetrics),
        })
    }

    /// Record order metrics into the given recorder
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn prices(&self) -> &PriceBuffer {
        &self.prices
    }

    pub fn suite(&self) -> &dyn IndicatorSuite {
        self.suite.as_ref()
    }

    /// Current position as reported by the executor
    pub fn position(&self) -> Position {
        self.executor.position(&self.symbol)
    }

    pub fn equity(&self) -> f64 {
        self.executor.equity()
    }

    /// Feed a bar to the indicator suite and the price buffer
    ///
    /// Returns false (after a warning) when the suite rejects the bar; the
    /// caller should skip the rest of the bar in that case.
    pub fn ingest(&mut self, bar: &Bar) -> bool {
        if let Err(e) = self.suite.add(bar) {
            warn!(symbol = %self.symbol, error = %e, "suite_add_error");
            return false;
        }
        self.prices.add(bar.close);
        true
    }

    /// Warm-up gate: true once at least `min` closes have been recorded
    pub fn has_history(&self, min: usize) -> bool {
        self.prices.len() >= min
    }

    /// Last close minus the one before it
    pub fn momentum(&self) -> f64 {
        if self.prices.len() < 2 {
            return 0.0;
        }
        self.prices.last() - self.prices.prev()
    }

    /// Risk-bounded quantity for an entry at `price`
    pub fn calc_qty(&self, price: f64) -> f64 {
        calc_qty(
            self.executor.equity(),
            self.config.max_risk_per_trade,
            self.config.stop_loss_pct,
            price,
            &self.config.constraints(),
        )
    }

    /// Forward an order to the executor
    ///
    /// Failures are logged and returned without retry; successes are counted
    /// under `tag`.
    pub fn submit_order(&self, order: Order, tag: &str) -> Result<()> {
        if let Err(e) = self.executor.submit(&order) {
            error!(
                symbol = %order.symbol,
                side = %order.side,
                qty = order.quantity,
                error = %e,
                "order_submit_failed"
            );
            self.metrics.order_failed(tag);
            return Err(e.into());
        }
        info!(
            symbol = %order.symbol,
            side = %order.side,
            qty = order.quantity,
            price = order.price,
            tag,
            "order_submitted"
        );
        self.metrics.order_submitted(tag);
        Ok(())
    }

    /// Open a risk-sized position on `side` at `price`
    ///
    /// Returns true if an order was accepted by the executor. A quantity that
    /// sizes to zero is skipped.
    pub fn open_position(&self, side: Side, price: f64, tag: &str) -> bool {
        let qty = self.calc_qty(price);
        if qty <= 0.0 {
            debug!(symbol = %self.symbol, side = %side, price, "entry sized to zero, skipped");
            return false;
        }
        let order = Order::new(self.symbol.clone(), side, qty, price, tag);
        self.submit_order(order, tag).is_ok()
    }

    /// Flatten the current position at `price`; no-op when already flat
    ///
    /// Returns whether the executor reports the position flat afterwards.
    pub fn close_position(&self, price: f64, tag: &str) -> bool {
        let position = self.position();
        if position.is_flat() {
            return true;
        }
        let order = Order::new(
            self.symbol.clone(),
            Side::closing(position.quantity),
            position.quantity.abs(),
            price,
            tag,
        );
        if self.submit_order(order, tag).is_err() {
            return false;
        }
        self.position().is_flat()
    }

    /// Price at which a trailing stop fires for a position of `quantity`
    ///
    /// `avg * (1 + trailing_pct)` for longs, `avg * (1 - trailing_pct)` for
    /// shorts; `None` when trailing is disabled or the position is flat.
    pub fn trailing_stop_level(&self, avg_price: f64, quantity: f64) -> Option<f64> {
        if self.config.trailing_pct <= 0.0 || quantity == 0.0 {
            return None;
        }
        let level = if quantity > 0.0 {
            avg_price * (1.0 + self.config.trailing_pct)
        } else {
            avg_price * (1.0 - self.config.trailing_pct)
        };
        Some(level)
    }

    /// Close the position once price has reached the trailing level
    ///
    /// The level is recomputed from the current average price on every call.
    /// Returns true if a close order was issued.
    pub fn apply_trailing_stop(&self, current_price: f64) -> bool {
        let position = self.position();
        let Some(level) = self.trailing_stop_level(position.avg_price, position.quantity) else {
            return false;
        };
        let hit = (position.is_long() && current_price >= level)
            || (position.is_short() && current_price <= level);
        if hit {
            self.close_position(current_price, "trailing_stop");
        }
        hit
    }

    /// Close the position at an ATR-multiple profit target
    ///
    /// Target is `avg ± volatility * take_profit_pct`, where volatility is
    /// the suite's |ATSO| after sanitization. Returns true if a close order
    /// was issued.
    pub fn manage_take_profit(&self, current_price: f64) -> bool {
        if self.config.take_profit_pct <= 0.0 {
            return false;
        }
        let position = self.position();
        if position.is_flat() {
            return false;
        }
        let raw = self
            .suite
            .calculate(Indicator::Atso)
            .map(f64::abs)
            .unwrap_or(f64::NAN);
        let atr = self.sanitize_volatility(raw, position.avg_price);
        let distance = atr * self.config.take_profit_pct;

        let hit = if position.is_long() {
            current_price >= position.avg_price + distance
        } else {
            current_price <= position.avg_price - distance
        };
        if hit {
            self.close_position(current_price, "take_profit");
        }
        hit
    }

    /// Close the position once price has moved `stop_loss_pct` against it
    ///
    /// Returns true if a close order was issued.
    pub fn apply_stop_loss(&self, current_price: f64) -> bool {
        let position = self.position();
        if position.is_flat() {
            return false;
        }
        let hit = if position.is_long() {
            current_price <= position.avg_price * (1.0 - self.config.stop_loss_pct)
        } else {
            current_price >= position.avg_price * (1.0 + self.config.stop_loss_pct)
        };
        if hit {
            self.close_position(current_price, "stop_loss");
        }
        hit
    }

    /// Stop loss, then take profit, then trailing stop; stops at the first close
    pub fn manage_open_position(&self, current_price: f64) -> bool {
        self.apply_stop_loss(current_price)
            || self.manage_take_profit(current_price)
            || self.apply_trailing_stop(current_price)
    }

    /// Replace a degenerate volatility estimate with something usable
    ///
    /// A value is accepted when it is finite, positive and at most 10 % of
    /// `price`. Otherwise the price buffer's volatility is tried under the
    /// same test, then 2 % of price. The result is never below `1e-8`.
    pub fn sanitize_volatility(&self, raw: f64, price: f64) -> f64 {
        let plausible = |v: f64| {
            v.is_finite()
                && v > 0.0
                && (!(price > 0.0) || v <= price * MAX_VOLATILITY_FRACTION)
        };

        let value = if plausible(raw) {
            raw
        } else {
            let buffered = self.prices.volatility();
            if plausible(buffered) {
                buffered
            } else if price.is_finite() && price > 0.0 {
                price * FALLBACK_VOLATILITY_FRACTION
            } else {
                MIN_VOLATILITY
            }
        };
        value.max(MIN_VOLATILITY)
    }

    /// Up-trend according to the price buffer alone
    pub fn bullish_fallback(&self) -> bool {
        self.prices.trend() > 0 && self.prices.slope() > 0.0
    }

    /// Down-trend according to the price buffer alone
    pub fn bearish_fallback(&self) -> bool {
        self.prices.trend() < 0 && self.prices.slope() < 0.0
    }

    /// The indicator's bullish crossover, or the fallback while it cannot produce one
    pub fn bullish_signal(&self, indicator: Indicator) -> bool {
        match self.suite.is_bullish_crossover(indicator) {
            Ok(crossed) => crossed,
            Err(_) => self.bullish_fallback(),
        }
    }

    /// The indicator's bearish crossover, or the fallback while it cannot produce one
    pub fn bearish_signal(&self, indicator: Indicator) -> bool {
        match self.suite.is_bearish_crossover(indicator) {
            Ok(crossed) => crossed,
            Err(_) => self.bearish_fallback(),
        }
    }
}

impl std::fmt::Debug for StrategyRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRuntime")
            .field("symbol", &self.symbol)
            .field("config", &self.config)
            .field("prices", &self.prices)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::errors::{ExecutionError, IndicatorError};
    use crate::common::indicators::DetachedSuite;
    use crate::common::metrics::InMemoryMetrics;
    use crate::common::traits::{MockExecutor, MockIndicatorSuite};
    use crate::execution::PaperExecutor;
    use mockall::predicate::always;

    fn runtime_with(
        config: StrategyConfig,
        executor: Arc<dyn Executor>,
    ) -> StrategyRuntime {
        StrategyRuntime::new("TEST", config, executor, Box::new(DetachedSuite::new())).unwrap()
    }

    fn feed(runtime: &mut StrategyRuntime, closes: &[f64]) {
        for c in closes {
            assert!(runtime.ingest(&Bar::around(*c, 0.5, 1000.0)));
        }
    }

    #[test]
    fn test_invalid_config_fails_construction() {
        let config = StrategyConfig {
            stop_loss_pct: 0.0,
            ..StrategyConfig::default()
        };
        let result = StrategyRuntime::new(
            "TEST",
            config,
            Arc::new(PaperExecutor::new(1000.0)),
            Box::new(DetachedSuite::new()),
        );
        assert!(matches!(result, Err(StrategyError::Configuration(_))));
    }

    #[test]
    fn test_submit_failure_is_returned_and_not_counted() {
        let mut exec = MockExecutor::new();
        exec.expect_submit()
            .with(always())
            .times(1)
            .returning(|_| Err(ExecutionError::Rejected("broker down".into())));
        let metrics = Arc::new(InMemoryMetrics::new());
        let runtime = runtime_with(StrategyConfig::default(), Arc::new(exec))
            .with_metrics(metrics.clone());

        let result = runtime.submit_order(Order::new("TEST", Side::Buy, 1.0, 100.0, "x"), "x");
        assert!(matches!(result, Err(StrategyError::Execution(_))));
        assert_eq!(metrics.submitted("x"), 0);
        assert_eq!(metrics.failed("x"), 1);
    }

    #[test]
    fn test_submit_success_is_counted_by_tag() {
        let exec = Arc::new(PaperExecutor::new(10_000.0));
        let metrics = Arc::new(InMemoryMetrics::new());
        let runtime = runtime_with(StrategyConfig::default(), exec.clone())
            .with_metrics(metrics.clone());

        assert!(runtime.open_position(Side::Buy, 100.0, "entry_long"));
        assert_eq!(metrics.submitted("entry_long"), 1);
        assert_eq!(exec.orders()[0].quantity, 66.66);
    }

    #[test]
    fn test_close_position_is_noop_when_flat() {
        let mut exec = MockExecutor::new();
        exec.expect_position().returning(|_| Position::flat());
        exec.expect_submit().never();
        let runtime = runtime_with(StrategyConfig::default(), Arc::new(exec));
        assert!(runtime.close_position(100.0, "exit"));
    }

    #[test]
    fn test_close_position_reports_rejected_exit() {
        let mut exec = MockExecutor::new();
        exec.expect_position().returning(|_| Position::new(2.0, 100.0));
        exec.expect_submit()
            .times(1)
            .returning(|_| Err(ExecutionError::Rejected("halted".into())));
        let runtime = runtime_with(StrategyConfig::default(), Arc::new(exec));
        assert!(!runtime.close_position(99.0, "exit"));
    }

    #[test]
    fn test_close_position_flattens_short() {
        let mut exec = MockExecutor::new();
        exec.expect_position().returning(|_| Position::new(-3.5, 100.0));
        exec.expect_submit()
            .withf(|o: &Order| o.side == Side::Buy && o.quantity == 3.5 && o.reason == "exit")
            .times(1)
            .returning(|_| Ok(()));
        let runtime = runtime_with(StrategyConfig::default(), Arc::new(exec));
        runtime.close_position(98.0, "exit");
    }

    #[test]
    fn test_trailing_stop_levels() {
        let config = StrategyConfig {
            trailing_pct: 0.02,
            ..StrategyConfig::default()
        };
        let runtime = runtime_with(config, Arc::new(PaperExecutor::new(1000.0)));
        assert_eq!(runtime.trailing_stop_level(100.0, 1.0), Some(102.0));
        assert_eq!(runtime.trailing_stop_level(100.0, -1.0), Some(98.0));
        assert_eq!(runtime.trailing_stop_level(100.0, 0.0), None);

        let disabled = runtime_with(StrategyConfig::default(), Arc::new(PaperExecutor::new(1.0)));
        assert_eq!(disabled.trailing_stop_level(100.0, 1.0), None);
    }

    #[test]
    fn test_trailing_stop_fires_only_at_level() {
        let exec = Arc::new(PaperExecutor::new(10_000.0));
        let config = StrategyConfig {
            trailing_pct: 0.02,
            ..StrategyConfig::default()
        };
        let runtime = runtime_with(config, exec.clone());
        exec.submit(&Order::new("TEST", Side::Buy, 10.0, 100.0, "seed")).unwrap();

        assert!(!runtime.apply_trailing_stop(101.9));
        assert!(runtime.apply_trailing_stop(102.0));
        let orders = exec.orders();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[1].side, Side::Sell);
        assert_eq!(orders[1].reason, "trailing_stop");
        assert!(orders[1].price >= 100.0 * 1.02);
    }

    #[test]
    fn test_trailing_stop_for_short() {
        let exec = Arc::new(PaperExecutor::new(10_000.0));
        let config = StrategyConfig {
            trailing_pct: 0.05,
            ..StrategyConfig::default()
        };
        let runtime = runtime_with(config, exec.clone());
        exec.submit(&Order::new("TEST", Side::Sell, 2.0, 200.0, "seed")).unwrap();

        assert!(!runtime.apply_trailing_stop(191.0));
        assert!(runtime.apply_trailing_stop(189.0));
        let close = exec.orders().pop().unwrap();
        assert_eq!(close.side, Side::Buy);
        assert_eq!(close.quantity, 2.0);
        assert!(close.price <= 200.0 * 0.95);
    }

    #[test]
    fn test_take_profit_uses_sanitized_buffer_volatility() {
        let exec = Arc::new(PaperExecutor::new(10_000.0));
        let config = StrategyConfig {
            take_profit_pct: 2.0,
            ..StrategyConfig::default()
        };
        let mut runtime = runtime_with(config, exec.clone());
        // Unit steps: buffer volatility is 1.0, suite has no ATSO yet
        feed(&mut runtime, &[100.0, 101.0, 102.0, 103.0, 104.0]);
        exec.submit(&Order::new("TEST", Side::Buy, 1.0, 104.0, "seed")).unwrap();

        assert!(!runtime.manage_take_profit(105.9));
        assert!(runtime.manage_take_profit(106.0));
        assert_eq!(exec.orders().last().unwrap().reason, "take_profit");
    }

    #[test]
    fn test_take_profit_prefers_plausible_indicator_value() {
        let mut suite = MockIndicatorSuite::new();
        suite
            .expect_calculate()
            .with(mockall::predicate::eq(Indicator::Atso))
            .returning(|_| Ok(-3.0));
        let exec = Arc::new(PaperExecutor::new(10_000.0));
        let config = StrategyConfig {
            take_profit_pct: 1.0,
            ..StrategyConfig::default()
        };
        let runtime =
            StrategyRuntime::new("TEST", config, exec.clone(), Box::new(suite)).unwrap();
        exec.submit(&Order::new("TEST", Side::Sell, 1.0, 100.0, "seed")).unwrap();

        assert!(!runtime.manage_take_profit(97.5));
        assert!(runtime.manage_take_profit(97.0));
        assert_eq!(exec.position("TEST"), Position::flat());
    }

    #[test]
    fn test_stop_loss() {
        let exec = Arc::new(PaperExecutor::new(10_000.0));
        let runtime = runtime_with(StrategyConfig::default(), exec.clone());
        exec.submit(&Order::new("TEST", Side::Buy, 1.0, 100.0, "seed")).unwrap();

        assert!(!runtime.apply_stop_loss(98.6));
        assert!(runtime.apply_stop_loss(98.5));
        assert_eq!(exec.orders().last().unwrap().reason, "stop_loss");
        assert!(!runtime.manage_open_position(50.0));
    }

    #[test]
    fn test_sanitize_volatility() {
        let mut runtime = runtime_with(StrategyConfig::default(), Arc::new(PaperExecutor::new(1.0)));

        // Plausible raw values pass through
        assert_eq!(runtime.sanitize_volatility(1.5, 100.0), 1.5);

        // Empty buffer: 2 % of price
        for raw in [f64::NAN, f64::INFINITY, 0.0, -1.0, 50.0] {
            assert_eq!(runtime.sanitize_volatility(raw, 100.0), 2.0, "raw {}", raw);
        }

        // With history the buffer's volatility is preferred
        feed(&mut runtime, &[100.0, 100.5, 101.0, 101.5]);
        assert_eq!(runtime.sanitize_volatility(f64::NAN, 100.0), 0.5);

        // Degenerate price still yields a positive floor
        let v = runtime.sanitize_volatility(f64::NAN, 0.0);
        assert!(v > 0.0 && v.is_finite());
        assert!(runtime.sanitize_volatility(f64::NAN, f64::NAN) >= MIN_VOLATILITY);
    }

    #[test]
    fn test_fallback_signals_follow_price_buffer() {
        let mut runtime = runtime_with(StrategyConfig::default(), Arc::new(PaperExecutor::new(1.0)));
        feed(&mut runtime, &[100.0, 101.0, 102.0, 103.0, 104.0]);
        assert!(runtime.bullish_fallback());
        assert!(!runtime.bearish_fallback());
        assert!(runtime.bullish_signal(Indicator::Hma));
        assert_eq!(runtime.momentum(), 1.0);

        feed(&mut runtime, &[103.0, 102.0, 101.0, 100.0, 99.0, 98.0]);
        assert!(runtime.bearish_signal(Indicator::Hma));
    }

    #[test]
    fn test_indicator_crossover_overrides_fallback() {
        let mut suite = MockIndicatorSuite::new();
        suite.expect_add().returning(|_| Ok(()));
        suite.expect_is_bullish_crossover().returning(|_| Ok(false));
        suite.expect_is_bearish_crossover().returning(|ind| {
            Err(IndicatorError::InsufficientHistory {
                indicator: ind,
                available: 0,
                needed: 10,
            })
        });
        let mut runtime = StrategyRuntime::new(
            "TEST",
            StrategyConfig::default(),
            Arc::new(PaperExecutor::new(1.0)),
            Box::new(suite),
        )
        .unwrap();
        feed(&mut runtime, &[100.0, 101.0, 102.0, 103.0, 104.0]);

        assert!(runtime.bullish_fallback());
        assert!(!runtime.bullish_signal(Indicator::Hma));
        assert!(!runtime.bearish_signal(Indicator::Hma));
    }

    #[test]
    fn test_rejected_bar_is_not_recorded() {
        let mut runtime = runtime_with(StrategyConfig::default(), Arc::new(PaperExecutor::new(1.0)));
        assert!(!runtime.ingest(&Bar::new(f64::NAN, 1.0, 1.0, 1.0)));
        assert!(runtime.prices().is_empty());
        assert!(!runtime.has_history(1));
    }
}
