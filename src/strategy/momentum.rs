use std::sync::Arc;

use tracing::debug;

use crate::common::errors::Result;
use crate::common::traits::{BoxedIndicatorSuite, Executor, MetricsRecorder};
use crate::common::types::{Bar, Indicator, Side};
use crate::config::StrategyConfig;
use crate::strategy::runtime::StrategyRuntime;
use crate::strategy::traits::Strategy;

/// Bars required before the first signal is acted on
pub const TREND_WARMUP_BARS: usize = 15;

/// Directional strategy that follows HMA crossovers
///
/// Flips between long and short on opposite signals; while holding without
/// a new signal it manages the trailing stop and take profit. The fixed
/// stop loss is not applied here: an adverse move is handled by the flip.
pub struct TrendFollower {
    runtime: StrategyRuntime,
}

impl TrendFollower {
    pub fn new(
        symbol: impl Into<String>,
        config: StrategyConfig,
        executor: Arc<dyn Executor>,
        suite: BoxedIndicatorSuite,
    ) -> Result<Self> {
        Ok(Self {
            runtime: StrategyRuntime::new(symbol, config, executor, suite)?,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.runtime = self.runtime.with_metrics(metrics);
        self
    }
}

impl Strategy for TrendFollower {
    fn name(&self) -> &str {
        "trend_follower"
    }

    fn runtime(&self) -> &StrategyRuntime {
        &self.runtime
    }

    fn process_bar(&mut self, bar: &Bar) {
        if !self.runtime.ingest(bar) || !self.runtime.has_history(TREND_WARMUP_BARS) {
            return;
        }

        let long = self.runtime.bullish_signal(Indicator::Hma);
        let short = self.runtime.bearish_signal(Indicator::Hma);
        let position = self.runtime.position();
        let price = bar.close;

        if long && position.quantity <= 0.0 {
            if position.is_short() {
                self.runtime.close_position(price, "trend_close_short");
            }
            self.runtime.open_position(Side::Buy, price, "trend_long");
        } else if short && position.quantity >= 0.0 {
            if position.is_long() {
                self.runtime.close_position(price, "trend_close_long");
            }
            self.runtime.open_position(Side::Sell, price, "trend_short");
        } else if !position.is_flat() {
            if !self.runtime.apply_trailing_stop(price) {
                self.runtime.manage_take_profit(price);
            }
        } else {
            debug!(symbol = %self.runtime.symbol(), price, "no trend signal");
        }
    }
}
