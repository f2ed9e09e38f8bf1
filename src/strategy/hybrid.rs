//! Trend-then-mean-reversion strategy
//!
//! ```text
//!   Idle ──signal──▶ Trend ──3 flat bars──▶ Revert ──contrarian exit──▶ Idle
//!                     │  ▲                    │  ▲
//!                     └──┘ reinforced         └──┘ scanning / holding
//! ```
//!
//! The transition logic lives in [`FsmState::step`], a pure function of the
//! current state and the bar's observations. [`TrendReversionFsm`] gathers
//! those observations, applies the returned [`FsmAction`] through the
//! runtime and commits the new state only when the action took effect.

use std::sync::Arc;

use tracing::{debug, info};

use crate::common::errors::Result;
use crate::common::traits::{BoxedIndicatorSuite, Executor, MetricsRecorder};
use crate::common::types::{Bar, Indicator, Position, Side};
use crate::config::StrategyConfig;
use crate::strategy::runtime::StrategyRuntime;
use crate::strategy::traits::Strategy;

/// Bars required before the FSM leaves Idle
pub const FSM_WARMUP_BARS: usize = 12;

/// Consecutive unconfirmed bars after which a trend is considered exhausted
pub const FLAT_BAR_THRESHOLD: u32 = 3;

/// Momentum tolerance as a fraction of the previous close
const MOMENTUM_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FsmState {
    /// Flat, scanning for a fresh trend signal
    #[default]
    Idle,
    /// Riding a directional position
    Trend { side: Side, flat_bars: u32 },
    /// Trend closed; scanning for, or holding, a contrarian position
    Revert { prior_trend: Side, entered: bool },
}

impl std::fmt::Display for FsmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FsmState::Idle => write!(f, "idle"),
            FsmState::Trend { side, flat_bars } => write!(f, "trend({}, flat={})", side, flat_bars),
            FsmState::Revert { prior_trend, entered } => {
                write!(f, "revert(after {}, entered={})", prior_trend, entered)
            }
        }
    }
}

/// Everything the FSM observes on one bar
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FsmInput {
    /// Bullish entry signal (crossover or its fallback)
    pub bullish: bool,
    /// Bearish entry signal (crossover or its fallback)
    pub bearish: bool,
    /// The indicator itself reported a bullish crossover
    pub confirmed_up: bool,
    /// The indicator itself reported a bearish crossover
    pub confirmed_down: bool,
    /// Last close minus previous close
    pub momentum: f64,
    /// Minimum |momentum| that counts as movement
    pub tolerance: f64,
    /// RSI and MFI both at or above their overbought thresholds
    pub overbought: bool,
    /// RSI and MFI both at or below their oversold thresholds
    pub oversold: bool,
    /// Position reported by the executor before acting
    pub position: Position,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmAction {
    Hold,
    Open(Side),
    Close,
    /// Run stop loss, take profit and trailing stop on the held position
    ManageExit,
}

impl FsmState {
    /// Next state and the action that must succeed for it to be committed
    pub fn step(self, input: &FsmInput) -> (FsmState, FsmAction) {
        let flat = input.position.is_flat();
        match self {
            FsmState::Idle => {
                if !flat {
                    // Never hold while idle
                    (FsmState::Idle, FsmAction::Close)
                } else if input.bullish {
                    (Self::fresh_trend(Side::Buy), FsmAction::Open(Side::Buy))
                } else if input.bearish {
                    (Self::fresh_trend(Side::Sell), FsmAction::Open(Side::Sell))
                } else {
                    (FsmState::Idle, FsmAction::Hold)
                }
            }
            FsmState::Trend { side, flat_bars } => {
                let revert = FsmState::Revert {
                    prior_trend: side,
                    entered: false,
                };
                if flat {
                    return (revert, FsmAction::Hold);
                }
                if input.reinforces(side) {
                    return (Self::fresh_trend(side), FsmAction::Hold);
                }
                let flat_bars = flat_bars + 1;
                if flat_bars >= FLAT_BAR_THRESHOLD {
                    (revert, FsmAction::Close)
                } else {
                    (FsmState::Trend { side, flat_bars }, FsmAction::Hold)
                }
            }
            FsmState::Revert { prior_trend, entered } => {
                let holding = FsmState::Revert {
                    prior_trend,
                    entered: true,
                };
                if !flat {
                    return (holding, FsmAction::ManageExit);
                }
                if entered {
                    return (FsmState::Idle, FsmAction::Hold);
                }
                match input.contrarian_entry(prior_trend) {
                    Some(side) => (holding, FsmAction::Open(side)),
                    None => (self, FsmAction::Hold),
                }
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, FsmState::Idle)
    }

    fn fresh_trend(side: Side) -> Self {
        FsmState::Trend { side, flat_bars: 0 }
    }
}

impl FsmInput {
    fn reinforces(&self, side: Side) -> bool {
        match side {
            Side::Buy => self.momentum > self.tolerance || self.confirmed_up,
            Side::Sell => self.momentum < -self.tolerance || self.confirmed_down,
        }
    }

    fn contrarian_entry(&self, prior_trend: Side) -> Option<Side> {
        let exhausted = match prior_trend {
            Side::Buy => self.overbought && self.momentum < -self.tolerance,
            Side::Sell => self.oversold && self.momentum > self.tolerance,
        };
        exhausted.then(|| prior_trend.opposite())
    }
}

/// Hybrid strategy: follow a trend, then fade its exhaustion
pub struct TrendReversionFsm {
    runtime: StrategyRuntime,
    state: FsmState,
}

impl TrendReversionFsm {
    pub fn new(
        symbol: impl Into<String>,
        config: StrategyConfig,
        executor: Arc<dyn Executor>,
        suite: BoxedIndicatorSuite,
    ) -> Result<Self> {
        Ok(Self {
            runtime: StrategyRuntime::new(symbol, config, executor, suite)?,
            state: FsmState::Idle,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.runtime = self.runtime.with_metrics(metrics);
        self
    }

    pub fn state(&self) -> FsmState {
        self.state
    }

    fn observe(&self) -> FsmInput {
        let rt = &self.runtime;
        let config = rt.config();
        let suite = rt.suite();

        let oscillators = match (
            suite.calculate(Indicator::Rsi),
            suite.calculate(Indicator::Mfi),
        ) {
            (Ok(rsi), Ok(mfi)) => Some((rsi, mfi)),
            (Err(e), _) | (_, Err(e)) => {
                debug!(symbol = %rt.symbol(), error = %e, "oscillators unavailable");
                None
            }
        };

        FsmInput {
            bullish: rt.bullish_signal(Indicator::Hma),
            bearish: rt.bearish_signal(Indicator::Hma),
            confirmed_up: suite.is_bullish_crossover(Indicator::Hma).unwrap_or(false),
            confirmed_down: suite.is_bearish_crossover(Indicator::Hma).unwrap_or(false),
            momentum: rt.momentum(),
            tolerance: (rt.prices().prev() * MOMENTUM_TOLERANCE).abs(),
            overbought: oscillators.map_or(false, |(rsi, mfi)| {
                rsi >= config.rsi_overbought && mfi >= config.mfi_overbought
            }),
            oversold: oscillators.map_or(false, |(rsi, mfi)| {
                rsi <= config.rsi_oversold && mfi <= config.mfi_oversold
            }),
            position: rt.position(),
        }
    }

    /// Apply an action; true if it took effect
    fn apply(&self, action: FsmAction, price: f64) -> bool {
        match action {
            FsmAction::Hold => true,
            FsmAction::Open(side) => {
                let tag = match (self.state, side) {
                    (FsmState::Idle, Side::Buy) => "fsm_trend_long",
                    (FsmState::Idle, Side::Sell) => "fsm_trend_short",
                    (_, Side::Buy) => "fsm_revert_long",
                    (_, Side::Sell) => "fsm_revert_short",
                };
                self.runtime.open_position(side, price, tag);
                // A dropped order leaves the executor flat
                !self.runtime.position().is_flat()
            }
            FsmAction::Close => {
                let tag = if self.state.is_idle() {
                    "fsm_orphan_close"
                } else {
                    "fsm_trend_exit"
                };
                self.runtime.close_position(price, tag)
            }
            FsmAction::ManageExit => {
                self.runtime.manage_open_position(price);
                true
            }
        }
    }
}

impl Strategy for TrendReversionFsm {
    fn name(&self) -> &str {
        "trend_reversion_fsm"
    }

    fn runtime(&self) -> &StrategyRuntime {
        &self.runtime
    }

    fn process_bar(&mut self, bar: &Bar) {
        if !self.runtime.ingest(bar) || !self.runtime.has_history(FSM_WARMUP_BARS) {
            return;
        }

        let input = self.observe();
        let (next, action) = self.state.step(&input);

        if !self.apply(action, bar.close) {
            debug!(
                symbol = %self.runtime.symbol(),
                state = %self.state,
                ?action,
                "action had no effect, state kept"
            );
            return;
        }
        if next != self.state {
            info!(
                symbol = %self.runtime.symbol(),
                from = %self.state,
                to = %next,
                price = bar.close,
                "fsm_transition"
            );
        }
        self.state = next;
    }
}
