//! Strategy module: per-bar trade decisions
//!
//! This module provides the shared runtime and the concrete strategies built
//! on top of it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 SINGLE SYMBOL (sync, &mut self)             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Bar arrives                                                │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  StrategyRuntime.ingest()  → IndicatorSuite + PriceBuffer   │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  Strategy.process_bar()    → signals / FSM step             │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  StrategyRuntime           → calc_qty → Executor.submit     │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │              MULTI SYMBOL (&self, one Mutex)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CapitalRotationScheduler.process_bar(symbol, bar)          │
//! │    - Updates the symbol's strength score                    │
//! │    - Every interval_bars × |universe| bars: rebalance top-K │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`PriceBuffer`]: Rolling closes with trend, slope and volatility
//! - [`calc_qty`]: Risk-bounded, broker-quantized order size
//! - [`StrategyRuntime`]: Order lifecycle shared by every strategy
//! - [`Strategy`]: Trait for single-symbol strategies
//! - [`TrendFollower`]: HMA crossover trend follower
//! - [`TrendReversionFsm`]: Trend-then-mean-reversion state machine
//! - [`CapitalRotationScheduler`]: Top-K rotation across a universe

mod hybrid;
mod momentum;
mod price_buffer;
mod rotation;
mod runtime;
mod size_calculator;
mod traits;

pub use hybrid::{FsmAction, FsmInput, FsmState, TrendReversionFsm, FLAT_BAR_THRESHOLD, FSM_WARMUP_BARS};
pub use momentum::{TrendFollower, TREND_WARMUP_BARS};
pub use price_buffer::{PriceBuffer, DEFAULT_CAPACITY};
pub use rotation::{composite_score, heuristic_score, CapitalRotationScheduler};
pub use runtime::StrategyRuntime;
pub use size_calculator::{calc_qty, QuantityConstraints};
pub use traits::{BoxedStrategy, Strategy};
