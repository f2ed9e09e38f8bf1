//! Strategy Runtime Library
//!
//! Per-bar decision runtime for algorithmic trading: rolling price
//! statistics, risk-bounded sizing, position lifecycle management and
//! top-K capital rotation, driven against pluggable executor and
//! indicator collaborators.

pub mod common;
pub mod config;
pub mod execution;
pub mod strategy;

// Re-export commonly used types
pub use common::errors::{ExecutionError, IndicatorError, Result, StrategyError};
pub use common::indicators::DetachedSuite;
pub use common::metrics::{InMemoryMetrics, NoopMetrics};
pub use common::traits::{BoxedIndicatorSuite, Executor, IndicatorSuite, MetricsRecorder};
pub use common::types::{Bar, Divergence, Indicator, Order, Position, Side};
pub use crate::config::types::{AppConfig, RotationConfig, StrategyConfig};
pub use execution::PaperExecutor;

// Strategy types
pub use strategy::{
    calc_qty, BoxedStrategy, CapitalRotationScheduler, FsmState, PriceBuffer,
    QuantityConstraints, Strategy, StrategyRuntime, TrendFollower, TrendReversionFsm,
};
