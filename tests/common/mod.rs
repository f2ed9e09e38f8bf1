//! Common test utilities and fixtures

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use strategy_runtime::{
    Bar, ExecutionError, Executor, Indicator, IndicatorError, IndicatorSuite, Order, Position,
    StrategyConfig,
};

/// Default config with take-profit and trailing stop disabled
pub fn base_config() -> StrategyConfig {
    StrategyConfig {
        rsi_overbought: 70.0,
        rsi_oversold: 30.0,
        mfi_overbought: 80.0,
        mfi_oversold: 20.0,
        hma_period: 9,
        atso_ema_period: 5,
        max_risk_per_trade: 0.01,
        stop_loss_pct: 0.015,
        take_profit_pct: 0.0,
        trailing_pct: 0.0,
        quantity_precision: 2,
        min_qty: 0.001,
        step_size: 0.0001,
        ..StrategyConfig::default()
    }
}

/// Oscillator thresholds so wide the overbought/oversold checks never pass
pub fn unreachable_thresholds() -> StrategyConfig {
    StrategyConfig {
        rsi_overbought: 1e9,
        rsi_oversold: -1e9,
        mfi_overbought: 1e9,
        mfi_oversold: -1e9,
        ..base_config()
    }
}

/// Bar with high/low `half_range` around `close`
pub fn bar(close: f64, half_range: f64, volume: f64) -> Bar {
    Bar::around(close, half_range, volume)
}

/// Closes 101, 102, ... 100 + n with a one-dollar range
pub fn rising(n: usize) -> Vec<Bar> {
    (1..=n).map(|i| bar(100.0 + i as f64, 0.5, 1000.0)).collect()
}

/// `n` closes falling one dollar per bar from `start - 1`
pub fn falling_from(start: f64, n: usize) -> Vec<Bar> {
    (1..=n).map(|i| bar(start - i as f64, 0.5, 1000.0)).collect()
}

/// `n` identical bars at `close`
pub fn flat(close: f64, n: usize) -> Vec<Bar> {
    (0..n).map(|_| bar(close, 0.2, 900.0)).collect()
}

/// Shared, mutable indicator values for a [`ScriptedSuite`]
#[derive(Debug, Clone, Default)]
pub struct Script(Arc<Mutex<HashMap<Indicator, f64>>>);

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, indicator: Indicator, value: f64) {
        self.0.lock().unwrap().insert(indicator, value);
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    fn get(&self, indicator: Indicator) -> Option<f64> {
        self.0.lock().unwrap().get(&indicator).copied()
    }
}

/// Indicator suite whose values are set by the test
///
/// Crossovers are never available, so signals come from the price-buffer
/// fallbacks; `calculate` returns whatever the script holds.
#[derive(Debug, Default)]
pub struct ScriptedSuite {
    script: Script,
    bars: usize,
}

impl ScriptedSuite {
    pub fn new(script: Script) -> Self {
        Self { script, bars: 0 }
    }

    fn missing(&self, indicator: Indicator) -> IndicatorError {
        IndicatorError::InsufficientHistory {
            indicator,
            available: self.bars,
            needed: self.bars + 1,
        }
    }
}

impl IndicatorSuite for ScriptedSuite {
    fn add(&mut self, _bar: &Bar) -> Result<(), IndicatorError> {
        self.bars += 1;
        Ok(())
    }

    fn is_bullish_crossover(&self, indicator: Indicator) -> Result<bool, IndicatorError> {
        Err(self.missing(indicator))
    }

    fn is_bearish_crossover(&self, indicator: Indicator) -> Result<bool, IndicatorError> {
        Err(self.missing(indicator))
    }

    fn calculate(&self, indicator: Indicator) -> Result<f64, IndicatorError> {
        self.script
            .get(indicator)
            .ok_or_else(|| self.missing(indicator))
    }
}

/// Executor that accepts every order but never fills it
#[derive(Debug, Default)]
pub struct BlackHoleExecutor {
    submitted: Mutex<Vec<Order>>,
}

impl BlackHoleExecutor {
    pub fn submitted(&self) -> Vec<Order> {
        self.submitted.lock().unwrap().clone()
    }
}

impl Executor for BlackHoleExecutor {
    fn submit(&self, order: &Order) -> Result<(), ExecutionError> {
        self.submitted.lock().unwrap().push(order.clone());
        Ok(())
    }

    fn equity(&self) -> f64 {
        10_000.0
    }

    fn position(&self, _symbol: &str) -> Position {
        Position::flat()
    }
}

/// Deterministic pseudo-random walk of closes around 100
pub fn random_walk(seed: u64, n: usize) -> Vec<Bar> {
    let mut state = seed;
    let mut close = 100.0;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let step = ((state >> 33) % 7) as f64 - 3.0;
            close = (close + step * 0.5).max(50.0);
            bar(close, 0.5 + ((state >> 40) % 4) as f64, 1000.0)
        })
        .collect()
}
