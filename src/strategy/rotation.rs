//! Capital rotation across a symbol universe
//!
//! Every bar updates one symbol's strength score. Once per evaluation cycle
//! (`interval_bars` bars per symbol) the universe is re-ranked: positions
//! outside the top-K are closed and flat top-K symbols are opened with an
//! equal share of the per-trade risk budget.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::common::errors::{Result, StrategyError};
use crate::common::metrics::NoopMetrics;
use crate::common::traits::{BoxedIndicatorSuite, Executor, MetricsRecorder};
use crate::common::types::{Bar, Indicator, Order, Side};
use crate::config::{RotationConfig, StrategyConfig};
use crate::strategy::runtime::StrategyRuntime;
use crate::strategy::size_calculator::calc_qty;

const RSI_WEIGHT: f64 = 0.35;
const MFI_WEIGHT: f64 = 0.35;
const ATSO_WEIGHT: f64 = 0.30;
/// |ATSO| at or above this counts as full strength
const ATSO_CAP: f64 = 3.0;

const RANGE_WEIGHT: f64 = 0.5;
const MOMENTUM_WEIGHT: f64 = 0.3;
const VOLUME_WEIGHT: f64 = 0.2;
/// Intraday range (as a fraction of close) that counts as full strength
const RANGE_SCALE: f64 = 0.2;
/// Single-bar return that counts as full strength
const MOMENTUM_SCALE: f64 = 0.05;

struct SymbolState {
    runtime: StrategyRuntime,
    score: f64,
    last_bar: Option<Bar>,
    prev_close: Option<f64>,
    prev_volume: Option<f64>,
}

impl SymbolState {
    fn last_close(&self) -> Option<f64> {
        self.last_bar.as_ref().map(|b| b.close)
    }
}

struct SchedulerState {
    symbols: HashMap<String, SymbolState>,
    bars: u64,
}

/// Top-K capital rotation scheduler
///
/// `process_bar` takes `&self` and may be called from several threads; the
/// symbol map, the bar counter and the rebalance pass all sit behind a
/// single lock, and the executor is only called while it is held.
pub struct CapitalRotationScheduler {
    universe: Vec<String>,
    config: StrategyConfig,
    rotation: RotationConfig,
    executor: Arc<dyn Executor>,
    metrics: Arc<dyn MetricsRecorder>,
    state: Mutex<SchedulerState>,
}

impl CapitalRotationScheduler {
    /// Validate parameters and build one runtime per universe member
    ///
    /// `suite_factory` is called once per symbol, in universe order.
    pub fn new<F>(
        config: StrategyConfig,
        rotation: RotationConfig,
        executor: Arc<dyn Executor>,
        suite_factory: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Result<BoxedIndicatorSuite>,
    {
        Self::with_metrics(config, rotation, executor, suite_factory, Arc::new(NoopMetrics))
    }

    /// Same as [`new`](Self::new), recording order and rebalance metrics
    pub fn with_metrics<F>(
        config: StrategyConfig,
        rotation: RotationConfig,
        executor: Arc<dyn Executor>,
        suite_factory: F,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Result<BoxedIndicatorSuite>,
    {
        config.validate()?;
        rotation.validate()?;

        let mut symbols = HashMap::with_capacity(rotation.symbols.len());
        for symbol in &rotation.symbols {
            let runtime = StrategyRuntime::new(
                symbol.clone(),
                config.clone(),
                executor.clone(),
                suite_factory(symbol)?,
            )?
            .with_metrics(metrics.clone());
            symbols.insert(
                symbol.clone(),
                SymbolState {
                    runtime,
                    score: 0.0,
                    last_bar: None,
                    prev_close: None,
                    prev_volume: None,
                },
            );
        }

        info!(
            universe = rotation.symbols.len(),
            top_k = rotation.top_k,
            interval_bars = rotation.interval_bars,
            "rotation scheduler ready"
        );

        Ok(Self {
            universe: rotation.symbols.clone(),
            config,
            rotation,
            executor,
            metrics,
            state: Mutex::new(SchedulerState { symbols, bars: 0 }),
        })
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    /// Record a bar for `symbol`, rebalancing at the end of each cycle
    ///
    /// Bars for symbols outside the universe, or rejected by the symbol's
    /// indicator suite, are logged and do not count towards the cycle.
    pub fn process_bar(&self, symbol: &str, bar: &Bar) {
        if let Err(e) = self.try_process_bar(symbol, bar) {
            warn!(symbol, error = %e, "rotation bar ignored");
        }
    }

    /// Like [`process_bar`](Self::process_bar), but reports a symbol outside
    /// the universe as [`StrategyError::UnknownSymbol`]
    pub fn try_process_bar(&self, symbol: &str, bar: &Bar) -> Result<()> {
        let mut state = self.lock();

        let Some(entry) = state.symbols.get_mut(symbol) else {
            return Err(StrategyError::UnknownSymbol(symbol.to_string()));
        };
        if !entry.runtime.ingest(bar) {
            return Ok(());
        }
        entry.prev_close = entry.last_close();
        entry.prev_volume = entry.last_bar.as_ref().map(|b| b.volume);
        entry.last_bar = Some(bar.clone());
        let score = self.score(entry);
        entry.score = score;
        debug!(symbol, score, "strength updated");

        state.bars += 1;
        let cycle = (self.rotation.interval_bars * self.universe.len()) as u64;
        if state.bars % cycle == 0 {
            self.rebalance(&state);
        }
        Ok(())
    }

    /// Latest strength score per symbol, in universe order
    pub fn scores(&self) -> Vec<(String, f64)> {
        let state = self.lock();
        self.universe
            .iter()
            .map(|s| (s.clone(), state.symbols.get(s).map_or(0.0, |e| e.score)))
            .collect()
    }

    /// Bars accepted since construction
    pub fn bars_processed(&self) -> u64 {
        self.lock().bars
    }

    /// Universe members the executor reports a non-zero position for
    pub fn held_positions(&self) -> Vec<String> {
        let _state = self.lock();
        self.universe
            .iter()
            .filter(|s| !self.executor.position(s).is_flat())
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn score(&self, entry: &SymbolState) -> f64 {
        let suite = entry.runtime.suite();
        let score = match (
            suite.calculate(Indicator::Rsi),
            suite.calculate(Indicator::Mfi),
            suite.calculate(Indicator::Atso),
        ) {
            (Ok(rsi), Ok(mfi), Ok(atso)) => composite_score(rsi, mfi, atso, &self.config),
            _ => match &entry.last_bar {
                Some(bar) => heuristic_score(bar, entry.prev_close, entry.prev_volume),
                None => 0.0,
            },
        };
        if score.is_finite() {
            score
        } else {
            0.0
        }
    }

    /// Symbols to hold after this cycle, strongest first
    fn targets(&self, state: &SchedulerState) -> Vec<String> {
        let mut ranked: Vec<(usize, &String, f64)> = self
            .universe
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s, state.symbols.get(s).map_or(0.0, |e| e.score)))
            .collect();
        ranked.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked
            .into_iter()
            .filter(|(_, _, score)| *score > self.rotation.min_strength)
            .take(self.rotation.top_k)
            .map(|(_, s, _)| s.clone())
            .collect()
    }

    fn rebalance(&self, state: &SchedulerState) {
        let targets = self.targets(state);
        let target_set: HashSet<&str> = targets.iter().map(String::as_str).collect();

        for symbol in &self.universe {
            if target_set.contains(symbol.as_str()) {
                continue;
            }
            let Some(entry) = state.symbols.get(symbol) else {
                continue;
            };
            let position = entry.runtime.position();
            if position.is_flat() {
                continue;
            }
            let price = entry.last_close().unwrap_or(position.avg_price);
            if !entry.runtime.close_position(price, "rotation_exit") {
                warn!(symbol = %symbol, "rotation exit did not flatten position");
            }
        }

        // Failed exits still occupy a slot
        let mut free_slots = self
            .rotation
            .top_k
            .saturating_sub(self.held_count());
        let equity = self.executor.equity();
        let risk = self.config.max_risk_per_trade / self.rotation.top_k as f64;
        let constraints = self.config.constraints();

        for symbol in &targets {
            let Some(entry) = state.symbols.get(symbol) else {
                continue;
            };
            let Some(price) = entry.last_close() else {
                continue;
            };
            if !entry.runtime.position().is_flat() {
                continue;
            }
            if free_slots == 0 {
                debug!(symbol = %symbol, "no free rotation slot, entry skipped");
                continue;
            }
            let qty = calc_qty(equity, risk, self.config.stop_loss_pct, price, &constraints);
            if qty <= 0.0 {
                debug!(symbol = %symbol, price, "rotation entry sized to zero, skipped");
                continue;
            }
            let side = self.entry_side(entry, price);
            let order = Order::new(symbol.clone(), side, qty, price, "rotation_entry");
            // Failure is logged by the runtime
            if entry.runtime.submit_order(order, "rotation_entry").is_ok()
                && !entry.runtime.position().is_flat()
            {
                free_slots -= 1;
            }
        }

        let held = self.held_count();
        self.metrics.rebalanced(held);
        info!(
            bars = state.bars,
            targets = ?targets,
            held,
            "rotation_rebalanced"
        );
    }

    fn held_count(&self) -> usize {
        self.universe
            .iter()
            .filter(|s| !self.executor.position(s).is_flat())
            .count()
    }

    /// ATSO sign, else direction of the last bar; ties go long
    fn entry_side(&self, entry: &SymbolState, price: f64) -> Side {
        match entry.runtime.suite().calculate(Indicator::Atso) {
            Ok(atso) if atso.is_finite() && atso != 0.0 => {
                if atso > 0.0 {
                    Side::Buy
                } else {
                    Side::Sell
                }
            }
            _ => match entry.prev_close {
                Some(prev) if price < prev => Side::Sell,
                _ => Side::Buy,
            },
        }
    }
}

/// Weighted blend of normalized RSI, MFI and |ATSO|, in [0, 1]
pub fn composite_score(rsi: f64, mfi: f64, atso: f64, config: &StrategyConfig) -> f64 {
    let rsi_norm = normalize(rsi, config.rsi_oversold, config.rsi_overbought);
    let mfi_norm = normalize(mfi, config.mfi_oversold, config.mfi_overbought);
    let atso_norm = atso.abs().min(ATSO_CAP) / ATSO_CAP;
    RSI_WEIGHT * rsi_norm + MFI_WEIGHT * mfi_norm + ATSO_WEIGHT * atso_norm
}

/// Indicator-free strength from range, single-bar momentum and volume growth
///
/// A missing previous close or volume contributes nothing.
pub fn heuristic_score(bar: &Bar, prev_close: Option<f64>, prev_volume: Option<f64>) -> f64 {
    if !(bar.close > 0.0) {
        return 0.0;
    }
    let range = (bar.range() / bar.close / RANGE_SCALE).clamp(0.0, 1.0);
    let momentum = match prev_close {
        Some(prev) if prev > 0.0 => ((bar.close / prev - 1.0).abs() / MOMENTUM_SCALE).min(1.0),
        _ => 0.0,
    };
    let volume = match prev_volume {
        Some(prev) if prev > 0.0 => (bar.volume / prev - 1.0).clamp(0.0, 1.0),
        _ => 0.0,
    };
    RANGE_WEIGHT * range + MOMENTUM_WEIGHT * momentum + VOLUME_WEIGHT * volume
}

fn normalize(value: f64, low: f64, high: f64) -> f64 {
    let span = high - low;
    if span == 0.0 || !span.is_finite() {
        return 0.0;
    }
    ((value - low) / span).clamp(0.0, 1.0)
}
