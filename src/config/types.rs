//! Configuration types

use serde::{Deserialize, Serialize};

use crate::common::errors::{Result, StrategyError};
use crate::strategy::QuantityConstraints;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Risk and threshold parameters shared by every strategy
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Capital rotation parameters (only needed in rotation mode)
    #[serde(default)]
    pub rotation: Option<RotationConfig>,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// Risk and threshold parameters for a strategy
///
/// Constructed once and validated before any strategy is built; never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub mfi_overbought: f64,
    pub mfi_oversold: f64,
    pub vwao_strong_trend: f64,
    pub hma_period: i64,
    pub amdo_overbought: f64,
    pub amdo_oversold: f64,
    pub atso_ema_period: i64,

    /// Fraction of equity risked per trade, e.g. 0.01 = 1 %
    pub max_risk_per_trade: f64,
    /// Stop-loss distance as a fraction of price, e.g. 0.015 = 1.5 %
    pub stop_loss_pct: f64,
    /// Take-profit as a multiple of volatility (ATR-multiple), 0 = disabled
    pub take_profit_pct: f64,
    /// Trailing-stop distance as a fraction of the average price, 0 = disabled
    pub trailing_pct: f64,

    /// Decimal places quantities are floored to (2 for crypto/futures, 0 for equities)
    pub quantity_precision: i32,
    /// Smallest order size the broker accepts
    pub min_qty: f64,
    /// Quantity increment the exchange allows
    pub step_size: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            mfi_overbought: 80.0,
            mfi_oversold: 20.0,
            vwao_strong_trend: 70.0,
            hma_period: 9,
            amdo_overbought: 1.0,
            amdo_oversold: -1.0,
            atso_ema_period: 5,
            max_risk_per_trade: 0.01,
            stop_loss_pct: 0.015,
            take_profit_pct: 0.0,
            trailing_pct: 0.0,
            quantity_precision: 2,
            min_qty: 0.001,
            step_size: 0.0001,
        }
    }
}

impl StrategyConfig {
    /// Check every numeric field against its documented bounds
    ///
    /// Returns the first problem found. Overbought/oversold pairs only have
    /// to differ: inverted thresholds are allowed so a test harness can make
    /// the value checks always pass.
    pub fn validate(&self) -> Result<()> {
        let floats = [
            ("rsi_overbought", self.rsi_overbought),
            ("rsi_oversold", self.rsi_oversold),
            ("mfi_overbought", self.mfi_overbought),
            ("mfi_oversold", self.mfi_oversold),
            ("vwao_strong_trend", self.vwao_strong_trend),
            ("amdo_overbought", self.amdo_overbought),
            ("amdo_oversold", self.amdo_oversold),
            ("max_risk_per_trade", self.max_risk_per_trade),
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
            ("trailing_pct", self.trailing_pct),
            ("min_qty", self.min_qty),
            ("step_size", self.step_size),
        ];
        if let Some((name, value)) = floats.iter().find(|(_, v)| !v.is_finite()) {
            return Err(invalid(format!("{} must be finite, got {}", name, value)));
        }

        if self.rsi_overbought == self.rsi_oversold {
            return Err(invalid("rsi_overbought and rsi_oversold cannot be equal"));
        }
        if self.mfi_overbought == self.mfi_oversold {
            return Err(invalid("mfi_overbought and mfi_oversold cannot be equal"));
        }
        if self.hma_period <= 0 {
            return Err(invalid("hma_period must be positive"));
        }
        if self.atso_ema_period <= 0 {
            return Err(invalid("atso_ema_period must be positive"));
        }
        if self.max_risk_per_trade <= 0.0 || self.max_risk_per_trade > 0.5 {
            return Err(invalid(format!(
                "max_risk_per_trade ({}) must be >0 and <=0.5",
                self.max_risk_per_trade
            )));
        }
        if self.stop_loss_pct <= 0.0 || self.stop_loss_pct > 0.2 {
            return Err(invalid(format!(
                "stop_loss_pct ({}) must be >0 and <=0.2",
                self.stop_loss_pct
            )));
        }
        if self.take_profit_pct < 0.0 || self.take_profit_pct > 5.0 {
            return Err(invalid(format!(
                "take_profit_pct ({}) must be between 0 and 5",
                self.take_profit_pct
            )));
        }
        if self.trailing_pct < 0.0 || self.trailing_pct > 1.0 {
            return Err(invalid(format!(
                "trailing_pct ({}) must be between 0 and 1",
                self.trailing_pct
            )));
        }
        if self.quantity_precision < 0 {
            return Err(invalid("quantity_precision cannot be negative"));
        }
        if self.min_qty < 0.0 {
            return Err(invalid("min_qty cannot be negative"));
        }
        if self.step_size <= 0.0 {
            return Err(invalid("step_size must be positive"));
        }
        Ok(())
    }

    /// Broker quantity constraints used by the sizer
    pub fn constraints(&self) -> QuantityConstraints {
        QuantityConstraints {
            step_size: self.step_size,
            quantity_precision: self.quantity_precision,
            min_qty: self.min_qty,
        }
    }
}

/// Capital rotation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Universe of symbols to rank
    pub symbols: Vec<String>,
    /// Number of symbols held after each rebalance
    pub top_k: usize,
    /// Bars per symbol between rebalances
    #[serde(default = "default_interval_bars")]
    pub interval_bars: usize,
    /// Scores at or below this are treated as ranking noise
    #[serde(default = "default_min_strength")]
    pub min_strength: f64,
}

impl RotationConfig {
    pub fn new(symbols: Vec<String>, top_k: usize, interval_bars: usize) -> Self {
        Self {
            symbols,
            top_k,
            interval_bars,
            min_strength: default_min_strength(),
        }
    }

    pub fn with_min_strength(mut self, min_strength: f64) -> Self {
        self.min_strength = min_strength;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(invalid("rotation universe cannot be empty"));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.symbols.iter().find(|s| !seen.insert(s.as_str())) {
            return Err(invalid(format!("duplicate symbol {} in universe", dup)));
        }
        if self.top_k == 0 || self.top_k > self.symbols.len() {
            return Err(invalid(format!(
                "top_k ({}) must be between 1 and the universe size ({})",
                self.top_k,
                self.symbols.len()
            )));
        }
        if self.interval_bars == 0 {
            return Err(invalid("interval_bars must be positive"));
        }
        if !self.min_strength.is_finite() || !(0.0..1.0).contains(&self.min_strength) {
            return Err(invalid(format!(
                "min_strength ({}) must be in [0, 1)",
                self.min_strength
            )));
        }
        Ok(())
    }
}

fn default_interval_bars() -> usize {
    1
}

fn default_min_strength() -> f64 {
    0.1
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,
    /// Cash the paper executor starts with
    #[serde(default = "default_starting_equity")]
    pub starting_equity: f64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            starting_equity: default_starting_equity(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_starting_equity() -> f64 {
    10_000.0
}

fn invalid(msg: impl Into<String>) -> StrategyError {
    StrategyError::Configuration(msg.into())
}
