//! Core value types shared by every strategy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The other side of the book
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Side of the order that flattens a position of the given signed quantity.
    ///
    /// Positive (long) positions are closed by selling, negative (short)
    /// positions by buying.
    pub fn closing(quantity: f64) -> Self {
        if quantity < 0.0 {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    /// +1 for buys, -1 for sells
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A single OHLCV sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Bar close time, when the feed provides one
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Instrument the bar belongs to (replay input only)
    #[serde(default)]
    pub symbol: Option<String>,
}

impl Bar {
    /// Create a bar without timestamp or symbol
    pub fn new(high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            high,
            low,
            close,
            volume,
            timestamp: None,
            symbol: None,
        }
    }

    /// Bar whose high/low sit `half_range` around the close
    pub fn around(close: f64, half_range: f64, volume: f64) -> Self {
        Self::new(close + half_range, close - half_range, close, volume)
    }

    /// High minus low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// An order built by the runtime and handed to the executor
///
/// Quantity is always positive; direction is carried by `side`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    /// Limit/reference price
    pub price: f64,
    /// Free-text reason tag
    pub reason: String,
}

impl Order {
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        quantity: f64,
        price: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            price,
            reason: reason.into(),
        }
    }

    /// Notional value of the order
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }
}

/// Current position in a symbol, as reported by the executor
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Positive = long, negative = short
    pub quantity: f64,
    /// Volume-weighted average entry price
    pub avg_price: f64,
}

impl Position {
    pub fn new(quantity: f64, avg_price: f64) -> Self {
        Self {
            quantity,
            avg_price,
        }
    }

    pub fn flat() -> Self {
        Self::default()
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0.0
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }
}

/// Indicators exposed by an indicator suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    /// Relative strength index
    Rsi,
    /// Money flow index
    Mfi,
    /// Hull moving average
    Hma,
    /// Volume-weighted aroon oscillator
    Vwao,
    /// Adaptive trend strength oscillator
    Atso,
    /// Adaptive momentum divergence oscillator
    Amdo,
}

impl std::fmt::Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Indicator::Rsi => "RSI",
            Indicator::Mfi => "MFI",
            Indicator::Hma => "HMA",
            Indicator::Vwao => "VWAO",
            Indicator::Atso => "ATSO",
            Indicator::Amdo => "AMDO",
        };
        write!(f, "{}", name)
    }
}

/// Price/oscillator divergence reported by some indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Divergence {
    Bullish,
    Bearish,
}
