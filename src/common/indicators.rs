//! Indicator suite used when no indicator library is attached

use super::errors::IndicatorError;
use super::traits::IndicatorSuite;
use super::types::{Bar, Indicator};

/// Suite that accepts bars but never produces a value
///
/// Every query reports insufficient history, so strategies running on it
/// act purely on their price-buffer fallbacks. Bars with non-finite prices
/// or negative volume are rejected like a real suite would.
#[derive(Debug, Clone, Default)]
pub struct DetachedSuite {
    bars: usize,
}

impl DetachedSuite {
    pub fn new() -> Self {
        Self::default()
    }

    fn unavailable(&self, indicator: Indicator) -> IndicatorError {
        IndicatorError::InsufficientHistory {
            indicator,
            available: self.bars,
            needed: usize::MAX,
        }
    }
}

impl IndicatorSuite for DetachedSuite {
    fn add(&mut self, bar: &Bar) -> Result<(), IndicatorError> {
        let prices = [bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(IndicatorError::InvalidInput(format!(
                "non-finite price in bar {:?}",
                bar
            )));
        }
        if bar.volume < 0.0 || !bar.volume.is_finite() {
            return Err(IndicatorError::InvalidInput(format!(
                "invalid volume {}",
                bar.volume
            )));
        }
        self.bars += 1;
        Ok(())
    }

    fn is_bullish_crossover(&self, indicator: Indicator) -> Result<bool, IndicatorError> {
        Err(self.unavailable(indicator))
    }

    fn is_bearish_crossover(&self, indicator: Indicator) -> Result<bool, IndicatorError> {
        Err(self.unavailable(indicator))
    }

    fn calculate(&self, indicator: Indicator) -> Result<f64, IndicatorError> {
        Err(self.unavailable(indicator))
    }
}
