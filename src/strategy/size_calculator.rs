use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Largest scale a `Decimal` can hold
const MAX_PRECISION: i32 = 28;

/// Broker constraints an order quantity must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantityConstraints {
    /// Quantity increment the exchange allows; <= 0 disables step flooring
    pub step_size: f64,
    /// Decimal places to floor to; negative disables precision flooring
    pub quantity_precision: i32,
    /// Smallest executable quantity
    pub min_qty: f64,
}

impl QuantityConstraints {
    /// Floor a raw quantity to the step size and precision
    ///
    /// Returns 0 for anything non-finite, non-positive, outside the range a
    /// `Decimal` can represent, or below `min_qty` after flooring.
    pub fn quantize(&self, raw: f64) -> f64 {
        if !raw.is_finite() || raw <= 0.0 {
            return 0.0;
        }
        let Some(mut qty) = Decimal::from_f64(raw) else {
            return 0.0;
        };

        if self.step_size > 0.0 {
            match Decimal::from_f64(self.step_size) {
                Some(step) if !step.is_zero() => {
                    let floored = qty
                        .checked_div(step)
                        .and_then(|steps| steps.floor().checked_mul(step));
                    let Some(floored) = floored else {
                        return 0.0;
                    };
                    qty = floored;
                }
                // Step too small for Decimal: nothing to floor against
                _ => {}
            }
        }

        if self.quantity_precision >= 0 {
            let dp = self.quantity_precision.min(MAX_PRECISION) as u32;
            qty = qty.round_dp_with_strategy(dp, RoundingStrategy::ToZero);
        }

        let qty = qty.to_f64().unwrap_or_default();
        if qty < self.min_qty || qty <= 0.0 {
            return 0.0;
        }
        qty
    }
}

/// Risk-bounded order quantity
///
/// Sizes the position so that a stop-loss hit at `price * stop_loss_fraction`
/// loses `equity * risk_fraction`, then floors the result to the broker's
/// step size and precision. Dust below `min_qty` is rejected as 0.
///
/// # Arguments
/// * `equity` - Current account equity
/// * `risk_fraction` - Fraction of equity risked on the trade (e.g. 0.01)
/// * `stop_loss_fraction` - Stop distance as a fraction of price (e.g. 0.015)
/// * `price` - Intended entry price
/// * `constraints` - Step size, precision and minimum quantity
///
/// # Returns
/// Executable quantity, or 0 when no valid order can be sized
pub fn calc_qty(
    equity: f64,
    risk_fraction: f64,
    stop_loss_fraction: f64,
    price: f64,
    constraints: &QuantityConstraints,
) -> f64 {
    let risk_amount = equity * risk_fraction;
    let stop_distance = price * stop_loss_fraction;
    // Cannot size without a stop distance (also catches NaN)
    if !(stop_distance > 0.0) || !stop_distance.is_finite() {
        return 0.0;
    }
    constraints.quantize(risk_amount / stop_distance)
}
