//! In-memory paper trading executor

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::common::errors::ExecutionError;
use crate::common::traits::Executor;
use crate::common::types::{Order, Position, Side};

#[derive(Debug, Default)]
struct Ledger {
    cash: f64,
    positions: HashMap<String, Position>,
    filled: Vec<Order>,
    dropped: Vec<Order>,
}

/// Paper trader with perfect fills and no slippage
///
/// Equity is the cash balance: buys debit `price * quantity`, sells
/// (including short sales) credit it. A buy costing more than the available
/// cash is dropped without an error, the way a broker would silently refuse
/// it; the order is kept in [`dropped`](Self::dropped) for inspection.
#[derive(Debug)]
pub struct PaperExecutor {
    ledger: Mutex<Ledger>,
}

impl PaperExecutor {
    pub fn new(starting_equity: f64) -> Self {
        Self {
            ledger: Mutex::new(Ledger {
                cash: starting_equity,
                ..Ledger::default()
            }),
        }
    }

    /// All filled orders, in submission order
    pub fn orders(&self) -> Vec<Order> {
        self.ledger().filled.clone()
    }

    /// Filled orders for one symbol
    pub fn orders_for(&self, symbol: &str) -> Vec<Order> {
        self.ledger()
            .filled
            .iter()
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect()
    }

    /// Orders dropped for insufficient cash
    pub fn dropped(&self) -> Vec<Order> {
        self.ledger().dropped.clone()
    }

    /// Symbols with a non-zero position
    pub fn open_symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .ledger()
            .positions
            .iter()
            .filter(|(_, p)| !p.is_flat())
            .map(|(s, _)| s.clone())
            .collect();
        out.sort();
        out
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Executor for PaperExecutor {
    fn submit(&self, order: &Order) -> Result<(), ExecutionError> {
        if !order.quantity.is_finite() || order.quantity <= 0.0 {
            return Err(ExecutionError::InvalidOrder(format!(
                "quantity must be positive, got {}",
                order.quantity
            )));
        }
        if !order.price.is_finite() || order.price <= 0.0 {
            return Err(ExecutionError::InvalidOrder(format!(
                "price must be positive, got {}",
                order.price
            )));
        }

        let mut ledger = self.ledger();
        let cost = order.notional();

        if order.side == Side::Buy && cost > ledger.cash {
            warn!(
                symbol = %order.symbol,
                qty = order.quantity,
                price = order.price,
                cash = ledger.cash,
                "paper executor: insufficient cash, order dropped"
            );
            ledger.dropped.push(order.clone());
            return Ok(());
        }

        match order.side {
            Side::Buy => ledger.cash -= cost,
            Side::Sell => ledger.cash += cost,
        }

        let position = ledger.positions.entry(order.symbol.clone()).or_default();
        *position = apply_fill(*position, order.side, order.quantity, order.price);

        debug!(
            symbol = %order.symbol,
            side = %order.side,
            qty = order.quantity,
            price = order.price,
            cash = ledger.cash,
            "paper fill"
        );
        ledger.filled.push(order.clone());
        Ok(())
    }

    fn equity(&self) -> f64 {
        self.ledger().cash
    }

    fn position(&self, symbol: &str) -> Position {
        self.ledger()
            .positions
            .get(symbol)
            .copied()
            .unwrap_or_default()
    }
}

/// New position after filling `quantity` at `price`
///
/// Adding to a position re-weights the average price; reducing keeps it;
/// crossing through zero starts a fresh average at the fill price.
fn apply_fill(current: Position, side: Side, quantity: f64, price: f64) -> Position {
    let signed = side.sign() * quantity;
    let new_qty = current.quantity + signed;

    if new_qty.abs() < f64::EPSILON * quantity.max(1.0) {
        return Position::flat();
    }

    let same_direction = current.is_flat() || current.quantity.signum() == signed.signum();
    let avg_price = if same_direction {
        (current.quantity.abs() * current.avg_price + quantity * price) / new_qty.abs()
    } else if new_qty.signum() == current.quantity.signum() {
        current.avg_price
    } else {
        price
    };

    Position::new(new_qty, avg_price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_buy_then_sell_round_trip() {
        let exec = PaperExecutor::new(10_000.0);
        exec.submit(&Order::new("TEST", Side::Buy, 10.0, 100.0, "entry"))
            .unwrap();
        assert_eq!(exec.position("TEST"), Position::new(10.0, 100.0));
        assert_eq!(exec.equity(), 9_000.0);

        exec.submit(&Order::new("TEST", Side::Sell, 10.0, 110.0, "exit"))
            .unwrap();
        assert_eq!(exec.position("TEST"), Position::flat());
        assert_eq!(exec.equity(), 10_100.0);
        assert_eq!(exec.orders().len(), 2);
        assert!(exec.open_symbols().is_empty());
    }

    #[test]
    fn test_average_price_is_volume_weighted() {
        let exec = PaperExecutor::new(10_000.0);
        exec.submit(&Order::new("TEST", Side::Buy, 1.0, 100.0, "a")).unwrap();
        exec.submit(&Order::new("TEST", Side::Buy, 3.0, 120.0, "b")).unwrap();
        assert_eq!(exec.position("TEST"), Position::new(4.0, 115.0));

        // Partial reduction keeps the average
        exec.submit(&Order::new("TEST", Side::Sell, 1.0, 130.0, "c")).unwrap();
        assert_eq!(exec.position("TEST"), Position::new(3.0, 115.0));
    }

    #[test]
    fn test_short_sale_and_flip() {
        let exec = PaperExecutor::new(1_000.0);
        exec.submit(&Order::new("TEST", Side::Sell, 2.0, 50.0, "short")).unwrap();
        assert_eq!(exec.position("TEST"), Position::new(-2.0, 50.0));
        assert_eq!(exec.equity(), 1_100.0);

        // Buying through zero opens a long at the fill price
        exec.submit(&Order::new("TEST", Side::Buy, 5.0, 40.0, "flip")).unwrap();
        assert_eq!(exec.position("TEST"), Position::new(3.0, 40.0));
    }

    #[test]
    fn test_insufficient_cash_is_silently_dropped() {
        let exec = PaperExecutor::new(100.0);
        let order = Order::new("TEST", Side::Buy, 10.0, 100.0, "too big");
        assert!(exec.submit(&order).is_ok());
        assert!(exec.orders().is_empty());
        assert_eq!(exec.dropped(), vec![order]);
        assert_eq!(exec.position("TEST"), Position::flat());
        assert_eq!(exec.equity(), 100.0);
    }

    #[test]
    fn test_rejects_invalid_orders() {
        let exec = PaperExecutor::new(100.0);
        let err = exec
            .submit(&Order::new("TEST", Side::Buy, 0.0, 10.0, "zero"))
            .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidOrder(_)));
        assert!(exec
            .submit(&Order::new("TEST", Side::Sell, 1.0, f64::NAN, "nan"))
            .is_err());
    }

    #[test]
    fn test_orders_for_filters_by_symbol() {
        let exec = PaperExecutor::new(10_000.0);
        exec.submit(&Order::new("AAA", Side::Buy, 1.0, 10.0, "a")).unwrap();
        exec.submit(&Order::new("BBB", Side::Sell, 1.0, 10.0, "b")).unwrap();
        assert_eq!(exec.orders_for("BBB").len(), 1);
        assert_eq!(exec.open_symbols(), vec!["AAA".to_string(), "BBB".to_string()]);
    }
}
