use std::time::SystemTime;

use crate::errors::OrderError;
use crate::price::Price;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// Order discipline. `Market` never rests as-is: admission rewrites it to
/// `GoodTillCancel` at the opposite side's worst price (§4.1 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    GoodTillCancel,
    ImmediateOrCancel,
    AllOrNone,
    GoodForDay,
    Market,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: u64,
    pub side: Side,
    pub discipline: Discipline,
    /// `None` only while `discipline == Market` and still unconverted.
    pub price: Option<Price>,
    pub initial_quantity: u64,
    pub remaining_quantity: u64,
    pub timestamp: SystemTime,
}

impl Order {
    pub fn new(id: u64, side: Side, discipline: Discipline, price: Price, quantity: u64) -> Self {
        Order {
            id,
            side,
            discipline,
            price: Some(price),
            initial_quantity: quantity,
            remaining_quantity: quantity,
            timestamp: SystemTime::now(),
        }
    }

    pub fn market(id: u64, side: Side, quantity: u64) -> Self {
        Order {
            id,
            side,
            discipline: Discipline::Market,
            price: None,
            initial_quantity: quantity,
            remaining_quantity: quantity,
            timestamp: SystemTime::now(),
        }
    }

    pub fn filled_quantity(&self) -> u64 {
        self.initial_quantity - self.remaining_quantity
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_quantity == 0
    }

    /// Decrements `remaining_quantity`. Overflow (filling past zero) is a
    /// matching-engine invariant violation, never a caller mistake — fatal.
    pub fn fill(&mut self, quantity: u64) -> Result<(), OrderError> {
        if quantity > self.remaining_quantity {
            return Err(OrderError::FillOverflow {
                order_id: self.id,
                remaining: self.remaining_quantity,
                attempted: quantity,
            });
        }
        self.remaining_quantity -= quantity;
        Ok(())
    }

    /// Converts a still-unpriced `Market` order into a resting
    /// `GoodTillCancel` at `price` (§4.1 step 2). Calling this on any other
    /// discipline is a misuse of the API, not a business condition — fatal.
    pub fn convert_to_good_till_cancel(&mut self, price: Price) -> Result<(), OrderError> {
        if self.discipline != Discipline::Market {
            return Err(OrderError::NotMarketOrder { order_id: self.id });
        }
        self.price = Some(price);
        self.discipline = Discipline::GoodTillCancel;
        Ok(())
    }
}

/// Semantically a cancel-then-insert with the discipline preserved from the
/// original order (§3, §4.5).
#[derive(Debug, Clone)]
pub struct OrderModify {
    pub id: u64,
    pub side: Side,
    pub price: Price,
    pub quantity: u64,
}

impl OrderModify {
    pub fn into_order(self, discipline: Discipline) -> Order {
        Order::new(self.id, self.side, discipline, self.price, self.quantity)
    }
}

/// One side's aggregate depth at a price, returned by `snapshot` (§4.8).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelInfo {
    pub price: f64,
    pub quantity: u64,
}
