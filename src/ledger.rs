use std::collections::HashMap;

use crate::price::Price;

/// Per-price aggregate resident-order count and residual quantity (§3, §4.3).
///
/// Invariant: for every price `P` resident in a side, `count` equals the
/// number of orders at `P` and `quantity` equals the sum of their remaining
/// quantities. An entry is removed the instant `count` reaches zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelAggregate {
    pub count: u32,
    pub quantity: u64,
}

/// The depth ledger for one side of the book.
///
/// Kept as a separate per-side map rather than one map unified across both
/// sides (spec.md §4.3 note: "Implementations may maintain two per-side
/// ledgers instead; equivalent.").
#[derive(Debug, Clone, Default)]
pub struct DepthLedger {
    levels: HashMap<Price, LevelAggregate>,
}

impl DepthLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, price: Price) -> Option<LevelAggregate> {
        self.levels.get(&price).copied()
    }

    /// Registers a newly-resident order at `price`: count += 1, quantity +=
    /// `qty`. Used both by fresh insertion (§4.1 step 5, full `qty` =
    /// initial quantity) and is otherwise never incremented elsewhere.
    pub fn add(&mut self, price: Price, qty: u64) {
        let entry = self.levels.entry(price).or_default();
        entry.count += 1;
        entry.quantity += qty;
    }

    /// Drains `qty` from a level's aggregate quantity without touching
    /// count — used mid-match, while the filled order is still resident
    /// (§4.4: "Do not decrement counts here").
    pub fn drain_quantity(&mut self, price: Price, qty: u64) {
        if let Some(entry) = self.levels.get_mut(&price) {
            entry.quantity = entry.quantity.saturating_sub(qty);
        }
    }

    /// Drops one resident order from `price`: count -= 1. Removes the entry
    /// entirely once count reaches zero (§3 invariant).
    pub fn remove_one(&mut self, price: Price) {
        if let Some(entry) = self.levels.get_mut(&price) {
            entry.count = entry.count.saturating_sub(1);
            if entry.count == 0 {
                self.levels.remove(&price);
            }
        }
    }

    /// Drops `qty` from a still-resident order's level *and* decrements its
    /// count by one in the same step — used by cancel (§4.6), where the
    /// order's full remaining quantity (not initial) leaves the ledger at
    /// once.
    pub fn remove_order(&mut self, price: Price, remaining_qty: u64) {
        self.drain_quantity(price, remaining_qty);
        self.remove_one(price);
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
