use std::sync::{Arc, Mutex};

use crate::clock::{Clock, SystemClock};
use crate::errors::OrderError;
use crate::orderbook::OrderBook;
use crate::orders::{LevelInfo, Order, OrderModify};
use crate::pruner::Pruner;
use crate::trade::Trade;

/// The single-instrument facade callers actually use: the exclusive-writer
/// lock around [`OrderBook`] plus the day-scoped pruner's lifecycle (§5, §6).
///
/// Every method acquires the lock, performs its mutation, and returns — no
/// public operation returns holding the lock, and none recurses into it.
pub struct OrderBookEngine {
    book: Arc<Mutex<OrderBook>>,
    pruner: Pruner,
}

impl OrderBookEngine {
    /// Production engine, clocked off the OS's local time.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Engine parameterized over a [`Clock`] collaborator, so the pruner can
    /// be driven by a virtual clock in tests (Design Note 3).
    pub fn with_clock(clock: impl Clock) -> Self {
        let book = Arc::new(Mutex::new(OrderBook::new()));
        let pruner = Pruner::spawn(Arc::clone(&book), Arc::new(clock));
        OrderBookEngine { book, pruner }
    }

    /// §4.1 order admission.
    pub fn add(&self, order: Order) -> Result<Vec<Trade>, OrderError> {
        self.lock().add(order)
    }

    /// §4.6 cancel.
    pub fn cancel(&self, id: u64) {
        self.lock().cancel(id);
    }

    /// §4.5 modify.
    pub fn modify(&self, request: OrderModify) -> Result<Vec<Trade>, OrderError> {
        self.lock().modify(request)
    }

    /// Count of resident orders across both sides.
    pub fn size(&self) -> usize {
        self.lock().size()
    }

    /// §4.8 snapshot accessor.
    pub fn snapshot(&self) -> (Vec<LevelInfo>, Vec<LevelInfo>) {
        self.lock().snapshot()
    }

    /// Idempotent; bounded by the pruner's one-second poll cap.
    pub fn teardown(&self) {
        self.pruner.teardown();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OrderBook> {
        self.book.lock().expect("order book mutex poisoned")
    }
}

impl Default for OrderBookEngine {
    fn default() -> Self {
        Self::new()
    }
}
