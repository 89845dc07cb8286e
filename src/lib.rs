//! A single-instrument, in-memory continuous limit-order book and matching
//! engine: price-time priority across resting, immediate-or-cancel,
//! all-or-none, day-scoped, and marketable order disciplines.

pub mod clock;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod orderbook;
pub mod orders;
pub mod price;
pub mod pruner;
pub mod trade;

pub use engine::OrderBookEngine;
pub use errors::OrderError;
pub use orderbook::OrderBook;
pub use orders::{Discipline, LevelInfo, Order, OrderModify, Side};
pub use price::Price;
pub use trade::{Trade, TradeInfo};
