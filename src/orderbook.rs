use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::{debug, trace};

use crate::errors::OrderError;
use crate::ledger::DepthLedger;
use crate::orders::{Discipline, LevelInfo, Order, OrderModify, Side};
use crate::price::Price;
use crate::trade::{Trade, TradeInfo};

/// Where a resident order lives: which side and at which price (§3 Order
/// registry). Removal within that level's queue is O(depth-at-that-price) —
/// Design Note 1 explicitly allows this ("walking a linked list to find the
/// node is acceptable if level depths are modest").
#[derive(Debug, Clone, Copy)]
struct Handle {
    side: Side,
    price: Price,
}

/// The dual price-indexed queues, the order registry, and the per-side
/// aggregate depth ledgers — the single-instrument book's entire resident
/// state (§3, §4).
///
/// `OrderBook` itself is not thread-safe; [`crate::engine::OrderBookEngine`]
/// is the exclusive-writer facade callers actually use.
#[derive(Clone)]
pub struct OrderBook {
    /// Bid side, iterated ascending; best bid is the *last* key.
    bids: BTreeMap<Price, VecDeque<Order>>,
    /// Ask side, iterated ascending; best ask is the *first* key.
    asks: BTreeMap<Price, VecDeque<Order>>,
    registry: HashMap<u64, Handle>,
    bid_ledger: DepthLedger,
    ask_ledger: DepthLedger,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    pub fn new() -> Self {
        OrderBook {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            registry: HashMap::new(),
            bid_ledger: DepthLedger::new(),
            ask_ledger: DepthLedger::new(),
        }
    }

    /// Count of resident orders across both sides (§6 `size`).
    pub fn size(&self) -> usize {
        self.registry.len()
    }

    /// Identifiers of every resident `GoodForDay` order, for the pruner's
    /// per-cutoff snapshot (§4.7 step 3).
    pub fn good_for_day_ids(&self) -> Vec<u64> {
        self.bids
            .values()
            .chain(self.asks.values())
            .flat_map(|queue| queue.iter())
            .filter(|order| order.discipline == Discipline::GoodForDay)
            .map(|order| order.id)
            .collect()
    }

    /// (bids, asks) aggregate depth, unordered per the §4.8 contract (callers
    /// needing sorted depth sort by price themselves).
    pub fn snapshot(&self) -> (Vec<LevelInfo>, Vec<LevelInfo>) {
        let bids = self
            .bids
            .keys()
            .map(|&p| LevelInfo {
                price: p.0,
                quantity: self.bid_ledger.get(p).map(|a| a.quantity).unwrap_or(0),
            })
            .collect();
        let asks = self
            .asks
            .keys()
            .map(|&p| LevelInfo {
                price: p.0,
                quantity: self.ask_ledger.get(p).map(|a| a.quantity).unwrap_or(0),
            })
            .collect();
        (bids, asks)
    }

    /// §4.2: true iff the opposing side is non-empty and marketable against
    /// its best.
    fn can_match(&self, side: Side, price: Price) -> bool {
        match side {
            Side::Buy => self.asks.keys().next().is_some_and(|&best| price >= best),
            Side::Sell => self
                .bids
                .keys()
                .next_back()
                .is_some_and(|&best| price <= best),
        }
    }

    /// §4.3: walk the resting-side ledger best-first, accumulating resident
    /// quantity at marketable prices; true on the first step that covers
    /// `qty`.
    fn can_fully_fill(&self, side: Side, price: Price, qty: u64) -> bool {
        let mut filled = 0u64;
        match side {
            Side::Buy => {
                for (&level, _) in self.asks.iter() {
                    if level > price {
                        break;
                    }
                    filled += self.ask_ledger.get(level).map(|a| a.quantity).unwrap_or(0);
                    if filled >= qty {
                        return true;
                    }
                }
            }
            Side::Sell => {
                for (&level, _) in self.bids.iter().rev() {
                    if level < price {
                        break;
                    }
                    filled += self.bid_ledger.get(level).map(|a| a.quantity).unwrap_or(0);
                    if filled >= qty {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// §4.1: admit an order, running it through dedup, Market conversion,
    /// IOC/AON pre-trade admission, insertion, and matching.
    pub fn add(&mut self, mut order: Order) -> Result<Vec<Trade>, OrderError> {
        if self.registry.contains_key(&order.id) {
            trace!(
                order_id = order.id,
                timestamp = ?order.timestamp,
                "duplicate identifier, rejecting silently"
            );
            return Ok(Vec::new());
        }

        if order.discipline == Discipline::Market {
            let worst_opposite = match order.side {
                Side::Buy => self.asks.keys().next_back().copied(),
                Side::Sell => self.bids.keys().next().copied(),
            };
            let Some(worst) = worst_opposite else {
                trace!(
                    order_id = order.id,
                    timestamp = ?order.timestamp,
                    "market order has no opposite depth"
                );
                return Ok(Vec::new());
            };
            order.convert_to_good_till_cancel(worst)?;
        }

        let price = order
            .price
            .expect("price set directly or via market conversion above");

        if order.discipline == Discipline::ImmediateOrCancel && !self.can_match(order.side, price)
        {
            trace!(
                order_id = order.id,
                timestamp = ?order.timestamp,
                "IOC not immediately marketable, rejecting"
            );
            return Ok(Vec::new());
        }

        if order.discipline == Discipline::AllOrNone
            && !self.can_fully_fill(order.side, price, order.initial_quantity)
        {
            trace!(
                order_id = order.id,
                timestamp = ?order.timestamp,
                "AON cannot be fully filled, rejecting"
            );
            return Ok(Vec::new());
        }

        let id = order.id;
        let side = order.side;
        let qty = order.initial_quantity;
        let timestamp = order.timestamp;
        let (map, ledger) = self.side_mut(side);
        map.entry(price).or_default().push_back(order);
        ledger.add(price, qty);
        self.registry.insert(id, Handle { side, price });
        debug!(order_id = id, ?side, price = price.0, qty, ?timestamp, "order admitted");

        self.run_matching()
    }

    /// §4.5: modify is cancel-then-admit with the original discipline and
    /// identifier preserved, losing time priority.
    pub fn modify(&mut self, request: OrderModify) -> Result<Vec<Trade>, OrderError> {
        let Some(handle) = self.registry.get(&request.id).copied() else {
            return Ok(Vec::new());
        };
        let (map, _) = self.side_mut(handle.side);
        let discipline = map
            .get(&handle.price)
            .and_then(|q| q.iter().find(|o| o.id == request.id))
            .map(|o| o.discipline);
        let Some(discipline) = discipline else {
            return Ok(Vec::new());
        };

        self.cancel(request.id);
        let id = request.id;
        let fresh = request.into_order(discipline);
        debug!(order_id = id, timestamp = ?fresh.timestamp, "modify: cancel-then-readmit");
        self.add(fresh)
    }

    /// §4.6: O(1) registry lookup, then a bounded scan of the level's queue
    /// to drop the record and rebalance the ledger.
    pub fn cancel(&mut self, id: u64) {
        let Some(handle) = self.registry.remove(&id) else {
            return;
        };
        let (map, ledger) = self.side_mut(handle.side);
        let mut now_empty = false;
        let mut timestamp = None;
        if let Some(queue) = map.get_mut(&handle.price) {
            if let Some(pos) = queue.iter().position(|o| o.id == id) {
                let order = queue.remove(pos).expect("position just located");
                ledger.remove_order(handle.price, order.remaining_quantity);
                timestamp = Some(order.timestamp);
            }
            now_empty = queue.is_empty();
        }
        if now_empty {
            map.remove(&handle.price);
        }
        trace!(order_id = id, ?timestamp, "cancelled");
    }

    fn side_mut(&mut self, side: Side) -> (&mut BTreeMap<Price, VecDeque<Order>>, &mut DepthLedger) {
        match side {
            Side::Buy => (&mut self.bids, &mut self.bid_ledger),
            Side::Sell => (&mut self.asks, &mut self.ask_ledger),
        }
    }

    /// §4.4: repeatedly cross the best bid against the best ask until the
    /// book uncrosses, one side empties, or an ImmediateOrCancel head
    /// short-circuits the whole loop.
    fn run_matching(&mut self) -> Result<Vec<Trade>, OrderError> {
        let mut trades = Vec::new();

        loop {
            let Some(&best_bid) = self.bids.keys().next_back() else {
                break;
            };
            let Some(&best_ask) = self.asks.keys().next() else {
                break;
            };
            if best_bid < best_ask {
                break;
            }

            loop {
                let bid_empty = self.bids.get(&best_bid).is_none_or(|q| q.is_empty());
                let ask_empty = self.asks.get(&best_ask).is_none_or(|q| q.is_empty());
                if bid_empty || ask_empty {
                    break;
                }

                let fill_qty;
                let (bid_id, bid_price, bid_discipline, bid_remaining, bid_timestamp);
                let (ask_id, ask_price, ask_discipline, ask_remaining, ask_timestamp);
                {
                    let bid = self
                        .bids
                        .get_mut(&best_bid)
                        .and_then(|q| q.front_mut())
                        .expect("checked non-empty above");
                    let ask = self
                        .asks
                        .get_mut(&best_ask)
                        .and_then(|q| q.front_mut())
                        .expect("checked non-empty above");

                    fill_qty = bid.remaining_quantity.min(ask.remaining_quantity);
                    bid.fill(fill_qty)?;
                    ask.fill(fill_qty)?;

                    trades.push(Trade {
                        bid: TradeInfo {
                            order_id: bid.id,
                            price: bid.price.expect("resting bid always priced").0,
                            quantity: fill_qty,
                        },
                        ask: TradeInfo {
                            order_id: ask.id,
                            price: ask.price.expect("resting ask always priced").0,
                            quantity: fill_qty,
                        },
                    });

                    bid_id = bid.id;
                    bid_price = bid.price.expect("resting bid always priced");
                    bid_discipline = bid.discipline;
                    bid_remaining = bid.remaining_quantity;
                    bid_timestamp = bid.timestamp;

                    ask_id = ask.id;
                    ask_price = ask.price.expect("resting ask always priced");
                    ask_discipline = ask.discipline;
                    ask_remaining = ask.remaining_quantity;
                    ask_timestamp = ask.timestamp;
                }

                trace!(
                    bid_id,
                    ask_id,
                    qty = fill_qty,
                    bid_timestamp = ?bid_timestamp,
                    ask_timestamp = ?ask_timestamp,
                    "fill"
                );

                self.bid_ledger.drain_quantity(bid_price, fill_qty);
                self.ask_ledger.drain_quantity(ask_price, fill_qty);

                if bid_remaining == 0 {
                    self.bids.get_mut(&best_bid).unwrap().pop_front();
                    self.registry.remove(&bid_id);
                    self.bid_ledger.remove_one(bid_price);
                }
                if ask_remaining == 0 {
                    self.asks.get_mut(&best_ask).unwrap().pop_front();
                    self.registry.remove(&ask_id);
                    self.ask_ledger.remove_one(ask_price);
                }

                let short_circuit = bid_discipline == Discipline::ImmediateOrCancel
                    || ask_discipline == Discipline::ImmediateOrCancel;

                if bid_discipline == Discipline::ImmediateOrCancel && bid_remaining > 0 {
                    self.bids.get_mut(&best_bid).unwrap().pop_front();
                    self.registry.remove(&bid_id);
                    self.bid_ledger.remove_order(bid_price, bid_remaining);
                    trace!(order_id = bid_id, timestamp = ?bid_timestamp, "IOC residual cancelled");
                }
                if ask_discipline == Discipline::ImmediateOrCancel && ask_remaining > 0 {
                    self.asks.get_mut(&best_ask).unwrap().pop_front();
                    self.registry.remove(&ask_id);
                    self.ask_ledger.remove_order(ask_price, ask_remaining);
                    trace!(order_id = ask_id, timestamp = ?ask_timestamp, "IOC residual cancelled");
                }

                if self.bids.get(&best_bid).is_some_and(|q| q.is_empty()) {
                    self.bids.remove(&best_bid);
                }
                if self.asks.get(&best_ask).is_some_and(|q| q.is_empty()) {
                    self.asks.remove(&best_ask);
                }

                if short_circuit {
                    return Ok(trades);
                }

                if self.bids.get(&best_bid).is_none() || self.asks.get(&best_ask).is_none() {
                    break;
                }
            }
        }

        Ok(trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gtc(id: u64, side: Side, price: f64, qty: u64) -> Order {
        Order::new(id, side, Discipline::GoodTillCancel, Price(price), qty)
    }

    fn ioc(id: u64, side: Side, price: f64, qty: u64) -> Order {
        Order::new(id, side, Discipline::ImmediateOrCancel, Price(price), qty)
    }

    fn aon(id: u64, side: Side, price: f64, qty: u64) -> Order {
        Order::new(id, side, Discipline::AllOrNone, Price(price), qty)
    }

    // Scenario 1
    #[test]
    fn resting_orders_with_no_cross_do_not_trade() {
        let mut ob = OrderBook::new();
        assert!(ob.add(gtc(1, Side::Buy, 100.0, 10)).unwrap().is_empty());
        assert!(ob.add(gtc(2, Side::Sell, 101.0, 10)).unwrap().is_empty());
        assert_eq!(ob.size(), 2);
        let (bids, asks) = ob.snapshot();
        assert_eq!(bids, vec![LevelInfo { price: 100.0, quantity: 10 }]);
        assert_eq!(asks, vec![LevelInfo { price: 101.0, quantity: 10 }]);
    }

    // Scenario 2
    #[test]
    fn crossing_orders_produce_a_single_partial_trade() {
        let mut ob = OrderBook::new();
        ob.add(gtc(1, Side::Buy, 100.0, 10)).unwrap();
        let trades = ob.add(gtc(2, Side::Sell, 100.0, 5)).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].bid.order_id, 1);
        assert_eq!(trades[0].bid.price, 100.0);
        assert_eq!(trades[0].bid.quantity, 5);
        assert_eq!(trades[0].ask.order_id, 2);
        assert_eq!(trades[0].ask.price, 100.0);
        assert_eq!(trades[0].ask.quantity, 5);
        assert_eq!(ob.size(), 1);
        let (bids, asks) = ob.snapshot();
        assert_eq!(bids, vec![LevelInfo { price: 100.0, quantity: 5 }]);
        assert!(asks.is_empty());
    }

    // Scenario 3
    #[test]
    fn market_order_converts_and_walks_the_book() {
        let mut ob = OrderBook::new();
        ob.add(gtc(1, Side::Sell, 100.0, 10)).unwrap();
        let trades = ob.add(Order::market(2, Side::Buy, 5)).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].bid.quantity, 5);
        assert_eq!(trades[0].ask.price, 100.0);
        let (_, asks) = ob.snapshot();
        assert_eq!(asks, vec![LevelInfo { price: 100.0, quantity: 5 }]);
    }

    #[test]
    fn market_order_with_no_opposite_depth_is_silently_dropped() {
        let mut ob = OrderBook::new();
        let trades = ob.add(Order::market(1, Side::Buy, 5)).unwrap();
        assert!(trades.is_empty());
        assert_eq!(ob.size(), 0);
    }

    // Scenario 4
    #[test]
    fn all_or_none_is_atomic() {
        let mut ob = OrderBook::new();
        ob.add(gtc(1, Side::Sell, 100.0, 5)).unwrap();
        let trades = ob.add(aon(2, Side::Buy, 100.0, 10)).unwrap();
        assert!(trades.is_empty());
        assert_eq!(ob.size(), 1);

        let trades = ob.add(aon(3, Side::Buy, 100.0, 5)).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].bid.quantity, 5);
        assert_eq!(ob.size(), 0);
    }

    // Scenario 5
    #[test]
    fn immediate_or_cancel_fills_what_it_can_and_kills_the_rest() {
        let mut ob = OrderBook::new();
        ob.add(gtc(1, Side::Sell, 100.0, 5)).unwrap();
        ob.add(gtc(2, Side::Sell, 101.0, 5)).unwrap();
        let trades = ob.add(ioc(3, Side::Buy, 101.0, 7)).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].ask.price, 100.0);
        assert_eq!(trades[0].bid.quantity, 5);
        assert_eq!(ob.size(), 1);
        let (_, asks) = ob.snapshot();
        assert_eq!(asks, vec![LevelInfo { price: 101.0, quantity: 5 }]);
    }

    #[test]
    fn immediate_or_cancel_rejected_up_front_when_unmarketable() {
        let mut ob = OrderBook::new();
        ob.add(gtc(1, Side::Sell, 100.0, 5)).unwrap();
        let trades = ob.add(ioc(2, Side::Buy, 99.0, 5)).unwrap();
        assert!(trades.is_empty());
        assert_eq!(ob.size(), 1);
    }

    // Scenario 6
    #[test]
    fn modify_is_cancel_then_add() {
        let mut ob = OrderBook::new();
        ob.add(gtc(1, Side::Buy, 100.0, 10)).unwrap();
        let trades = ob
            .modify(OrderModify {
                id: 1,
                side: Side::Buy,
                price: Price(101.0),
                quantity: 15,
            })
            .unwrap();
        assert!(trades.is_empty());
        let (bids, _) = ob.snapshot();
        assert_eq!(bids, vec![LevelInfo { price: 101.0, quantity: 15 }]);
    }

    #[test]
    fn duplicate_identifier_is_silently_rejected() {
        let mut ob = OrderBook::new();
        ob.add(gtc(1, Side::Buy, 100.0, 10)).unwrap();
        let trades = ob.add(gtc(1, Side::Buy, 99.0, 3)).unwrap();
        assert!(trades.is_empty());
        assert_eq!(ob.size(), 1);
        let (bids, _) = ob.snapshot();
        assert_eq!(bids, vec![LevelInfo { price: 100.0, quantity: 10 }]);
    }

    #[test]
    fn cancel_inverts_insert_for_non_crossing_orders() {
        let mut ob = OrderBook::new();
        ob.add(gtc(1, Side::Buy, 100.0, 10)).unwrap();
        ob.cancel(1);
        assert_eq!(ob.size(), 0);
        let (bids, asks) = ob.snapshot();
        assert!(bids.is_empty());
        assert!(asks.is_empty());
    }

    #[test]
    fn cancel_unknown_identifier_is_a_no_op() {
        let mut ob = OrderBook::new();
        ob.add(gtc(1, Side::Buy, 100.0, 10)).unwrap();
        ob.cancel(999);
        assert_eq!(ob.size(), 1);
    }

    #[test]
    fn price_time_priority_within_a_level() {
        let mut ob = OrderBook::new();
        ob.add(gtc(1, Side::Sell, 100.0, 4)).unwrap();
        ob.add(gtc(2, Side::Sell, 100.0, 6)).unwrap();
        let trades = ob.add(gtc(3, Side::Buy, 100.0, 9)).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].ask.order_id, 1);
        assert_eq!(trades[0].ask.quantity, 4);
        assert_eq!(trades[1].ask.order_id, 2);
        assert_eq!(trades[1].ask.quantity, 5);
        let (_, asks) = ob.snapshot();
        assert_eq!(asks, vec![LevelInfo { price: 100.0, quantity: 1 }]);
    }

    #[test]
    fn book_never_rests_crossed() {
        let mut ob = OrderBook::new();
        ob.add(gtc(1, Side::Sell, 105.0, 5)).unwrap();
        let trades = ob.add(gtc(2, Side::Buy, 110.0, 3)).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].bid.price, 110.0);
        assert_eq!(trades[0].ask.price, 105.0);
        let (bids, _) = ob.snapshot();
        assert!(bids.is_empty());
    }
}
