use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

pub type Price = Decimal;
pub type Quantity = Decimal;

/// Fractional digits carried by every price, quantity and monetary amount.
pub const SCALE: u32 = 6;

/// Round half-up to [`SCALE`] fractional digits.
///
/// Applied at settlement boundaries only; intermediate arithmetic keeps
/// full `Decimal` precision.
pub fn quantize(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// One open order as seen by the clearing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookOrder {
    pub id: Uuid,
    pub trader_id: Uuid,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    /// Round the order last participated in. Carried-over remainders keep
    /// their original round and therefore outrank fresh orders at the same
    /// price.
    pub iteration: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl BookOrder {
    fn is_valid(&self) -> bool {
        self.price > Decimal::ZERO && self.quantity > Decimal::ZERO
    }
}

/// Secondary ordering once prices tie: earlier iteration (none last),
/// then earlier submission, then lower id.
fn tiebreak(a: &BookOrder, b: &BookOrder) -> Ordering {
    let iter_a = a.iteration.map_or(i64::MAX, i64::from);
    let iter_b = b.iteration.map_or(i64::MAX, i64::from);
    iter_a
        .cmp(&iter_b)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort bids into fill priority: highest price first.
pub fn sort_bids(bids: &mut [BookOrder]) {
    bids.sort_by(|a, b| b.price.cmp(&a.price).then_with(|| tiebreak(a, b)));
}

/// Sort asks into fill priority: lowest price first.
pub fn sort_asks(asks: &mut [BookOrder]) {
    asks.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| tiebreak(a, b)));
}

/// Aggregated view of all orders resting at one price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceLevel {
    pub price: Price,
    pub total_quantity: Quantity,
    pub order_count: u32,
}

/// Fold a priority-sorted slice into price levels. The output inherits the
/// input ordering: descending for bids, ascending for asks.
pub fn aggregate_levels(orders: &[BookOrder]) -> Vec<PriceLevel> {
    let mut levels: Vec<PriceLevel> = Vec::new();
    for order in orders {
        match levels.last_mut() {
            Some(level) if level.price == order.price => {
                level.total_quantity += order.quantity;
                level.order_count += 1;
            }
            _ => levels.push(PriceLevel {
                price: order.price,
                total_quantity: order.quantity,
                order_count: 1,
            }),
        }
    }
    levels
}

/// Display metrics for one auction's open book.
#[derive(Debug, Clone, Serialize)]
pub struct BookMetrics {
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    /// `best_ask - best_bid`; negative while the call-market book is crossed.
    pub spread: Option<Decimal>,
    pub is_crossed: bool,
    pub mid_price: Option<Price>,
    pub total_bid_quantity: Quantity,
    pub total_ask_quantity: Quantity,
    pub bid_order_count: u32,
    pub ask_order_count: u32,
    pub best_bid_depth: Option<Quantity>,
    pub best_ask_depth: Option<Quantity>,
    /// `(bid_depth - ask_depth) / (bid_depth + ask_depth)` over the best
    /// levels; `None` without depth on both sides.
    pub depth_imbalance: Option<Decimal>,
}

/// One auction's open orders, partitioned and priority-sorted.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    bids: Vec<BookOrder>,
    asks: Vec<BookOrder>,
}

impl OrderBook {
    pub fn from_orders(orders: impl IntoIterator<Item = BookOrder>) -> Self {
        let mut bids = Vec::new();
        let mut asks = Vec::new();
        for order in orders {
            if !order.is_valid() {
                continue;
            }
            match order.side {
                Side::Bid => bids.push(order),
                Side::Ask => asks.push(order),
            }
        }
        sort_bids(&mut bids);
        sort_asks(&mut asks);
        Self { bids, asks }
    }

    pub fn bids(&self) -> &[BookOrder] {
        &self.bids
    }

    pub fn asks(&self) -> &[BookOrder] {
        &self.asks
    }

    pub fn bid_levels(&self) -> Vec<PriceLevel> {
        aggregate_levels(&self.bids)
    }

    pub fn ask_levels(&self) -> Vec<PriceLevel> {
        aggregate_levels(&self.asks)
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|o| o.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|o| o.price)
    }

    pub fn metrics(&self) -> BookMetrics {
        let bid_levels = self.bid_levels();
        let ask_levels = self.ask_levels();
        let best_bid = self.best_bid();
        let best_ask = self.best_ask();
        let two = Decimal::from(2);

        let (spread, is_crossed, mid_price) = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => (Some(ask - bid), ask < bid, Some((bid + ask) / two)),
            _ => (None, false, None),
        };

        let best_bid_depth = bid_levels.first().map(|l| l.total_quantity);
        let best_ask_depth = ask_levels.first().map(|l| l.total_quantity);
        let depth_imbalance = match (best_bid_depth, best_ask_depth) {
            (Some(b), Some(a)) if b + a > Decimal::ZERO => Some((b - a) / (b + a)),
            _ => None,
        };

        BookMetrics {
            best_bid,
            best_ask,
            spread,
            is_crossed,
            mid_price,
            total_bid_quantity: self.bids.iter().map(|o| o.quantity).sum(),
            total_ask_quantity: self.asks.iter().map(|o| o.quantity).sum(),
            bid_order_count: self.bids.len() as u32,
            ask_order_count: self.asks.len() as u32,
            best_bid_depth,
            best_ask_depth,
            depth_imbalance,
        }
    }
}

/// Operator hint: nudge `k` against the heavier side of the book.
///
/// Positive imbalance (bids heavier) lowers `k` toward the ask side,
/// negative raises it. Result clamped to `[0, 1]`.
pub fn adaptive_k(base_k: Decimal, depth_imbalance: Decimal, alpha: Decimal) -> Decimal {
    let candidate = base_k - alpha * depth_imbalance;
    candidate.clamp(Decimal::ZERO, Decimal::ONE)
}

/// A fill awarded to one order by the clearing pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub order_id: Uuid,
    pub trader_id: Uuid,
    pub side: Side,
    pub cleared_qty: Quantity,
}

/// Outcome of one clearing round over a frozen book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearingResult {
    /// Uniform settlement price; `None` when nothing traded.
    pub price: Option<Price>,
    pub volume: Quantity,
    pub allocations: Vec<Allocation>,
    /// Cumulative demand at `p_star`.
    pub demand: Quantity,
    /// Cumulative supply at `p_star`.
    pub supply: Quantity,
    /// Feasible interval `[min, max]` of the two marginal prices.
    pub price_interval: (Option<Price>, Option<Price>),
    pub p_star: Option<Price>,
}

impl ClearingResult {
    fn empty(demand: Quantity, supply: Quantity) -> Self {
        Self {
            price: None,
            volume: Decimal::ZERO,
            allocations: Vec::new(),
            demand,
            supply,
            price_interval: (None, None),
            p_star: None,
        }
    }

    pub fn traded(&self) -> bool {
        self.volume > Decimal::ZERO
    }
}

/// Price of the marginal (last-filled) order when `trade_qty` is walked off
/// a priority-sorted side.
fn marginal_price(orders: &[BookOrder], trade_qty: Quantity) -> Price {
    let mut cumulative = Decimal::ZERO;
    for order in orders {
        cumulative += order.quantity;
        if cumulative >= trade_qty {
            return order.price;
        }
    }
    // trade_qty never exceeds the side's total; the loop always returns.
    orders.last().map(|o| o.price).unwrap_or_default()
}

/// Fill winners in priority order until `trade_qty` is exhausted. The last
/// allocation absorbs any residual so the side sums to `trade_qty` exactly.
fn allocate(winners: &[&BookOrder], trade_qty: Quantity) -> Vec<Allocation> {
    let mut allocations: Vec<Allocation> = Vec::new();
    let mut remaining = trade_qty;
    for order in winners {
        if remaining <= Decimal::ZERO {
            break;
        }
        let fill = order.quantity.min(remaining);
        allocations.push(Allocation {
            order_id: order.id,
            trader_id: order.trader_id,
            side: order.side,
            cleared_qty: fill,
        });
        remaining -= fill;
    }
    if remaining > Decimal::ZERO {
        if let Some(last) = allocations.last_mut() {
            last.cleared_qty += remaining;
        }
    }
    allocations
}

/// Clear a frozen call-market book at a single uniform price.
///
/// `k` blends the two marginal prices: `k = 0` settles at the bid marginal
/// (seller-favoring), `k = 1` at the ask marginal, `k = 0.5` at the
/// midpoint. Fills follow strict price-time priority; ties at the marginal
/// price fill in submission order.
pub fn clear(orders: &[BookOrder], k: Decimal) -> ClearingResult {
    let book = OrderBook::from_orders(orders.iter().cloned());
    let bids = book.bids();
    let asks = book.asks();
    if bids.is_empty() || asks.is_empty() {
        return ClearingResult::empty(Decimal::ZERO, Decimal::ZERO);
    }

    // Unique price grid, ascending.
    let mut grid: Vec<Price> = bids.iter().chain(asks.iter()).map(|o| o.price).collect();
    grid.sort();
    grid.dedup();

    // Cumulative curves by sweeping the sorted sides once each:
    // D(p) = bid quantity at prices >= p, S(p) = ask quantity at prices <= p.
    let mut demand_at = vec![Decimal::ZERO; grid.len()];
    let mut cumulative = Decimal::ZERO;
    let mut bid_idx = 0;
    for (i, px) in grid.iter().enumerate().rev() {
        while bid_idx < bids.len() && bids[bid_idx].price >= *px {
            cumulative += bids[bid_idx].quantity;
            bid_idx += 1;
        }
        demand_at[i] = cumulative;
    }
    let mut supply_at = vec![Decimal::ZERO; grid.len()];
    cumulative = Decimal::ZERO;
    let mut ask_idx = 0;
    for (i, px) in grid.iter().enumerate() {
        while ask_idx < asks.len() && asks[ask_idx].price <= *px {
            cumulative += asks[ask_idx].quantity;
            ask_idx += 1;
        }
        supply_at[i] = cumulative;
    }

    // p* maximizes traded volume; ties prefer the smaller demand/supply
    // gap, then the higher price.
    let mut best: Option<(usize, Quantity, Decimal)> = None;
    for i in 0..grid.len() {
        let volume = demand_at[i].min(supply_at[i]);
        let gap = (demand_at[i] - supply_at[i]).abs();
        let better = match best {
            None => true,
            Some((_, best_volume, best_gap)) => {
                volume > best_volume || (volume == best_volume && gap < best_gap)
            }
        };
        // Equal volume and gap: later grid entries have higher prices.
        let tie = matches!(best, Some((_, bv, bg)) if volume == bv && gap == bg);
        if better || tie {
            best = Some((i, volume, gap));
        }
    }
    let (star_idx, trade_qty, _) = best.expect("non-empty grid");
    let demand = demand_at[star_idx];
    let supply = supply_at[star_idx];
    if trade_qty <= Decimal::ZERO {
        return ClearingResult::empty(demand, supply);
    }
    let p_star = grid[star_idx];

    let bid_marginal = marginal_price(bids, trade_qty);
    let ask_marginal = marginal_price(asks, trade_qty);
    let low = ask_marginal.min(bid_marginal);
    let high = ask_marginal.max(bid_marginal);
    let blended = k * ask_marginal + (Decimal::ONE - k) * bid_marginal;
    let price = quantize(blended.clamp(low, high));

    let winning_bids: Vec<&BookOrder> = bids.iter().filter(|o| o.price >= p_star).collect();
    let winning_asks: Vec<&BookOrder> = asks.iter().filter(|o| o.price <= p_star).collect();
    let mut allocations = allocate(&winning_bids, trade_qty);
    allocations.extend(allocate(&winning_asks, trade_qty));

    ClearingResult {
        price: Some(price),
        volume: trade_qty,
        allocations,
        demand,
        supply,
        price_interval: (Some(low), Some(high)),
        p_star: Some(p_star),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn order(side: Side, price: Decimal, quantity: Decimal, secs: i64) -> BookOrder {
        BookOrder {
            id: Uuid::new_v4(),
            trader_id: Uuid::new_v4(),
            side,
            price,
            quantity,
            iteration: None,
            created_at: at(secs),
        }
    }

    fn bid(price: Decimal, quantity: Decimal, secs: i64) -> BookOrder {
        order(Side::Bid, price, quantity, secs)
    }

    fn ask(price: Decimal, quantity: Decimal, secs: i64) -> BookOrder {
        order(Side::Ask, price, quantity, secs)
    }

    fn side_total(result: &ClearingResult, side: Side) -> Decimal {
        result
            .allocations
            .iter()
            .filter(|a| a.side == side)
            .map(|a| a.cleared_qty)
            .sum()
    }

    #[test]
    fn test_quantize_half_up() {
        assert_eq!(quantize(dec!(1.0000005)), dec!(1.000001));
        assert_eq!(quantize(dec!(1.0000004)), dec!(1.000000));
        assert_eq!(quantize(dec!(10)), dec!(10));
    }

    #[test]
    fn test_empty_book_clears_nothing() {
        let result = clear(&[], dec!(0.5));
        assert_eq!(result.price, None);
        assert_eq!(result.volume, Decimal::ZERO);
        assert!(result.allocations.is_empty());
    }

    #[test]
    fn test_one_sided_book_clears_nothing() {
        let orders = vec![bid(dec!(10), dec!(5), 0), bid(dec!(9), dec!(2), 1)];
        let result = clear(&orders, dec!(0.5));
        assert_eq!(result.price, None);
        assert_eq!(result.volume, Decimal::ZERO);
    }

    #[test]
    fn test_invalid_orders_filtered() {
        let orders = vec![
            bid(dec!(0), dec!(5), 0),
            bid(dec!(10), dec!(0), 1),
            ask(dec!(-1), dec!(5), 2),
        ];
        let result = clear(&orders, dec!(0.5));
        assert_eq!(result.volume, Decimal::ZERO);
        assert!(result.allocations.is_empty());
    }

    #[test]
    fn test_symmetric_cross_at_same_price() {
        let orders = vec![bid(dec!(10), dec!(5), 0), ask(dec!(10), dec!(5), 1)];
        let result = clear(&orders, dec!(0.5));
        assert_eq!(result.price, Some(dec!(10.000000)));
        assert_eq!(result.volume, dec!(5));
        assert_eq!(result.price_interval, (Some(dec!(10)), Some(dec!(10))));
        assert_eq!(result.allocations.len(), 2);
        assert_eq!(side_total(&result, Side::Bid), dec!(5));
        assert_eq!(side_total(&result, Side::Ask), dec!(5));
    }

    #[test]
    fn test_k_endpoints() {
        let orders = vec![bid(dec!(12), dec!(3), 0), ask(dec!(8), dec!(3), 1)];

        let seller_favoring = clear(&orders, dec!(0));
        assert_eq!(seller_favoring.price, Some(dec!(12.000000)));

        let buyer_favoring = clear(&orders, dec!(1));
        assert_eq!(buyer_favoring.price, Some(dec!(8.000000)));

        let midpoint = clear(&orders, dec!(0.5));
        assert_eq!(midpoint.price, Some(dec!(10.000000)));
        assert_eq!(midpoint.price_interval, (Some(dec!(8)), Some(dec!(12))));
    }

    #[test]
    fn test_k_monotone_in_wide_interval() {
        let orders = vec![bid(dec!(12), dec!(3), 0), ask(dec!(8), dec!(3), 1)];
        // ask_marginal < bid_marginal here, so price must not increase in k.
        let mut last = None;
        for k in [dec!(0), dec!(0.25), dec!(0.5), dec!(0.75), dec!(1)] {
            let price = clear(&orders, k).price.unwrap();
            if let Some(prev) = last {
                assert!(price <= prev, "price rose from {} to {} at k={}", prev, price, k);
            }
            last = Some(price);
        }
    }

    #[test]
    fn test_partial_fill_respects_time_priority() {
        let orders = vec![
            bid(dec!(11), dec!(2), 0),
            bid(dec!(11), dec!(2), 1),
            bid(dec!(10), dec!(5), 2),
            ask(dec!(9), dec!(3), 3),
        ];
        let result = clear(&orders, dec!(0.5));
        assert_eq!(result.volume, dec!(3));
        assert_eq!(result.price, Some(dec!(10.000000)));
        assert_eq!(result.demand, dec!(4));
        assert_eq!(result.supply, dec!(3));

        let bid_allocs: Vec<&Allocation> = result
            .allocations
            .iter()
            .filter(|a| a.side == Side::Bid)
            .collect();
        assert_eq!(bid_allocs.len(), 2);
        assert_eq!(bid_allocs[0].order_id, orders[0].id);
        assert_eq!(bid_allocs[0].cleared_qty, dec!(2));
        assert_eq!(bid_allocs[1].order_id, orders[1].id);
        assert_eq!(bid_allocs[1].cleared_qty, dec!(1));
        // The lower bid never fills.
        assert!(result.allocations.iter().all(|a| a.order_id != orders[2].id));
    }

    #[test]
    fn test_carried_over_remainder_outranks_fresh_order() {
        let mut carried = bid(dec!(11), dec!(2), 5);
        carried.iteration = Some(1);
        let fresh = bid(dec!(11), dec!(2), 0);
        let orders = vec![fresh.clone(), carried.clone(), ask(dec!(11), dec!(2), 6)];
        let result = clear(&orders, dec!(0.5));
        assert_eq!(result.volume, dec!(2));
        let bid_allocs: Vec<&Allocation> = result
            .allocations
            .iter()
            .filter(|a| a.side == Side::Bid)
            .collect();
        assert_eq!(bid_allocs.len(), 1);
        assert_eq!(bid_allocs[0].order_id, carried.id);
    }

    #[test]
    fn test_non_crossing_book() {
        let orders = vec![bid(dec!(5), dec!(10), 0), ask(dec!(7), dec!(10), 1)];
        let result = clear(&orders, dec!(0.5));
        assert_eq!(result.price, None);
        assert_eq!(result.volume, Decimal::ZERO);
        assert!(result.allocations.is_empty());
        assert_eq!(result.price_interval, (None, None));
        // Demand/supply still reported at the best candidate price.
        assert!(result.demand + result.supply > Decimal::ZERO);
    }

    #[test]
    fn test_bid_refund_scenario_price() {
        let orders = vec![bid(dec!(20), dec!(1), 0), ask(dec!(10), dec!(1), 1)];
        let result = clear(&orders, dec!(0.5));
        assert_eq!(result.price, Some(dec!(15.000000)));
        assert_eq!(result.volume, dec!(1));
    }

    #[test]
    fn test_round_accounting_balances_sides() {
        let orders = vec![
            bid(dec!(10.5), dec!(4), 0),
            bid(dec!(10.1), dec!(2.5), 1),
            bid(dec!(9.9), dec!(1), 2),
            ask(dec!(9.8), dec!(3), 3),
            ask(dec!(10.0), dec!(2), 4),
            ask(dec!(10.4), dec!(7), 5),
        ];
        let result = clear(&orders, dec!(0.3));
        assert!(result.traded());
        assert_eq!(side_total(&result, Side::Bid), result.volume);
        assert_eq!(side_total(&result, Side::Ask), result.volume);
    }

    #[test]
    fn test_price_within_marginal_interval() {
        let orders = vec![
            bid(dec!(12), dec!(2), 0),
            bid(dec!(11), dec!(2), 1),
            ask(dec!(9), dec!(1), 2),
            ask(dec!(10), dec!(2), 3),
        ];
        for k in [dec!(0), dec!(0.2), dec!(0.5), dec!(0.8), dec!(1)] {
            let result = clear(&orders, k);
            let (low, high) = result.price_interval;
            let price = result.price.unwrap();
            assert!(price >= low.unwrap() && price <= high.unwrap());
        }
    }

    #[test]
    fn test_fractional_quantities_clear_exactly() {
        let orders = vec![
            bid(dec!(3.333333), dec!(0.700001), 0),
            bid(dec!(3.2), dec!(1.5), 1),
            ask(dec!(3.1), dec!(1.000001), 2),
        ];
        let result = clear(&orders, dec!(0.5));
        assert_eq!(result.volume, dec!(1.000001));
        assert_eq!(side_total(&result, Side::Bid), result.volume);
        assert_eq!(side_total(&result, Side::Ask), result.volume);
    }

    #[test]
    fn test_tie_prefers_smaller_gap_then_higher_price() {
        // Volume is 3 everywhere on the grid; 11 has the smallest |D-S|.
        let orders = vec![
            bid(dec!(11), dec!(2), 0),
            bid(dec!(11), dec!(2), 1),
            bid(dec!(10), dec!(5), 2),
            ask(dec!(9), dec!(3), 3),
        ];
        let result = clear(&orders, dec!(0.5));
        assert_eq!(result.p_star, Some(dec!(11)));
    }

    #[test]
    fn test_book_metrics() {
        let book = OrderBook::from_orders(vec![
            bid(dec!(10), dec!(4), 0),
            bid(dec!(10), dec!(2), 1),
            bid(dec!(9), dec!(1), 2),
            ask(dec!(11), dec!(2), 3),
            ask(dec!(12), dec!(5), 4),
        ]);
        let metrics = book.metrics();
        assert_eq!(metrics.best_bid, Some(dec!(10)));
        assert_eq!(metrics.best_ask, Some(dec!(11)));
        assert_eq!(metrics.spread, Some(dec!(1)));
        assert!(!metrics.is_crossed);
        assert_eq!(metrics.mid_price, Some(dec!(10.5)));
        assert_eq!(metrics.total_bid_quantity, dec!(7));
        assert_eq!(metrics.total_ask_quantity, dec!(7));
        assert_eq!(metrics.bid_order_count, 3);
        assert_eq!(metrics.ask_order_count, 2);
        assert_eq!(metrics.best_bid_depth, Some(dec!(6)));
        assert_eq!(metrics.best_ask_depth, Some(dec!(2)));
        assert_eq!(metrics.depth_imbalance, Some(dec!(0.5)));
    }

    #[test]
    fn test_crossed_book_metrics() {
        let book = OrderBook::from_orders(vec![bid(dec!(12), dec!(1), 0), ask(dec!(10), dec!(1), 1)]);
        let metrics = book.metrics();
        assert_eq!(metrics.spread, Some(dec!(-2)));
        assert!(metrics.is_crossed);
    }

    #[test]
    fn test_aggregate_levels_merges_same_price() {
        let mut bids = vec![
            bid(dec!(10), dec!(4), 0),
            bid(dec!(10), dec!(2), 1),
            bid(dec!(9), dec!(1), 2),
        ];
        sort_bids(&mut bids);
        let levels = aggregate_levels(&bids);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].price, dec!(10));
        assert_eq!(levels[0].total_quantity, dec!(6));
        assert_eq!(levels[0].order_count, 2);
        assert_eq!(levels[1].price, dec!(9));
    }

    #[test]
    fn test_adaptive_k_shifts_and_clamps() {
        assert_eq!(adaptive_k(dec!(0.5), dec!(1), dec!(0.15)), dec!(0.35));
        assert_eq!(adaptive_k(dec!(0.5), dec!(-1), dec!(0.15)), dec!(0.65));
        assert_eq!(adaptive_k(dec!(0.05), dec!(1), dec!(0.15)), Decimal::ZERO);
        assert_eq!(adaptive_k(dec!(0.95), dec!(-1), dec!(0.15)), Decimal::ONE);
        assert_eq!(adaptive_k(dec!(0.5), Decimal::ZERO, dec!(0.15)), dec!(0.5));
    }
}
