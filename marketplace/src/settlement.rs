use chrono::{DateTime, Utc};
use clearing_engine::{clear, quantize, Side};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::docs::{self, TradeRole};
use crate::models::{
    Auction, AuctionClearingRound, AuctionOrder, NewClearingRound, ResourceTxType,
    TraderInventory, WalletAccount, WalletError,
};
use crate::Config;

#[derive(Debug, thiserror::Error)]
pub enum SettleError {
    #[error("Auction not found")]
    NotFound,
    #[error("Auction is not collecting orders")]
    NotCollecting,
    #[error("Clearing throttled until {retry_at}")]
    Throttled { retry_at: DateTime<Utc> },
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What one clearing round did, for logs and the manual-clear response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary {
    pub auction_id: Uuid,
    /// `None` when the book was empty and the round was skipped.
    pub round_number: Option<i32>,
    pub price: Option<Decimal>,
    pub volume: Decimal,
    pub demand: Decimal,
    pub supply: Decimal,
    pub price_low: Option<Decimal>,
    pub price_high: Option<Decimal>,
    pub total_bids: i32,
    pub total_asks: i32,
    pub matched_orders: i32,
}

struct PendingDocument {
    role: TradeRole,
    trader_id: Uuid,
    quantity: Decimal,
}

/// Run one clearing round for an auction and settle the outcome.
///
/// The auction row is locked for the whole transaction, so concurrent
/// rounds against the same auction serialize; everything up to the commit
/// either lands together or not at all. `force` is the manual-clear path
/// and skips the inter-round throttle.
pub async fn clear_and_settle(
    pool: &PgPool,
    config: &Config,
    auction_id: Uuid,
    now: DateTime<Utc>,
    force: bool,
) -> Result<RoundSummary, SettleError> {
    let interval = config.clearing_interval_chrono();
    let mut tx = pool.begin().await?;

    let auction = Auction::find_for_update(&mut tx, auction_id)
        .await?
        .ok_or(SettleError::NotFound)?;
    if !auction.is_collecting() {
        return Err(SettleError::NotCollecting);
    }
    if !force {
        if let Some(last) = auction.last_clearing_at {
            let min_next = last + interval;
            if now < min_next {
                return Err(SettleError::Throttled { retry_at: min_next });
            }
        }
    }

    let orders = AuctionOrder::open_for_auction_in_tx(&mut tx, auction_id).await?;
    let next_clearing_at = now + interval;

    // An entirely empty book only reschedules; round numbers stay gapless.
    if orders.is_empty() {
        sqlx::query("UPDATE auctions SET next_clearing_at = $1 WHERE id = $2")
            .bind(next_clearing_at)
            .bind(auction_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        return Ok(RoundSummary {
            auction_id,
            round_number: None,
            price: None,
            volume: Decimal::ZERO,
            demand: Decimal::ZERO,
            supply: Decimal::ZERO,
            price_low: None,
            price_high: None,
            total_bids: 0,
            total_asks: 0,
            matched_orders: 0,
        });
    }

    let book: Vec<_> = orders.iter().map(AuctionOrder::to_book_order).collect();
    let result = clear(&book, auction.k_value);
    let round_number = auction.current_round + 1;

    let allocated: HashMap<Uuid, Decimal> = result
        .allocations
        .iter()
        .map(|a| (a.order_id, a.cleared_qty))
        .collect();

    let mut documents: Vec<PendingDocument> = Vec::new();

    // Wallet rows are locked in trader order, so two settlements touching
    // the same traders cannot deadlock.
    let mut orders_by_trader: Vec<&AuctionOrder> = orders.iter().collect();
    orders_by_trader.sort_by_key(|o| (o.trader_id, o.id));

    if let Some(clearing_price) = result.price {
        for order in orders_by_trader {
            let cleared = quantize(allocated.get(&order.id).copied().unwrap_or(Decimal::ZERO));
            if cleared <= Decimal::ZERO {
                continue;
            }
            let fully_filled = cleared >= order.quantity;

            if fully_filled {
                sqlx::query(
                    "UPDATE auction_orders
                     SET status = 'cleared',
                         cleared_price = $1,
                         cleared_quantity = COALESCE(cleared_quantity, 0) + $2,
                         iteration = $3,
                         reserved_amount = NULL
                     WHERE id = $4",
                )
                .bind(clearing_price)
                .bind(cleared)
                .bind(round_number)
                .bind(order.id)
                .execute(&mut *tx)
                .await?;
            } else {
                sqlx::query(
                    "UPDATE auction_orders
                     SET quantity = quantity - $2,
                         cleared_price = $1,
                         cleared_quantity = COALESCE(cleared_quantity, 0) + $2,
                         iteration = $3
                     WHERE id = $4",
                )
                .bind(clearing_price)
                .bind(cleared)
                .bind(round_number)
                .bind(order.id)
                .execute(&mut *tx)
                .await?;
            }

            let meta = json!({
                "auctionId": auction_id,
                "orderId": order.id,
                "round": round_number,
                "product": auction.product,
                "orderPrice": order.price.to_string(),
                "clearingPrice": clearing_price.to_string(),
                "quantity": cleared.to_string(),
            });

            match order.side_enum() {
                Side::Bid => {
                    // Spend the cleared portion of the reservation; refund
                    // the gap between the bid price and the clearing price.
                    // The untouched remainder of a partial fill stays
                    // reserved for future rounds.
                    let spent = quantize(clearing_price * cleared);
                    if spent > Decimal::ZERO {
                        WalletAccount::spend_in_tx(&mut tx, order.trader_id, spent, Some(&meta))
                            .await?;
                    }
                    let reserved_total = order.remaining_reservation();
                    let refund = if fully_filled {
                        (reserved_total - spent).max(Decimal::ZERO)
                    } else {
                        (quantize(order.price * cleared) - spent).max(Decimal::ZERO)
                    };
                    if refund > Decimal::ZERO {
                        WalletAccount::release_in_tx(&mut tx, order.trader_id, refund, Some(&meta))
                            .await?;
                    }
                    if !fully_filled {
                        let remaining = (reserved_total - spent - refund).max(Decimal::ZERO);
                        sqlx::query("UPDATE auction_orders SET reserved_amount = $1 WHERE id = $2")
                            .bind(remaining)
                            .bind(order.id)
                            .execute(&mut *tx)
                            .await?;
                    }

                    TraderInventory::adjust_in_tx(
                        &mut tx,
                        order.trader_id,
                        &auction.product,
                        cleared,
                        ResourceTxType::InventoryAdd,
                        &format!("Auction {auction_id}, round {round_number}, order {}", order.id),
                    )
                    .await?;

                    documents.push(PendingDocument {
                        role: TradeRole::Buyer,
                        trader_id: order.trader_id,
                        quantity: cleared,
                    });
                }
                Side::Ask => {
                    let proceeds = quantize(clearing_price * cleared);
                    if proceeds > Decimal::ZERO {
                        WalletAccount::deposit_in_tx(&mut tx, order.trader_id, proceeds, Some(&meta))
                            .await?;
                    }

                    TraderInventory::adjust_in_tx(
                        &mut tx,
                        order.trader_id,
                        &auction.product,
                        -cleared,
                        ResourceTxType::InventoryRemove,
                        &format!("Auction {auction_id}, round {round_number}, order {}", order.id),
                    )
                    .await?;

                    documents.push(PendingDocument {
                        role: TradeRole::Seller,
                        trader_id: order.trader_id,
                        quantity: cleared,
                    });
                }
            }
        }
    }

    let total_bids = orders.iter().filter(|o| o.side == "bid").count() as i32;
    let total_asks = orders.iter().filter(|o| o.side == "ask").count() as i32;
    let matched_orders = result.allocations.len() as i32;

    AuctionClearingRound::insert_in_tx(
        &mut tx,
        &NewClearingRound {
            auction_id,
            round_number,
            clearing_price: result.price,
            clearing_volume: Some(result.volume),
            clearing_demand: Some(result.demand),
            clearing_supply: Some(result.supply),
            total_bids,
            total_asks,
            matched_orders,
        },
    )
    .await?;

    TraderInventory::snapshot_in_tx(&mut tx, auction_id, round_number).await?;

    let (price_low, price_high) = result.price_interval;
    sqlx::query(
        "UPDATE auctions
         SET current_round = $1,
             last_clearing_at = $2,
             next_clearing_at = $3,
             clearing_price = $4,
             clearing_quantity = $5,
             clearing_demand = $6,
             clearing_supply = $7,
             clearing_price_low = $8,
             clearing_price_high = $9
         WHERE id = $10",
    )
    .bind(round_number)
    .bind(now)
    .bind(next_clearing_at)
    .bind(result.price)
    .bind(result.volume)
    .bind(result.demand)
    .bind(result.supply)
    .bind(price_low)
    .bind(price_high)
    .bind(auction_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    // Receipts are best-effort; a failed write never unwinds the round.
    if let Some(clearing_price) = result.price {
        for doc in &documents {
            if let Err(e) = docs::write_trade_document(
                &config.docs_root,
                &config.jwt_secret,
                auction_id,
                &auction.product,
                doc.role,
                doc.trader_id,
                clearing_price,
                doc.quantity,
                now,
            ) {
                tracing::warn!(
                    "failed to write trade document for trader {} in auction {}: {}",
                    doc.trader_id,
                    auction_id,
                    e
                );
            }
        }
    }

    tracing::info!(
        "auction {} round {} cleared: price={:?} volume={} matched={}",
        auction_id,
        round_number,
        result.price,
        result.volume,
        matched_orders
    );

    Ok(RoundSummary {
        auction_id,
        round_number: Some(round_number),
        price: result.price,
        volume: result.volume,
        demand: result.demand,
        supply: result.supply,
        price_low,
        price_high,
        total_bids,
        total_asks,
        matched_orders,
    })
}

/// Close an auction: reject its remaining open orders and release every
/// bid's leftover reservation. Shared by the admin endpoint and the
/// scheduler's window-expiry sweep.
pub async fn close_auction(
    pool: &PgPool,
    auction_id: Uuid,
    now: DateTime<Utc>,
    final_status: &str,
) -> Result<(Auction, usize), SettleError> {
    let mut tx = pool.begin().await?;

    let auction = Auction::find_for_update(&mut tx, auction_id)
        .await?
        .ok_or(SettleError::NotFound)?;
    if !auction.is_collecting() {
        return Err(SettleError::NotCollecting);
    }

    let mut open_orders = AuctionOrder::open_for_auction_in_tx(&mut tx, auction_id).await?;
    let rejected = open_orders.len();
    open_orders.sort_by_key(|o| (o.trader_id, o.id));

    for order in &open_orders {
        sqlx::query("UPDATE auction_orders SET status = 'rejected' WHERE id = $1")
            .bind(order.id)
            .execute(&mut *tx)
            .await?;

        if order.side_enum() == Side::Bid {
            let remaining = order.remaining_reservation();
            if remaining > Decimal::ZERO {
                let meta = json!({
                    "auctionId": auction_id,
                    "orderId": order.id,
                    "action": "auction_closed",
                });
                WalletAccount::release_in_tx(&mut tx, order.trader_id, remaining, Some(&meta))
                    .await?;
            }
        }
    }

    let auction = sqlx::query_as::<_, Auction>(
        "UPDATE auctions SET status = $1, closed_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(final_status)
    .bind(now)
    .bind(auction_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        "auction {} closed ({}) with {} open orders rejected",
        auction_id,
        final_status,
        rejected
    );

    Ok((auction, rejected))
}
