use chrono::{DateTime, Utc};
use clearing_engine::{quantize, BookOrder, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::wallet::{WalletAccount, WalletError};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuctionOrder {
    pub id: Uuid,
    pub auction_id: Uuid,
    pub trader_id: Uuid,
    pub side: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub status: String,
    pub cleared_price: Option<Decimal>,
    pub cleared_quantity: Option<Decimal>,
    pub iteration: Option<i32>,
    /// Remaining reservation backing an open bid. Settlement decrements it
    /// as portions are spent or refunded.
    pub reserved_amount: Option<Decimal>,
    pub reserve_tx_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct PlaceOrderResult {
    pub order: AuctionOrder,
    pub reserved_amount: Option<Decimal>,
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AuctionOrder {
    pub fn side_enum(&self) -> Side {
        if self.side == "bid" {
            Side::Bid
        } else {
            Side::Ask
        }
    }

    pub fn to_book_order(&self) -> BookOrder {
        BookOrder {
            id: self.id,
            trader_id: self.trader_id,
            side: self.side_enum(),
            price: self.price,
            quantity: self.quantity,
            iteration: self.iteration,
            created_at: self.created_at,
        }
    }

    /// The reservation originally backing this bid; orders placed before
    /// reservations were recorded fall back to price * quantity.
    pub fn remaining_reservation(&self) -> Decimal {
        self.reserved_amount
            .unwrap_or_else(|| quantize(self.price * self.quantity))
    }

    /// Insert the order, reserving `price * quantity` for bids in the same
    /// transaction. Auction-state validation is the caller's job.
    pub async fn place(
        pool: &PgPool,
        auction_id: Uuid,
        trader_id: Uuid,
        side: Side,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<PlaceOrderResult, OrderError> {
        let mut tx = pool.begin().await?;

        let mut reserved_amount = None;
        let mut reserve_tx_id = None;
        if side == Side::Bid {
            let amount = quantize(price * quantity);
            let meta = json!({
                "auctionId": auction_id,
                "orderSide": side.to_string(),
                "price": price.to_string(),
                "quantity": quantity.to_string(),
            });
            let update =
                WalletAccount::reserve_in_tx(&mut tx, trader_id, amount, Some(&meta)).await?;
            reserved_amount = Some(amount);
            reserve_tx_id = Some(update.tx_id);
        }

        let order = sqlx::query_as::<_, AuctionOrder>(
            "INSERT INTO auction_orders
                (auction_id, trader_id, side, price, quantity, reserved_amount, reserve_tx_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(auction_id)
        .bind(trader_id)
        .bind(side.to_string())
        .bind(price)
        .bind(quantity)
        .bind(reserved_amount)
        .bind(reserve_tx_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(PlaceOrderResult {
            order,
            reserved_amount,
        })
    }

    pub async fn open_for_auction(pool: &PgPool, auction_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM auction_orders
             WHERE auction_id = $1 AND status = 'open'
             ORDER BY created_at",
        )
        .bind(auction_id)
        .fetch_all(pool)
        .await
    }

    pub async fn open_for_auction_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        auction_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM auction_orders
             WHERE auction_id = $1 AND status = 'open'
             ORDER BY created_at",
        )
        .bind(auction_id)
        .fetch_all(&mut **tx)
        .await
    }

    pub async fn list_for_auction(
        pool: &PgPool,
        auction_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM auction_orders WHERE auction_id = $1 ORDER BY created_at",
        )
        .bind(auction_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_for_trader(
        pool: &PgPool,
        trader_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM auction_orders
             WHERE trader_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(trader_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Recently cleared fills, newest first, for book displays.
    pub async fn recent_cleared(
        pool: &PgPool,
        auction_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM auction_orders
             WHERE auction_id = $1
               AND status = 'cleared'
               AND cleared_quantity IS NOT NULL
               AND cleared_quantity > 0
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(auction_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM auction_orders WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
