use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// History row for one clearing round, written even when nothing traded.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuctionClearingRound {
    pub id: Uuid,
    pub auction_id: Uuid,
    pub round_number: i32,
    pub clearing_price: Option<Decimal>,
    pub clearing_volume: Option<Decimal>,
    pub clearing_demand: Option<Decimal>,
    pub clearing_supply: Option<Decimal>,
    pub total_bids: i32,
    pub total_asks: i32,
    pub matched_orders: i32,
    pub cleared_at: DateTime<Utc>,
}

pub struct NewClearingRound {
    pub auction_id: Uuid,
    pub round_number: i32,
    pub clearing_price: Option<Decimal>,
    pub clearing_volume: Option<Decimal>,
    pub clearing_demand: Option<Decimal>,
    pub clearing_supply: Option<Decimal>,
    pub total_bids: i32,
    pub total_asks: i32,
    pub matched_orders: i32,
}

impl AuctionClearingRound {
    pub async fn insert_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        row: &NewClearingRound,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO auction_clearing_rounds
                (auction_id, round_number, clearing_price, clearing_volume,
                 clearing_demand, clearing_supply, total_bids, total_asks, matched_orders)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(row.auction_id)
        .bind(row.round_number)
        .bind(row.clearing_price)
        .bind(row.clearing_volume)
        .bind(row.clearing_demand)
        .bind(row.clearing_supply)
        .bind(row.total_bids)
        .bind(row.total_asks)
        .bind(row.matched_orders)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn list_for_auction(
        pool: &PgPool,
        auction_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM auction_clearing_rounds
             WHERE auction_id = $1
             ORDER BY round_number DESC
             LIMIT $2",
        )
        .bind(auction_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
