use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionType {
    Open,
    Closed,
}

impl std::fmt::Display for AuctionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuctionType::Open => write!(f, "open"),
            AuctionType::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Collecting,
    Cleared,
    Closed,
}

impl std::fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuctionStatus::Collecting => write!(f, "collecting"),
            AuctionStatus::Cleared => write!(f, "cleared"),
            AuctionStatus::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub id: Uuid,
    pub product: String,
    pub auction_type: String,
    pub k_value: Decimal,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub status: String,
    pub approval_status: String,
    pub creator_id: Option<Uuid>,
    pub admin_id: Option<Uuid>,
    pub listing_id: Option<Uuid>,
    pub current_round: i32,
    pub last_clearing_at: Option<DateTime<Utc>>,
    pub next_clearing_at: Option<DateTime<Utc>>,
    pub clearing_price: Option<Decimal>,
    pub clearing_quantity: Option<Decimal>,
    pub clearing_demand: Option<Decimal>,
    pub clearing_supply: Option<Decimal>,
    pub clearing_price_low: Option<Decimal>,
    pub clearing_price_high: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateAuction {
    pub product: String,
    pub auction_type: AuctionType,
    pub k_value: Decimal,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub admin_id: Uuid,
    pub listing_id: Option<Uuid>,
}

impl Auction {
    pub fn is_collecting(&self) -> bool {
        self.status == "collecting"
    }

    pub fn is_closed_type(&self) -> bool {
        self.auction_type == "closed"
    }

    /// Is the trading window open at `now`? Unset bounds are unrestricted.
    pub fn window_open(&self, now: DateTime<Utc>) -> bool {
        if let Some(start) = self.window_start {
            if now < start {
                return false;
            }
        }
        if let Some(end) = self.window_end {
            if now > end {
                return false;
            }
        }
        true
    }

    pub async fn create(pool: &PgPool, params: &CreateAuction) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO auctions
                (product, auction_type, k_value, window_start, window_end, creator_id, admin_id, listing_id)
             VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
             RETURNING *",
        )
        .bind(&params.product)
        .bind(params.auction_type.to_string())
        .bind(params.k_value)
        .bind(params.window_start)
        .bind(params.window_end)
        .bind(params.admin_id)
        .bind(params.listing_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM auctions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lock the auction row for the rest of the transaction. Serializes
    /// concurrent clearing attempts against the same auction.
    pub async fn find_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM auctions WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        status: Option<&str>,
        auction_type: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM auctions
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::text IS NULL OR auction_type = $2)
             ORDER BY created_at DESC",
        )
        .bind(status)
        .bind(auction_type)
        .fetch_all(pool)
        .await
    }

    /// Collecting auctions whose trading window has already ended.
    pub async fn expired_windows(
        pool: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM auctions
             WHERE status = 'collecting'
               AND window_end IS NOT NULL
               AND window_end <= $1",
        )
        .bind(now)
        .fetch_all(pool)
        .await
    }

    /// Collecting auctions due for a clearing round at `now`.
    pub async fn due_for_clearing(
        pool: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM auctions
             WHERE status = 'collecting'
               AND (next_clearing_at IS NULL OR next_clearing_at <= $1)
             ORDER BY created_at",
        )
        .bind(now)
        .fetch_all(pool)
        .await
    }

    pub async fn bump_next_clearing(
        pool: &PgPool,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE auctions SET next_clearing_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_k_value(pool: &PgPool, id: Uuid, k: Decimal) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE auctions SET k_value = $1 WHERE id = $2")
            .bind(k)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
