use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticipantStatus::Pending => write!(f, "pending"),
            ParticipantStatus::Approved => write!(f, "approved"),
            ParticipantStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Uuid,
    pub auction_id: Uuid,
    pub trader_id: Uuid,
    pub account_id: Option<Uuid>,
    pub status: String,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// Join an auction: open auctions auto-approve, closed auctions start
    /// pending. Re-joining refreshes the row.
    pub async fn join(
        pool: &PgPool,
        auction_id: Uuid,
        trader_id: Uuid,
        account_id: Option<Uuid>,
        status: ParticipantStatus,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO auction_participants (auction_id, trader_id, account_id, status)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (auction_id, trader_id) DO UPDATE
                SET account_id = EXCLUDED.account_id,
                    status = EXCLUDED.status
             RETURNING *",
        )
        .bind(auction_id)
        .bind(trader_id)
        .bind(account_id)
        .bind(status.to_string())
        .fetch_one(pool)
        .await
    }

    pub async fn find(
        pool: &PgPool,
        auction_id: Uuid,
        trader_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM auction_participants WHERE auction_id = $1 AND trader_id = $2",
        )
        .bind(auction_id)
        .bind(trader_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_for_auction(
        pool: &PgPool,
        auction_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM auction_participants WHERE auction_id = $1 ORDER BY joined_at DESC",
        )
        .bind(auction_id)
        .fetch_all(pool)
        .await
    }

    pub async fn set_status(
        pool: &PgPool,
        auction_id: Uuid,
        participant_id: Uuid,
        status: ParticipantStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "UPDATE auction_participants SET status = $1
             WHERE id = $2 AND auction_id = $3
             RETURNING *",
        )
        .bind(status.to_string())
        .bind(participant_id)
        .bind(auction_id)
        .fetch_optional(pool)
        .await
    }

    pub fn is_approved(&self) -> bool {
        self.status == "approved"
    }
}
