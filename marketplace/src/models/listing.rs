use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Draft,
    Published,
    Archived,
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingStatus::Draft => write!(f, "draft"),
            ListingStatus::Published => write!(f, "published"),
            ListingStatus::Archived => write!(f, "archived"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub starting_bid: Decimal,
    pub current_bid: Option<Decimal>,
    pub unit: String,
    pub base_quantity: Option<Decimal>,
    pub owner_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ListingUpdate {
    pub title: Option<String>,
    pub starting_bid: Option<Decimal>,
    pub current_bid: Option<Option<Decimal>>,
    pub unit: Option<String>,
    pub base_quantity: Option<Option<Decimal>>,
}

impl Listing {
    /// May this user edit or delete the listing? Creator or admin.
    pub fn can_mutate(&self, user_id: Uuid, is_admin: bool) -> bool {
        is_admin || self.owner_id == user_id
    }

    pub async fn create(
        pool: &PgPool,
        owner_id: Uuid,
        title: &str,
        starting_bid: Decimal,
        unit: &str,
        base_quantity: Option<Decimal>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO listings (title, starting_bid, unit, base_quantity, owner_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(title)
        .bind(starting_bid)
        .bind(unit)
        .bind(base_quantity)
        .bind(owner_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM listings WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Published listings for everyone, plus the viewer's own drafts.
    /// Admins see everything.
    pub async fn list_visible(
        pool: &PgPool,
        viewer: Option<Uuid>,
        is_admin: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        if is_admin {
            sqlx::query_as::<_, Self>("SELECT * FROM listings ORDER BY created_at DESC")
                .fetch_all(pool)
                .await
        } else {
            sqlx::query_as::<_, Self>(
                "SELECT * FROM listings
                 WHERE status = 'published' OR owner_id = $1
                 ORDER BY created_at DESC",
            )
            .bind(viewer)
            .fetch_all(pool)
            .await
        }
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        changes: &ListingUpdate,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "UPDATE listings SET
                title = COALESCE($1, title),
                starting_bid = COALESCE($2, starting_bid),
                current_bid = CASE WHEN $3 THEN $4 ELSE current_bid END,
                unit = COALESCE($5, unit),
                base_quantity = CASE WHEN $6 THEN $7 ELSE base_quantity END,
                updated_at = NOW()
             WHERE id = $8
             RETURNING *",
        )
        .bind(changes.title.as_deref())
        .bind(changes.starting_bid)
        .bind(changes.current_bid.is_some())
        .bind(changes.current_bid.clone().flatten())
        .bind(changes.unit.as_deref())
        .bind(changes.base_quantity.is_some())
        .bind(changes.base_quantity.clone().flatten())
        .bind(id)
        .fetch_one(pool)
        .await
    }

    pub async fn set_status(
        pool: &PgPool,
        id: Uuid,
        status: ListingStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "UPDATE listings SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(status.to_string())
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
