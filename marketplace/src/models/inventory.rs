use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceTxType {
    Deposit,
    Withdraw,
    InventoryAdd,
    InventoryRemove,
}

impl std::fmt::Display for ResourceTxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceTxType::Deposit => write!(f, "deposit"),
            ResourceTxType::Withdraw => write!(f, "withdraw"),
            ResourceTxType::InventoryAdd => write!(f, "inventory_add"),
            ResourceTxType::InventoryRemove => write!(f, "inventory_remove"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TraderInventory {
    pub trader_id: Uuid,
    pub product: String,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTransaction {
    pub id: Uuid,
    pub trader_id: Uuid,
    pub tx_type: String,
    pub quantity: Decimal,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TraderInventory {
    /// Apply a signed inventory delta and log the paired audit row. Rows
    /// that fall to zero or below are removed.
    pub async fn adjust_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        trader_id: Uuid,
        product: &str,
        delta: Decimal,
        tx_type: ResourceTxType,
        notes: &str,
    ) -> Result<(), sqlx::Error> {
        if delta == Decimal::ZERO {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO trader_inventory (trader_id, product, quantity)
             VALUES ($1, $2, $3)
             ON CONFLICT (trader_id, product) DO UPDATE
                SET quantity = trader_inventory.quantity + EXCLUDED.quantity,
                    updated_at = NOW()",
        )
        .bind(trader_id)
        .bind(product)
        .bind(delta)
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            "DELETE FROM trader_inventory
             WHERE trader_id = $1 AND product = $2 AND quantity <= 0",
        )
        .bind(trader_id)
        .bind(product)
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO resource_transactions (trader_id, tx_type, quantity, notes)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(trader_id)
        .bind(tx_type.to_string())
        .bind(delta.abs())
        .bind(notes)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn for_trader(pool: &PgPool, trader_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM trader_inventory WHERE trader_id = $1 ORDER BY product",
        )
        .bind(trader_id)
        .fetch_all(pool)
        .await
    }

    pub async fn get_quantity(
        pool: &PgPool,
        trader_id: Uuid,
        product: &str,
    ) -> Result<Decimal, sqlx::Error> {
        let quantity: Option<Decimal> = sqlx::query_scalar(
            "SELECT quantity FROM trader_inventory WHERE trader_id = $1 AND product = $2",
        )
        .bind(trader_id)
        .bind(product)
        .fetch_optional(pool)
        .await?;
        Ok(quantity.unwrap_or(Decimal::ZERO))
    }

    /// Whole-world `{trader -> product -> quantity}` map, written per round
    /// as an audit artifact; never read back by the clearing path.
    pub async fn snapshot_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        auction_id: Uuid,
        round_number: i32,
    ) -> Result<(), sqlx::Error> {
        let rows: Vec<(Uuid, String, Decimal)> = sqlx::query_as(
            "SELECT trader_id, product, quantity FROM trader_inventory
             WHERE quantity > 0
             ORDER BY trader_id, product",
        )
        .fetch_all(&mut **tx)
        .await?;

        let mut snapshot: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (trader_id, product, quantity) in rows {
            snapshot
                .entry(trader_id.to_string())
                .or_default()
                .insert(product, quantity.to_string());
        }
        let snapshot_json =
            serde_json::to_value(&snapshot).unwrap_or(serde_json::Value::Null);

        sqlx::query(
            "INSERT INTO inventory_snapshots (auction_id, round_number, snapshot_data)
             VALUES ($1, $2, $3)",
        )
        .bind(auction_id)
        .bind(round_number)
        .bind(snapshot_json)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

impl ResourceTransaction {
    pub async fn list_for_trader(
        pool: &PgPool,
        trader_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM resource_transactions
             WHERE trader_id = $1
             ORDER BY occurred_at DESC, id DESC
             LIMIT $2",
        )
        .bind(trader_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
