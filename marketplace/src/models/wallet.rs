use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletTxType {
    Deposit,
    Withdraw,
    Reserve,
    Release,
    Spend,
}

impl std::fmt::Display for WalletTxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletTxType::Deposit => write!(f, "deposit"),
            WalletTxType::Withdraw => write!(f, "withdraw"),
            WalletTxType::Reserve => write!(f, "reserve"),
            WalletTxType::Release => write!(f, "release"),
            WalletTxType::Spend => write!(f, "spend"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    pub user_id: Uuid,
    pub available: Decimal,
    pub reserved: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only ledger row. `balance_after` records the *available* balance
/// once the operation is applied.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tx_type: String,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Amount must be positive")]
    NonPositiveAmount,
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Decimal, required: Decimal },
    #[error("Insufficient reserved funds: reserved {reserved}, required {required}")]
    InsufficientReserved { reserved: Decimal, required: Decimal },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome of one wallet operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletUpdate {
    pub available: Decimal,
    pub reserved: Decimal,
    pub tx_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletBalance {
    pub available: Decimal,
    pub reserved: Decimal,
    pub total: Decimal,
}

impl WalletAccount {
    /// Upsert the wallet row and take a row-level lock on it for the rest
    /// of the transaction. Returns the current `(available, reserved)`.
    async fn lock(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> Result<(Decimal, Decimal), sqlx::Error> {
        sqlx::query("INSERT INTO wallet_accounts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query_as::<_, (Decimal, Decimal)>(
            "SELECT available, reserved FROM wallet_accounts WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await
    }

    async fn store(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        available: Decimal,
        reserved: Decimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE wallet_accounts SET available = $1, reserved = $2, updated_at = NOW()
             WHERE user_id = $3",
        )
        .bind(available)
        .bind(reserved)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn log(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        tx_type: WalletTxType,
        amount: Decimal,
        balance_after: Decimal,
        meta: Option<&serde_json::Value>,
    ) -> Result<Uuid, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO wallet_transactions (user_id, tx_type, amount, balance_after, meta)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(user_id)
        .bind(tx_type.to_string())
        .bind(amount)
        .bind(balance_after)
        .bind(meta)
        .fetch_one(&mut **tx)
        .await
    }

    /// `available += amount`.
    pub async fn deposit_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount: Decimal,
        meta: Option<&serde_json::Value>,
    ) -> Result<WalletUpdate, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount);
        }
        let (available, reserved) = Self::lock(tx, user_id).await?;
        let available = available + amount;
        Self::store(tx, user_id, available, reserved).await?;
        let tx_id = Self::log(tx, user_id, WalletTxType::Deposit, amount, available, meta).await?;
        Ok(WalletUpdate {
            available,
            reserved,
            tx_id,
        })
    }

    /// `available -= amount`, failing when the balance cannot cover it.
    pub async fn withdraw_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount: Decimal,
        meta: Option<&serde_json::Value>,
    ) -> Result<WalletUpdate, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount);
        }
        let (available, reserved) = Self::lock(tx, user_id).await?;
        if available < amount {
            return Err(WalletError::InsufficientFunds {
                available,
                required: amount,
            });
        }
        let available = available - amount;
        Self::store(tx, user_id, available, reserved).await?;
        let tx_id =
            Self::log(tx, user_id, WalletTxType::Withdraw, -amount, available, meta).await?;
        Ok(WalletUpdate {
            available,
            reserved,
            tx_id,
        })
    }

    /// Move `amount` from available into reserved.
    pub async fn reserve_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount: Decimal,
        meta: Option<&serde_json::Value>,
    ) -> Result<WalletUpdate, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount);
        }
        let (available, reserved) = Self::lock(tx, user_id).await?;
        if available < amount {
            return Err(WalletError::InsufficientFunds {
                available,
                required: amount,
            });
        }
        let available = available - amount;
        let reserved = reserved + amount;
        Self::store(tx, user_id, available, reserved).await?;
        let tx_id = Self::log(tx, user_id, WalletTxType::Reserve, -amount, available, meta).await?;
        Ok(WalletUpdate {
            available,
            reserved,
            tx_id,
        })
    }

    /// Return reserved funds to available. Over-release clamps to the
    /// reserved balance, so a stale caller can never drive it negative.
    pub async fn release_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount: Decimal,
        meta: Option<&serde_json::Value>,
    ) -> Result<WalletUpdate, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount);
        }
        let (available, reserved) = Self::lock(tx, user_id).await?;
        let amount = amount.min(reserved);
        let available = available + amount;
        let reserved = reserved - amount;
        Self::store(tx, user_id, available, reserved).await?;
        let tx_id = Self::log(tx, user_id, WalletTxType::Release, amount, available, meta).await?;
        Ok(WalletUpdate {
            available,
            reserved,
            tx_id,
        })
    }

    /// Consume reserved funds without crediting available.
    pub async fn spend_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount: Decimal,
        meta: Option<&serde_json::Value>,
    ) -> Result<WalletUpdate, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount);
        }
        let (available, reserved) = Self::lock(tx, user_id).await?;
        if reserved < amount {
            return Err(WalletError::InsufficientReserved {
                reserved,
                required: amount,
            });
        }
        let reserved = reserved - amount;
        Self::store(tx, user_id, available, reserved).await?;
        let tx_id = Self::log(tx, user_id, WalletTxType::Spend, -amount, available, meta).await?;
        Ok(WalletUpdate {
            available,
            reserved,
            tx_id,
        })
    }

    pub async fn deposit(
        pool: &PgPool,
        user_id: Uuid,
        amount: Decimal,
        meta: Option<&serde_json::Value>,
    ) -> Result<WalletUpdate, WalletError> {
        let mut tx = pool.begin().await?;
        let update = Self::deposit_in_tx(&mut tx, user_id, amount, meta).await?;
        tx.commit().await?;
        Ok(update)
    }

    pub async fn withdraw(
        pool: &PgPool,
        user_id: Uuid,
        amount: Decimal,
        meta: Option<&serde_json::Value>,
    ) -> Result<WalletUpdate, WalletError> {
        let mut tx = pool.begin().await?;
        let update = Self::withdraw_in_tx(&mut tx, user_id, amount, meta).await?;
        tx.commit().await?;
        Ok(update)
    }

    pub async fn reserve(
        pool: &PgPool,
        user_id: Uuid,
        amount: Decimal,
        meta: Option<&serde_json::Value>,
    ) -> Result<WalletUpdate, WalletError> {
        let mut tx = pool.begin().await?;
        let update = Self::reserve_in_tx(&mut tx, user_id, amount, meta).await?;
        tx.commit().await?;
        Ok(update)
    }

    pub async fn release(
        pool: &PgPool,
        user_id: Uuid,
        amount: Decimal,
        meta: Option<&serde_json::Value>,
    ) -> Result<WalletUpdate, WalletError> {
        let mut tx = pool.begin().await?;
        let update = Self::release_in_tx(&mut tx, user_id, amount, meta).await?;
        tx.commit().await?;
        Ok(update)
    }

    pub async fn spend(
        pool: &PgPool,
        user_id: Uuid,
        amount: Decimal,
        meta: Option<&serde_json::Value>,
    ) -> Result<WalletUpdate, WalletError> {
        let mut tx = pool.begin().await?;
        let update = Self::spend_in_tx(&mut tx, user_id, amount, meta).await?;
        tx.commit().await?;
        Ok(update)
    }

    /// Current balances; a user without a wallet row reads as all zeros.
    pub async fn balance(pool: &PgPool, user_id: Uuid) -> Result<WalletBalance, sqlx::Error> {
        let row: Option<(Decimal, Decimal)> = sqlx::query_as(
            "SELECT available, reserved FROM wallet_accounts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        let (available, reserved) = row.unwrap_or((Decimal::ZERO, Decimal::ZERO));
        Ok(WalletBalance {
            available,
            reserved,
            total: available + reserved,
        })
    }

    pub async fn transactions(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, sqlx::Error> {
        sqlx::query_as::<_, WalletTransaction>(
            "SELECT * FROM wallet_transactions
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
