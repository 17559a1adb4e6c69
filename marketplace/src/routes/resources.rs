use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use clearing_engine::quantize;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::{ResourceTransaction, ResourceTxType, TraderInventory, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTxRequest {
    #[serde(rename = "type")]
    pub tx_type: String,
    pub product: String,
    pub quantity: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub fn inventory_routes() -> Router<AppState> {
    Router::new().route("/", get(my_inventory))
}

pub fn resource_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", post(record_transaction))
        .route("/transactions", get(list_transactions))
}

async fn my_inventory(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<TraderInventory>>, ApiError> {
    let inventory = TraderInventory::for_trader(&state.pool, user.id).await?;
    Ok(Json(inventory))
}

/// Manual inventory movement: physical deposit into, or withdrawal out of,
/// the marketplace. Always paired with an audit row.
async fn record_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<ResourceTxRequest>,
) -> Result<(StatusCode, Json<TraderInventory>), ApiError> {
    let product = req.product.trim();
    if product.is_empty() {
        return Err(ApiError::BadRequest("Field 'product' is required".into()));
    }
    let quantity = quantize(req.quantity);
    if quantity <= Decimal::ZERO {
        return Err(ApiError::BadRequest("Quantity must be positive".into()));
    }

    let (tx_type, delta) = match req.tx_type.as_str() {
        "deposit" => (ResourceTxType::Deposit, quantity),
        "withdraw" => (ResourceTxType::Withdraw, -quantity),
        _ => {
            return Err(ApiError::BadRequest(
                "Field 'type' must be 'deposit' or 'withdraw'".into(),
            ))
        }
    };

    if tx_type == ResourceTxType::Withdraw {
        let current = TraderInventory::get_quantity(&state.pool, user.id, product).await?;
        if current < quantity {
            return Err(ApiError::BadRequest(format!(
                "Insufficient inventory: holding {current}, requested {quantity}"
            )));
        }
    }

    let notes = req.notes.unwrap_or_else(|| format!("Manual {}", req.tx_type));
    let mut tx = state.pool.begin().await?;
    TraderInventory::adjust_in_tx(&mut tx, user.id, product, delta, tx_type, &notes).await?;
    tx.commit().await?;

    let quantity_after = TraderInventory::get_quantity(&state.pool, user.id, product).await?;
    Ok((
        StatusCode::CREATED,
        Json(TraderInventory {
            trader_id: user.id,
            product: product.to_string(),
            quantity: quantity_after,
            updated_at: chrono::Utc::now(),
        }),
    ))
}

async fn list_transactions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Vec<ResourceTransaction>>, ApiError> {
    let limit = query.limit.clamp(1, 200);
    let transactions = ResourceTransaction::list_for_trader(&state.pool, user.id, limit).await?;
    Ok(Json(transactions))
}
