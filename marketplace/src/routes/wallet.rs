use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use clearing_engine::quantize;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::models::{User, WalletAccount, WalletBalance, WalletTransaction, WalletUpdate};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_balance))
        .route("/deposit", post(deposit))
        .route("/withdraw", post(withdraw))
        .route("/transactions", get(list_transactions))
}

async fn get_balance(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<WalletBalance>, ApiError> {
    let balance = WalletAccount::balance(&state.pool, user.id).await?;
    Ok(Json(balance))
}

async fn deposit(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<WalletUpdate>, ApiError> {
    let amount = quantize(req.amount);
    let meta = json!({ "source": "api" });
    let update = WalletAccount::deposit(&state.pool, user.id, amount, Some(&meta)).await?;
    Ok(Json(update))
}

async fn withdraw(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<WalletUpdate>, ApiError> {
    let amount = quantize(req.amount);
    let meta = json!({ "source": "api" });
    let update = WalletAccount::withdraw(&state.pool, user.id, amount, Some(&meta)).await?;
    Ok(Json(update))
}

async fn list_transactions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Vec<WalletTransaction>>, ApiError> {
    let limit = query.limit.clamp(1, 200);
    let transactions = WalletAccount::transactions(&state.pool, user.id, limit).await?;
    Ok(Json(transactions))
}
