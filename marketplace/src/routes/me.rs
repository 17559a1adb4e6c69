use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Auction, AuctionOrder, User};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(profile))
        .route("/orders", get(my_orders))
        .route("/auctions", get(my_auctions))
}

async fn profile(Extension(user): Extension<User>) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        id: user.id,
        username: user.username,
        is_admin: user.is_admin,
    })
}

async fn my_orders(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<AuctionOrder>>, ApiError> {
    let limit = query.limit.clamp(1, 200);
    let orders = AuctionOrder::list_for_trader(&state.pool, user.id, limit).await?;
    Ok(Json(orders))
}

async fn my_auctions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Auction>>, ApiError> {
    let auctions = sqlx::query_as::<_, Auction>(
        "SELECT a.* FROM auctions a
         JOIN auction_participants p ON p.auction_id = a.id
         WHERE p.trader_id = $1
         ORDER BY a.created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(auctions))
}
