use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use clearing_engine::{quantize, Side};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    Auction, AuctionOrder, CreateAuction, AuctionType, Listing, ListingStatus, Participant,
    ParticipantStatus, User, WalletAccount,
};
use super::auth::hash_password;
use crate::settlement::{self, RoundSummary, SettleError};
use crate::AppState;

// === Request/Response Types ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuctionRequest {
    pub product: Option<String>,
    #[serde(rename = "type")]
    pub auction_type: Option<String>,
    pub k: Decimal,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub listing_id: Option<Uuid>,
    #[serde(default = "default_publish_listing")]
    pub publish_listing: bool,
}

fn default_publish_listing() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
pub struct ClearRequest {
    /// When set, the auction is finalized after the round: leftovers are
    /// rejected, reservations released, status becomes `cleared`.
    #[serde(default)]
    pub finalize: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub message: String,
    #[serde(flatten)]
    pub summary: RoundSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseResponse {
    pub message: String,
    pub rejected_orders: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRequest {
    #[serde(default = "default_bots")]
    pub bots: u32,
    pub base_price: Option<Decimal>,
    #[serde(default = "default_max_quantity")]
    pub max_quantity: u32,
}

fn default_bots() -> u32 {
    6
}

fn default_max_quantity() -> u32 {
    5
}

impl Default for SeedRequest {
    fn default() -> Self {
        Self {
            bots: default_bots(),
            base_price: None,
            max_quantity: default_max_quantity(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedResponse {
    pub message: String,
    pub bots: usize,
    pub orders: usize,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PurgeRequest {
    pub username_prefix: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResponse {
    pub message: String,
    pub removed_users: u64,
    pub bot_ids: Vec<Uuid>,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/auctions", post(create_auction))
        .route("/auctions/:auction_id/clear", post(clear_auction))
        .route("/auctions/:auction_id/close", patch(close_auction))
        .route("/auctions/:auction_id/orders", get(list_auction_orders))
        .route("/auctions/:auction_id/participants", get(list_participants))
        .route(
            "/auctions/:auction_id/participants/:participant_id/approve",
            patch(approve_participant),
        )
        .route(
            "/auctions/:auction_id/participants/:participant_id/reject",
            patch(reject_participant),
        )
        .route("/auctions/:auction_id/seed_random", post(seed_random))
        .route("/bots/purge", post(purge_bots))
}

fn ensure_admin(user: &User) -> Result<(), ApiError> {
    if user.is_admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin access required".into()))
    }
}

fn map_settle_error(e: SettleError) -> ApiError {
    match e {
        SettleError::NotFound => ApiError::NotFound("Auction not found".into()),
        SettleError::NotCollecting => {
            ApiError::Conflict("Auction is not in collecting state".into())
        }
        SettleError::Throttled { retry_at } => {
            ApiError::Conflict(format!("Clearing throttled until {retry_at}"))
        }
        SettleError::Wallet(w) => ApiError::from(w),
        SettleError::Database(d) => ApiError::Database(d),
    }
}

// === Route Handlers ===

async fn create_auction(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateAuctionRequest>,
) -> Result<(StatusCode, Json<Auction>), ApiError> {
    ensure_admin(&user)?;

    if req.k < Decimal::ZERO || req.k > Decimal::ONE {
        return Err(ApiError::BadRequest(
            "Field 'k' must be between 0 and 1".into(),
        ));
    }
    let auction_type = match req.auction_type.as_deref() {
        None | Some("open") => AuctionType::Open,
        Some("closed") => AuctionType::Closed,
        Some(_) => {
            return Err(ApiError::BadRequest(
                "Field 'type' must be 'open' or 'closed'".into(),
            ))
        }
    };
    if let (Some(start), Some(end)) = (req.window_start, req.window_end) {
        if end <= start {
            return Err(ApiError::BadRequest(
                "Field 'windowEnd' must be after 'windowStart'".into(),
            ));
        }
    }

    let mut product = req.product.unwrap_or_default().trim().to_string();
    let mut listing = None;
    if let Some(listing_id) = req.listing_id {
        let row = Listing::find(&state.pool, listing_id)
            .await?
            .ok_or_else(|| ApiError::BadRequest("Listing not found".into()))?;
        if product.is_empty() {
            product = row.title.trim().to_string();
        }
        listing = Some(row);
    }
    if product.is_empty() {
        return Err(ApiError::BadRequest("Field 'product' is required".into()));
    }

    let auction = Auction::create(
        &state.pool,
        &CreateAuction {
            product,
            auction_type,
            k_value: req.k,
            window_start: req.window_start,
            window_end: req.window_end,
            admin_id: user.id,
            listing_id: req.listing_id,
        },
    )
    .await?;

    if req.publish_listing {
        if let Some(row) = listing {
            if row.status != "published" {
                Listing::set_status(&state.pool, row.id, ListingStatus::Published).await?;
            }
        }
    }

    Ok((StatusCode::CREATED, Json(auction)))
}

/// Force an immediate clearing round, bypassing the scheduler throttle.
async fn clear_auction(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(auction_id): Path<Uuid>,
    req: Option<Json<ClearRequest>>,
) -> Result<Json<ClearResponse>, ApiError> {
    ensure_admin(&user)?;
    let req = req.map(|Json(r)| r).unwrap_or_default();

    let now = Utc::now();
    let summary = settlement::clear_and_settle(&state.pool, &state.config, auction_id, now, true)
        .await
        .map_err(map_settle_error)?;

    if req.finalize {
        settlement::close_auction(&state.pool, auction_id, now, "cleared")
            .await
            .map_err(map_settle_error)?;
    }

    let message = match summary.round_number {
        Some(round) if summary.volume > Decimal::ZERO => {
            format!("Auction cleared, round {round}")
        }
        Some(round) => format!("No trades cleared in round {round}"),
        None => "No orders to clear".into(),
    };

    Ok(Json(ClearResponse { message, summary }))
}

async fn close_auction(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(auction_id): Path<Uuid>,
) -> Result<Json<CloseResponse>, ApiError> {
    ensure_admin(&user)?;

    let (_, rejected) = settlement::close_auction(&state.pool, auction_id, Utc::now(), "closed")
        .await
        .map_err(map_settle_error)?;

    Ok(Json(CloseResponse {
        message: "Auction closed".into(),
        rejected_orders: rejected,
    }))
}

async fn list_auction_orders(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(auction_id): Path<Uuid>,
) -> Result<Json<Vec<AuctionOrder>>, ApiError> {
    ensure_admin(&user)?;
    if Auction::find(&state.pool, auction_id).await?.is_none() {
        return Err(ApiError::NotFound("Auction not found".into()));
    }
    let orders = AuctionOrder::list_for_auction(&state.pool, auction_id).await?;
    Ok(Json(orders))
}

async fn list_participants(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(auction_id): Path<Uuid>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    ensure_admin(&user)?;
    let participants = Participant::list_for_auction(&state.pool, auction_id).await?;
    Ok(Json(participants))
}

async fn approve_participant(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((auction_id, participant_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Participant>, ApiError> {
    set_participant_status(&state, &user, auction_id, participant_id, ParticipantStatus::Approved)
        .await
}

async fn reject_participant(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((auction_id, participant_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Participant>, ApiError> {
    set_participant_status(&state, &user, auction_id, participant_id, ParticipantStatus::Rejected)
        .await
}

async fn set_participant_status(
    state: &AppState,
    user: &User,
    auction_id: Uuid,
    participant_id: Uuid,
    status: ParticipantStatus,
) -> Result<Json<Participant>, ApiError> {
    ensure_admin(user)?;
    let participant = Participant::set_status(&state.pool, auction_id, participant_id, status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Participant not found".into()))?;
    Ok(Json(participant))
}

/// Seed bot traders with funded wallets and random crossed orders, for
/// demos and load checks. Bids reserve funds exactly like real orders.
async fn seed_random(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(auction_id): Path<Uuid>,
    req: Option<Json<SeedRequest>>,
) -> Result<(StatusCode, Json<SeedResponse>), ApiError> {
    ensure_admin(&user)?;
    let req = req.map(|Json(r)| r).unwrap_or_default();

    let auction = Auction::find(&state.pool, auction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Auction not found".into()))?;
    if !auction.is_collecting() {
        return Err(ApiError::Conflict(
            "Auction is not in collecting state".into(),
        ));
    }

    let bots = req.bots.clamp(1, 50);
    let max_quantity = req.max_quantity.clamp(1, 1000);
    let base_price = req.base_price.unwrap_or(dec!(100));
    if base_price <= Decimal::ZERO {
        return Err(ApiError::BadRequest("Field 'basePrice' must be positive".into()));
    }

    let mut created_bots = 0usize;
    let mut created_orders = 0usize;

    for i in 0..bots {
        let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
        let username = format!("bot_{i}_{suffix}");
        let password: String = format!("bot-pw-{}", Uuid::new_v4());
        let password_hash = hash_password(&password)?;
        let bot = match User::create(&state.pool, &username, &password_hash, false).await {
            Ok(user) => user,
            // Unique-violation on a collision: skip this slot.
            Err(_) => continue,
        };
        created_bots += 1;

        let funding = quantize(
            base_price * Decimal::from(max_quantity) * dec!(4),
        );
        let meta = json!({ "source": "seed_random", "auctionId": auction_id });
        WalletAccount::deposit(&state.pool, bot.id, funding, Some(&meta)).await?;

        Participant::join(
            &state.pool,
            auction_id,
            bot.id,
            None,
            ParticipantStatus::Approved,
        )
        .await?;

        let orders_for_bot = rand::thread_rng().gen_range(1..=2);
        for _ in 0..orders_for_bot {
            let (side, price, quantity) = {
                let mut rng = rand::thread_rng();
                let side = if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
                // Prices scatter within +-10% of the base so sides cross.
                let drift_bps: i64 = rng.gen_range(-1000..=1000);
                let price = quantize(
                    base_price * (Decimal::ONE + Decimal::new(drift_bps, 4)),
                );
                let quantity = Decimal::from(rng.gen_range(1..=max_quantity));
                (side, price, quantity)
            };
            if price <= Decimal::ZERO {
                continue;
            }

            match AuctionOrder::place(&state.pool, auction_id, bot.id, side, price, quantity).await
            {
                Ok(_) => created_orders += 1,
                Err(e) => {
                    tracing::warn!("seed order failed for bot {}: {}", bot.id, e);
                }
            }
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(SeedResponse {
            message: "Bots seeded".into(),
            bots: created_bots,
            orders: created_orders,
        }),
    ))
}

/// Remove every bot user and, via cascading foreign keys, all of their
/// orders, participations, wallet rows and inventory.
async fn purge_bots(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    req: Option<Json<PurgeRequest>>,
) -> Result<Json<PurgeResponse>, ApiError> {
    ensure_admin(&user)?;
    let req = req.map(|Json(r)| r).unwrap_or_default();

    let prefix = req.username_prefix.unwrap_or_else(|| "bot_".to_string());
    let pattern = format!("{prefix}%");

    let bot_ids: Vec<Uuid> = sqlx::query_scalar(
        "SELECT id FROM users WHERE username LIKE $1 AND is_admin = FALSE",
    )
    .bind(&pattern)
    .fetch_all(&state.pool)
    .await?;

    if bot_ids.is_empty() {
        return Ok(Json(PurgeResponse {
            message: "No bot users".into(),
            removed_users: 0,
            bot_ids,
        }));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ANY($1)")
        .bind(&bot_ids)
        .execute(&state.pool)
        .await?;

    Ok(Json(PurgeResponse {
        message: "Bots purged".into(),
        removed_users: result.rows_affected(),
        bot_ids,
    }))
}
