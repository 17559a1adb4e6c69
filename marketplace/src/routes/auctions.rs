use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use clearing_engine::{adaptive_k, quantize, BookMetrics, OrderBook, PriceLevel, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    Auction, AuctionClearingRound, AuctionOrder, Participant, ParticipantStatus, User,
};
use crate::AppState;

// === Request/Response Types ===

#[derive(Debug, Deserialize)]
pub struct ListAuctionsQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub auction_type: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub account_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub side: String,
    pub price: Decimal,
    pub quantity: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_amount: Option<Decimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDto {
    pub price: Decimal,
    pub total_quantity: Decimal,
    pub order_count: u32,
}

#[derive(Debug, Serialize)]
pub struct BookSides {
    pub bids: Vec<LevelDto>,
    pub asks: Vec<LevelDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDto {
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub is_crossed_market: bool,
    pub mid_price: Option<Decimal>,
    pub total_bid_quantity: Decimal,
    pub total_ask_quantity: Decimal,
    pub bid_order_count: u32,
    pub ask_order_count: u32,
    pub best_bid_depth: Option<Decimal>,
    pub best_ask_depth: Option<Decimal>,
    pub depth_imbalance: Option<Decimal>,
    pub last_clearing_price: Option<Decimal>,
    pub last_clearing_quantity: Option<Decimal>,
    pub k_value: Decimal,
    pub adaptive_k: Option<Decimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentOrderDto {
    pub id: Uuid,
    pub side: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub trader_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RecentOrders {
    pub bids: Vec<RecentOrderDto>,
    pub asks: Vec<RecentOrderDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearedOrderDto {
    pub id: Uuid,
    pub side: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub auction: Auction,
    pub book: BookSides,
    pub metrics: MetricsDto,
    pub recent_orders: RecentOrders,
    pub recent_clearing: Vec<ClearedOrderDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub t: DateTime<Utc>,
    pub round: i32,
    pub price: Option<Decimal>,
    pub quantity: Option<Decimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurvePoint {
    pub price: Decimal,
    pub depth: Decimal,
    pub cum: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub auction_id: Uuid,
    pub status: String,
    pub cleared_series: Vec<HistoryPoint>,
    pub book_curve: BookCurve,
}

#[derive(Debug, Serialize)]
pub struct BookCurve {
    pub bids: Vec<CurvePoint>,
    pub asks: Vec<CurvePoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionBucket {
    pub price: Decimal,
    pub quantity: Decimal,
    pub count: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionResponse {
    pub auction_id: Uuid,
    pub mid: Option<Decimal>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub bids: Vec<DistributionBucket>,
    pub asks: Vec<DistributionBucket>,
}

// === Routers ===

pub fn auction_public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_auctions))
        .route("/:auction_id/book", get(auction_book))
        .route("/:auction_id/history", get(auction_history))
        .route("/:auction_id/distribution", get(auction_distribution))
}

pub fn auction_trader_routes() -> Router<AppState> {
    Router::new()
        .route("/:auction_id/join", post(join_auction))
        .route("/:auction_id/orders", post(place_order))
        .route("/:auction_id/participants/me", get(my_participation))
}

// === Helpers ===

fn level_dto(level: &PriceLevel) -> LevelDto {
    LevelDto {
        price: level.price,
        total_quantity: level.total_quantity,
        order_count: level.order_count,
    }
}

fn recent_order_dto(order: &clearing_engine::BookOrder) -> RecentOrderDto {
    RecentOrderDto {
        id: order.id,
        side: order.side.to_string(),
        price: order.price,
        quantity: order.quantity,
        trader_id: order.trader_id,
        created_at: order.created_at,
    }
}

fn curve(levels: &[PriceLevel]) -> Vec<CurvePoint> {
    let mut cum = Decimal::ZERO;
    levels
        .iter()
        .map(|level| {
            cum += level.total_quantity;
            CurvePoint {
                price: level.price,
                depth: level.total_quantity,
                cum,
            }
        })
        .collect()
}

// === Route Handlers ===

async fn list_auctions(
    State(state): State<AppState>,
    Query(query): Query<ListAuctionsQuery>,
) -> Result<Json<Vec<Auction>>, ApiError> {
    let status = match query.status.as_deref() {
        Some(s @ ("collecting" | "cleared" | "closed")) => Some(s),
        Some(_) => return Err(ApiError::BadRequest("Invalid status filter".into())),
        None => None,
    };
    let auction_type = match query.auction_type.as_deref() {
        Some(t @ ("open" | "closed")) => Some(t),
        Some(_) => return Err(ApiError::BadRequest("Invalid type filter".into())),
        None => None,
    };

    let auctions = Auction::list(&state.pool, status, auction_type).await?;
    Ok(Json(auctions))
}

/// Book snapshot with display metrics and the adaptive-k hint. A hint that
/// drifts at least the configured threshold from the stored `k` is written
/// back; the clearing engine still uses whatever is stored at tick time.
async fn auction_book(
    State(state): State<AppState>,
    Path(auction_id): Path<Uuid>,
) -> Result<Json<BookResponse>, ApiError> {
    let mut auction = Auction::find(&state.pool, auction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Auction not found".into()))?;

    let open_orders = AuctionOrder::open_for_auction(&state.pool, auction_id).await?;
    let book = OrderBook::from_orders(open_orders.iter().map(AuctionOrder::to_book_order));
    let metrics: BookMetrics = book.metrics();

    let hint = metrics
        .depth_imbalance
        .map(|imbalance| adaptive_k(auction.k_value, imbalance, state.config.k_alpha));
    if let Some(k) = hint {
        if (k - auction.k_value).abs() >= state.config.k_persist_threshold {
            Auction::set_k_value(&state.pool, auction_id, k).await?;
            auction.k_value = k;
        }
    }

    let cleared = AuctionOrder::recent_cleared(&state.pool, auction_id, 20).await?;
    let recent_clearing: Vec<ClearedOrderDto> = cleared
        .iter()
        .map(|o| ClearedOrderDto {
            id: o.id,
            side: o.side.clone(),
            price: o.cleared_price.unwrap_or(o.price),
            quantity: o.cleared_quantity.unwrap_or(o.quantity),
            created_at: o.created_at,
        })
        .collect();

    let metrics_dto = MetricsDto {
        best_bid: metrics.best_bid,
        best_ask: metrics.best_ask,
        spread: metrics.spread,
        is_crossed_market: metrics.is_crossed,
        mid_price: metrics.mid_price,
        total_bid_quantity: metrics.total_bid_quantity,
        total_ask_quantity: metrics.total_ask_quantity,
        bid_order_count: metrics.bid_order_count,
        ask_order_count: metrics.ask_order_count,
        best_bid_depth: metrics.best_bid_depth,
        best_ask_depth: metrics.best_ask_depth,
        depth_imbalance: metrics.depth_imbalance,
        last_clearing_price: recent_clearing.first().map(|c| c.price),
        last_clearing_quantity: recent_clearing.first().map(|c| c.quantity),
        k_value: auction.k_value,
        adaptive_k: hint,
    };

    let response = BookResponse {
        book: BookSides {
            bids: book.bid_levels().iter().map(level_dto).collect(),
            asks: book.ask_levels().iter().map(level_dto).collect(),
        },
        recent_orders: RecentOrders {
            bids: book.bids().iter().take(10).map(recent_order_dto).collect(),
            asks: book.asks().iter().take(10).map(recent_order_dto).collect(),
        },
        metrics: metrics_dto,
        recent_clearing,
        auction,
    };

    Ok(Json(response))
}

async fn auction_history(
    State(state): State<AppState>,
    Path(auction_id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let auction = Auction::find(&state.pool, auction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Auction not found".into()))?;

    let rounds = AuctionClearingRound::list_for_auction(&state.pool, auction_id, 200).await?;
    let cleared_series: Vec<HistoryPoint> = rounds
        .iter()
        .rev()
        .map(|r| HistoryPoint {
            t: r.cleared_at,
            round: r.round_number,
            price: r.clearing_price,
            quantity: r.clearing_volume,
        })
        .collect();

    let open_orders = AuctionOrder::open_for_auction(&state.pool, auction_id).await?;
    let book = OrderBook::from_orders(open_orders.iter().map(AuctionOrder::to_book_order));

    Ok(Json(HistoryResponse {
        auction_id,
        status: auction.status,
        cleared_series,
        book_curve: BookCurve {
            bids: curve(&book.bid_levels()),
            asks: curve(&book.ask_levels()),
        },
    }))
}

async fn auction_distribution(
    State(state): State<AppState>,
    Path(auction_id): Path<Uuid>,
) -> Result<Json<DistributionResponse>, ApiError> {
    if Auction::find(&state.pool, auction_id).await?.is_none() {
        return Err(ApiError::NotFound("Auction not found".into()));
    }

    let open_orders = AuctionOrder::open_for_auction(&state.pool, auction_id).await?;
    let book = OrderBook::from_orders(open_orders.iter().map(AuctionOrder::to_book_order));
    let metrics = book.metrics();

    let bucket = |level: &PriceLevel| DistributionBucket {
        price: level.price,
        quantity: level.total_quantity,
        count: level.order_count,
    };

    Ok(Json(DistributionResponse {
        auction_id,
        mid: metrics.mid_price,
        best_bid: metrics.best_bid,
        best_ask: metrics.best_ask,
        bids: book.bid_levels().iter().map(bucket).collect(),
        asks: book.ask_levels().iter().map(bucket).collect(),
    }))
}

async fn join_auction(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(auction_id): Path<Uuid>,
    req: Option<Json<JoinRequest>>,
) -> Result<(StatusCode, Json<JoinResponse>), ApiError> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let auction = Auction::find(&state.pool, auction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Auction not found".into()))?;
    if !auction.is_collecting() {
        return Err(ApiError::BadRequest(
            "Auction is not accepting participants".into(),
        ));
    }

    let status = if auction.is_closed_type() {
        ParticipantStatus::Pending
    } else {
        ParticipantStatus::Approved
    };
    let participant =
        Participant::join(&state.pool, auction_id, user.id, req.account_id, status).await?;

    let message = if participant.is_approved() {
        "Joined auction"
    } else {
        "Join request submitted"
    };
    Ok((
        StatusCode::CREATED,
        Json(JoinResponse {
            message: message.into(),
            status: participant.status,
        }),
    ))
}

async fn place_order(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(auction_id): Path<Uuid>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>), ApiError> {
    let auction = Auction::find(&state.pool, auction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Auction not found".into()))?;
    if !auction.is_collecting() {
        return Err(ApiError::BadRequest(
            "Auction is not collecting orders".into(),
        ));
    }
    let now = Utc::now();
    if !auction.window_open(now) {
        return Err(ApiError::BadRequest("Auction window is not open".into()));
    }
    if auction.is_closed_type() {
        let participant = Participant::find(&state.pool, auction_id, user.id).await?;
        if !participant.map(|p| p.is_approved()).unwrap_or(false) {
            return Err(ApiError::Forbidden(
                "Not approved to participate in this auction".into(),
            ));
        }
    }

    let side = match req.side.as_str() {
        "bid" => Side::Bid,
        "ask" => Side::Ask,
        _ => {
            return Err(ApiError::BadRequest(
                "Field 'side' must be 'bid' or 'ask'".into(),
            ))
        }
    };
    let price = quantize(req.price);
    let quantity = quantize(req.quantity);
    if price <= Decimal::ZERO || quantity <= Decimal::ZERO {
        return Err(ApiError::BadRequest(
            "'price' and 'quantity' must be positive".into(),
        ));
    }

    let result = AuctionOrder::place(&state.pool, auction_id, user.id, side, price, quantity)
        .await
        .map_err(|e| match e {
            crate::models::OrderError::Wallet(w) => ApiError::from(w),
            crate::models::OrderError::Database(d) => ApiError::Database(d),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(PlaceOrderResponse {
            id: result.order.id,
            reserved_amount: result.reserved_amount,
        }),
    ))
}

async fn my_participation(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(auction_id): Path<Uuid>,
) -> Result<Json<Participant>, ApiError> {
    let participant = Participant::find(&state.pool, auction_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Not a participant of this auction".into()))?;
    Ok(Json(participant))
}
