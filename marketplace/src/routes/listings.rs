use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post, put},
    Extension, Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Listing, ListingStatus, ListingUpdate, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    pub title: String,
    pub starting_bid: Decimal,
    pub unit: Option<String>,
    pub base_quantity: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub starting_bid: Option<Decimal>,
    pub current_bid: Option<Option<Decimal>>,
    pub unit: Option<String>,
    pub base_quantity: Option<Option<Decimal>>,
}

pub fn listing_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_listings))
        .route("/", post(create_listing))
        .route("/:listing_id", get(get_listing))
        .route("/:listing_id", put(update_listing))
        .route("/:listing_id", patch(update_listing))
        .route("/:listing_id", delete(delete_listing))
}

/// Admin-only status transitions, mounted under `/api/admin/listings`.
pub fn listing_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/:listing_id/publish", patch(publish_listing))
        .route("/:listing_id/archive", patch(archive_listing))
}

async fn list_listings(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let listings = Listing::list_visible(&state.pool, Some(user.id), user.is_admin).await?;
    Ok(Json(listings))
}

async fn create_listing(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<Listing>), ApiError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Field 'title' is required".into()));
    }
    if req.starting_bid < Decimal::ZERO {
        return Err(ApiError::BadRequest(
            "Field 'startingBid' must not be negative".into(),
        ));
    }

    let listing = Listing::create(
        &state.pool,
        user.id,
        title,
        req.starting_bid,
        req.unit.as_deref().unwrap_or("unit"),
        req.base_quantity,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(listing)))
}

async fn get_listing(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Listing>, ApiError> {
    let listing = Listing::find(&state.pool, listing_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Listing not found".into()))?;

    if listing.status != "published" && !listing.can_mutate(user.id, user.is_admin) {
        return Err(ApiError::NotFound("Listing not found".into()));
    }

    Ok(Json(listing))
}

async fn update_listing(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<UpdateListingRequest>,
) -> Result<Json<Listing>, ApiError> {
    let listing = Listing::find(&state.pool, listing_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Listing not found".into()))?;

    if !listing.can_mutate(user.id, user.is_admin) {
        return Err(ApiError::Forbidden(
            "Only the owner or an admin may edit a listing".into(),
        ));
    }
    if let Some(bid) = req.starting_bid {
        if bid < Decimal::ZERO {
            return Err(ApiError::BadRequest(
                "Field 'startingBid' must not be negative".into(),
            ));
        }
    }

    let updated = Listing::update(
        &state.pool,
        listing_id,
        &ListingUpdate {
            title: req.title,
            starting_bid: req.starting_bid,
            current_bid: req.current_bid,
            unit: req.unit,
            base_quantity: req.base_quantity,
        },
    )
    .await?;

    Ok(Json(updated))
}

async fn delete_listing(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(listing_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let listing = Listing::find(&state.pool, listing_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Listing not found".into()))?;

    if !listing.can_mutate(user.id, user.is_admin) {
        return Err(ApiError::Forbidden(
            "Only the owner or an admin may delete a listing".into(),
        ));
    }
    if listing.status == "published" && !user.is_admin {
        return Err(ApiError::Conflict(
            "Published listings can only be removed by an admin".into(),
        ));
    }

    Listing::delete(&state.pool, listing_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn publish_listing(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Listing>, ApiError> {
    set_status(&state, &user, listing_id, ListingStatus::Published).await
}

async fn archive_listing(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Listing>, ApiError> {
    set_status(&state, &user, listing_id, ListingStatus::Archived).await
}

async fn set_status(
    state: &AppState,
    user: &User,
    listing_id: Uuid,
    status: ListingStatus,
) -> Result<Json<Listing>, ApiError> {
    if !user.is_admin {
        return Err(ApiError::Forbidden(
            "Only admins may change listing status".into(),
        ));
    }
    let listing = Listing::set_status(&state.pool, listing_id, status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Listing not found".into()))?;
    Ok(Json(listing))
}
