use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{TokenService, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::InvariantViolation(format!("password hashing failed: {e}")))
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn user_response(user: &User) -> UserResponse {
    UserResponse {
        id: user.id,
        username: user.username.clone(),
        is_admin: user.is_admin,
    }
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let username = req.username.trim();
    if username.len() < 3 || username.len() > 64 {
        return Err(ApiError::BadRequest(
            "Username must be 3-64 characters".into(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }
    if User::find_by_username(&state.pool, username).await?.is_some() {
        return Err(ApiError::Conflict("Username already taken".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let user = User::create(&state.pool, username, &password_hash, false).await?;

    let token = TokenService::create_access_token(
        user.id,
        &user.username,
        &state.config.jwt_secret,
        state.config.jwt_ttl_min,
    );

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user_response(&user),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = User::find_by_username(&state.pool, req.username.trim())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid username or password".into()))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("Invalid username or password".into()));
    }

    let token = TokenService::create_access_token(
        user.id,
        &user.username,
        &state.config.jwt_secret,
        state.config.jwt_ttl_min,
    );

    Ok(Json(AuthResponse {
        token,
        user: user_response(&user),
    }))
}
