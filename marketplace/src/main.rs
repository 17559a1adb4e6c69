use marketplace::db;
use marketplace::models::{TokenService, User};
use marketplace::routes::{
    admin_routes, auction_public_routes, auction_trader_routes, auth_routes, inventory_routes,
    listing_admin_routes, listing_routes, me_routes, resource_routes, wallet_routes,
};
use marketplace::scheduler::Scheduler;
use marketplace::{AppState, Config};

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    statuscode: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("marketplace=debug".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = Arc::new(Config::from_env());

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    tracing::info!("Running migrations...");
    db::run_migrations(&pool).await?;

    let scheduler = Scheduler::new(pool.clone(), config.clone()).start();

    let state = AppState {
        pool,
        config: config.clone(),
    };

    let auction_routes = auction_public_routes().merge(
        auction_trader_routes()
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
    );

    let app = Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes())
        .nest("/api/auctions", auction_routes)
        .nest(
            "/api/me",
            me_routes()
                .nest("/wallet", wallet_routes())
                .nest("/inventory", inventory_routes())
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .nest(
            "/api/resources",
            resource_routes()
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .nest(
            "/api/listings",
            listing_routes()
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .nest(
            "/api/admin",
            admin_routes()
                .nest("/listings", listing_admin_routes())
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .layer(build_cors_layer())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Marketplace service listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received");
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
    use axum::http::Method;

    let allowed_headers = [AUTHORIZATION, CONTENT_TYPE, ACCEPT];
    let allowed_methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let origins: Vec<HeaderValue> = env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:5173,http://127.0.0.1:5173".to_string())
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(allowed_methods)
        .allow_headers(allowed_headers)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let unauthorized = |message: &str| {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: message.to_string(),
                statuscode: StatusCode::UNAUTHORIZED.as_u16(),
            }),
        )
    };

    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized("Missing authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Invalid authorization header"))?;

    let claims = TokenService::verify_access_token(token, &state.config.jwt_secret)
        .ok_or_else(|| unauthorized("Invalid or expired token"))?;

    let user_id: uuid::Uuid = claims
        .sub
        .parse()
        .map_err(|_| unauthorized("Invalid token"))?;

    let user = User::find_by_id(&state.pool, user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal error".to_string(),
                    statuscode: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                }),
            )
        })?
        .ok_or_else(|| unauthorized("User not found"))?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
