use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod crypto;
mod db;
mod error;
mod models;

use config::Config;
use constants::API_VERSION;
use db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cashcow_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting Cash Cow Valley Backend");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    // Initialize database
    let db = Database::new(&config).await?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db.run_migrations().await?;

    // Ensure the root admin wallet exists
    db.seed_dev_wallet(&config.dev_wallet_address).await?;

    let app_state = api::AppState {
        db,
        config: config.clone(),
    };

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid address");

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Authentication
        .route("/api/v1/auth/nonce/{wallet}", get(api::auth::get_nonce))
        .route("/api/v1/auth/login", post(api::auth::login))
        // Farm
        .route("/api/v1/farm/feed", post(api::farm::feed_cow))
        .route("/api/v1/farm/harvest", post(api::farm::harvest))
        .route("/api/v1/farm/status", get(api::farm::farm_status))
        // Marketplace
        .route("/api/v1/market/buy", post(api::market::buy))
        .route("/api/v1/market/sell", post(api::market::sell))
        .route("/api/v1/market/listings", get(api::market::listings))
        // Gold economy
        .route("/api/v1/market/sell-milk", post(api::market::sell_milk))
        .route("/api/v1/market/buy-item", post(api::market::buy_item))
        .route("/api/v1/market/swap", post(api::market::swap))
        // Referral
        .route("/api/v1/referral/stats", get(api::referral::stats))
        // Ad network SSV webhook
        .route(
            "/api/v1/webhooks/ad-complete",
            post(api::webhooks::ad_complete),
        )
        // Admin (manual maintenance)
        .route("/api/v1/admin/transfer", post(api::admin::transfer))
        .route("/api/v1/admin/users", get(api::admin::list_users))
        .route("/api/v1/admin/stats", get(api::admin::stats))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
