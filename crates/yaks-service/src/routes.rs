//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, award, health, wallet};
use crate::state::AppState;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Wallet (user auth)
/// - `GET /v1/wallet` - Wallet summary, history, and the feature shop
/// - `POST /v1/wallet/spend` - Purchase and apply a feature
/// - `POST /v1/wallet/purchase` - Buy Yaks (stubbed payment flow)
/// - `GET /v1/earnings/preview` - Earning preview for UI hints
///
/// ## Earning hooks (service API key)
/// - `POST /v1/award` - Evaluate an earning rule for a user action
///
/// ## Admin (service API key)
/// - `GET /v1/admin/stats` - System-wide statistics
/// - `POST /v1/admin/grant` - Grant Yaks with an audit-logged reason
/// - `GET /v1/admin/transactions` - List/filter transactions
/// - `GET|POST /v1/admin/features`, `PUT /v1/admin/features/:feature_key`
/// - `GET /v1/admin/earning-rules`, `PUT /v1/admin/earning-rules/:action_key`
/// - `GET|POST /v1/admin/packages`, `PUT|DELETE /v1/admin/packages/:id`
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // Wallet
        .route("/v1/wallet", get(wallet::get_wallet_summary))
        .route("/v1/wallet/spend", post(wallet::spend))
        .route("/v1/wallet/purchase", post(wallet::purchase))
        .route("/v1/earnings/preview", get(award::preview))
        // Earning hooks (service auth)
        .route("/v1/award", post(award::award))
        // Admin (service auth)
        .route("/v1/admin/stats", get(admin::stats))
        .route("/v1/admin/grant", post(admin::grant))
        .route("/v1/admin/transactions", get(admin::list_transactions))
        .route(
            "/v1/admin/features",
            get(admin::list_features).post(admin::create_feature),
        )
        .route("/v1/admin/features/:feature_key", put(admin::update_feature))
        .route("/v1/admin/earning-rules", get(admin::list_earning_rules))
        .route(
            "/v1/admin/earning-rules/:action_key",
            put(admin::update_earning_rule),
        )
        .route(
            "/v1/admin/packages",
            get(admin::list_packages).post(admin::create_package),
        )
        .route(
            "/v1/admin/packages/:id",
            put(admin::update_package).delete(admin::delete_package),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
