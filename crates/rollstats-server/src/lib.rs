//! rollstats server library: HTTP routes and application state.
//!
//! Kept apart from main.rs so the router can be driven from integration tests.

pub mod config;
pub mod logging;
pub mod routes;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the full router.
pub fn app(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/campaigns/{campaign}/players", get(routes::stats::players))
        .route("/stats/{campaign}", get(routes::stats::report))
        .route(
            "/stats/{campaign}/distributions",
            get(routes::stats::distributions),
        )
        .route("/health", get(routes::health));

    Router::new()
        .route("/roll/{campaign}", post(routes::rolls::submit))
        .route("/push/{campaign}/{sheet}", post(routes::sheets::push))
        .route("/view/{campaign}", get(routes::sheets::view_campaign))
        .route("/view/{campaign}/{sheet}", get(routes::sheets::view_sheet))
        .nest("/api", api_routes)
        // Sheets and rolls are posted from a browser extension.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
