//! Route definitions and router construction.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bootstrap::{AxumContext, CorsConfig};
use crate::handlers;
use crate::state::AppState;

fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// Sync surface and event stream, state not yet applied.
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/entries",
            get(handlers::entries::list)
                .post(handlers::entries::create)
                .put(handlers::entries::batch_update),
        )
        .route(
            "/entries/:id",
            get(handlers::entries::get)
                .put(handlers::entries::update)
                .delete(handlers::entries::remove),
        )
        .route("/entries/:id/resolve", put(handlers::entries::reresolve))
        .route("/events", get(handlers::events::stream))
}

/// Create the application router.
pub fn create_router(ctx: AxumContext, cors_config: &CorsConfig) -> Router {
    let state: AppState = Arc::new(ctx);

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes().with_state(state))
        .layer(build_cors_layer(cors_config))
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}
