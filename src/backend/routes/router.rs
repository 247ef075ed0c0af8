/**
 * Router Configuration
 *
 * 1. API routes, behind the bearer-token middleware
 * 2. `GET /ws`, the realtime endpoint (authenticates in-band)
 * 3. JSON 404 fallback
 *
 * CORS and request tracing wrap the whole router.
 */

use axum::http::HeaderValue;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::error::not_found_fallback;
use crate::backend::middleware::auth_middleware;
use crate::backend::realtime::ws_handler;
use crate::backend::routes::api_routes::configure_api_routes;
use crate::backend::server::state::AppState;

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            tracing::warn!("Ignoring invalid CORS_ORIGIN ({}), allowing any origin", e);
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router<()> {
    let api = configure_api_routes(Router::new())
        .route_layer(from_fn_with_state(app_state.clone(), auth_middleware));

    Router::new()
        .merge(api)
        .route("/ws", get(ws_handler))
        .fallback(not_found_fallback)
        .layer(cors_layer(app_state.config.cors_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
