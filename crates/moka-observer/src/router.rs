//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{control, handlers, ws};

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/state` -- `WebSocket` snapshot stream
/// - `GET /api/state` -- latest snapshot
/// - `GET|POST /api/start` -- start a brew
/// - `GET|POST /api/stop` -- stop and reset to idle
/// - `GET|POST /api/reset` -- reset to idle
///
/// CORS allows any origin so a browser UI served elsewhere can call the
/// control routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/state", get(ws::ws_state))
        // REST API
        .route("/api/state", get(handlers::get_state))
        .route("/api/start", get(control::start).post(control::start))
        .route("/api/stop", get(control::stop).post(control::stop))
        .route("/api/reset", get(control::reset).post(control::reset))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
