//! Axum router construction.
//!
//! Assembles all routes (REST + `WebSocket` + optional static files) into
//! a single [`Router`] with CORS open to any origin, as the dashboard and
//! sensors may be served from anywhere.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- dashboard
/// - `GET /ws` -- bidirectional sensor `WebSocket`
/// - `GET /sensor-history` -- stored readings
/// - `GET /current-status` -- latest reading
/// - `GET /fire-alert` -- fire alert payload
/// - `GET /fire-alert/panel` -- fire alert HTML fragment
/// - `GET /api/stats` -- hub counters
/// - `GET /health` -- liveness
/// - `/static/*` -- files from [`AppState::static_dir`] when set
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/", get(handlers::index))
        .route("/ws", get(ws::ws_handler))
        .route("/sensor-history", get(handlers::sensor_history))
        .route("/current-status", get(handlers::current_status))
        .route("/fire-alert", get(handlers::fire_alert))
        .route("/fire-alert/panel", get(handlers::fire_alert_panel))
        .route("/api/stats", get(handlers::stats))
        .route("/health", get(handlers::health));

    if let Some(dir) = &state.static_dir {
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
