//! REST endpoint handlers.
//!
//! All handlers read through the shared [`FireHub`](firewatch_core::FireHub)
//! and never touch the fan-out path.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | HTML dashboard |
//! | `GET` | `/sensor-history` | Stored readings, oldest first |
//! | `GET` | `/current-status` | Latest reading |
//! | `GET` | `/fire-alert` | Fire alert payload or status message |
//! | `GET` | `/fire-alert/panel` | Fire alert HTML fragment or status message |
//! | `GET` | `/api/stats` | Hub counters |
//! | `GET` | `/health` | Liveness probe |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use firewatch_types::{FireAlert, HubStats, NO_SENSOR_DATA_MESSAGE, Reading};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

/// `{"message": ...}` body used for every "nothing to show" outcome.
fn message(text: &str) -> Response {
    Json(json!({ "message": text })).into_response()
}

// ---------------------------------------------------------------------------
// GET / -- dashboard
// ---------------------------------------------------------------------------

/// Serve the dashboard page.
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let stats = state.hub.stats().await;
    let page = state
        .templates
        .dashboard(&stats, state.hub.config().history_capacity)?;
    Ok(Html(page))
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Return every stored reading, oldest first.
pub async fn sensor_history(State(state): State<Arc<AppState>>) -> Json<Vec<Reading>> {
    Json(state.hub.history().await)
}

/// Return the most recent reading, or a "no data" message.
pub async fn current_status(State(state): State<Arc<AppState>>) -> Response {
    match state.hub.latest().await {
        Some(reading) => Json(reading).into_response(),
        None => message(NO_SENSOR_DATA_MESSAGE),
    }
}

// ---------------------------------------------------------------------------
// Fire alert
// ---------------------------------------------------------------------------

/// Return the fire alert payload, or a "no fire" / "no data" message.
pub async fn fire_alert(State(state): State<Arc<AppState>>) -> Response {
    match state.hub.fire_alert().await {
        FireAlert::Alert(view) => Json(view).into_response(),
        other => message(other.message().unwrap_or_default()),
    }
}

/// Return the fire alert as an HTML fragment when a fire is detected.
///
/// The non-alert outcomes answer with the same JSON messages as
/// [`fire_alert`].
pub async fn fire_alert_panel(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    match state.hub.fire_alert().await {
        FireAlert::Alert(view) => {
            let panel = state.templates.fire_alert(&view)?;
            Ok(Html(panel).into_response())
        }
        other => Ok(message(other.message().unwrap_or_default())),
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Return the hub counters.
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<HubStats> {
    Json(state.hub.stats().await)
}

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
