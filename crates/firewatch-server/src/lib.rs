//! HTTP and `WebSocket` front end for the Firewatch sensor hub.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`) where sensors push readings and
//!   dashboards receive every accepted reading in real time
//! - **REST endpoints** for the rolling history, the latest reading and
//!   the derived fire alert
//! - **HTML dashboard** (`GET /`) and fire alert panel rendered with
//!   `minijinja`
//!
//! # Architecture
//!
//! All state lives in the [`FireHub`](firewatch_core::FireHub) held by
//! [`AppState`]. REST handlers only read from it; the `WebSocket` handler
//! registers subscribers and feeds an ingestion task per connection.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod templates;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, bind, serve, start_server};
pub use state::AppState;
pub use templates::{TemplateError, Templates};
