//! Shared application state for the HTTP server.

use std::path::PathBuf;

use firewatch_core::FireHub;

use crate::templates::Templates;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor. The hub is itself a cheap handle onto shared state; the
/// server never holds hub locks across an await of its own.
#[derive(Debug)]
pub struct AppState {
    /// The sensor hub.
    pub hub: FireHub,
    /// Compiled page templates.
    pub templates: Templates,
    /// Directory served under `/static`, if any.
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    /// Create state around a running hub.
    pub const fn new(hub: FireHub, templates: Templates) -> Self {
        Self {
            hub,
            templates,
            static_dir: None,
        }
    }

    /// Serve files from `dir` under `/static`.
    #[must_use]
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }
}
