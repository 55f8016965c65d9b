//! Error types for the daemon binary.
//!
//! [`DaemonError`] wraps every failure mode of startup and serving so
//! `main` can propagate with `?`.

/// Top-level error for the daemon binary.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: firewatch_core::ConfigError,
    },

    /// Page templates failed to load.
    #[error("template error: {source}")]
    Template {
        /// The underlying template error.
        #[from]
        source: firewatch_server::TemplateError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: firewatch_server::ServerError,
    },
}
