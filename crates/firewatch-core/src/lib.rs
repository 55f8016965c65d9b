//! Validation, history, subscriber tracking and fan-out for the Firewatch
//! sensor hub.
//!
//! Producers push JSON readings over persistent connections; every valid
//! reading is stored in a bounded rolling history and broadcast to all
//! live subscribers. Query handlers read the history and the derived fire
//! alert without touching the fan-out path.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `firewatch-config.yaml` into
//!   strongly-typed structs.
//! - [`validator`] -- Inbound message parsing into canonical readings.
//! - [`history`] -- Fixed-capacity FIFO of recent readings.
//! - [`registry`] -- Live subscriber handles and delivery.
//! - [`hub`] -- [`FireHub`], the owner of all shared state, and its
//!   broadcast [`Dispatcher`].
//! - [`alert`] -- Fire alert derivation.
//! - [`ingest`] -- Per-producer-connection ingestion task.
//!
//! [`FireHub`]: hub::FireHub
//! [`Dispatcher`]: hub::Dispatcher

pub mod alert;
pub mod config;
pub mod history;
pub mod hub;
pub mod ingest;
pub mod registry;
pub mod validator;

pub use config::{ConfigError, FireConfig, HubConfig, LoggingConfig, ServerConfig};
pub use hub::{BroadcastReport, Dispatcher, FireHub, Handoff, Ingested};
pub use ingest::{ConnectionPhase, InboundFrame, IngestSummary, IngestionTask};
pub use registry::{DeliveryError, Removal, SubscriberHandle};
pub use validator::ValidationError;
