//! Diagnostic counters exposed by the hub.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Point-in-time hub counters for the dashboard and `/api/stats`.
///
/// Counters are cumulative since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HubStats {
    /// Readings that passed validation and were stored.
    pub readings_accepted: u64,
    /// Inbound messages rejected by the validator.
    pub readings_rejected: u64,
    /// Broadcast passes run by the dispatcher.
    pub broadcasts: u64,
    /// Successful per-subscriber deliveries.
    pub deliveries: u64,
    /// Failed per-subscriber deliveries (each one unregistered a subscriber).
    pub delivery_failures: u64,
    /// Readings stored but not broadcast because the handoff queue was full.
    pub handoffs_dropped: u64,
    /// Subscribers currently registered.
    pub subscribers: usize,
    /// Readings currently held in the history buffer.
    pub history_len: usize,
}
