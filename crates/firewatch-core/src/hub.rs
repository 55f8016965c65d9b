//! The broadcast hub: rolling history, subscriber registry and fan-out.
//!
//! [`FireHub`] owns all shared state. Connection tasks and query handlers
//! hold cheap clones and go through its methods; nothing outside this
//! module touches the registry or the history directly.
//!
//! # Data flow
//!
//! ```text
//! ingest ─► validate ─► history.append ─► handoff queue ─► Dispatcher
//!                                                           │
//!                                         broadcast(snapshot of registry)
//!                                                           │
//!                                      per-subscriber deliver (concurrent,
//!                                       bounded by send timeout)
//! ```
//!
//! Ingestion never waits on fan-out: the handoff is a `try_send` into a
//! bounded queue that the [`Dispatcher`] drains one reading at a time. A
//! full queue drops the broadcast of that reading; the reading itself is
//! already in the history.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use firewatch_types::{FireAlert, HubStats, Reading, SubscriberId};
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::alert;
use crate::config::HubConfig;
use crate::history::HistoryBuffer;
use crate::registry::{DeliveryError, Payload, Removal, SubscriberHandle, SubscriberRegistry};
use crate::validator::{self, ValidationError};

/// What happened to a stored reading on its way to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// Queued for broadcast.
    Queued,
    /// Not broadcast: the handoff queue was full.
    Dropped,
    /// Not broadcast: the dispatcher has stopped.
    Closed,
}

/// A reading accepted by [`FireHub::ingest`].
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    /// The reading as stored, timestamp included.
    pub reading: Reading,
    /// Whether it was queued for broadcast.
    pub handoff: Handoff,
}

/// Outcome of one broadcast pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers in the snapshot taken at the start of the pass.
    pub attempted: usize,
    /// Deliveries that succeeded.
    pub delivered: usize,
    /// Subscribers whose delivery failed; all have been unregistered.
    pub failed: Vec<(SubscriberId, DeliveryError)>,
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    broadcasts: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
    handoffs_dropped: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: usize) {
        counter.fetch_add(u64::try_from(by).unwrap_or(u64::MAX), Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct HubInner {
    config: HubConfig,
    history: RwLock<HistoryBuffer>,
    registry: RwLock<SubscriberRegistry>,
    handoff: mpsc::Sender<Reading>,
    shutdown: watch::Sender<bool>,
    counters: Counters,
}

/// Shared sensor hub. Clones share the same state.
#[derive(Debug, Clone)]
pub struct FireHub {
    inner: Arc<HubInner>,
}

impl FireHub {
    /// Create a hub and the [`Dispatcher`] that must run for broadcasts to
    /// happen.
    pub fn new(config: HubConfig) -> (Self, Dispatcher) {
        let (handoff, queue) = mpsc::channel(config.handoff_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let hub = Self {
            inner: Arc::new(HubInner {
                history: RwLock::new(HistoryBuffer::new(config.history_capacity)),
                registry: RwLock::new(SubscriberRegistry::new()),
                handoff,
                shutdown,
                counters: Counters::default(),
                config,
            }),
        };
        let dispatcher = Dispatcher {
            hub: hub.clone(),
            queue,
            shutdown: shutdown_rx,
        };
        (hub, dispatcher)
    }

    /// Create a hub and spawn its dispatcher on the current Tokio runtime.
    pub fn start(config: HubConfig) -> (Self, JoinHandle<()>) {
        let (hub, dispatcher) = Self::new(config);
        let handle = tokio::spawn(dispatcher.run());
        (hub, handle)
    }

    /// Configuration the hub was built with.
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    // -----------------------------------------------------------------------
    // Subscribers
    // -----------------------------------------------------------------------

    /// Register a subscriber whose transport handshake has completed.
    ///
    /// Returns the number of active subscribers afterwards, or `None` if
    /// the hub has been shut down. In that case the handle is dropped,
    /// which closes its outbound channel.
    pub async fn register(&self, handle: SubscriberHandle) -> Option<usize> {
        let id = handle.id();
        let peer = handle.peer().to_owned();
        let mut registry = self.inner.registry.write().await;
        if *self.inner.shutdown.borrow() {
            debug!(subscriber = %id, peer = %peer, "Hub shut down, subscriber refused");
            return None;
        }
        if !registry.register(handle) {
            debug!(subscriber = %id, "Subscriber already registered");
        }
        let active = registry.len();
        info!(subscriber = %id, peer = %peer, active, "Subscriber connected");
        Some(active)
    }

    /// Remove a subscriber. Safe to call for one that is already gone.
    pub async fn unregister(&self, id: SubscriberId) -> Removal {
        let mut registry = self.inner.registry.write().await;
        let removal = registry.unregister(id);
        if removal == Removal::Removed {
            info!(subscriber = %id, active = registry.len(), "Subscriber disconnected");
        }
        removal
    }

    /// Whether `id` is currently registered.
    pub async fn is_registered(&self, id: SubscriberId) -> bool {
        self.inner.registry.read().await.contains(id)
    }

    /// Number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.inner.registry.read().await.len()
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Ingest a text frame.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] that rejected the message. Nothing
    /// is stored or broadcast in that case.
    pub async fn ingest_text(&self, raw: &str) -> Result<Ingested, ValidationError> {
        match validator::decode_text(raw) {
            Ok(value) => self.ingest(&value).await,
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Ingest a binary frame holding UTF-8 JSON.
    ///
    /// # Errors
    ///
    /// Same as [`ingest_text`](Self::ingest_text).
    pub async fn ingest_bytes(&self, raw: &[u8]) -> Result<Ingested, ValidationError> {
        match validator::decode_bytes(raw) {
            Ok(value) => self.ingest(&value).await,
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Validate a decoded message, stamp it, store it and queue it for
    /// broadcast.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] that rejected the message. Nothing
    /// is stored or broadcast in that case.
    pub async fn ingest(&self, raw: &Value) -> Result<Ingested, ValidationError> {
        let mut reading = validator::parse(raw).map_err(|e| self.reject(e))?;
        validator::assign_timestamp(&mut reading, raw);
        let handoff = self.record(reading.clone()).await;
        Counters::bump(&self.inner.counters.accepted, 1);
        info!(
            timestamp = %reading.timestamp,
            temperature = reading.temperature,
            smoke_level = reading.smoke_level,
            fire_detected = reading.fire_detected,
            "Sensor reading accepted"
        );
        Ok(Ingested { reading, handoff })
    }

    /// Append an already-validated reading to the history and hand it to
    /// the dispatcher without waiting.
    ///
    /// Append and enqueue happen under the same lock, so broadcasts go out
    /// in history order.
    pub async fn record(&self, mut reading: Reading) -> Handoff {
        validator::ensure_timestamp(&mut reading);
        let mut history = self.inner.history.write().await;
        history.append(reading.clone());
        match self.inner.handoff.try_send(reading) {
            Ok(()) => Handoff::Queued,
            Err(TrySendError::Full(dropped)) => {
                Counters::bump(&self.inner.counters.handoffs_dropped, 1);
                warn!(
                    timestamp = %dropped.timestamp,
                    "Handoff queue full, reading stored but not broadcast"
                );
                Handoff::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Dispatcher stopped, reading stored but not broadcast");
                Handoff::Closed
            }
        }
    }

    fn reject(&self, error: ValidationError) -> ValidationError {
        Counters::bump(&self.inner.counters.rejected, 1);
        match &error {
            ValidationError::InvalidField {
                field: "timestamp",
                found,
                ..
            } => warn!(
                found = *found,
                "Producer timestamp is not a string, message dropped"
            ),
            _ => warn!(error = %error, "Data validation error, message dropped"),
        }
        error
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    /// Deliver `reading` to every subscriber registered when the call
    /// starts.
    ///
    /// Deliveries run concurrently, each bounded by the configured send
    /// timeout. Subscribers whose delivery fails are unregistered after
    /// the pass. Never fails as a whole.
    pub async fn broadcast(&self, reading: &Reading) -> BroadcastReport {
        let payload: Payload = match serde_json::to_string(reading) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!(error = %e, "Failed to serialize reading, broadcast skipped");
                return BroadcastReport::default();
            }
        };

        let snapshot = self.inner.registry.read().await.snapshot();
        let timeout = self.inner.config.send_timeout();

        let outcomes = join_all(snapshot.iter().map(|subscriber| {
            let payload = Arc::clone(&payload);
            async move { (subscriber, subscriber.deliver(payload, timeout).await) }
        }))
        .await;

        let mut report = BroadcastReport {
            attempted: snapshot.len(),
            ..BroadcastReport::default()
        };
        for (subscriber, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(e) => {
                    warn!(
                        subscriber = %subscriber.id(),
                        peer = subscriber.peer(),
                        error = %e,
                        "Broadcast error, removing subscriber"
                    );
                    report.failed.push((subscriber.id(), e));
                }
            }
        }

        if !report.failed.is_empty() {
            let mut registry = self.inner.registry.write().await;
            for (id, _) in &report.failed {
                registry.unregister(*id);
            }
            info!(active = registry.len(), "Failed subscribers removed");
        }

        let counters = &self.inner.counters;
        Counters::bump(&counters.broadcasts, 1);
        Counters::bump(&counters.deliveries, report.delivered);
        Counters::bump(&counters.delivery_failures, report.failed.len());
        report
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Stored readings, oldest first.
    pub async fn history(&self) -> Vec<Reading> {
        self.inner.history.read().await.all()
    }

    /// The most recent reading, if any.
    pub async fn latest(&self) -> Option<Reading> {
        self.inner.history.read().await.latest().cloned()
    }

    /// Fire alert derived from the most recent reading.
    pub async fn fire_alert(&self) -> FireAlert {
        alert::derive(&*self.inner.history.read().await)
    }

    /// Current diagnostic counters.
    pub async fn stats(&self) -> HubStats {
        let history_len = self.inner.history.read().await.len();
        let subscribers = self.inner.registry.read().await.len();
        let c = &self.inner.counters;
        HubStats {
            readings_accepted: c.accepted.load(Ordering::Relaxed),
            readings_rejected: c.rejected.load(Ordering::Relaxed),
            broadcasts: c.broadcasts.load(Ordering::Relaxed),
            deliveries: c.deliveries.load(Ordering::Relaxed),
            delivery_failures: c.delivery_failures.load(Ordering::Relaxed),
            handoffs_dropped: c.handoffs_dropped.load(Ordering::Relaxed),
            subscribers,
            history_len,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Stop the dispatcher and drop every subscriber.
    ///
    /// Dropping a subscriber closes its outbound channel, which ends its
    /// writer task and with it the connection.
    pub async fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        let removed = self.inner.registry.write().await.clear();
        info!(subscribers_dropped = removed, "Hub shut down");
    }
}

/// Drains the handoff queue and runs one broadcast pass per reading.
#[derive(Debug)]
pub struct Dispatcher {
    hub: FireHub,
    queue: mpsc::Receiver<Reading>,
    shutdown: watch::Receiver<bool>,
}

impl Dispatcher {
    /// Run until [`FireHub::shutdown`] is called.
    pub async fn run(mut self) {
        debug!("Broadcast dispatcher started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                next = self.queue.recv() => {
                    let Some(reading) = next else { break };
                    let report = self.hub.broadcast(&reading).await;
                    debug!(
                        attempted = report.attempted,
                        delivered = report.delivered,
                        failed = report.failed.len(),
                        "Broadcast pass complete"
                    );
                }
            }
        }
        debug!("Broadcast dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use serde_json::json;

    fn raw(temperature: f64, fire: bool) -> Value {
        json!({
            "temperature": temperature,
            "humidity": 30.0,
            "smoke_level": 100,
            "fire_detected": fire
        })
    }

    fn sample() -> Reading {
        Reading {
            temperature: 20.0,
            timestamp: "2026-01-01 00:00:00".to_owned(),
            ..Reading::default()
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let (hub, _dispatcher) = FireHub::new(HubConfig::default());
        let mut receivers = Vec::new();
        for n in 0..3 {
            let (handle, rx) = SubscriberHandle::channel(format!("peer-{n}"), 4);
            hub.register(handle).await;
            receivers.push(rx);
        }

        let report = hub.broadcast(&sample()).await;
        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 3);
        assert!(report.failed.is_empty());

        for rx in &mut receivers {
            let payload = rx.recv().await;
            assert!(payload.is_some_and(|p| p.contains("\"temperature\":20.0")));
        }
    }

    #[tokio::test]
    async fn closed_subscriber_is_removed_and_others_still_served() {
        let (hub, _dispatcher) = FireHub::new(HubConfig::default());
        let (a, mut rx_a) = SubscriberHandle::channel("a", 4);
        let (b, mut rx_b) = SubscriberHandle::channel("b", 4);
        let (c, rx_c) = SubscriberHandle::channel("c", 4);
        let c_id = c.id();
        hub.register(a).await;
        hub.register(b).await;
        hub.register(c).await;

        drop(rx_c);
        let report = hub.broadcast(&sample()).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, vec![(c_id, DeliveryError::Closed)]);
        assert_eq!(hub.subscriber_count().await, 2);
        assert!(!hub.is_registered(c_id).await);
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());

        // The removed subscriber is not part of later passes.
        let report = hub.broadcast(&sample()).await;
        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 2);
    }

    #[tokio::test]
    async fn stalled_subscriber_times_out_without_blocking_others() {
        let config = HubConfig {
            send_timeout_ms: 30,
            subscriber_buffer: 1,
            ..HubConfig::default()
        };
        let (hub, _dispatcher) = FireHub::new(config);
        let (stalled, _stalled_rx) = SubscriberHandle::channel("stalled", 1);
        let (healthy, mut healthy_rx) = SubscriberHandle::channel("healthy", 1);
        let stalled_id = stalled.id();
        hub.register(stalled).await;
        hub.register(healthy).await;

        let first = hub.broadcast(&sample()).await;
        assert_eq!(first.delivered, 2);
        assert!(healthy_rx.recv().await.is_some());

        let second = hub.broadcast(&sample()).await;
        assert_eq!(second.delivered, 1);
        assert_eq!(
            second.failed,
            vec![(stalled_id, DeliveryError::Timeout(Duration::from_millis(30)))]
        );
        assert!(healthy_rx.recv().await.is_some());
        assert_eq!(hub.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn unregister_twice_reports_already_absent() {
        let (hub, _dispatcher) = FireHub::new(HubConfig::default());
        let (handle, _rx) = SubscriberHandle::channel("a", 4);
        let id = handle.id();
        assert_eq!(hub.register(handle).await, Some(1));
        assert_eq!(hub.unregister(id).await, Removal::Removed);
        assert_eq!(hub.unregister(id).await, Removal::AlreadyAbsent);
    }

    #[tokio::test]
    async fn ingest_stores_and_queues_for_broadcast() {
        let (hub, mut dispatcher) = FireHub::new(HubConfig::default());
        let ingested = hub.ingest(&raw(22.0, false)).await;
        assert!(ingested.as_ref().is_ok_and(|i| i.handoff == Handoff::Queued));
        assert!(ingested.as_ref().is_ok_and(|i| i.reading.has_timestamp()));

        assert_eq!(hub.history().await.len(), 1);
        let queued = dispatcher.queue.try_recv().ok();
        assert_eq!(queued, ingested.ok().map(|i| i.reading));
    }

    #[tokio::test]
    async fn invalid_message_is_neither_stored_nor_queued() {
        let (hub, mut dispatcher) = FireHub::new(HubConfig::default());
        let result = hub
            .ingest(&json!({"humidity": 30.0, "smoke_level": 1, "fire_detected": false}))
            .await;
        assert_eq!(
            result,
            Err(ValidationError::MissingField { field: "temperature" })
        );
        assert!(hub.history().await.is_empty());
        assert!(dispatcher.queue.try_recv().is_err());

        let malformed = hub.ingest_text("{\"temperature\":").await;
        assert!(matches!(malformed, Err(ValidationError::MalformedJson(_))));

        let stats = hub.stats().await;
        assert_eq!(stats.readings_rejected, 2);
        assert_eq!(stats.readings_accepted, 0);
    }

    #[tokio::test]
    async fn full_handoff_queue_drops_broadcast_but_keeps_history() {
        let config = HubConfig {
            handoff_capacity: 1,
            ..HubConfig::default()
        };
        let (hub, _dispatcher) = FireHub::new(config);
        let first = hub.ingest(&raw(20.0, false)).await.map(|i| i.handoff);
        let second = hub.ingest(&raw(21.0, false)).await.map(|i| i.handoff);
        assert_eq!(first, Ok(Handoff::Queued));
        assert_eq!(second, Ok(Handoff::Dropped));
        assert_eq!(hub.history().await.len(), 2);
        assert_eq!(hub.stats().await.handoffs_dropped, 1);
    }

    #[tokio::test]
    async fn history_respects_configured_capacity() {
        let config = HubConfig {
            history_capacity: 3,
            ..HubConfig::default()
        };
        let (hub, _dispatcher) = FireHub::new(config);
        for n in 0..5 {
            let _ = hub.ingest(&raw(f64::from(n), false)).await;
        }
        let temps: Vec<f64> = hub.history().await.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn dispatcher_delivers_until_shutdown() {
        let (hub, handle) = FireHub::start(HubConfig::default());
        let (subscriber, mut rx) = SubscriberHandle::channel("live", 4);
        hub.register(subscriber).await;

        let mut message = raw(30.0, false);
        message["room"] = json!("lab");
        assert!(hub.ingest(&message).await.is_ok());

        let payload = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        let payload = payload.ok().flatten();
        let value: Value = payload
            .as_deref()
            .and_then(|p| serde_json::from_str(p).ok())
            .unwrap_or(Value::Null);
        assert_eq!(value["room"], "lab");
        assert!(value["timestamp"].as_str().is_some_and(|t| !t.is_empty()));

        hub.shutdown().await;
        assert!(tokio::time::timeout(Duration::from_secs(2), handle).await.is_ok());
        assert_eq!(hub.subscriber_count().await, 0);
        // Subscriber channel closes once the hub lets go of it.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn register_after_shutdown_is_refused_and_closes_the_channel() {
        let (hub, _dispatcher) = FireHub::new(HubConfig::default());
        hub.shutdown().await;

        let (late, mut rx) = SubscriberHandle::channel("late", 4);
        let id = late.id();
        assert_eq!(hub.register(late).await, None);
        assert!(!hub.is_registered(id).await);
        assert_eq!(hub.subscriber_count().await, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn non_string_timestamp_is_counted_as_rejected() {
        let (hub, _dispatcher) = FireHub::new(HubConfig::default());
        let mut message = raw(20.0, false);
        message["timestamp"] = json!(1_700_000_000);
        let result = hub.ingest(&message).await;
        assert!(matches!(
            result,
            Err(ValidationError::InvalidField { field: "timestamp", .. })
        ));
        assert!(hub.history().await.is_empty());
        assert_eq!(hub.stats().await.readings_rejected, 1);
    }

    #[tokio::test]
    async fn record_stamps_unstamped_readings() {
        let (hub, _dispatcher) = FireHub::new(HubConfig::default());
        hub.record(Reading::default()).await;
        assert!(hub.latest().await.is_some_and(|r| r.has_timestamp()));
    }
}
