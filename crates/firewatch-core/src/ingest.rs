//! Per-connection ingestion task.
//!
//! One [`IngestionTask`] runs for each producer connection. It moves
//! through `Connecting -> Open -> Closed`; while open it feeds every data
//! frame through the hub and keeps going past bad messages. A close
//! frame, end of stream, or read error closes it for good, and if the
//! connection was also registered as a subscriber it is unregistered on
//! the way out.
//!
//! The task is transport-agnostic: the server maps its socket into a
//! stream of [`InboundFrame`]s.

use std::fmt::Display;
use std::ops::ControlFlow;

use firewatch_types::SubscriberId;
use futures::{Stream, StreamExt};
use tracing::{debug, info};

use crate::hub::FireHub;

/// Lifecycle of a producer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Created, not yet reading.
    Connecting,
    /// Reading frames.
    Open,
    /// Finished. Terminal.
    Closed,
}

/// One frame received from a producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// UTF-8 text, expected to hold a JSON reading.
    Text(String),
    /// Binary payload, expected to hold UTF-8 JSON.
    Binary(Vec<u8>),
    /// Ping, pong or anything else without a payload for us.
    Control,
    /// The producer asked to close.
    Close,
}

/// Per-connection message counts, returned when the task ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Messages stored.
    pub accepted: u64,
    /// Messages rejected by validation.
    pub rejected: u64,
}

/// Reads one producer connection into the hub.
#[derive(Debug)]
pub struct IngestionTask {
    hub: FireHub,
    peer: String,
    subscriber: Option<SubscriberId>,
    phase: ConnectionPhase,
    summary: IngestSummary,
}

impl IngestionTask {
    /// Create a task for the connection from `peer`.
    pub fn new(hub: FireHub, peer: impl Into<String>) -> Self {
        Self {
            hub,
            peer: peer.into(),
            subscriber: None,
            phase: ConnectionPhase::Connecting,
            summary: IngestSummary::default(),
        }
    }

    /// Mark the connection as also registered under `id`, so closing it
    /// unregisters the subscriber too.
    #[must_use]
    pub fn with_subscriber(mut self, id: SubscriberId) -> Self {
        self.subscriber = Some(id);
        self
    }

    /// Current lifecycle phase.
    pub const fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Counts so far.
    pub const fn summary(&self) -> IngestSummary {
        self.summary
    }

    /// Move from `Connecting` to `Open`. No effect in any other phase.
    pub fn open(&mut self) {
        if self.phase == ConnectionPhase::Connecting {
            self.phase = ConnectionPhase::Open;
            debug!(peer = %self.peer, "Producer connection open");
        }
    }

    /// Process one frame.
    ///
    /// Returns [`ControlFlow::Break`] once the connection should stop
    /// reading. Validation failures are logged by the hub and do not stop
    /// the loop.
    pub async fn handle(&mut self, frame: InboundFrame) -> ControlFlow<()> {
        if self.phase != ConnectionPhase::Open {
            return ControlFlow::Break(());
        }
        let outcome = match frame {
            InboundFrame::Text(text) => self.hub.ingest_text(&text).await,
            InboundFrame::Binary(bytes) => self.hub.ingest_bytes(&bytes).await,
            InboundFrame::Control => return ControlFlow::Continue(()),
            InboundFrame::Close => return ControlFlow::Break(()),
        };
        match outcome {
            Ok(_) => self.summary.accepted = self.summary.accepted.saturating_add(1),
            Err(_) => self.summary.rejected = self.summary.rejected.saturating_add(1),
        }
        ControlFlow::Continue(())
    }

    /// Move to `Closed`, unregistering the subscriber side if any.
    pub async fn close(&mut self) {
        if self.phase == ConnectionPhase::Closed {
            return;
        }
        self.phase = ConnectionPhase::Closed;
        if let Some(id) = self.subscriber {
            self.hub.unregister(id).await;
        }
        info!(
            peer = %self.peer,
            accepted = self.summary.accepted,
            rejected = self.summary.rejected,
            "Producer connection closed"
        );
    }

    /// Open the connection, read `inbound` until it closes, then close.
    pub async fn run<S, E>(mut self, mut inbound: S) -> IngestSummary
    where
        S: Stream<Item = Result<InboundFrame, E>> + Unpin,
        E: Display,
    {
        self.open();
        while let Some(next) = inbound.next().await {
            match next {
                Ok(frame) => {
                    if self.handle(frame).await.is_break() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(peer = %self.peer, error = %e, "Producer read error");
                    break;
                }
            }
        }
        self.close().await;
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use crate::registry::SubscriberHandle;

    fn valid(temperature: f64) -> InboundFrame {
        InboundFrame::Text(format!(
            r#"{{"temperature":{temperature},"humidity":20,"smoke_level":5,"fire_detected":false}}"#
        ))
    }

    #[tokio::test]
    async fn phases_advance_and_close_is_terminal() {
        let (hub, _dispatcher) = FireHub::new(HubConfig::default());
        let mut task = IngestionTask::new(hub, "test");
        assert_eq!(task.phase(), ConnectionPhase::Connecting);

        // Frames before open are not processed.
        assert!(task.handle(valid(1.0)).await.is_break());

        task.open();
        assert_eq!(task.phase(), ConnectionPhase::Open);
        assert!(task.handle(valid(1.0)).await.is_continue());
        assert!(task.handle(InboundFrame::Control).await.is_continue());
        assert!(task.handle(InboundFrame::Close).await.is_break());

        task.close().await;
        assert_eq!(task.phase(), ConnectionPhase::Closed);
        task.open();
        assert_eq!(task.phase(), ConnectionPhase::Closed);
        assert!(task.handle(valid(2.0)).await.is_break());
        assert_eq!(task.summary().accepted, 1);
    }

    #[tokio::test]
    async fn bad_frames_do_not_stop_the_loop() {
        let (hub, _dispatcher) = FireHub::new(HubConfig::default());
        let frames = vec![
            Ok::<_, std::convert::Infallible>(valid(1.0)),
            Ok(InboundFrame::Text("not json".to_owned())),
            Ok(InboundFrame::Binary(b"[1,2]".to_vec())),
            Ok(valid(2.0)),
        ];
        let summary = IngestionTask::new(hub.clone(), "test")
            .run(futures::stream::iter(frames))
            .await;
        assert_eq!(summary, IngestSummary { accepted: 2, rejected: 2 });
        assert_eq!(hub.history().await.len(), 2);
    }

    #[tokio::test]
    async fn read_error_closes_and_unregisters() {
        let (hub, _dispatcher) = FireHub::new(HubConfig::default());
        let (handle, _rx) = SubscriberHandle::channel("both", 4);
        let id = handle.id();
        hub.register(handle).await;

        let frames = vec![Ok(valid(1.0)), Err("connection reset"), Ok(valid(2.0))];
        let summary = IngestionTask::new(hub.clone(), "both")
            .with_subscriber(id)
            .run(futures::stream::iter(frames))
            .await;

        assert_eq!(summary.accepted, 1);
        assert!(!hub.is_registered(id).await);
        assert_eq!(hub.history().await.len(), 1);
    }
}
