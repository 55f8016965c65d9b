//! `WebSocket` endpoint for sensors and dashboards.
//!
//! Every connection to `GET /ws` plays both roles: it is registered as a
//! subscriber once the upgrade completes, and every text or binary frame
//! it sends is ingested as a reading. Outbound readings go through a
//! per-connection writer task fed by the hub; inbound frames go through
//! an [`IngestionTask`].
//!
//! When the peer goes away the ingestion task unregisters the subscriber
//! and the writer task is stopped. When a send fails the writer
//! unregisters it instead.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Extension;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use firewatch_core::registry::Payload;
use firewatch_core::{FireHub, InboundFrame, IngestionTask, SubscriberHandle};
use firewatch_types::SubscriberId;
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
) -> impl IntoResponse {
    let peer = connect_info.map_or_else(
        || String::from("unknown"),
        |Extension(ConnectInfo(addr))| addr.to_string(),
    );
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub, peer))
}

/// Drive one connection from registration to teardown.
async fn handle_socket(socket: WebSocket, hub: FireHub, peer: String) {
    let (handle, outbound) =
        SubscriberHandle::channel(peer.clone(), hub.config().subscriber_buffer);
    let id = handle.id();

    if hub.register(handle).await.is_none() {
        debug!(peer = %peer, "Hub shutting down, connection dropped");
        return;
    }

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_outbound(
        sink,
        outbound,
        hub.clone(),
        id,
        peer.clone(),
    ));

    let inbound = stream.map(|result| result.map(to_frame));
    let summary = IngestionTask::new(hub, peer.clone())
        .with_subscriber(id)
        .run(inbound)
        .await;

    writer.abort();
    debug!(
        peer = %peer,
        accepted = summary.accepted,
        rejected = summary.rejected,
        "WebSocket connection finished"
    );
}

/// Forward hub payloads to `sink` until the hub drops the subscriber or a
/// send fails.
///
/// A failed or timed-out send unregisters the subscriber straight away.
async fn write_outbound<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Payload>,
    hub: FireHub,
    id: SubscriberId,
    peer: String,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let send_timeout = hub.config().send_timeout();
    let mut failed = false;
    while let Some(payload) = outbound.recv().await {
        let frame = Message::Text(payload.as_ref().into());
        match tokio::time::timeout(send_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(peer = %peer, error = %e, "WebSocket send failed");
                failed = true;
                break;
            }
            Err(_) => {
                warn!(peer = %peer, "WebSocket send timed out");
                failed = true;
                break;
            }
        }
    }
    outbound.close();
    if failed {
        hub.unregister(id).await;
    }
    let _ = sink.close().await;
}

/// Map a socket message onto the transport-agnostic frame.
fn to_frame(message: Message) -> InboundFrame {
    match message {
        Message::Text(text) => InboundFrame::Text(text.as_str().to_owned()),
        Message::Binary(bytes) => InboundFrame::Binary(bytes.to_vec()),
        Message::Close(_) => InboundFrame::Close,
        Message::Ping(_) | Message::Pong(_) => InboundFrame::Control,
    }
}
