//! Per-connection bridge between one browser client and one Gemini Live session.
//!
//! Each accepted WebSocket gets its own task multiplexing the client socket
//! and the upstream socket. Audio that arrives while the upstream connection
//! is still being established is buffered and flushed, in arrival order,
//! right after the one-time session configuration. Whichever side closes
//! first, the other side is closed too; there is no retry or reconnect.

use super::{
    protocol::{UpstreamPayload, parse_control},
    upstream::{self, UpstreamStream},
};
use crate::{config::Config, state::AppState};
use axum::extract::{
    State,
    ws::{Message, WebSocket, WebSocketUpgrade},
};
use axum::response::Response;
use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde_json::json;
use std::{collections::VecDeque, sync::Arc};
use tokio_tungstenite::tungstenite::{
    self,
    protocol::{CloseFrame, Message as WsMessage, frame::coding::CloseCode},
};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

/// Why a session died. Normal closes on either side are paired teardown, not
/// errors, and never appear here.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The upstream connection could not be constructed or never opened.
    #[error("failed to initialize upstream connection: {0}")]
    Init(tungstenite::Error),
    /// The upstream connection failed after it was open.
    #[error("upstream transport error: {0}")]
    UpstreamTransport(tungstenite::Error),
    /// The client connection failed.
    #[error("client transport error: {0}")]
    ClientTransport(axum::Error),
    /// An outbound payload could not be serialized.
    #[error("failed to encode upstream message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Session lifecycle. There is no retry or reconnect state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    ConnectingUpstream,
    Open,
    Closed,
}

/// Ordered queue of audio chunks that arrived before the upstream session was
/// ready. Unbounded, matching the reference behavior.
#[derive(Debug, Default)]
struct PendingBuffer {
    chunks: VecDeque<Bytes>,
}

impl PendingBuffer {
    fn enqueue(&mut self, chunk: Bytes) {
        self.chunks.push_back(chunk);
    }

    fn drain(&mut self) -> VecDeque<Bytes> {
        std::mem::take(&mut self.chunks)
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }
}

/// The bridge's per-session state. The methods translate connection events
/// into the upstream payloads they produce; the async loop below owns the
/// sockets and does the actual sending.
struct Session {
    id: Uuid,
    lifecycle: Lifecycle,
    pending: PendingBuffer,
}

impl Session {
    fn new(id: Uuid) -> Self {
        Self {
            id,
            lifecycle: Lifecycle::ConnectingUpstream,
            pending: PendingBuffer::default(),
        }
    }

    /// Binary frames are microphone audio. Pre-ready chunks are buffered;
    /// post-ready chunks become append messages immediately.
    fn on_client_binary(&mut self, chunk: Bytes) -> Vec<UpstreamPayload> {
        match self.lifecycle {
            Lifecycle::ConnectingUpstream => {
                self.pending.enqueue(chunk);
                Vec::new()
            }
            Lifecycle::Open => vec![UpstreamPayload::Command(upstream::append_chunk(&chunk))],
            Lifecycle::Closed => Vec::new(),
        }
    }

    /// Text frames are control messages. Frames that arrive before the
    /// upstream session is ready are dropped, unlike audio; unparseable JSON
    /// is dropped at any time.
    fn on_client_text(&mut self, text: &str) -> Vec<UpstreamPayload> {
        match self.lifecycle {
            Lifecycle::ConnectingUpstream => {
                warn!(session_id = %self.id, "Dropping control frame received before upstream was ready");
                Vec::new()
            }
            Lifecycle::Closed => Vec::new(),
            Lifecycle::Open => match parse_control(text) {
                Some(message) => message.into_upstream(),
                None => Vec::new(),
            },
        }
    }

    /// The ready transition. Emits the one-time session configuration
    /// followed by every buffered chunk in arrival order; the pending queue
    /// is empty afterwards and never refills.
    fn on_upstream_open(&mut self, config: &Config) -> Vec<UpstreamPayload> {
        self.lifecycle = Lifecycle::Open;
        let mut payloads = vec![UpstreamPayload::Command(upstream::initial_session_update(
            config,
        ))];
        for chunk in self.pending.drain() {
            payloads.push(UpstreamPayload::Command(upstream::append_chunk(&chunk)));
        }
        payloads
    }

    fn close(&mut self) {
        self.lifecycle = Lifecycle::Closed;
    }
}

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Entry point for one client connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    let span = tracing::info_span!("voice_session", %session_id);
    async move {
        info!("Client connected");
        if let Err(e) = run_bridge(socket, state, session_id).await {
            error!(error = ?e, "Session terminated with error");
        }
        info!("Session finished");
    }
    .instrument(span)
    .await
}

/// Runs one session end to end: connect upstream (buffering early audio),
/// configure the session, then relay in both directions until either side
/// goes away.
async fn run_bridge(
    socket: WebSocket,
    state: Arc<AppState>,
    session_id: Uuid,
) -> Result<(), BridgeError> {
    let (mut client_tx, mut client_rx) = socket.split();
    let mut session = Session::new(session_id);

    // CONNECTING_UPSTREAM: keep reading the client while the outbound
    // connection is established so early audio is never lost.
    let connect_fut = upstream::connect(&state.config);
    tokio::pin!(connect_fut);
    let upstream_stream = loop {
        tokio::select! {
            res = &mut connect_fut => match res {
                Ok(ws_stream) => break ws_stream,
                Err(e) => {
                    send_error(&mut client_tx, "Failed to initialize upstream connection").await;
                    let _ = client_tx.close().await;
                    session.close();
                    return Err(BridgeError::Init(e));
                }
            },
            msg = client_rx.next() => match msg {
                Some(Ok(Message::Binary(chunk))) => {
                    session.on_client_binary(chunk);
                }
                Some(Ok(Message::Text(text))) => {
                    session.on_client_text(&text);
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client left before upstream was ready");
                    session.close();
                    return Ok(());
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Err(e)) => {
                    session.close();
                    return Err(BridgeError::ClientTransport(e));
                }
            },
        }
    };

    // OPEN: configure the session, flush buffered audio, then relay.
    let (mut up_tx, mut up_rx) = upstream_stream.split();
    info!(
        buffered_chunks = session.pending.len(),
        "Upstream ready; configuring session"
    );
    let ready_payloads = session.on_upstream_open(&state.config);
    if let Err(e) = send_all(&mut up_tx, ready_payloads).await {
        send_error(&mut client_tx, "Upstream error").await;
        teardown(&mut session, &mut up_tx, &mut client_tx).await;
        return Err(e);
    }

    let result = relay(&mut session, &mut client_tx, &mut client_rx, &mut up_tx, &mut up_rx).await;

    // A fatal upstream condition gets at most one error frame, best-effort,
    // while the client side may still be reachable.
    if let Err(BridgeError::UpstreamTransport(_) | BridgeError::Encode(_)) = &result {
        send_error(&mut client_tx, "Upstream error").await;
    }
    teardown(&mut session, &mut up_tx, &mut client_tx).await;
    result
}

/// The steady-state loop: client frames go upstream (translated), upstream
/// frames go to the client unchanged. Returns when either side closes.
async fn relay(
    session: &mut Session,
    client_tx: &mut SplitSink<WebSocket, Message>,
    client_rx: &mut SplitStream<WebSocket>,
    up_tx: &mut SplitSink<UpstreamStream, WsMessage>,
    up_rx: &mut SplitStream<UpstreamStream>,
) -> Result<(), BridgeError> {
    loop {
        tokio::select! {
            msg = client_rx.next() => match msg {
                Some(Ok(Message::Binary(chunk))) => {
                    send_all(up_tx, session.on_client_binary(chunk)).await?;
                }
                Some(Ok(Message::Text(text))) => {
                    send_all(up_tx, session.on_client_text(&text)).await?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client closed; closing upstream");
                    return Ok(());
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Err(e)) => return Err(BridgeError::ClientTransport(e)),
            },
            msg = up_rx.next() => match msg {
                // Upstream payloads are relayed unchanged, keeping the frame kind.
                Some(Ok(WsMessage::Text(text))) => {
                    client_tx
                        .send(Message::Text(text.as_str().into()))
                        .await
                        .map_err(BridgeError::ClientTransport)?;
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    client_tx
                        .send(Message::Binary(data))
                        .await
                        .map_err(BridgeError::ClientTransport)?;
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    info!(?frame, "Upstream closed; closing client");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(BridgeError::UpstreamTransport(e)),
                None => {
                    info!("Upstream stream ended; closing client");
                    return Ok(());
                }
            },
        }
    }
}

/// Paired teardown: whichever side is still up gets a best-effort close.
/// Failures here mean the handle was already gone and are suppressed.
async fn teardown(
    session: &mut Session,
    up_tx: &mut SplitSink<UpstreamStream, WsMessage>,
    client_tx: &mut SplitSink<WebSocket, Message>,
) {
    session.close();
    let _ = up_tx
        .send(WsMessage::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "session closed".into(),
        })))
        .await;
    let _ = up_tx.close().await;
    let _ = client_tx.close().await;
}

/// Sends a sequence of payloads upstream, in order.
async fn send_all(
    up_tx: &mut SplitSink<UpstreamStream, WsMessage>,
    payloads: Vec<UpstreamPayload>,
) -> Result<(), BridgeError> {
    for payload in payloads {
        let wire = payload.to_wire()?;
        up_tx
            .send(WsMessage::Text(wire.into()))
            .await
            .map_err(BridgeError::UpstreamTransport)?;
    }
    Ok(())
}

/// Best-effort delivery of a locally generated error frame to the client.
async fn send_error(client_tx: &mut SplitSink<WebSocket, Message>, error: &str) {
    let frame = json!({ "type": "error", "error": error }).to_string();
    if let Err(e) = client_tx.send(Message::Text(frame.into())).await {
        warn!(error = ?e, "Failed to deliver error frame to client");
    }
}
