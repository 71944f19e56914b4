//! WebSocket transport: the single-slot connection owner and its receive loop

use crate::client::{classify_payload, CloseReason, Payload, StreamEvent, StreamEventKind};
use crate::state::{ConnectionState, ConnectionStatus};
use anyhow::{Context, Result};
use async_channel::{Receiver, Sender};
use futures_util::{SinkExt, StreamExt};
use mmsc_core::config::StreamConfig;
use mmsc_core::Peer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message, WebSocketConfig};
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Stream client owning at most one live connection.
///
/// `connect` and `disconnect` return immediately; establishment, frame
/// dispatch, and teardown run on a background task and are reported through
/// the event channel. While a connection is live (`Connecting` or `Open`),
/// further `connect` calls are no-ops; callers disconnect first to switch
/// peers. There is no automatic reconnection.
pub struct StreamClient {
    config: StreamConfig,
    status: Arc<ConnectionStatus>,
    event_tx: Sender<StreamEvent>,
    event_rx: Receiver<StreamEvent>,

    /// The single connection slot; never aliased elsewhere
    conn: Mutex<Option<ConnectionHandle>>,

    /// Identifier of the newest connection attempt; stale tasks compare
    /// against this before touching shared state
    generation: Arc<AtomicU64>,
}

/// Handle to the background task owning one connection attempt.
struct ConnectionHandle {
    peer: Peer,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl StreamClient {
    /// Creates an idle client.
    pub fn new(config: StreamConfig) -> Self {
        let (event_tx, event_rx) = async_channel::bounded(config.event_capacity);

        Self {
            config,
            status: Arc::new(ConnectionStatus::new()),
            event_tx,
            event_rx,
            conn: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Opens a connection to the peer's stream endpoint.
    ///
    /// No-op while a connection is live; a dead handle left over from a
    /// closed connection is discarded and replaced. Completion is reported
    /// via `Opened`/`Closed` events, not by this call.
    pub fn connect(&self, peer: Peer) {
        let mut slot = self.conn.lock();

        if let Some(handle) = slot.as_ref() {
            if self.status.is_live() {
                debug!(current = %handle.peer, requested = %peer, "connect ignored, connection is live");
                return;
            }
            // Previous attempt already wound down
            handle.task.abort();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.status.set_state(ConnectionState::Connecting);

        info!(peer = %peer, url = peer.ws_url(), "opening stream");

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let ctx = ConnectionCtx {
            peer: peer.clone(),
            generation,
            latest: self.generation.clone(),
            status: self.status.clone(),
            events: self.event_tx.clone(),
            config: self.config.clone(),
        };
        let task = tokio::spawn(run_connection(ctx, shutdown_rx));

        *slot = Some(ConnectionHandle {
            peer,
            shutdown_tx,
            task,
        });
    }

    /// Requests closure of the current connection, if any.
    ///
    /// Does not wait for close confirmation; the `Closed` event reports
    /// completion.
    pub fn disconnect(&self) {
        match self.conn.lock().take() {
            None => debug!("disconnect ignored, no connection"),
            Some(handle) => {
                info!(peer = %handle.peer, "requesting stream close");
                let _ = handle.shutdown_tx.try_send(());
            }
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.status.state()
    }

    /// Connection status (state, metrics, last close reason).
    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// Returns the event receiver for external consumers.
    pub fn event_receiver(&self) -> Receiver<StreamEvent> {
        self.event_rx.clone()
    }
}

/// Everything one connection task needs to report back.
struct ConnectionCtx {
    peer: Peer,
    generation: u64,
    latest: Arc<AtomicU64>,
    status: Arc<ConnectionStatus>,
    events: Sender<StreamEvent>,
    config: StreamConfig,
}

impl ConnectionCtx {
    /// Whether this task still owns the connection slot's state.
    fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }

    fn set_state(&self, state: ConnectionState) {
        if self.is_current() {
            self.status.set_state(state);
        }
    }

    async fn emit(&self, kind: StreamEventKind) {
        if let Err(e) = self.events.send(StreamEvent::new(kind)).await {
            debug!(error = %e, "event channel closed");
        }
    }

    /// Terminal path of every attempt: back to idle, then exactly one
    /// close event.
    async fn finish(&self, reason: CloseReason) {
        if self.is_current() {
            self.status.metrics().mark_disconnected();
            self.status.set_last_close(reason.to_string());
            self.status.set_state(ConnectionState::Idle);
        }
        self.emit(StreamEventKind::Closed {
            peer: self.peer.clone(),
            reason,
        })
        .await;
    }
}

/// Opens the transport within the configured bound.
async fn establish(ctx: &ConnectionCtx) -> Result<WsStream> {
    let url = ctx.peer.ws_url();

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(ctx.config.max_message_bytes);

    let (ws, response) = timeout(
        ctx.config.connect_timeout(),
        connect_async_with_config(url.as_str(), Some(ws_config), false),
    )
    .await
    .context("connect timed out")?
    .context("failed to open stream")?;

    debug!(status = %response.status(), "handshake complete");
    Ok(ws)
}

/// Runs one connection attempt to completion.
async fn run_connection(ctx: ConnectionCtx, mut shutdown_rx: mpsc::Receiver<()>) {
    let mut ws = tokio::select! {
        _ = shutdown_rx.recv() => {
            debug!(peer = %ctx.peer, "connect attempt abandoned on local request");
            ctx.finish(CloseReason::LocalRequest).await;
            return;
        }
        result = establish(&ctx) => match result {
            Ok(ws) => ws,
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(peer = %ctx.peer, error = %reason, "connect failed");
                ctx.finish(CloseReason::ConnectFailed { reason }).await;
                return;
            }
        },
    };

    info!(peer = %ctx.peer, "stream established");
    ctx.set_state(ConnectionState::Open);
    if ctx.is_current() {
        ctx.status.metrics().mark_connected();
    }
    ctx.emit(StreamEventKind::Opened {
        peer: ctx.peer.clone(),
    })
    .await;

    let reason = loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                let _ = ws
                    .close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "client disconnect".into(),
                    }))
                    .await;
                break CloseReason::LocalRequest;
            }

            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    ctx.status.metrics().record_frame(text.len() as u64);
                    dispatch_text(&ctx, &text).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    // No defined semantics for binary payloads
                    ctx.status.metrics().record_frame(data.len() as u64);
                    debug!(len = data.len(), "binary frame ignored");
                }
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) = ws.send(Message::Pong(payload)).await {
                        warn!(error = %e, "failed to answer ping");
                    }
                }
                Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    info!(peer = %ctx.peer, frame = ?frame, "stream closed by remote");
                    break match frame {
                        Some(f) => CloseReason::Remote {
                            code: f.code.into(),
                            reason: f.reason.into_owned(),
                        },
                        None => CloseReason::Ended,
                    };
                }
                Some(Ok(Message::Frame(_))) => {
                    warn!("unexpected raw frame");
                }
                Some(Err(e)) => {
                    ctx.status.metrics().record_error();
                    error!(peer = %ctx.peer, error = %e, "stream transport error");
                    break CloseReason::Transport {
                        reason: e.to_string(),
                    };
                }
                None => {
                    info!(peer = %ctx.peer, "stream ended");
                    break CloseReason::Ended;
                }
            }
        }
    };

    ctx.finish(reason).await;
}

/// Applies the dispatch policy to one inbound text frame.
async fn dispatch_text(ctx: &ConnectionCtx, text: &str) {
    match classify_payload(text) {
        Payload::Location(update) => {
            debug!(lat = update.latitude, lng = update.longitude, "location update");
            ctx.emit(StreamEventKind::Location(update)).await;
        }
        Payload::Unrecognized(record) => {
            debug!(record = %record, "unrecognized record dropped");
        }
        Payload::Malformed { reason } => {
            warn!(reason, "malformed payload dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmsc_core::LocationUpdate;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn local_peer(name: &str) -> (Peer, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (Peer::new(name, Ipv4Addr::LOCALHOST, port), listener)
    }

    #[tokio::test]
    async fn test_location_dispatch_and_remote_close() {
        let (peer, listener) = local_peer("loopback").await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(r#"{"lat": 52.5, "lng": 13.4}"#.to_string()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"foo": 1}"#.to_string()))
                .await
                .unwrap();
            ws.send(Message::Text("not json".to_string())).await.unwrap();
            ws.send(Message::Binary(vec![0, 1, 2])).await.unwrap();
            ws.close(None).await.unwrap();
            while ws.next().await.is_some() {}
        });

        let client = StreamClient::new(StreamConfig::default());
        let events = client.event_receiver();
        client.connect(peer.clone());

        let event = events.recv().await.unwrap();
        assert!(matches!(event.kind, StreamEventKind::Opened { .. }));
        assert_eq!(client.state(), ConnectionState::Open);

        // The three text frames yield exactly one location event
        let event = events.recv().await.unwrap();
        match event.kind {
            StreamEventKind::Location(update) => {
                assert_eq!(update, LocationUpdate::new(52.5, 13.4));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // Remote close: one close event, back to idle
        let event = events.recv().await.unwrap();
        match event.kind {
            StreamEventKind::Closed { reason, .. } => {
                assert!(matches!(
                    reason,
                    CloseReason::Remote { .. } | CloseReason::Ended
                ));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(client.status().metrics().frames_received(), 4);

        // No reconnect on its own
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(events.try_recv().is_err());
        assert_eq!(client.state(), ConnectionState::Idle);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_while_open_is_a_noop() {
        let (peer_a, listener_a) = local_peer("first").await;
        let (peer_b, listener_b) = local_peer("second").await;

        let server_a = tokio::spawn(async move {
            let (stream, _) = listener_a.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Close(_) = msg {
                    break;
                }
            }
        });

        // The ignored connect must never reach the transport
        let server_b = tokio::spawn(async move {
            assert!(
                tokio::time::timeout(Duration::from_millis(500), listener_b.accept())
                    .await
                    .is_err(),
                "second connect should not open a socket"
            );
        });

        let client = StreamClient::new(StreamConfig::default());
        let events = client.event_receiver();
        client.connect(peer_a.clone());

        let event = events.recv().await.unwrap();
        assert!(matches!(event.kind, StreamEventKind::Opened { .. }));

        client.connect(peer_b);
        assert_eq!(client.state(), ConnectionState::Open);
        server_b.await.unwrap();
        assert!(events.try_recv().is_err());

        client.disconnect();
        let event = events.recv().await.unwrap();
        match event.kind {
            StreamEventKind::Closed { peer, reason } => {
                assert_eq!(peer, peer_a);
                assert_eq!(reason, CloseReason::LocalRequest);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(client.state(), ConnectionState::Idle);

        server_a.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_returns_to_idle() {
        // Bind then drop to obtain a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = StreamClient::new(StreamConfig::default());
        let events = client.event_receiver();
        client.connect(Peer::new("gone", Ipv4Addr::LOCALHOST, port));

        let event = events.recv().await.unwrap();
        match event.kind {
            StreamEventKind::Closed { reason, .. } => {
                assert!(matches!(reason, CloseReason::ConnectFailed { .. }));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(client
            .status()
            .last_close()
            .unwrap()
            .starts_with("connect failed"));
    }

    #[tokio::test]
    async fn test_disconnect_without_connection_is_a_noop() {
        let client = StreamClient::new(StreamConfig::default());
        client.disconnect();

        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(client.event_receiver().try_recv().is_err());
    }
}
