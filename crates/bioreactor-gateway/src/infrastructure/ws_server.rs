//! WebSocket relay server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Upgrading each accepted connection to a WebSocket session, reading the
//!    peer's role from the `X-Client-Type` handshake header.
//! 3. Registering the session with the [`RelayEngine`], which supersedes any
//!    earlier session of the same role.
//! 4. Running two halves per session until either finishes:
//!    - **Reader**: every inbound text frame goes to
//!      [`RelayEngine::on_message`], one at a time, in arrival order.
//!    - **Writer**: drains the session's outbound queue into the socket and
//!      sends a Close frame when the session is superseded.
//! 5. Unregistering the session (a no-op if it was superseded).
//! 6. Stopping the accept loop when the `running` flag is cleared.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use bioreactor_core::{Role, ROLE_HEADER};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{Request, Response},
        protocol::{frame::coding::CloseCode, CloseFrame},
        Error as WsError, Message as WsMessage,
    },
    WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::application::registry::{PeerHandle, PeerInbox};
use crate::application::relay::RelayEngine;

/// Close reason sent to a session replaced by a newer one of the same role.
pub const SUPERSEDED_REASON: &str = "superseded";

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `bind_addr` and runs the relay accept loop until `running` is set
/// to `false`.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_ws_server(
    bind_addr: SocketAddr,
    relay: Arc<RelayEngine>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {bind_addr}"))?;

    info!("WebSocket relay listening on {bind_addr}");
    serve_ws(listener, relay, running).await
}

/// Runs the accept loop on an already bound listener.
///
/// Each accepted connection is handed off to its own Tokio task so that one
/// slow peer never blocks the loop.
///
/// # Errors
///
/// Currently infallible once the listener is bound; accept errors are logged
/// and the loop continues.
pub async fn serve_ws(
    listener: TcpListener,
    relay: Arc<RelayEngine>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping WebSocket accept loop");
            break;
        }

        // The short timeout lets the loop notice the shutdown flag even when
        // nobody is connecting.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new relay connection from {peer_addr}");
                let relay = Arc::clone(&relay);
                tokio::spawn(async move {
                    handle_peer_session(stream, peer_addr, relay).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Top-level handler for one relay session; logs the outcome.
async fn handle_peer_session(raw_stream: TcpStream, peer_addr: SocketAddr, relay: Arc<RelayEngine>) {
    match run_session(raw_stream, peer_addr, &relay).await {
        Ok(()) => info!("session {peer_addr} closed"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of one relay session.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    relay: &RelayEngine,
) -> anyhow::Result<()> {
    let mut role = Role::Frontend;
    let callback = |request: &Request, response: Response| {
        role = Role::from_header(
            request
                .headers()
                .get(ROLE_HEADER)
                .and_then(|value| value.to_str().ok()),
        );
        Ok(response)
    };
    let ws_stream = accept_hdr_async(raw_stream, callback)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let (handle, inbox) = relay.attach(role);
    let session = format!("{peer_addr} ({role} {})", handle.id());
    info!("session {session} established");

    let (ws_tx, ws_rx) = ws_stream.split();

    // Whichever half finishes first ends the session; the other half is
    // dropped with the select.
    tokio::select! {
        _ = pump_outbound(ws_tx, inbox, &session) => {
            debug!("session {session}: writer finished");
        }
        _ = pump_inbound(ws_rx, relay, &handle, &session) => {
            debug!("session {session}: reader finished");
        }
    }

    relay.detach(&handle);
    Ok(())
}

/// Writes queued text frames to the socket until the queue closes, a send
/// fails, or the session is superseded.
async fn pump_outbound(mut sink: WsSink, mut inbox: PeerInbox, session: &str) {
    loop {
        tokio::select! {
            biased;

            _ = inbox.superseded.changed() => {
                info!("session {session}: superseded by a newer connection, closing");
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: SUPERSEDED_REASON.into(),
                };
                if let Err(e) = sink.send(WsMessage::Close(Some(frame))).await {
                    debug!("session {session}: close frame not sent: {e}");
                }
                break;
            }

            next = inbox.messages.recv() => {
                let Some(text) = next else { break };
                if let Err(e) = sink.send(WsMessage::Text(text)).await {
                    debug!("session {session}: send failed (peer disconnected): {e}");
                    break;
                }
            }
        }
    }
}

/// Feeds inbound text frames to the relay until the peer goes away.
async fn pump_inbound(mut source: WsSource, relay: &RelayEngine, handle: &PeerHandle, session: &str) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                debug!("session {session}: text frame ({} bytes)", text.len());
                relay.on_message(handle, text).await;
            }
            Ok(WsMessage::Binary(data)) => {
                // The relay channel is text-only.
                warn!(
                    "session {session}: unexpected binary frame ({} bytes) ignored",
                    data.len()
                );
            }
            Ok(WsMessage::Ping(_) | WsMessage::Pong(_)) => {
                // Pong replies are handled by tokio-tungstenite.
                debug!("session {session}: ping/pong");
            }
            Ok(WsMessage::Close(_)) => {
                debug!("session {session}: Close frame received");
                break;
            }
            Ok(WsMessage::Frame(_)) => {
                debug!("session {session}: raw frame (ignored)");
            }
            Err(WsError::ConnectionClosed | WsError::Protocol(_)) => {
                debug!("session {session}: connection closed");
                break;
            }
            Err(e) => {
                warn!("session {session}: WebSocket error: {e}");
                break;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
