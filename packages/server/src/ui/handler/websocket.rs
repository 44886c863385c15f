//! WebSocket connection handlers.
//!
//! Each upgraded socket gets a `Connection` registered on the hub and two
//! pumps: the write loop drains the outbound queue and keeps the socket
//! alive with pings; the read loop feeds inbound envelopes to the hub's
//! message handler one at a time.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{
    sink::{Sink, SinkExt},
    stream::{Stream, StreamExt},
};
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch},
    task::JoinError,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    config::ConnectionSettings,
    domain::{Connection, ConnectionId, Hub, OutboundFrame, SessionId},
    infrastructure::{RoomHub, dto::websocket::ClientEnvelope},
    ui::state::AppState,
};

/// Why a connection pump stopped
#[derive(Debug, Error)]
pub enum PumpError {
    #[error("websocket error: {0}")]
    Socket(#[from] axum::Error),

    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),

    #[error("no pong received within {0:?}")]
    PongTimeout(Duration),
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let room_id = match room_id.parse::<SessionId>() {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(room_id = %room_id, error = %e, "Invalid room id in upgrade request");
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    let read_limit = state.connection.read_limit_bytes;
    Ok(ws
        .max_message_size(read_limit)
        .max_frame_size(read_limit)
        .on_upgrade(move |socket| handle_socket(socket, state, room_id)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, room_id: SessionId) {
    let settings = state.connection.clone();
    let (conn, outbound) = Connection::new(room_id, settings.send_buffer);
    let client_id = conn.id().clone();
    state.hub.register(conn.clone()).await;
    tracing::info!(client_id = %client_id, session_id = %room_id, "Client connected");

    let (sender, receiver) = socket.split();
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut send_task = tokio::spawn(write_loop(sender, outbound, settings.clone()));
    let mut recv_task = tokio::spawn(read_loop(
        receiver,
        state.hub.clone(),
        conn.clone(),
        settings.pong_timeout,
        stop_rx,
    ));

    tokio::select! {
        result = &mut recv_task => {
            send_task.abort();
            log_pump_exit("read", &client_id, result);
        }
        result = &mut send_task => {
            log_pump_exit("write", &client_id, result);
            // The read loop finishes the message in hand before it stops
            let _ = stop_tx.send(true);
            log_pump_exit("read", &client_id, recv_task.await);
        }
    };

    state.hub.unregister(conn).await;
    tracing::info!(client_id = %client_id, session_id = %room_id, "Client disconnected");
}

fn log_pump_exit(
    pump: &'static str,
    client_id: &ConnectionId,
    result: Result<Result<(), PumpError>, JoinError>,
) {
    match result {
        Ok(Ok(())) => tracing::debug!(client_id = %client_id, pump, "Pump finished"),
        Ok(Err(e)) => tracing::info!(client_id = %client_id, pump, error = %e, "Pump stopped"),
        Err(e) if e.is_panic() => {
            tracing::error!(client_id = %client_id, pump, error = %e, "Pump panicked")
        }
        Err(e) => tracing::debug!(client_id = %client_id, pump, error = %e, "Pump cancelled"),
    }
}

/// Drain the outbound queue to the socket.
///
/// Pings go out on a fixed interval regardless of other traffic.
/// When the hub closes the queue the loop sends a close frame and returns.
async fn write_loop<S>(
    mut sender: S,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    settings: ConnectionSettings,
) -> Result<(), PumpError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let write_timeout = settings.write_timeout;
    let mut ping = tokio::time::interval_at(
        Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    // Best effort: the peer may already be gone
                    let close = Message::Close(None);
                    let _ = send_with_timeout(&mut sender, close, write_timeout).await;
                    return Ok(());
                };
                let text = Message::Text(frame.to_string().into());
                send_with_timeout(&mut sender, text, write_timeout).await?;
            }
            _ = ping.tick() => {
                send_with_timeout(&mut sender, Message::Ping(Bytes::new()), write_timeout).await?;
            }
        }
    }
}

async fn send_with_timeout<S>(
    sender: &mut S,
    message: Message,
    limit: Duration,
) -> Result<(), PumpError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    tokio::time::timeout(limit, sender.send(message))
        .await
        .map_err(|_| PumpError::WriteTimeout(limit))??;
    Ok(())
}

/// Hand every inbound text frame to the message handler, in order.
///
/// The read deadline is pushed back on each pong only. Once `stop` flips the
/// loop returns before reading the next frame; a handler already running is
/// never cut short.
async fn read_loop<S>(
    mut receiver: S,
    hub: Arc<RoomHub>,
    conn: Arc<Connection>,
    pong_timeout: Duration,
    mut stop: watch::Receiver<bool>,
) -> Result<(), PumpError>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut deadline = Instant::now() + pong_timeout;

    loop {
        let next = tokio::select! {
            biased;
            _ = stop.changed() => return Ok(()),
            next = tokio::time::timeout_at(deadline, receiver.next()) => {
                next.map_err(|_| PumpError::PongTimeout(pong_timeout))?
            }
        };
        let Some(msg) = next else {
            return Ok(());
        };

        match msg? {
            Message::Text(text) => dispatch(&hub, &conn, text.as_str()).await,
            Message::Pong(_) => {
                deadline = Instant::now() + pong_timeout;
            }
            Message::Close(_) => {
                tracing::debug!(client_id = %conn.id(), "Client requested close");
                return Ok(());
            }
            // Ping is answered by the protocol layer
            Message::Binary(_) | Message::Ping(_) => {}
        }
    }
}

async fn dispatch(hub: &RoomHub, conn: &Arc<Connection>, text: &str) {
    let envelope = match serde_json::from_str::<ClientEnvelope>(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(client_id = %conn.id(), error = %e, "Failed to parse message as JSON, dropping");
            return;
        }
    };

    let Some(handler) = hub.message_handler() else {
        tracing::warn!(client_id = %conn.id(), message_type = %envelope.r#type, "No message handler registered, dropping");
        return;
    };
    handler.handle_message(conn.clone(), envelope.into()).await;
}
