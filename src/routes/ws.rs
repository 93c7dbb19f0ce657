//! WebSocket handler — per-connection relay session.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection handle and enters a `select!` loop:
//! - Incoming client events → parse + dispatch by event type
//! - Broadcast events from room peers → forward to this client
//!
//! Each connection is a member of at most one room at a time. Joining a
//! different board leaves the previous room first; disconnecting removes
//! the connection from its room before the handler returns, so no further
//! broadcasts can target it.
//!
//! Malformed inbound payloads are logged and dropped — they never crash
//! the session or touch room state.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::event::{ClientEvent, ServerEvent, UserIdentity};
use crate::services;
use crate::state::{AppState, Member};

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();

    // Per-connection channel for events broadcast by room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerEvent>(256);

    info!(%conn_id, "ws: client connected");

    // The board this connection is currently a member of, if any.
    let mut current_board: Option<String> = None;

    'conn: loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies =
                            process_event(&state, &mut current_board, conn_id, &client_tx, &text).await;
                        for event in replies {
                            if send_event(&mut socket, &event).await.is_err() {
                                break 'conn;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = client_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    // Leave before returning so no further broadcasts target this connection.
    if let Some(board_id) = current_board.take() {
        services::room::leave_room(&state, &board_id, conn_id).await;
    }
    info!(%conn_id, "ws: client disconnected");
}

// =============================================================================
// EVENT DISPATCH
// =============================================================================

/// Parse and process one inbound text event. Returns the events owed to
/// the sender; peer-bound events go out through the room service.
///
/// Kept separate from the socket loop so tests can drive a full session
/// without a live websocket.
async fn process_event(
    state: &AppState,
    current_board: &mut Option<String>,
    conn_id: Uuid,
    client_tx: &mpsc::Sender<ServerEvent>,
    text: &str,
) -> Vec<ServerEvent> {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%conn_id, error = %e, "ws: dropping malformed event");
            return Vec::new();
        }
    };

    match event {
        ClientEvent::JoinRoom { board_id, user_id, user_name, color } => {
            // Switching boards leaves the old room first. A duplicate join
            // to the current board skips the leave and re-announces.
            if current_board.as_deref() != Some(board_id.as_str()) {
                if let Some(old_board) = current_board.take() {
                    services::room::leave_room(state, &old_board, conn_id).await;
                }
            }

            let member = Member {
                identity: UserIdentity { user_id, user_name, color },
                tx: client_tx.clone(),
            };
            let joined = services::room::join_room(state, &board_id, conn_id, member).await;
            *current_board = Some(board_id);

            vec![ServerEvent::RoomState { canvas_json: joined.canvas_json, users: joined.others }]
        }
        ClientEvent::CanvasSync { board_id, canvas_json } => {
            services::room::update_canvas(state, &board_id, conn_id, canvas_json).await;
            Vec::new()
        }
        ClientEvent::CursorMove { board_id, user_id, x, y } => {
            services::room::forward_cursor(state, &board_id, conn_id, user_id, x, y).await;
            Vec::new()
        }
        ClientEvent::Ping => vec![ServerEvent::Pong],
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize event");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
