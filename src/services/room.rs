//! Room service — join/leave, snapshot replacement, and broadcast.
//!
//! DESIGN
//! ======
//! Rooms live only while someone is in them: `join_room` creates the room
//! on demand and `leave_room` evicts it when the last member leaves, which
//! also drops its snapshot. Data events for a board with no live room are
//! no-ops — there is nobody to forward to.
//!
//! Every membership change recomputes the presence list synchronously and
//! publishes it to the whole room. Broadcast delivery is best-effort: a
//! member whose channel is full misses the event rather than stalling the
//! room.

use tracing::info;
use uuid::Uuid;

use crate::event::{ServerEvent, UserIdentity};
use crate::state::{AppState, Member, Room};

// =============================================================================
// JOIN / LEAVE
// =============================================================================

/// The joiner's private view of the room at join time: the current
/// snapshot plus the identities of the members already present.
#[derive(Debug)]
pub struct JoinedRoom {
    pub canvas_json: Option<String>,
    pub others: Vec<UserIdentity>,
}

/// Join a board, creating its room if absent. Refreshes the member in
/// place on a duplicate join. Publishes the updated presence list to
/// every member (joiner included) and returns the joiner's room view.
pub async fn join_room(state: &AppState, board_id: &str, conn_id: Uuid, member: Member) -> JoinedRoom {
    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(board_id.to_owned()).or_insert_with(Room::new);

    let joined = JoinedRoom {
        canvas_json: room.canvas_json.clone(),
        others: room.presence_excluding(conn_id),
    };

    room.insert_member(conn_id, member);
    info!(%board_id, %conn_id, members = room.member_count(), "client joined room");

    send_to_room(room, &ServerEvent::UsersUpdate { users: room.presence() }, None);
    joined
}

/// Leave a board. Remaining members get a `user-left` notice and the
/// recomputed presence list; an emptied room is removed from the registry
/// (its snapshot does not survive emptiness). Leaving a board the
/// connection never joined is a no-op.
pub async fn leave_room(state: &AppState, board_id: &str, conn_id: Uuid) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(board_id) else {
        return;
    };
    let Some(member) = room.remove_member(conn_id) else {
        return;
    };
    info!(%board_id, %conn_id, remaining = room.member_count(), "client left room");

    if room.is_empty() {
        rooms.remove(board_id);
        info!(%board_id, "evicted empty room");
        return;
    }

    send_to_room(room, &ServerEvent::UserLeft { user_id: member.identity.user_id }, None);
    send_to_room(room, &ServerEvent::UsersUpdate { users: room.presence() }, None);
}

// =============================================================================
// DATA EVENTS
// =============================================================================

/// Overwrite the room's snapshot (last writer wins, no version check) and
/// forward it to every other member. No room means nothing to update.
pub async fn update_canvas(state: &AppState, board_id: &str, conn_id: Uuid, canvas_json: String) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(board_id) else {
        return;
    };

    room.canvas_json = Some(canvas_json.clone());
    send_to_room(room, &ServerEvent::CanvasSync { canvas_json }, Some(conn_id));
}

/// Forward a pointer position to every other member. Never stored.
pub async fn forward_cursor(
    state: &AppState,
    board_id: &str,
    conn_id: Uuid,
    user_id: String,
    x: f64,
    y: f64,
) {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(board_id) else {
        return;
    };
    send_to_room(room, &ServerEvent::CursorMove { user_id, x, y }, Some(conn_id));
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Send an event to every member of a room, optionally excluding one
/// connection. Best-effort: a full channel drops the event for that member.
fn send_to_room(room: &Room, event: &ServerEvent, exclude: Option<Uuid>) {
    for (conn_id, member) in room.members() {
        if exclude == Some(conn_id) {
            continue;
        }
        let _ = member.tx.try_send(event.clone());
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
