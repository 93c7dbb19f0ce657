//! Wire protocol — the typed events both halves of the system speak.
//!
//! DESIGN
//! ======
//! Every message on the wire is a JSON object tagged by its `event` field
//! (kebab-case names) with camelCase payload keys, e.g.
//! `{"event":"join-room","boardId":"abc123","userId":"...","userName":"Ada","color":"#e8745a"}`.
//! Client-to-server and server-to-client events are separate enums so each
//! side only parses what it can receive. Unknown event names fail to parse
//! and are dropped by the relay.

use serde::{Deserialize, Serialize};

// =============================================================================
// IDENTITY
// =============================================================================

/// A participant's session identity, generated client-side and carried on
/// every `join-room`. Stable across reconnects of the same session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_id: String,
    pub user_name: String,
    /// Display color, a CSS hex string.
    pub color: String,
}

// =============================================================================
// CLIENT -> SERVER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Enter a board's room, announcing identity. Also re-sent after every
    /// reconnect, since the relay forgets membership with the transport.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        board_id: String,
        user_id: String,
        user_name: String,
        color: String,
    },
    /// Full serialized canvas state. Last writer wins.
    #[serde(rename_all = "camelCase")]
    CanvasSync {
        board_id: String,
        #[serde(rename = "canvasJSON")]
        canvas_json: String,
    },
    /// Pointer position, forwarded to peers and never stored.
    #[serde(rename_all = "camelCase")]
    CursorMove {
        board_id: String,
        user_id: String,
        x: f64,
        y: f64,
    },
    /// Liveness probe; answered with `pong`.
    Ping,
}

impl ClientEvent {
    /// The join event for a board under a given identity.
    #[must_use]
    pub fn join(board_id: impl Into<String>, identity: &UserIdentity) -> Self {
        Self::JoinRoom {
            board_id: board_id.into(),
            user_id: identity.user_id.clone(),
            user_name: identity.user_name.clone(),
            color: identity.color.clone(),
        }
    }
}

// =============================================================================
// SERVER -> CLIENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Private reply to a join: the current snapshot (if any) and the
    /// members already present, excluding the joiner.
    #[serde(rename_all = "camelCase")]
    RoomState {
        #[serde(rename = "canvasJSON")]
        canvas_json: Option<String>,
        users: Vec<UserIdentity>,
    },
    /// Full presence list, published to the whole room on every
    /// membership change.
    UsersUpdate { users: Vec<UserIdentity> },
    /// A member left the room.
    #[serde(rename_all = "camelCase")]
    UserLeft { user_id: String },
    /// A peer's snapshot, forwarded. Never echoed to its author.
    CanvasSync {
        #[serde(rename = "canvasJSON")]
        canvas_json: String,
    },
    /// A peer's pointer position.
    #[serde(rename_all = "camelCase")]
    CursorMove { user_id: String, x: f64, y: f64 },
    /// Reply to `ping`, to the sender only.
    Pong,
}

// =============================================================================
// TESTS
// =============================================================================
