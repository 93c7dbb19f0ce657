//! Shared relay state — the room registry.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It owns the map from board id to live `Room`. Rooms are created lazily
//! on first join and removed when their last member leaves, so a room is
//! present in the table if and only if it has members. All room mutation
//! happens under the registry write lock; there is no per-room lock and
//! no module-level singleton.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::event::{ServerEvent, UserIdentity};

// =============================================================================
// MEMBER
// =============================================================================

/// One connected participant of a room: the session identity plus the
/// sender side of the connection's outbound event channel.
#[derive(Debug, Clone)]
pub struct Member {
    pub identity: UserIdentity,
    pub tx: mpsc::Sender<ServerEvent>,
}

// =============================================================================
// ROOM
// =============================================================================

/// Per-board live state: the last-known canvas snapshot and the members
/// currently joined. Members are kept in join order because the presence
/// list is derived in insertion order.
#[derive(Debug, Default)]
pub struct Room {
    /// Opaque serialized board state. Last writer wins, no merge.
    pub canvas_json: Option<String>,
    members: Vec<(Uuid, Member)>,
}

impl Room {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member, or refresh its identity in place if the connection is
    /// already present (duplicate join). Join order is preserved.
    pub fn insert_member(&mut self, conn_id: Uuid, member: Member) {
        if let Some((_, existing)) = self.members.iter_mut().find(|(id, _)| *id == conn_id) {
            *existing = member;
        } else {
            self.members.push((conn_id, member));
        }
    }

    /// Remove a member by connection handle. Returns the removed member.
    pub fn remove_member(&mut self, conn_id: Uuid) -> Option<Member> {
        let index = self.members.iter().position(|(id, _)| *id == conn_id)?;
        Some(self.members.remove(index).1)
    }

    #[must_use]
    pub fn contains(&self, conn_id: Uuid) -> bool {
        self.members.iter().any(|(id, _)| *id == conn_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Iterate members in join order.
    pub fn members(&self) -> impl Iterator<Item = (Uuid, &Member)> {
        self.members.iter().map(|(id, member)| (*id, member))
    }

    /// Presence list: every member's identity in join order.
    #[must_use]
    pub fn presence(&self) -> Vec<UserIdentity> {
        self.members.iter().map(|(_, m)| m.identity.clone()).collect()
    }

    /// Presence list excluding one connection (the joiner's own view).
    #[must_use]
    pub fn presence_excluding(&self, conn_id: Uuid) -> Vec<UserIdentity> {
        self.members
            .iter()
            .filter(|(id, _)| *id != conn_id)
            .map(|(_, m)| m.identity.clone())
            .collect()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared relay state, injected into Axum handlers via State extractor.
/// Clone is required by Axum — the registry is Arc-wrapped.
#[derive(Clone, Default)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<String, Room>>>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
