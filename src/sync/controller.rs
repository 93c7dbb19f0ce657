//! Session controller: connection lifecycle, debounced broadcast, and
//! event application.
//!
//! DESIGN
//! ======
//! One task owns the whole client session. Local changes arrive on an
//! unbounded channel from the surface boundary, board updates flow out to
//! the UI on another, and the transport is abstracted behind
//! [`EventChannel`] so the controller never touches websocket framing.
//!
//! The lifecycle follows the [`ConnectionFsm`]: connect (with a bounded
//! handshake fallback so the board unlocks even if the relay never
//! answers), run the connected session, and on transport drop either back
//! off and reconnect or degrade to solo mode. Every successful connect
//! re-emits `join-room`, because the relay lost this connection's
//! membership with the old transport.

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{info, warn};

use crate::event::{ClientEvent, ServerEvent, UserIdentity};

use super::connection::{ConnectionFsm, ConnectionStatus, Effect, ReconnectPolicy};
use super::debounce::CanvasDebouncer;

// =============================================================================
// CHANNEL ABSTRACTION
// =============================================================================

/// Transport failure surfaced by an [`EventChannel`].
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("channel closed")]
    Closed,
}

/// The bidirectional, event-typed channel the controller drives.
/// Production code wraps a websocket; tests use in-memory channels.
#[async_trait::async_trait]
pub trait EventChannel: Send {
    /// Establish (or re-establish) the transport.
    async fn connect(&mut self) -> Result<(), ChannelError>;

    /// Emit one event to the relay.
    async fn emit(&mut self, event: ClientEvent) -> Result<(), ChannelError>;

    /// Next inbound event. `None` means the transport dropped.
    async fn next_event(&mut self) -> Option<ServerEvent>;
}

// =============================================================================
// CONTROLLER I/O
// =============================================================================

/// Local changes reported by the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalChange {
    /// Serialized canvas after a local mutation.
    Canvas(String),
    /// Local pointer position.
    Cursor { x: f64, y: f64 },
}

/// Updates the controller publishes toward the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardUpdate {
    /// Remote snapshot to apply to the local surface (under the echo guard).
    RemoteCanvas(String),
    /// Current presence list for the room.
    Presence(Vec<UserIdentity>),
    /// A member left the room.
    UserLeft(String),
    /// Another member's pointer moved.
    RemoteCursor { user_id: String, x: f64, y: f64 },
    /// Connection lifecycle change, for the status indicator.
    Status(ConnectionStatus),
    /// The board is usable. Sent once, on first connect or on the
    /// handshake-fallback deadline, whichever comes first.
    BoardReady,
}

/// Why a connected session ended.
enum SessionEnd {
    /// Transport dropped; reconnect per policy.
    Dropped,
    /// The local side shut down (surface channel closed).
    Shutdown,
}

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct SyncController<C: EventChannel> {
    channel: C,
    board_id: String,
    identity: UserIdentity,
    fsm: ConnectionFsm,
    debounce: CanvasDebouncer,
    changes: mpsc::UnboundedReceiver<LocalChange>,
    updates: mpsc::UnboundedSender<BoardUpdate>,
}

impl<C: EventChannel> SyncController<C> {
    pub fn new(
        channel: C,
        board_id: impl Into<String>,
        identity: UserIdentity,
        policy: ReconnectPolicy,
        changes: mpsc::UnboundedReceiver<LocalChange>,
        updates: mpsc::UnboundedSender<BoardUpdate>,
    ) -> Self {
        Self {
            channel,
            board_id: board_id.into(),
            identity,
            fsm: ConnectionFsm::new(policy),
            debounce: CanvasDebouncer::default(),
            changes,
            updates,
        }
    }

    /// Override the debounce window. Mostly for tests.
    #[must_use]
    pub fn with_debounce(mut self, debounce: CanvasDebouncer) -> Self {
        self.debounce = debounce;
        self
    }

    /// Drive the session until the surface channel closes or the retry
    /// budget is exhausted and solo mode runs out of local changes.
    pub async fn run(mut self) {
        self.publish(BoardUpdate::Status(ConnectionStatus::Connecting));

        loop {
            match self.fsm.status() {
                ConnectionStatus::Connecting | ConnectionStatus::Reconnecting => {
                    if self.establish().await {
                        self.publish(BoardUpdate::Status(ConnectionStatus::Connected));
                        if matches!(self.session().await, SessionEnd::Shutdown) {
                            return;
                        }
                    }
                }
                ConnectionStatus::Unavailable => {
                    self.run_solo().await;
                    return;
                }
                // Only visible transiently inside `session`.
                ConnectionStatus::Connected => unreachable!("connected outside a session"),
            }
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// One connect attempt. Returns true if the session is established.
    async fn establish(&mut self) -> bool {
        match self.establish_transport().await {
            Ok(()) => {
                info!(board_id = %self.board_id, "sync: connected");
                let effects = self.fsm.on_connected();
                self.apply_effects(effects).await;
                true
            }
            Err(e) => {
                warn!(error = %e, "sync: connect failed");
                let effects = self.fsm.on_transport_drop();
                self.apply_effects(effects).await;
                false
            }
        }
    }

    /// Await the transport handshake, unlocking the board if the fallback
    /// deadline passes first.
    async fn establish_transport(&mut self) -> Result<(), ChannelError> {
        let fallback = sleep(self.fsm.policy().handshake_fallback);
        tokio::pin!(fallback);

        let Self { channel, fsm, updates, .. } = self;
        let connect = channel.connect();
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => return result,
                () = &mut fallback, if !fsm.board_unlocked() => {
                    for effect in fsm.on_handshake_deadline() {
                        if effect == Effect::UnlockBoard {
                            info!("sync: handshake fallback, unlocking board");
                            let _ = updates.send(BoardUpdate::BoardReady);
                        }
                    }
                }
            }
        }
    }

    async fn apply_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::EmitJoin => {
                    let join = ClientEvent::join(&self.board_id, &self.identity);
                    // On failure the session loop will observe the drop.
                    if let Err(e) = self.channel.emit(join).await {
                        warn!(error = %e, "sync: join emit failed");
                    }
                }
                Effect::UnlockBoard => self.publish(BoardUpdate::BoardReady),
                Effect::RetryAfter(delay) => {
                    self.publish(BoardUpdate::Status(ConnectionStatus::Reconnecting));
                    info!(?delay, "sync: retrying after backoff");
                    sleep(delay).await;
                }
                Effect::EnterSolo => {
                    self.publish(BoardUpdate::Status(ConnectionStatus::Unavailable));
                }
            }
        }
    }

    /// Solo mode: no room to broadcast to. Local changes keep flowing from
    /// the surface (the board stays editable) and are consumed unsent.
    async fn run_solo(&mut self) {
        info!("sync: solo mode, edits stay local");
        self.debounce.clear();
        while self.changes.recv().await.is_some() {}
    }

    // =========================================================================
    // CONNECTED SESSION
    // =========================================================================

    async fn session(&mut self) -> SessionEnd {
        enum Step {
            Server(Option<ServerEvent>),
            Local(Option<LocalChange>),
            Flush,
        }

        loop {
            let deadline = self.debounce.deadline();
            let Self { channel, changes, .. } = self;

            let step = tokio::select! {
                event = channel.next_event() => Step::Server(event),
                change = changes.recv() => Step::Local(change),
                () = flush_wait(deadline) => Step::Flush,
            };

            match step {
                Step::Server(Some(event)) => self.apply_server_event(event),
                Step::Server(None) => {
                    warn!("sync: transport dropped");
                    let effects = self.fsm.on_transport_drop();
                    self.apply_effects(effects).await;
                    return SessionEnd::Dropped;
                }
                Step::Local(Some(LocalChange::Canvas(canvas_json))) => {
                    self.debounce.queue(canvas_json);
                }
                Step::Local(Some(LocalChange::Cursor { x, y })) => {
                    let event = ClientEvent::CursorMove {
                        board_id: self.board_id.clone(),
                        user_id: self.identity.user_id.clone(),
                        x,
                        y,
                    };
                    // Ephemeral: a send failure surfaces as a drop later.
                    let _ = self.channel.emit(event).await;
                }
                Step::Local(None) => return SessionEnd::Shutdown,
                Step::Flush => {
                    if let Some(canvas_json) = self.debounce.take_due(Instant::now()) {
                        let event = ClientEvent::CanvasSync {
                            board_id: self.board_id.clone(),
                            canvas_json,
                        };
                        let _ = self.channel.emit(event).await;
                    }
                }
            }
        }
    }

    fn apply_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::RoomState { canvas_json, users } => {
                self.publish(BoardUpdate::Presence(users));
                if let Some(canvas_json) = canvas_json {
                    self.publish(BoardUpdate::RemoteCanvas(canvas_json));
                }
            }
            ServerEvent::UsersUpdate { users } => self.publish(BoardUpdate::Presence(users)),
            ServerEvent::UserLeft { user_id } => self.publish(BoardUpdate::UserLeft(user_id)),
            ServerEvent::CanvasSync { canvas_json } => {
                self.publish(BoardUpdate::RemoteCanvas(canvas_json));
            }
            ServerEvent::CursorMove { user_id, x, y } => {
                self.publish(BoardUpdate::RemoteCursor { user_id, x, y });
            }
            ServerEvent::Pong => {}
        }
    }

    fn publish(&self, update: BoardUpdate) {
        let _ = self.updates.send(update);
    }
}

/// Resolve when the debounce deadline passes; never, if nothing is pending.
async fn flush_wait(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
