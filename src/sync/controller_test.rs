use super::*;
use crate::state::test_helpers::identity;
use crate::sync::connection::RetryBudget;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::timeout;

// =============================================================================
// SCRIPTED CHANNEL
// =============================================================================

enum ConnectScript {
    /// Handshake succeeds; inbound events arrive on this receiver.
    Up(mpsc::UnboundedReceiver<ServerEvent>),
    /// Handshake fails immediately.
    Fail,
    /// Handshake never completes.
    Hang,
}

struct ScriptedChannel {
    connects: VecDeque<ConnectScript>,
    inbound: Option<mpsc::UnboundedReceiver<ServerEvent>>,
    sent: mpsc::UnboundedSender<ClientEvent>,
}

#[async_trait::async_trait]
impl EventChannel for ScriptedChannel {
    async fn connect(&mut self) -> Result<(), ChannelError> {
        match self.connects.pop_front() {
            Some(ConnectScript::Up(rx)) => {
                self.inbound = Some(rx);
                Ok(())
            }
            Some(ConnectScript::Fail) | None => {
                Err(ChannelError::Connect("scripted failure".into()))
            }
            Some(ConnectScript::Hang) => std::future::pending().await,
        }
    }

    async fn emit(&mut self, event: ClientEvent) -> Result<(), ChannelError> {
        self.sent.send(event).map_err(|_| ChannelError::Closed)
    }

    async fn next_event(&mut self) -> Option<ServerEvent> {
        match &mut self.inbound {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }
}

// =============================================================================
// HARNESS
// =============================================================================

struct Harness {
    changes: mpsc::UnboundedSender<LocalChange>,
    updates: mpsc::UnboundedReceiver<BoardUpdate>,
    sent: mpsc::UnboundedReceiver<ClientEvent>,
    task: tokio::task::JoinHandle<()>,
}

impl Harness {
    fn start(connects: Vec<ConnectScript>, policy: ReconnectPolicy) -> Self {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();

        let channel =
            ScriptedChannel { connects: connects.into(), inbound: None, sent: sent_tx };
        let controller = SyncController::new(
            channel,
            "abc123",
            identity("u-1", "Ada"),
            policy,
            changes_rx,
            updates_tx,
        );
        let task = tokio::spawn(controller.run());

        Self { changes: changes_tx, updates: updates_rx, sent: sent_rx, task }
    }

    async fn next_update(&mut self) -> BoardUpdate {
        timeout(Duration::from_secs(30), self.updates.recv())
            .await
            .expect("update receive timed out")
            .expect("update channel closed unexpectedly")
    }

    async fn next_sent(&mut self) -> ClientEvent {
        timeout(Duration::from_secs(30), self.sent.recv())
            .await
            .expect("sent receive timed out")
            .expect("sent channel closed unexpectedly")
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn up() -> (mpsc::UnboundedSender<ServerEvent>, ConnectScript) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, ConnectScript::Up(rx))
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn connect_emits_join_and_unlocks_board() {
    let (_server, script) = up();
    let mut h = Harness::start(vec![script], ReconnectPolicy::default());

    assert_eq!(h.next_update().await, BoardUpdate::Status(ConnectionStatus::Connecting));
    assert_eq!(h.next_update().await, BoardUpdate::BoardReady);
    assert_eq!(h.next_update().await, BoardUpdate::Status(ConnectionStatus::Connected));

    let ClientEvent::JoinRoom { board_id, user_id, .. } = h.next_sent().await else {
        panic!("expected join-room");
    };
    assert_eq!(board_id, "abc123");
    assert_eq!(user_id, "u-1");
}

#[tokio::test(start_paused = true)]
async fn burst_of_local_changes_produces_one_canvas_sync() {
    let (_server, script) = up();
    let mut h = Harness::start(vec![script], ReconnectPolicy::default());

    let ClientEvent::JoinRoom { .. } = h.next_sent().await else {
        panic!("expected join-room first");
    };

    for i in 1..=5 {
        h.changes
            .send(LocalChange::Canvas(format!("{{\"v\":{i}}}")))
            .expect("controller should be running");
    }

    let ClientEvent::CanvasSync { board_id, canvas_json } = h.next_sent().await else {
        panic!("expected canvas-sync");
    };
    assert_eq!(board_id, "abc123");
    assert_eq!(canvas_json, "{\"v\":5}");

    // Exactly one emission for the burst.
    assert!(h.sent.try_recv().is_err());

    // A later change starts a fresh window.
    h.changes
        .send(LocalChange::Canvas("{\"v\":6}".into()))
        .expect("controller should be running");
    let ClientEvent::CanvasSync { canvas_json, .. } = h.next_sent().await else {
        panic!("expected second canvas-sync");
    };
    assert_eq!(canvas_json, "{\"v\":6}");
}

#[tokio::test(start_paused = true)]
async fn cursor_changes_are_forwarded_without_debounce() {
    let (_server, script) = up();
    let mut h = Harness::start(vec![script], ReconnectPolicy::default());
    let ClientEvent::JoinRoom { .. } = h.next_sent().await else {
        panic!("expected join-room first");
    };

    h.changes
        .send(LocalChange::Cursor { x: 9.0, y: 11.0 })
        .expect("controller should be running");

    let ClientEvent::CursorMove { board_id, user_id, x, y } = h.next_sent().await else {
        panic!("expected cursor-move");
    };
    assert_eq!(board_id, "abc123");
    assert_eq!(user_id, "u-1");
    assert!((x - 9.0).abs() < f64::EPSILON);
    assert!((y - 11.0).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn server_events_become_board_updates() {
    let (server, script) = up();
    let mut h = Harness::start(vec![script], ReconnectPolicy::default());
    // Skip the connection lifecycle updates.
    for _ in 0..3 {
        h.next_update().await;
    }

    let users = vec![identity("u-2", "Brin")];
    server
        .send(ServerEvent::RoomState {
            canvas_json: Some("{\"v\":1}".into()),
            users: users.clone(),
        })
        .expect("controller should be running");
    assert_eq!(h.next_update().await, BoardUpdate::Presence(users.clone()));
    assert_eq!(h.next_update().await, BoardUpdate::RemoteCanvas("{\"v\":1}".into()));

    server
        .send(ServerEvent::CanvasSync { canvas_json: "{\"v\":2}".into() })
        .expect("controller should be running");
    assert_eq!(h.next_update().await, BoardUpdate::RemoteCanvas("{\"v\":2}".into()));

    server
        .send(ServerEvent::UserLeft { user_id: "u-2".into() })
        .expect("controller should be running");
    assert_eq!(h.next_update().await, BoardUpdate::UserLeft("u-2".into()));

    server
        .send(ServerEvent::CursorMove { user_id: "u-2".into(), x: 1.0, y: 2.0 })
        .expect("controller should be running");
    let BoardUpdate::RemoteCursor { user_id, .. } = h.next_update().await else {
        panic!("expected remote cursor");
    };
    assert_eq!(user_id, "u-2");
}

#[tokio::test(start_paused = true)]
async fn transport_drop_reconnects_and_reannounces() {
    let (server_a, script_a) = up();
    let (_server_b, script_b) = up();
    let mut h = Harness::start(vec![script_a, script_b], ReconnectPolicy::default());

    let ClientEvent::JoinRoom { .. } = h.next_sent().await else {
        panic!("expected initial join");
    };
    for _ in 0..3 {
        h.next_update().await;
    }

    // Server goes away.
    drop(server_a);

    assert_eq!(h.next_update().await, BoardUpdate::Status(ConnectionStatus::Reconnecting));
    assert_eq!(h.next_update().await, BoardUpdate::Status(ConnectionStatus::Connected));

    // Membership was lost server-side, so the client re-announces.
    let ClientEvent::JoinRoom { board_id, user_id, .. } = h.next_sent().await else {
        panic!("expected re-join after resume");
    };
    assert_eq!(board_id, "abc123");
    assert_eq!(user_id, "u-1");
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_degrades_to_solo_mode() {
    let policy = ReconnectPolicy {
        budget: RetryBudget::Limited(1),
        ..ReconnectPolicy::dedicated()
    };
    let mut h = Harness::start(vec![ConnectScript::Fail, ConnectScript::Fail], policy);

    assert_eq!(h.next_update().await, BoardUpdate::Status(ConnectionStatus::Connecting));
    assert_eq!(h.next_update().await, BoardUpdate::Status(ConnectionStatus::Reconnecting));
    // The board was never unlocked, so entering solo unlocks it.
    assert_eq!(h.next_update().await, BoardUpdate::BoardReady);
    assert_eq!(h.next_update().await, BoardUpdate::Status(ConnectionStatus::Unavailable));

    // Local edits are consumed but never broadcast.
    h.changes
        .send(LocalChange::Canvas("{\"solo\":true}".into()))
        .expect("controller should be running");
    tokio::task::yield_now().await;
    assert!(h.sent.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn handshake_fallback_unlocks_a_stalled_connect() {
    let mut h = Harness::start(vec![ConnectScript::Hang], ReconnectPolicy::default());

    assert_eq!(h.next_update().await, BoardUpdate::Status(ConnectionStatus::Connecting));
    // The handshake never completes; the fallback deadline frees the board.
    assert_eq!(h.next_update().await, BoardUpdate::BoardReady);
    assert!(h.updates.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn surface_shutdown_ends_the_controller() {
    let (changes_tx, changes_rx) = mpsc::unbounded_channel();
    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();
    let (sent_tx, _sent_rx) = mpsc::unbounded_channel();
    let (_server, script) = up();

    let channel = ScriptedChannel { connects: vec![script].into(), inbound: None, sent: sent_tx };
    let controller = SyncController::new(
        channel,
        "abc123",
        identity("u-1", "Ada"),
        ReconnectPolicy::default(),
        changes_rx,
        updates_tx,
    );
    let task = tokio::spawn(controller.run());

    // Wait until the session is up, then close the surface side.
    loop {
        let update = timeout(Duration::from_secs(30), updates_rx.recv())
            .await
            .expect("update receive timed out")
            .expect("update channel closed unexpectedly");
        if update == BoardUpdate::Status(ConnectionStatus::Connected) {
            break;
        }
    }
    drop(changes_tx);

    timeout(Duration::from_secs(30), task)
        .await
        .expect("controller did not shut down")
        .expect("controller task panicked");
}
