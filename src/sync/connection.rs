//! Connection lifecycle state machine.
//!
//! DESIGN
//! ======
//! The reconnect behavior is an explicit state machine rather than a side
//! effect of transport callbacks: inputs are transport facts (handshake
//! completed, transport dropped, fallback deadline passed) and outputs are
//! effects for the controller to execute. Re-joining after a resume is the
//! `EmitJoin` effect produced on every entry to `Connected`, because the
//! relay forgets membership when the old connection dies.
//!
//! `UnlockBoard` fires exactly once — on the first successful handshake,
//! on the handshake-fallback deadline, or on entering solo mode — so the
//! user is never blocked indefinitely behind a spinner.

use std::time::Duration;

// =============================================================================
// POLICY
// =============================================================================

/// How many reconnect attempts the controller may spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    /// Keep retrying forever. For a dedicated relay endpoint.
    Unlimited,
    /// Give up after this many attempts. For shared endpoints where the
    /// relay's in-process room state is not guaranteed to be reachable
    /// again (retries cannot fix that topology).
    Limited(u32),
}

impl RetryBudget {
    fn allows(self, attempts_used: u32) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(max) => attempts_used < max,
        }
    }
}

/// Reconnection tuning. Defaults carry the reference values.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub budget: RetryBudget,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// If the first handshake has not completed by this deadline, the
    /// board is made usable anyway (local edits, no collaboration yet).
    pub handshake_fallback: Duration,
}

impl ReconnectPolicy {
    /// Policy for a dedicated relay endpoint: retry until it comes back.
    #[must_use]
    pub fn dedicated() -> Self {
        Self {
            budget: RetryBudget::Unlimited,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            handshake_fallback: Duration::from_secs(4),
        }
    }

    /// Policy for a degraded/shared endpoint that is structurally
    /// unreliable for this protocol: a small finite budget, then solo.
    #[must_use]
    pub fn shared() -> Self {
        Self { budget: RetryBudget::Limited(5), ..Self::dedicated() }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::dedicated()
    }
}

// =============================================================================
// STATE MACHINE
// =============================================================================

/// Connection lifecycle states, in the order a session moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting,
    /// Retry budget exhausted. Collaboration is off; edits stay local.
    Unavailable,
}

/// Actions the controller must take after feeding an input to the FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Announce (or re-announce) room membership to the relay.
    EmitJoin,
    /// Make the board editable. Fires at most once per session.
    UnlockBoard,
    /// Attempt the next connect after this backoff delay.
    RetryAfter(Duration),
    /// Stop retrying; local-only editing from here on.
    EnterSolo,
}

#[derive(Debug)]
pub struct ConnectionFsm {
    status: ConnectionStatus,
    policy: ReconnectPolicy,
    attempts: u32,
    next_backoff: Duration,
    board_unlocked: bool,
}

impl ConnectionFsm {
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            attempts: 0,
            next_backoff: policy.initial_backoff,
            board_unlocked: false,
            policy,
        }
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[must_use]
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    #[must_use]
    pub fn board_unlocked(&self) -> bool {
        self.board_unlocked
    }

    /// Handshake completed. Resets the retry accounting and re-announces
    /// membership, since any previous server-side membership is gone.
    pub fn on_connected(&mut self) -> Vec<Effect> {
        self.status = ConnectionStatus::Connected;
        self.attempts = 0;
        self.next_backoff = self.policy.initial_backoff;

        let mut effects = vec![Effect::EmitJoin];
        if !self.board_unlocked {
            self.board_unlocked = true;
            effects.push(Effect::UnlockBoard);
        }
        effects
    }

    /// Transport dropped, or a connect attempt failed.
    pub fn on_transport_drop(&mut self) -> Vec<Effect> {
        if self.status == ConnectionStatus::Unavailable {
            return Vec::new();
        }

        if self.policy.budget.allows(self.attempts) {
            self.attempts += 1;
            self.status = ConnectionStatus::Reconnecting;
            let delay = self.next_backoff;
            self.next_backoff = (self.next_backoff * 2).min(self.policy.max_backoff);
            return vec![Effect::RetryAfter(delay)];
        }

        self.status = ConnectionStatus::Unavailable;
        let mut effects = Vec::new();
        if !self.board_unlocked {
            self.board_unlocked = true;
            effects.push(Effect::UnlockBoard);
        }
        effects.push(Effect::EnterSolo);
        effects
    }

    /// The handshake-fallback deadline passed while still connecting.
    pub fn on_handshake_deadline(&mut self) -> Vec<Effect> {
        if self.board_unlocked || self.status == ConnectionStatus::Connected {
            return Vec::new();
        }
        self.board_unlocked = true;
        vec![Effect::UnlockBoard]
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
