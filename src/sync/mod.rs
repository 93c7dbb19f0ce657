//! Client sync controller — the client half of the board protocol.
//!
//! The relay half (`routes`, `services`) runs in the server process; this
//! module is the logic a client embeds next to its rendering surface:
//! connection lifecycle with degradation to solo mode, debounced canvas
//! broadcast, echo suppression, and session identity.

pub mod connection;
pub mod controller;
pub mod debounce;
pub mod identity;
pub mod surface;

pub use connection::{ConnectionFsm, ConnectionStatus, ReconnectPolicy, RetryBudget};
pub use controller::{BoardUpdate, ChannelError, EventChannel, LocalChange, SyncController};
pub use debounce::CanvasDebouncer;
pub use surface::SurfaceSync;
