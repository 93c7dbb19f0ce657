//! Real-time relay and client sync logic for a shared drawing board.
//!
//! The server half (`routes`, `services`, `state`) relays full-state
//! canvas snapshots, presence, and cursor positions between the members
//! of a board's room. The client half (`sync`) debounces local
//! broadcasts, suppresses echo, and degrades to solo mode when no relay
//! is reachable. Both halves speak the typed protocol in `event`.

pub mod event;
pub mod routes;
pub mod services;
pub mod state;
pub mod sync;
