//! Session identity generation.
//!
//! An identity is created once when the client session starts and reused
//! for every reconnect, so presence stays stable across transport drops.

use rand::Rng;
use uuid::Uuid;

use crate::event::UserIdentity;

/// Display colors assigned to new sessions.
const PALETTE: [&str; 8] = [
    "#e8745a", "#5a9be8", "#58b368", "#e8b45a", "#9b5ae8", "#e85a9b", "#45aab4", "#8a8178",
];

impl UserIdentity {
    /// Generate a fresh session identity with a random display color.
    #[must_use]
    pub fn generate(user_name: impl Into<String>) -> Self {
        let color = PALETTE[rand::rng().random_range(0..PALETTE.len())];
        Self {
            user_id: Uuid::new_v4().to_string(),
            user_name: user_name.into(),
            color: color.to_owned(),
        }
    }
}
