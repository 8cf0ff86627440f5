//! Session controller and matchmaking.
//!
//! One [`SessionController`] per user session. It owns the ephemeral
//! [`SessionState`], talks to the backend through [`LudiceApi`](crate::api::LudiceApi)
//! and reports to the user through a [`HostBridge`](crate::host::HostBridge).

mod controller;
mod error;
mod poller;
mod types;

pub use controller::SessionController;
pub use error::SessionError;
pub use types::{MatchPhase, Profile, Screen, SessionState};
