//! Authentication module for managing user sessions and tokens.
//!
//! This module provides:
//! - `TokenStore`: durable access/refresh token storage with local expiry checks
//! - `SessionStore`: the reactive session state container and its reducer
//! - `SnapshotStore`: the persisted `user`/`is_authenticated` subset of the state
//! - `SessionManager`: login, register, logout, refresh and startup logic
//!
//! Sessions survive restarts through the snapshot; startup re-verifies
//! the stored tokens before trusting it.

pub mod session;
pub mod snapshot;
pub mod state;
pub mod tokens;

pub use session::SessionManager;
pub use snapshot::{SessionSnapshot, SnapshotStore};
pub use state::{reduce, SessionAction, SessionState, SessionStore};
pub use tokens::{decode_expiry, TokenStore};
