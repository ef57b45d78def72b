//! Persisted subset of the session state.
//!
//! Only `user` and `is_authenticated` cross this boundary. Loading flags
//! and error text are transient and never written.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::state::SessionState;
use crate::models::User;
use crate::storage::{Storage, StorageResult, SESSION_SNAPSHOT_KEY};

/// Snapshot format version, bumped when the persisted shape changes
const SNAPSHOT_VERSION: u32 = 0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    #[serde(rename = "isAuthenticated")]
    pub is_authenticated: bool,
}

impl SessionSnapshot {
    /// The only way session state reaches storage.
    pub fn of(state: &SessionState) -> Self {
        Self {
            user: state.user.clone(),
            is_authenticated: state.is_authenticated,
        }
    }
}

/// On-disk envelope: `{"state": {...}, "version": 0}`
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    state: SessionSnapshot,
    #[serde(default)]
    version: u32,
}

#[derive(Clone)]
pub struct SnapshotStore {
    storage: Arc<dyn Storage>,
}

impl SnapshotStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Read the stored snapshot. Unreadable or foreign-version data counts as none.
    pub fn load(&self) -> Option<SessionSnapshot> {
        let raw = match self.storage.get(SESSION_SNAPSHOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read session snapshot");
                return None;
            }
        };
        match serde_json::from_str::<Envelope>(&raw) {
            Ok(envelope) if envelope.version == SNAPSHOT_VERSION => Some(envelope.state),
            Ok(envelope) => {
                warn!(version = envelope.version, "Ignoring session snapshot with unknown version");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse session snapshot");
                None
            }
        }
    }

    pub fn save(&self, snapshot: &SessionSnapshot) -> StorageResult<()> {
        let envelope = Envelope {
            state: snapshot.clone(),
            version: SNAPSHOT_VERSION,
        };
        let raw = serde_json::to_string(&envelope)?;
        self.storage.set(SESSION_SNAPSHOT_KEY, &raw)
    }

    pub fn clear(&self) -> StorageResult<()> {
        self.storage.remove(SESSION_SNAPSHOT_KEY)
    }
}
