//! Session state container.
//!
//! All session mutations go through `SessionStore::dispatch`, which runs
//! the pure `reduce` function under the watch channel's write lock and
//! persists the snapshot in the same critical section. Receivers see every
//! state change in order.
//!
//! Every identity change (sign-in, sign-out) bumps `epoch`. Operations that
//! fetch first and apply later capture the epoch up front and apply with
//! `dispatch_if_current`, so a response that arrives after a sign-out is
//! dropped instead of resurrecting the old session.

use std::sync::Mutex;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::snapshot::{SessionSnapshot, SnapshotStore};
use crate::models::User;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Present iff `is_authenticated`
    pub user: Option<User>,
    pub is_authenticated: bool,
    /// True while an operation is in flight; false at rest
    pub is_loading: bool,
    /// Last failure text, cleared by the next successful operation
    pub error: Option<String>,
    pub(crate) epoch: u64,
}

impl SessionState {
    /// Rebuild state from a persisted snapshot, dropping inconsistent halves.
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        match snapshot.user {
            Some(user) if snapshot.is_authenticated => Self {
                user: Some(user),
                is_authenticated: true,
                ..Default::default()
            },
            _ => Self::default(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_anonymous(&self) -> bool {
        !self.is_authenticated
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// An operation began: loading on, previous error cleared
    Started,
    /// Startup verification began: loading on, error kept
    Resuming,
    /// A new identity signed in
    SignedIn(User),
    /// The current identity was (re)loaded from the server
    UserLoaded(User),
    /// Profile fields changed; ignored unless authenticated
    ProfileUpdated(User),
    /// An operation finished without touching identity
    Settled,
    /// Sign-out began; results of earlier operations are now stale
    SignOutStarted,
    SignedOut,
    Failed {
        message: String,
        deauthenticate: bool,
    },
    /// The server is unreachable; the cached identity is kept
    Offline { message: String },
    ErrorCleared,
}

pub fn reduce(state: &SessionState, action: SessionAction) -> SessionState {
    let mut next = state.clone();
    match action {
        SessionAction::Started => {
            next.is_loading = true;
            next.error = None;
        }
        SessionAction::Resuming => {
            next.is_loading = true;
        }
        SessionAction::SignedIn(user) => {
            next.user = Some(user);
            next.is_authenticated = true;
            next.is_loading = false;
            next.error = None;
            next.epoch += 1;
        }
        SessionAction::UserLoaded(user) => {
            next.user = Some(user);
            next.is_authenticated = true;
            next.is_loading = false;
            next.error = None;
        }
        SessionAction::ProfileUpdated(user) => {
            if next.is_authenticated {
                next.user = Some(user);
            }
            next.is_loading = false;
            next.error = None;
        }
        SessionAction::Settled => {
            next.is_loading = false;
            next.error = None;
        }
        SessionAction::SignOutStarted => {
            next.is_loading = true;
            next.epoch += 1;
        }
        SessionAction::SignedOut => {
            next.user = None;
            next.is_authenticated = false;
            next.is_loading = false;
            next.error = None;
            next.epoch += 1;
        }
        SessionAction::Failed {
            message,
            deauthenticate,
        } => {
            next.is_loading = false;
            next.error = Some(message);
            if deauthenticate {
                next.user = None;
                next.is_authenticated = false;
                next.epoch += 1;
            }
        }
        SessionAction::Offline { message } => {
            next.is_loading = false;
            next.error = Some(message);
        }
        SessionAction::ErrorCleared => {
            next.error = None;
        }
    }
    next
}

pub struct SessionStore {
    state: watch::Sender<SessionState>,
    snapshots: SnapshotStore,
    last_saved: Mutex<Option<SessionSnapshot>>,
}

impl SessionStore {
    /// Create the store, rehydrating from the persisted snapshot if one exists
    pub fn new(snapshots: SnapshotStore) -> Self {
        let restored = snapshots.load();
        debug!(
            restored = restored.is_some(),
            authenticated = restored.as_ref().map(|s| s.is_authenticated).unwrap_or(false),
            "Session snapshot loaded"
        );
        let initial = restored
            .clone()
            .map(SessionState::from_snapshot)
            .unwrap_or_default();
        let (state, _) = watch::channel(initial);
        Self {
            state,
            snapshots,
            last_saved: Mutex::new(restored),
        }
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn epoch(&self) -> u64 {
        self.state.borrow().epoch
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn dispatch(&self, action: SessionAction) {
        self.dispatch_when(|_| true, action);
    }

    /// Apply `action` only if no identity change happened since `epoch`.
    /// Returns whether the action was applied.
    pub fn dispatch_if_current(&self, epoch: u64, action: SessionAction) -> bool {
        self.dispatch_when(|state| state.epoch == epoch, action)
    }

    /// Apply `action` if `relevant` accepts the state it would replace.
    /// The check and the update happen under the same lock.
    pub fn dispatch_when(
        &self,
        relevant: impl FnOnce(&SessionState) -> bool,
        action: SessionAction,
    ) -> bool {
        let mut applied = true;
        self.state.send_if_modified(|state| {
            if !relevant(&*state) {
                debug!(epoch = state.epoch, ?action, "Dropping stale session update");
                applied = false;
                return false;
            }
            let next = reduce(state, action);
            if next == *state {
                return false;
            }
            *state = next;
            self.persist(state);
            true
        });
        applied
    }

    fn persist(&self, state: &SessionState) {
        let snapshot = SessionSnapshot::of(state);
        let mut last_saved = match self.last_saved.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if last_saved.as_ref() == Some(&snapshot) {
            return;
        }
        match self.snapshots.save(&snapshot) {
            Ok(()) => *last_saved = Some(snapshot),
            Err(e) => warn!(error = %e, "Failed to persist session snapshot"),
        }
    }
}
