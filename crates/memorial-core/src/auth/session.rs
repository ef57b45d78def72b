//! Session manager: the authentication state machine.
//!
//! States are anonymous and authenticated; `is_loading` and `error`
//! overlay either one. Operations suspend only on network I/O and may
//! overlap. Results that arrive after an identity change are dropped (see
//! `SessionStore::dispatch_when`), so a late `refresh_user` can never undo
//! a `logout`.
//!
//! Every operation updates shared state and emits a notification before
//! returning its error to the caller, so forms can still show field-level
//! feedback.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::snapshot::SnapshotStore;
use super::state::{SessionAction, SessionState, SessionStore};
use crate::api::{ApiClient, ApiError};
use crate::messages::Message;
use crate::models::{LoginRequest, LoginResponse, PasswordChange, ProfileUpdate, RegisterRequest, User};
use crate::notify::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignInKind {
    Login,
    Register,
}

impl SignInKind {
    fn welcome(self, first_name: &str) -> Message<'_> {
        match self {
            SignInKind::Login => Message::WelcomeBack { first_name },
            SignInKind::Register => Message::Registered { first_name },
        }
    }

    fn failure(self) -> Message<'static> {
        match self {
            SignInKind::Login => Message::LoginFailed,
            SignInKind::Register => Message::RegisterFailed,
        }
    }
}

pub struct SessionManager {
    api: ApiClient,
    store: Arc<SessionStore>,
}

impl SessionManager {
    /// Build the manager over `api`, restoring any persisted snapshot.
    ///
    /// The manager subscribes to the client's session-expiry hook so a
    /// failed token refresh anywhere resets the session immediately.
    pub fn new(api: ApiClient) -> Self {
        let store = Arc::new(SessionStore::new(SnapshotStore::new(api.tokens().storage())));

        let weak = Arc::downgrade(&store);
        api.on_session_expired(move || {
            if let Some(store) = weak.upgrade() {
                store.dispatch(SessionAction::SignedOut);
            }
        });

        Self { api, store }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // ===== Selectors =====

    pub fn state(&self) -> SessionState {
        self.store.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.store.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.store.current().user
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.current().is_authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.store.current().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.store.current().error
    }

    // ===== Operations =====

    /// Re-derive session state from stored tokens at process start.
    ///
    /// Never fails: every unexpected outcome falls back to anonymous,
    /// except a network failure with a cached identity, which keeps the
    /// cached identity and records an advisory error.
    pub async fn initialize(&self) -> SessionState {
        let tokens = self.api.tokens();

        if !tokens.is_present() {
            debug!("No stored access token");
            self.store.dispatch(SessionAction::SignedOut);
            return self.state();
        }

        if tokens.is_expired() {
            info!("Token expired, clearing authentication");
            if let Err(e) = tokens.clear() {
                warn!(error = %e, "Failed to clear expired tokens");
            }
            self.store.dispatch(SessionAction::SignedOut);
            return self.state();
        }

        let epoch = self.store.epoch();
        self.store.dispatch(SessionAction::Resuming);

        match self.api.current_user().await {
            Ok(user) => {
                debug!(user_id = %user.id, "Session restored");
                self.store.dispatch_if_current(epoch, SessionAction::UserLoaded(user));
            }
            Err(e) if e.is_auth_failure() => {
                info!(error = %e, "Token rejected by server, clearing authentication");
                self.store.dispatch_when(
                    |state| {
                        if state.epoch != epoch {
                            return false;
                        }
                        if let Err(e) = tokens.clear() {
                            warn!(error = %e, "Failed to clear rejected tokens");
                        }
                        true
                    },
                    SessionAction::SignedOut,
                );
            }
            Err(e) => {
                let message = Message::CachedOffline.text(self.api.locale());
                let applied = self.store.dispatch_when(
                    |state| state.epoch == epoch && state.is_authenticated && state.user.is_some(),
                    SessionAction::Offline { message },
                );
                if applied {
                    warn!(error = %e, "Server unreachable, using cached authentication");
                } else {
                    warn!(error = %e, "Server unreachable and no cached identity");
                    self.store.dispatch_if_current(epoch, SessionAction::SignedOut);
                }
            }
        }

        self.state()
    }

    pub async fn login(&self, credentials: &LoginRequest) -> Result<User, ApiError> {
        self.store.dispatch(SessionAction::Started);
        let outcome = self.api.login(credentials).await;
        self.finish_sign_in(outcome, SignInKind::Login)
    }

    pub async fn register(&self, data: &RegisterRequest) -> Result<User, ApiError> {
        self.store.dispatch(SessionAction::Started);
        let outcome = self.api.register(data).await;
        self.finish_sign_in(outcome, SignInKind::Register)
    }

    fn finish_sign_in(
        &self,
        outcome: Result<LoginResponse, ApiError>,
        kind: SignInKind,
    ) -> Result<User, ApiError> {
        let locale = self.api.locale();
        let outcome = outcome.and_then(|response| {
            if !response.success {
                let message = response
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| kind.failure().text(locale));
                return Err(ApiError::Rejected(message));
            }
            self.api.tokens().set(&response.tokens)?;
            Ok(response.user)
        });

        match outcome {
            Ok(user) => {
                info!(user_id = %user.id, ?kind, "Signed in");
                self.store.dispatch(SessionAction::SignedIn(user.clone()));
                self.notify(Notification::success(kind.welcome(&user.first_name).text(locale)));
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, ?kind, "Sign-in failed");
                if let Err(clear_err) = self.api.tokens().clear() {
                    warn!(error = %clear_err, "Failed to clear stale tokens");
                }
                let message = self.failure_text(&e, kind.failure());
                self.store.dispatch(SessionAction::Failed {
                    message: message.clone(),
                    deauthenticate: true,
                });
                self.notify(Notification::error(message));
                Err(e)
            }
        }
    }

    /// End the session. The remote call is best-effort; local cleanup always runs.
    pub async fn logout(&self) {
        self.store.dispatch(SessionAction::SignOutStarted);

        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Logout request failed");
        }

        if let Err(e) = self.api.tokens().clear() {
            warn!(error = %e, "Failed to clear tokens");
        }
        self.store.dispatch(SessionAction::SignedOut);
        info!("Signed out");
        self.notify(Notification::success(Message::LoggedOut.text(self.api.locale())));
    }

    /// Reload the current identity from the server.
    ///
    /// A 401 ends the session. Any other failure keeps the session and only
    /// records the error.
    pub async fn refresh_user(&self) -> Result<(), ApiError> {
        if !self.api.tokens().is_present() {
            return Ok(());
        }

        self.store.dispatch(SessionAction::Started);
        let epoch = self.store.epoch();

        match self.api.current_user().await {
            Ok(user) => {
                self.store.dispatch_if_current(epoch, SessionAction::UserLoaded(user));
                Ok(())
            }
            Err(e) if e.is_auth_failure() => {
                // The client usually ended the session already; only sign out
                // if nothing else changed the identity meanwhile.
                if self.store.epoch() == epoch {
                    info!(error = %e, "Identity rejected, signing out");
                    self.logout().await;
                }
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Refresh user error");
                let message = self.failure_text(&e, Message::LoadUserFailed);
                self.store.dispatch_if_current(
                    epoch,
                    SessionAction::Failed {
                        message,
                        deauthenticate: false,
                    },
                );
                Err(e)
            }
        }
    }

    pub async fn update_profile(&self, patch: &ProfileUpdate) -> Result<User, ApiError> {
        self.store.dispatch(SessionAction::Started);
        let epoch = self.store.epoch();

        match self.api.update_profile(patch).await {
            Ok(user) => {
                self.store.dispatch_if_current(epoch, SessionAction::ProfileUpdated(user.clone()));
                self.notify(Notification::success(Message::ProfileUpdated.text(self.api.locale())));
                Ok(user)
            }
            Err(e) => {
                self.record_failure(epoch, &e, Message::ProfileUpdateFailed);
                Err(e)
            }
        }
    }

    pub async fn change_password(&self, data: &PasswordChange) -> Result<(), ApiError> {
        self.store.dispatch(SessionAction::Started);
        let epoch = self.store.epoch();

        match self.api.change_password(data).await {
            Ok(()) => {
                self.store.dispatch_if_current(epoch, SessionAction::Settled);
                self.notify(Notification::success(Message::PasswordChanged.text(self.api.locale())));
                Ok(())
            }
            Err(e) => {
                self.record_failure(epoch, &e, Message::PasswordChangeFailed);
                Err(e)
            }
        }
    }

    /// Delete the account server-side, then end the local session.
    pub async fn delete_account(&self) -> Result<(), ApiError> {
        self.store.dispatch(SessionAction::Started);
        let epoch = self.store.epoch();

        match self.api.delete_account().await {
            Ok(()) => {
                if let Err(e) = self.api.tokens().clear() {
                    warn!(error = %e, "Failed to clear tokens");
                }
                self.store.dispatch(SessionAction::SignedOut);
                info!("Account deleted");
                self.notify(Notification::success(Message::AccountDeleted.text(self.api.locale())));
                Ok(())
            }
            Err(e) => {
                self.record_failure(epoch, &e, Message::AccountDeleteFailed);
                Err(e)
            }
        }
    }

    pub fn clear_error(&self) {
        self.store.dispatch(SessionAction::ErrorCleared);
    }

    // ===== Helpers =====

    /// Record a failed account operation. Auth failures end the session.
    fn record_failure(&self, epoch: u64, error: &ApiError, fallback: Message<'static>) {
        warn!(error = %error, "Session operation failed");
        let message = self.failure_text(error, fallback);
        self.store.dispatch_when(
            |state| state.epoch == epoch || state.is_anonymous(),
            SessionAction::Failed {
                message: message.clone(),
                deauthenticate: error.is_auth_failure(),
            },
        );
        self.notify(Notification::error(message));
    }

    fn failure_text(&self, error: &ApiError, fallback: Message<'static>) -> String {
        let message = error.user_message();
        if message.trim().is_empty() {
            fallback.text(self.api.locale())
        } else {
            message
        }
    }

    fn notify(&self, notification: Notification) {
        self.api.notifier().notify(notification);
    }
}
