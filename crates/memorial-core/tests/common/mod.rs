//! Shared harness for integration tests: a mock API server, in-memory
//! storage and a channel notifier wired into a session manager.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use memorial_core::auth::{SessionSnapshot, SnapshotStore};
use memorial_core::models::{TokenPair, User};
use memorial_core::notify::ChannelNotifier;
use memorial_core::storage::{MemoryStorage, Storage};
use memorial_core::{ApiClient, ClientConfig, Notification, SessionManager, TokenStore};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::MockServer;

pub struct Harness {
    pub server: MockServer,
    pub storage: Arc<dyn Storage>,
    pub manager: SessionManager,
    pub notifications: UnboundedReceiver<Notification>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new())).await
    }

    pub async fn with_storage(storage: Arc<dyn Storage>) -> Self {
        let server = MockServer::start().await;
        let base_url = format!("{}/api", server.uri());
        let (manager, notifications) = manager_for(&base_url, storage.clone());
        Self {
            server,
            storage,
            manager,
            notifications,
        }
    }

    pub fn api(&self) -> &ApiClient {
        self.manager.api()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }
}

/// Session manager over `storage` talking to `base_url`, with a short backoff.
pub fn manager_for(
    base_url: &str,
    storage: Arc<dyn Storage>,
) -> (SessionManager, UnboundedReceiver<Notification>) {
    let mut config = ClientConfig::new(base_url);
    config.initial_backoff = Duration::from_millis(10);
    config.timeout = Duration::from_secs(5);

    let (notifier, rx) = ChannelNotifier::new();
    let api = ApiClient::new(config, TokenStore::new(storage), Arc::new(notifier))
        .expect("client should build");
    (SessionManager::new(api), rx)
}

/// Unsigned token whose payload carries `exp` at `now + offset_secs`.
pub fn jwt_expiring_in(offset_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + offset_secs;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "sub": "u-1", "exp": exp }).to_string());
    format!("{}.{}.signature", header, payload)
}

pub fn user_json(first_name: &str) -> Value {
    json!({
        "id": "u-1",
        "email": "lan@example.vn",
        "first_name": first_name,
        "last_name": "Trần",
        "email_verified": true,
        "language": "vi",
        "timezone": "Asia/Ho_Chi_Minh",
        "created_at": "2024-01-10T09:00:00"
    })
}

pub fn user(first_name: &str) -> User {
    serde_json::from_value(user_json(first_name)).expect("user fixture should parse")
}

pub fn login_body(access: &str, refresh: &str) -> Value {
    json!({
        "success": true,
        "message": "Login successful",
        "user": user_json("Lan"),
        "tokens": {
            "access_token": access,
            "refresh_token": refresh,
            "token_type": "bearer",
            "expires_in": 1800
        },
        "session_id": "s-1"
    })
}

/// Seed storage as if a previous run had signed in.
pub fn seed_session(storage: &Arc<dyn Storage>, access: &str, refresh: &str) {
    TokenStore::new(storage.clone())
        .set(&TokenPair::new(access, refresh))
        .expect("tokens should store");
    SnapshotStore::new(storage.clone())
        .save(&SessionSnapshot {
            user: Some(user("Lan")),
            is_authenticated: true,
        })
        .expect("snapshot should store");
}
