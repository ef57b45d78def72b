//! Memorial core - session and API client library for the memorial service.
//!
//! This crate holds everything a front end needs to talk to the memorial
//! API: the authenticated HTTP client with transparent token refresh, the
//! durable token store, the session manager and its reactive state, route
//! guards, and the wire models.

pub mod api;
pub mod auth;
pub mod config;
pub mod guards;
pub mod messages;
pub mod models;
pub mod notify;
pub mod storage;
pub mod utils;

pub use api::{ApiClient, ApiError, ClientConfig, RequestOptions};
pub use auth::{SessionManager, SessionState, TokenStore};
pub use config::Config;
pub use guards::{guard, GuardDecision, Route};
pub use notify::{Notification, NotificationLevel, Notifier};
