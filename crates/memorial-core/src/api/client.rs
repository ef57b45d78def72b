//! HTTP client for the memorial REST API.
//!
//! Every request goes through `ApiClient::send`, which:
//! - attaches the stored access token as a bearer header
//! - retries rate-limited responses with exponential backoff
//! - on a 401, refreshes the token pair once and replays the request once
//! - de-authenticates globally when the credentials cannot be recovered
//! - reports failures through the configured `Notifier` before returning them
//!
//! Token refresh is serialized: concurrent requests that hit a 401 at the
//! same time share one rotation instead of racing each other.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{header, multipart, Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ApiError;
use crate::auth::{SnapshotStore, TokenStore};
use crate::messages::{Locale, Message};
use crate::models::{FileUpload, TokenPair};
use crate::notify::{Notification, SharedNotifier};

// ============================================================================
// Constants
// ============================================================================

/// Default API base URL when none is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8002/api";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Refresh endpoint, called with the stored refresh token
const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub locale: Locale,
    pub initial_backoff: Duration,
    pub max_rate_limit_retries: u32,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            locale: Locale::default(),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_rate_limit_retries: MAX_RATE_LIMIT_RETRIES,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

/// Per-request behaviour.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Send without a bearer token and never refresh on 401 (login, register, refresh)
    pub skip_auth: bool,
    /// Report failures through the notifier. Off when the caller reports them itself.
    pub notify_errors: bool,
    /// Override the client-wide timeout
    pub timeout: Option<Duration>,
    pub query: Vec<(&'static str, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            skip_auth: false,
            notify_errors: true,
            timeout: None,
            query: Vec::new(),
        }
    }
}

impl RequestOptions {
    /// Authenticated, failures left to the caller
    pub fn quiet() -> Self {
        Self {
            notify_errors: false,
            ..Self::default()
        }
    }

    /// Unauthenticated endpoints
    pub fn public() -> Self {
        Self {
            skip_auth: true,
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: Vec<(&'static str, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// Rebuilt into a fresh multipart form for every attempt
    Multipart(FileUpload),
}

impl RequestBody {
    pub fn json<B: serde::Serialize>(body: &B) -> Result<Self, ApiError> {
        serde_json::to_value(body)
            .map(RequestBody::Json)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode request body: {}", e)))
    }
}

/// Hook run synchronously whenever the client gives up on the stored credentials.
pub type ExpiryHook = Arc<dyn Fn() + Send + Sync>;

/// The refresh endpoint answers either `{"tokens": {...}}` or the bare pair.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RefreshResponse {
    Wrapped { tokens: TokenPair },
    Bare(TokenPair),
}

impl RefreshResponse {
    fn into_pair(self) -> TokenPair {
        match self {
            RefreshResponse::Wrapped { tokens } => tokens,
            RefreshResponse::Bare(tokens) => tokens,
        }
    }
}

struct ClientInner {
    http: Client,
    config: ClientConfig,
    tokens: TokenStore,
    snapshots: SnapshotStore,
    notifier: SharedNotifier,
    refresh_lock: Mutex<()>,
    expiry_hooks: RwLock<Vec<ExpiryHook>>,
}

/// API client for the memorial service.
/// Clone is cheap - all clones share the connection pool, token store and refresh guard.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    pub fn new(
        config: ClientConfig,
        tokens: TokenStore,
        notifier: SharedNotifier,
    ) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        let snapshots = SnapshotStore::new(tokens.storage());

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                tokens,
                snapshots,
                notifier,
                refresh_lock: Mutex::new(()),
                expiry_hooks: RwLock::new(Vec::new()),
            }),
        })
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub fn notifier(&self) -> &SharedNotifier {
        &self.inner.notifier
    }

    pub fn locale(&self) -> Locale {
        self.inner.config.locale
    }

    pub fn base_url(&self) -> &str {
        &self.inner.config.base_url
    }

    /// Register a hook to run when the session is forcibly ended
    pub fn on_session_expired(&self, hook: impl Fn() + Send + Sync + 'static) {
        match self.inner.expiry_hooks.write() {
            Ok(mut hooks) => hooks.push(Arc::new(hook)),
            Err(poisoned) => poisoned.into_inner().push(Arc::new(hook)),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.config.base_url, path)
    }

    // ===== Request pipeline =====

    /// Send a request and parse the JSON response body.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let response = self.execute(method, path, &body, &options).await?;
        let text = response.text().await?;
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e))
        })
    }

    /// Send a request whose response body is irrelevant.
    pub async fn send_no_content(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<(), ApiError> {
        self.execute(method, path, &body, &options).await?;
        Ok(())
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: &RequestBody,
        options: &RequestOptions,
    ) -> Result<Response, ApiError> {
        let outcome = self.execute_with_refresh(&method, path, body, options).await;
        if let Err(ref e) = outcome {
            if options.notify_errors {
                self.notify_failure(e, options.skip_auth);
            }
        }
        outcome
    }

    async fn execute_with_refresh(
        &self,
        method: &Method,
        path: &str,
        body: &RequestBody,
        options: &RequestOptions,
    ) -> Result<Response, ApiError> {
        let url = self.url(path);
        let token = if options.skip_auth {
            None
        } else {
            self.inner.tokens.access_token()?
        };

        match self.send_with_backoff(method, &url, body, options, token.as_deref()).await {
            Err(ApiError::Unauthorized(detail)) if !options.skip_auth => {
                debug!(%method, path, "Received 401, attempting token refresh");
                let fresh = self.refresh_after_unauthorized(token.as_deref(), detail).await?;

                // Exactly one replay per original request
                let retried = self
                    .send_with_backoff(method, &url, body, options, Some(&fresh))
                    .await;
                if let Err(ApiError::Unauthorized(ref detail)) = retried {
                    warn!(%method, path, detail = %detail, "Request rejected again after token refresh");
                    self.deauthenticate();
                }
                retried
            }
            other => other,
        }
    }

    async fn send_with_backoff(
        &self,
        method: &Method,
        url: &str,
        body: &RequestBody,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let mut retries = 0;
        let mut backoff = self.inner.config.initial_backoff;

        loop {
            let mut request = self
                .inner
                .http
                .request(method.clone(), url)
                .header(header::ACCEPT, "application/json");
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            if let Some(timeout) = options.timeout {
                request = request.timeout(timeout);
            }
            if !options.query.is_empty() {
                request = request.query(&options.query);
            }
            request = match body {
                RequestBody::Empty => request,
                RequestBody::Json(value) => request.json(value),
                RequestBody::Multipart(upload) => request.multipart(Self::build_form(upload)?),
            };

            let response = request.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > self.inner.config.max_rate_limit_retries {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    fn build_form(upload: &FileUpload) -> Result<multipart::Form, ApiError> {
        let part = multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(upload.guessed_mime_type())?;
        let mut form = multipart::Form::new().part("file", part);
        if let Some(ref profile_id) = upload.profile_id {
            form = form.text("profile_id", profile_id.clone());
        }
        Ok(form)
    }

    // ===== Token refresh =====

    /// Obtain a usable access token after `rejected` drew a 401.
    ///
    /// Holds the refresh lock for the whole rotation. A caller that waited
    /// on the lock and finds the stored token already changed reuses it.
    async fn refresh_after_unauthorized(
        &self,
        rejected: Option<&str>,
        detail: String,
    ) -> Result<String, ApiError> {
        let _guard = self.inner.refresh_lock.lock().await;

        match self.inner.tokens.access_token()? {
            Some(current) if Some(current.as_str()) != rejected => {
                debug!("Tokens already rotated by a concurrent request");
                return Ok(current);
            }
            None if rejected.is_some() => {
                // Cleared while we waited: another refresh failed or the user signed out
                return Err(ApiError::Unauthorized(detail));
            }
            _ => {}
        }

        let refresh_token = match self.inner.tokens.refresh_token()? {
            Some(token) => token,
            None => {
                info!("No refresh token available, ending session");
                self.deauthenticate();
                return Err(ApiError::Unauthorized(detail));
            }
        };

        match self.request_refresh(&refresh_token).await {
            Ok(pair) => {
                self.inner.tokens.set(&pair)?;
                info!("Access token refreshed");
                Ok(pair.access_token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.deauthenticate();
                Err(ApiError::RefreshExhausted(e.user_message()))
            }
        }
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let url = self.url(REFRESH_PATH);
        let body = RequestBody::Json(serde_json::json!({ "refresh_token": refresh_token }));
        let response = self
            .send_with_backoff(&Method::POST, &url, &body, &RequestOptions::public(), None)
            .await?;
        let parsed: RefreshResponse = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", e))
        })?;
        Ok(parsed.into_pair())
    }

    /// Rotate the token pair now, outside of any 401.
    pub async fn refresh_tokens(&self) -> Result<TokenPair, ApiError> {
        let _guard = self.inner.refresh_lock.lock().await;
        let refresh_token = self
            .inner
            .tokens
            .refresh_token()?
            .ok_or_else(|| ApiError::Unauthorized("No refresh token available".to_string()))?;
        match self.request_refresh(&refresh_token).await {
            Ok(pair) => {
                self.inner.tokens.set(&pair)?;
                info!("Access token refreshed");
                Ok(pair)
            }
            Err(e) if e.is_auth_failure() => {
                warn!(error = %e, "Refresh token rejected, ending session");
                self.deauthenticate();
                Err(ApiError::RefreshExhausted(e.user_message()))
            }
            Err(e) => Err(e),
        }
    }

    // ===== Global de-authentication =====

    /// Drop stored credentials and cached identity, then tell observers.
    fn deauthenticate(&self) {
        if let Err(e) = self.inner.tokens.clear() {
            warn!(error = %e, "Failed to clear tokens");
        }
        if let Err(e) = self.inner.snapshots.clear() {
            warn!(error = %e, "Failed to clear session snapshot");
        }

        let hooks: Vec<ExpiryHook> = match self.inner.expiry_hooks.read() {
            Ok(hooks) => hooks.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        debug!(hooks = hooks.len(), "Session expired");
        for hook in hooks {
            hook();
        }
    }

    fn notify_failure(&self, error: &ApiError, skip_auth: bool) {
        let notification = if error.is_auth_failure() && !skip_auth {
            Notification::warning(Message::SessionExpired.text(self.locale()))
        } else {
            Notification::error(error.user_message())
        };
        self.inner.notifier.notify(notification);
    }
}
