//! Durable access/refresh token storage.
//!
//! The access token's `exp` claim is read locally to skip network calls
//! for tokens that are obviously stale. The signature is not checked here;
//! the server does that. Anything that cannot be decoded counts as expired.

use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::TokenPair;
use crate::storage::{Storage, StorageResult, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
    clock_skew: Duration,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            clock_skew: Duration::zero(),
        }
    }

    /// Accept access tokens up to `secs` past their `exp` claim
    pub fn with_clock_skew(mut self, secs: i64) -> Self {
        self.clock_skew = Duration::seconds(secs.max(0));
        self
    }

    /// The backing storage, shared with the session snapshot
    pub fn storage(&self) -> Arc<dyn Storage> {
        Arc::clone(&self.storage)
    }

    /// Both tokens, or `None` unless both are stored.
    ///
    /// Only the two token strings are persisted; the informational fields
    /// of the pair that was stored come back empty.
    pub fn get(&self) -> StorageResult<Option<TokenPair>> {
        let access = self.storage.get(ACCESS_TOKEN_KEY)?;
        let refresh = self.storage.get(REFRESH_TOKEN_KEY)?;
        Ok(match (access, refresh) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(&access, &refresh)),
            _ => None,
        })
    }

    pub fn access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(REFRESH_TOKEN_KEY)
    }

    /// Store both tokens. If the refresh token cannot be written, the
    /// previous access token is put back so a mismatched pair is never left.
    pub fn set(&self, pair: &TokenPair) -> StorageResult<()> {
        let previous = self.storage.get(ACCESS_TOKEN_KEY)?;
        self.storage.set(ACCESS_TOKEN_KEY, &pair.access_token)?;

        if let Err(e) = self.storage.set(REFRESH_TOKEN_KEY, &pair.refresh_token) {
            warn!(error = %e, "Failed to store refresh token, rolling back access token");
            let rollback = match previous {
                Some(ref token) => self.storage.set(ACCESS_TOKEN_KEY, token),
                None => self.storage.remove(ACCESS_TOKEN_KEY),
            };
            if let Err(rollback_err) = rollback {
                warn!(error = %rollback_err, "Rollback failed, clearing token pair");
                if let Err(clear_err) = self.clear() {
                    warn!(error = %clear_err, "Failed to clear token pair");
                }
            }
            return Err(e);
        }

        debug!("Stored token pair");
        Ok(())
    }

    pub fn clear(&self) -> StorageResult<()> {
        self.storage.remove(ACCESS_TOKEN_KEY)?;
        self.storage.remove(REFRESH_TOKEN_KEY)?;
        debug!("Cleared token pair");
        Ok(())
    }

    /// True iff an access token is stored. Unreadable storage counts as absent.
    pub fn is_present(&self) -> bool {
        match self.access_token() {
            Ok(token) => token.is_some_and(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read access token");
                false
            }
        }
    }

    /// Whether the stored access token is past its `exp` claim.
    /// A missing or undecodable token is expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expiry) => expiry + self.clock_skew < now,
            None => true,
        }
    }

    /// The decoded `exp` claim of the stored access token
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let token = match self.access_token() {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read access token");
                return None;
            }
        };
        let expiry = decode_expiry(&token);
        if expiry.is_none() {
            warn!("Could not decode access token expiry, treating as expired");
        }
        expiry
    }
}

/// Read the `exp` claim from a JWT-shaped token without verifying it.
pub fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_f64()?;
    DateTime::from_timestamp(exp.floor() as i64, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::storage::{MemoryStorage, StorageError};

    fn jwt_with(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.signature", header, payload)
    }

    fn store() -> TokenStore {
        TokenStore::new(Arc::new(MemoryStorage::new()))
    }

    /// Memory storage whose refresh-token writes fail on demand
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail_refresh: AtomicBool,
    }

    impl Storage for FlakyStorage {
        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            if key == REFRESH_TOKEN_KEY && self.fail_refresh.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_failed_refresh_write_restores_previous_pair() {
        let storage = Arc::new(FlakyStorage::default());
        let tokens = TokenStore::new(storage.clone());
        tokens.set(&TokenPair::new("a-1", "r-1")).unwrap();

        storage.fail_refresh.store(true, Ordering::SeqCst);
        assert!(tokens.set(&TokenPair::new("a-2", "r-2")).is_err());

        assert_eq!(tokens.get().unwrap(), Some(TokenPair::new("a-1", "r-1")));
    }

    #[test]
    fn test_failed_first_write_leaves_no_access_token() {
        let storage = Arc::new(FlakyStorage::default());
        storage.fail_refresh.store(true, Ordering::SeqCst);
        let tokens = TokenStore::new(storage.clone());

        assert!(tokens.set(&TokenPair::new("a-1", "r-1")).is_err());
        assert!(!tokens.is_present());
        assert_eq!(tokens.access_token().unwrap(), None);
    }

    #[test]
    fn test_set_get_round_trip() {
        let tokens = store();
        assert_eq!(tokens.get().unwrap(), None);

        let pair = TokenPair::new("access.payload.sig", "refresh-1");
        tokens.set(&pair).unwrap();
        assert_eq!(tokens.get().unwrap(), Some(pair));
        assert!(tokens.is_present());
    }

    #[test]
    fn test_clear_removes_both_tokens() {
        let tokens = store();
        tokens.set(&TokenPair::new("a", "r")).unwrap();
        tokens.clear().unwrap();

        assert!(!tokens.is_present());
        assert_eq!(tokens.get().unwrap(), None);
        assert_eq!(tokens.refresh_token().unwrap(), None);
    }

    #[test]
    fn test_is_expired_reads_exp_claim() {
        let tokens = store();
        let now = Utc::now();

        let fresh = jwt_with(serde_json::json!({"sub": "u1", "exp": now.timestamp() + 600}));
        tokens.set(&TokenPair::new(&fresh, "r")).unwrap();
        assert!(!tokens.is_expired_at(now));

        let stale = jwt_with(serde_json::json!({"sub": "u1", "exp": now.timestamp() - 10}));
        tokens.set(&TokenPair::new(&stale, "r")).unwrap();
        assert!(tokens.is_expired_at(now));
    }

    #[test]
    fn test_clock_skew_tolerance() {
        let tokens = store().with_clock_skew(30);
        let now = Utc::now();

        let just_expired = jwt_with(serde_json::json!({"exp": now.timestamp() - 10}));
        tokens.set(&TokenPair::new(&just_expired, "r")).unwrap();
        assert!(!tokens.is_expired_at(now));

        let long_expired = jwt_with(serde_json::json!({"exp": now.timestamp() - 60}));
        tokens.set(&TokenPair::new(&long_expired, "r")).unwrap();
        assert!(tokens.is_expired_at(now));
    }

    #[test]
    fn test_undecodable_tokens_fail_closed() {
        let tokens = store();
        let now = Utc::now();

        // No token at all
        assert!(tokens.is_expired_at(now));

        for bad in ["opaque", "a.!!!.c", "a.bm90LWpzb24.c"] {
            tokens.set(&TokenPair::new(bad, "r")).unwrap();
            assert!(tokens.is_expired_at(now), "{} should count as expired", bad);
        }

        // Valid payload but no exp claim
        let no_exp = jwt_with(serde_json::json!({"sub": "u1"}));
        tokens.set(&TokenPair::new(&no_exp, "r")).unwrap();
        assert!(tokens.is_expired_at(now));
    }

    #[test]
    fn test_decode_expiry_accepts_padding_and_vietnamese_claims() {
        let payload = serde_json::json!({"name": "Nguyễn Thị Hoa", "exp": 2_000_000_000});
        let padded = base64::engine::general_purpose::URL_SAFE.encode(payload.to_string());
        let token = format!("h.{}.s", padded);

        let expiry = decode_expiry(&token).expect("padded payload should decode");
        assert_eq!(expiry.timestamp(), 2_000_000_000);
    }
}
