//! HTTP client behaviour: refresh-and-retry, backoff, query encoding.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{seed_session, user_json, Harness};
use memorial_core::models::{DeceasedProfileUpdate, FileUpload, PrivacyLevel, ProfileQuery};
use memorial_core::storage::{MemoryStorage, Storage};
use memorial_core::{ApiError, NotificationLevel};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, Request, ResponseTemplate};

async fn signed_in_harness(access: &str, refresh: &str) -> Harness {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    seed_session(&storage, access, refresh);
    Harness::with_storage(storage).await
}

fn refreshed_tokens(access: &str, refresh: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "tokens": { "access_token": access, "refresh_token": refresh, "token_type": "bearer" }
    }))
}

#[tokio::test]
async fn test_401_refreshes_and_retries_once() {
    let h = signed_in_harness("a-old", "r-old").await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", "Bearer a-old"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token expired" })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({ "refresh_token": "r-old" })))
        .respond_with(refreshed_tokens("a-new", "r-new"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", "Bearer a-new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("Lan")))
        .expect(1)
        .mount(&h.server)
        .await;

    let user = h.api().current_user().await.unwrap();
    assert_eq!(user.first_name, "Lan");

    let tokens = h.api().tokens().get().unwrap().unwrap();
    assert_eq!(tokens.access_token, "a-new");
    assert_eq!(tokens.refresh_token, "r-new");
    assert!(h.manager.is_authenticated());
}

#[tokio::test]
async fn test_refresh_accepts_bare_token_pair() {
    let h = signed_in_harness("a-old", "r-old").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a-bare",
            "refresh_token": "r-bare"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let pair = h.api().refresh_tokens().await.unwrap();
    assert_eq!(pair.access_token, "a-bare");
    assert_eq!(
        h.api().tokens().access_token().unwrap().as_deref(),
        Some("a-bare")
    );
}

#[tokio::test]
async fn test_second_401_after_refresh_ends_session() {
    let mut h = signed_in_harness("a-old", "r-old").await;

    Mock::given(method("GET"))
        .and(path("/api/deceased/p-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Not authenticated" })))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refreshed_tokens("a-new", "r-new"))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.api().get_deceased_profile("p-1").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(ref d) if d == "Not authenticated"));

    assert!(!h.api().tokens().is_present());
    assert!(!h.manager.is_authenticated());

    let notes = h.drain_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Warning);
}

#[tokio::test]
async fn test_missing_refresh_token_ends_session() {
    let h = signed_in_harness("a-old", "r-old").await;
    h.storage
        .remove(memorial_core::storage::REFRESH_TOKEN_KEY)
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token expired" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.api().current_user().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
    assert!(!h.manager.is_authenticated());
    assert_eq!(h.storage.get(memorial_core::storage::ACCESS_TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let h = signed_in_harness("a-old", "r-old").await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", "Bearer a-old"))
        .respond_with(ResponseTemplate::new(401))
        .expect(5)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refreshed_tokens("a-new", "r-new").set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", "Bearer a-new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("Lan")))
        .expect(5)
        .mount(&h.server)
        .await;

    let api = h.api().clone();
    let results = futures::future::join_all((0..5).map(|_| {
        let api = api.clone();
        async move { api.current_user().await }
    }))
    .await;

    for result in results {
        assert_eq!(result.unwrap().first_name, "Lan");
    }
    assert_eq!(
        h.api().tokens().refresh_token().unwrap().as_deref(),
        Some("r-new")
    );
}

#[tokio::test]
async fn test_concurrent_401s_share_one_failed_refresh() {
    let h = signed_in_harness("a-old", "r-old").await;
    let expirations = Arc::new(AtomicUsize::new(0));
    let counter = expirations.clone();
    h.api().on_session_expired(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token expired" })))
        .expect(5)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Invalid refresh token" }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let api = h.api().clone();
    let results = futures::future::join_all((0..5).map(|_| {
        let api = api.clone();
        async move { api.current_user().await }
    }))
    .await;

    for result in results {
        let err = result.unwrap_err();
        assert!(err.is_auth_failure(), "{:?}", err);
    }
    assert_eq!(expirations.load(Ordering::SeqCst), 1);
    assert!(!h.api().tokens().is_present());
    assert!(!h.manager.is_authenticated());
}

#[tokio::test]
async fn test_verify_token() {
    let h = signed_in_harness("a-1", "r-1").await;

    Mock::given(method("GET"))
        .and(path("/api/auth/verify-token"))
        .and(header("authorization", "Bearer a-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": true,
            "user_id": "u-1",
            "session_id": "s-1",
            "expires_at": "2030-01-01T00:00:00"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let validation = h.api().verify_token().await.unwrap();
    assert!(validation.valid);
    assert_eq!(validation.user_id.as_deref(), Some("u-1"));
    assert_eq!(validation.session_id.as_deref(), Some("s-1"));
}

#[tokio::test]
async fn test_update_deceased_profile_sends_only_set_fields() {
    let h = signed_in_harness("a-1", "r-1").await;

    Mock::given(method("PUT"))
        .and(path("/api/deceased/p-1"))
        .and(body_json(json!({
            "death_date_lunar": "15/7 Ất Dậu",
            "privacy_level": "private"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p-1",
            "vietnamese_name": "Nguyễn Văn An",
            "gender": "male",
            "death_date_lunar": "15/7 Ất Dậu",
            "privacy_level": "private"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let patch = DeceasedProfileUpdate {
        death_date_lunar: Some("15/7 Ất Dậu".to_string()),
        privacy_level: Some(PrivacyLevel::Private),
        ..DeceasedProfileUpdate::default()
    };
    let updated = h.api().update_deceased_profile("p-1", &patch).await.unwrap();
    assert_eq!(updated.privacy_level, PrivacyLevel::Private);
    assert_eq!(updated.death_date_lunar.as_deref(), Some("15/7 Ất Dậu"));
}

#[tokio::test]
async fn test_public_requests_never_refresh() {
    let h = signed_in_harness("a-1", "r-1").await;

    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refreshed_tokens("a-2", "r-2"))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h.api().health_check().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));

    let requests = h.server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
    assert!(h.api().tokens().is_present());
}

#[tokio::test]
async fn test_rate_limited_requests_back_off_and_retry() {
    let h = Harness::new().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(move |_: &Request| {
            if calls_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                ResponseTemplate::new(429)
            } else {
                ResponseTemplate::new(200).set_body_json(json!({
                    "status": "healthy",
                    "version": "1.0.0",
                    "database": "healthy"
                }))
            }
        })
        .mount(&h.server)
        .await;

    let health = h.api().health_check().await.unwrap();
    assert!(health.is_healthy());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_retries() {
    let mut h = Harness::new().await;

    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&h.server)
        .await;

    let err = h.api().health_check().await.unwrap_err();
    assert!(matches!(err, ApiError::RateLimited));
    assert!(err.is_transient());

    let notes = h.drain_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Error);
}

#[tokio::test]
async fn test_error_detail_reaches_notification() {
    let mut h = signed_in_harness("a-1", "r-1").await;

    Mock::given(method("GET"))
        .and(path("/api/deceased/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "detail": "Không tìm thấy hồ sơ" })),
        )
        .mount(&h.server)
        .await;

    let err = h.api().get_deceased_profile("missing").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let notes = h.drain_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].message, "Không tìm thấy hồ sơ");
    assert!(h.manager.is_authenticated());
}

#[tokio::test]
async fn test_list_deceased_sends_query() {
    let h = signed_in_harness("a-1", "r-1").await;

    Mock::given(method("GET"))
        .and(path("/api/deceased/"))
        .and(query_param("skip", "20"))
        .and(query_param("limit", "10"))
        .and(query_param("search", "Nguyễn"))
        .and(header("authorization", "Bearer a-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "profiles": [{
                "id": "p-1",
                "vietnamese_name": "Nguyễn Văn An",
                "gender": "male",
                "privacy_level": "family"
            }],
            "total": 21,
            "skip": 20,
            "limit": 10
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let query = ProfileQuery {
        skip: Some(20),
        limit: Some(10),
        search: Some("Nguyễn".to_string()),
        ..ProfileQuery::default()
    };
    let list = h.api().list_deceased_profiles(&query).await.unwrap();
    assert_eq!(list.profiles.len(), 1);
    assert_eq!(list.profiles[0].vietnamese_name, "Nguyễn Văn An");
    assert!(!list.has_more());
}

#[tokio::test]
async fn test_upload_sends_multipart() {
    let h = signed_in_harness("a-1", "r-1").await;

    Mock::given(method("POST"))
        .and(path("/api/media/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "/uploads/anh-tho.jpg",
            "file_id": "f-1"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let upload = FileUpload::new("anh-tho.jpg", b"\xff\xd8\xff".to_vec()).for_profile("p-1");
    let uploaded = h.api().upload_file(upload).await.unwrap();
    assert_eq!(uploaded.file_id, "f-1");

    let requests = h.server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"profile_id\""));
    assert!(body.contains("filename=\"anh-tho.jpg\""));
}
