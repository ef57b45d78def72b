//! Typed wrappers over `ApiClient::send` for each remote endpoint.
//!
//! Endpoints whose outcome the session manager reports itself (login,
//! register, logout, profile and password changes) are sent quietly so a
//! failure is only surfaced once.

use reqwest::Method;

use super::client::{ApiClient, RequestBody, RequestOptions};
use super::ApiError;
use crate::models::{
    DeceasedProfile, DeceasedProfileCreate, DeceasedProfileList, DeceasedProfileUpdate,
    FileUpload, HealthStatus, LoginRequest, LoginResponse, PasswordChange, ProfileQuery,
    ProfileUpdate, RegisterRequest, TokenValidation, UploadedFile, User,
};

impl ApiClient {
    // ===== Authentication =====

    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let options = RequestOptions {
            notify_errors: false,
            ..RequestOptions::public()
        };
        self.send(Method::POST, "/auth/login", RequestBody::json(credentials)?, options)
            .await
    }

    pub async fn register(&self, data: &RegisterRequest) -> Result<LoginResponse, ApiError> {
        let options = RequestOptions {
            notify_errors: false,
            ..RequestOptions::public()
        };
        self.send(Method::POST, "/auth/register", RequestBody::json(data)?, options)
            .await
    }

    /// Invalidate the server-side session. Local state is not touched here.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.send_no_content(Method::POST, "/auth/logout", RequestBody::Empty, RequestOptions::quiet())
            .await
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.send(Method::GET, "/auth/me", RequestBody::Empty, RequestOptions::default())
            .await
    }

    pub async fn verify_token(&self) -> Result<TokenValidation, ApiError> {
        self.send(Method::GET, "/auth/verify-token", RequestBody::Empty, RequestOptions::default())
            .await
    }

    // ===== Account =====

    pub async fn update_profile(&self, patch: &ProfileUpdate) -> Result<User, ApiError> {
        self.send(Method::PUT, "/users/me", RequestBody::json(patch)?, RequestOptions::quiet())
            .await
    }

    pub async fn change_password(&self, data: &PasswordChange) -> Result<(), ApiError> {
        self.send_no_content(
            Method::POST,
            "/users/change-password",
            RequestBody::json(data)?,
            RequestOptions::quiet(),
        )
        .await
    }

    pub async fn delete_account(&self) -> Result<(), ApiError> {
        self.send_no_content(Method::DELETE, "/users/me", RequestBody::Empty, RequestOptions::quiet())
            .await
    }

    // ===== Deceased profiles =====

    pub async fn create_deceased_profile(
        &self,
        profile: &DeceasedProfileCreate,
    ) -> Result<DeceasedProfile, ApiError> {
        self.send(Method::POST, "/deceased/", RequestBody::json(profile)?, RequestOptions::default())
            .await
    }

    pub async fn list_deceased_profiles(
        &self,
        query: &ProfileQuery,
    ) -> Result<DeceasedProfileList, ApiError> {
        let options = RequestOptions::default().with_query(query.to_pairs());
        self.send(Method::GET, "/deceased/", RequestBody::Empty, options).await
    }

    pub async fn get_deceased_profile(&self, profile_id: &str) -> Result<DeceasedProfile, ApiError> {
        let path = format!("/deceased/{}", profile_id);
        self.send(Method::GET, &path, RequestBody::Empty, RequestOptions::default())
            .await
    }

    pub async fn update_deceased_profile(
        &self,
        profile_id: &str,
        patch: &DeceasedProfileUpdate,
    ) -> Result<DeceasedProfile, ApiError> {
        let path = format!("/deceased/{}", profile_id);
        self.send(Method::PUT, &path, RequestBody::json(patch)?, RequestOptions::default())
            .await
    }

    pub async fn delete_deceased_profile(&self, profile_id: &str) -> Result<(), ApiError> {
        let path = format!("/deceased/{}", profile_id);
        self.send_no_content(Method::DELETE, &path, RequestBody::Empty, RequestOptions::default())
            .await
    }

    // ===== Media =====

    pub async fn upload_file(&self, upload: FileUpload) -> Result<UploadedFile, ApiError> {
        self.send(
            Method::POST,
            "/media/upload",
            RequestBody::Multipart(upload),
            RequestOptions::default(),
        )
        .await
    }

    // ===== Health =====

    pub async fn health_check(&self) -> Result<HealthStatus, ApiError> {
        self.send(Method::GET, "/health", RequestBody::Empty, RequestOptions::public())
            .await
    }
}
