//! Data models for the memorial API.
//!
//! This module contains the wire types exchanged with the remote API:
//!
//! - `User` and its preference records, plus the auth request/response
//!   shapes (`LoginRequest`, `RegisterRequest`, `LoginResponse`, `TokenPair`)
//! - `DeceasedProfile` with Vietnamese naming and lunar-calendar fields,
//!   and the create/update/list shapes around it
//! - Media upload and health-check responses

pub mod deceased;
pub mod media;
pub mod user;

pub use deceased::{
    DeceasedProfile, DeceasedProfileCreate, DeceasedProfileList, DeceasedProfileUpdate,
    Gender, PrivacyLevel, ProfileQuery,
};
pub use media::{FileUpload, HealthStatus, UploadedFile};
pub use user::{
    LoginRequest, LoginResponse, NotificationPreferences, PasswordChange, PrivacySettings,
    ProfileUpdate, RegisterRequest, TokenPair, TokenValidation, User,
};
