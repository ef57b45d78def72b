//! REST API client module for the memorial service.
//!
//! This module provides the `ApiClient` for talking to the remote API:
//! authentication, account management, deceased profiles and media.
//!
//! Requests carry the stored access token as a bearer credential. Expired
//! tokens are refreshed transparently, once per request.

pub mod client;
pub mod endpoints;
pub mod error;

pub use client::{ApiClient, ClientConfig, RequestBody, RequestOptions, DEFAULT_API_URL};
pub use error::ApiError;
