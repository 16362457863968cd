//! REST API client module for the hotel staff backend.
//!
//! This module provides the `ApiClient` request executor and the
//! `RefreshCoordinator` that keeps at most one token refresh in flight.
//!
//! Calls carry a bearer access token; an expired token is refreshed with
//! the long-lived refresh token and the call is replayed once.

pub mod client;
pub mod error;
pub mod refresh;

pub use client::{ApiClient, ApiRequest};
pub use error::{ApiError, TOKEN_EXPIRED};
pub use refresh::RefreshCoordinator;
