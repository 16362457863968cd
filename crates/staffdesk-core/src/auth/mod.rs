//! Authentication module for managing credentials and the user session.
//!
//! This module provides:
//! - `CredentialStore`: in-memory access/refresh token pair backed by an
//!   optional durable secure store (OS keychain via keyring)
//! - `SessionManager`: login, logout and start-up restore state machine

pub mod credentials;
pub mod session;

pub use credentials::{CredentialStore, KeyringStore, MemoryStore, SecureStore, StorageError};
pub use session::{SessionIdentity, SessionManager, SessionOptions, SessionState};
