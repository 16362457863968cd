//! Staffdesk core library.
//!
//! The authenticated request layer for the hotel staff client: credential
//! storage, the request executor with transparent refresh, session lifecycle,
//! and push device-token registration. Front-ends (mobile shell, CLI) build
//! one [`StaffdeskClient`] at start-up and inject its parts where needed.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod push;

use std::sync::Arc;

use anyhow::Result;

pub use api::{ApiClient, ApiError, ApiRequest, RefreshCoordinator};
pub use auth::{
    CredentialStore, KeyringStore, MemoryStore, SecureStore, SessionIdentity, SessionManager,
    SessionState,
};
pub use config::Config;
pub use models::Platform;
pub use push::{DeviceTokenRegistrar, NotificationEvents, PushEvent, PushTokenProvider};

/// Wiring of every component for one process lifetime.
#[derive(Clone)]
pub struct StaffdeskClient {
    pub credentials: CredentialStore,
    pub api: ApiClient,
    pub registrar: DeviceTokenRegistrar,
    pub session: SessionManager,
    pub events: NotificationEvents,
}

impl StaffdeskClient {
    /// Build the client from configuration, a durable secure store and the
    /// platform push-token provider.
    pub fn new(
        config: &Config,
        durable: Arc<dyn SecureStore>,
        push: Arc<dyn PushTokenProvider>,
    ) -> Result<Self> {
        let credentials = CredentialStore::new(durable);
        let api = ApiClient::new(&config.resolve_api_base(), config.request_timeout(), credentials.clone())?;
        let registrar = DeviceTokenRegistrar::new(api.clone(), push, config.platform);
        let session = SessionManager::new(api.clone(), registrar.clone(), config.session_options());

        Ok(Self {
            credentials,
            api,
            registrar,
            session,
            events: NotificationEvents::new(),
        })
    }
}
