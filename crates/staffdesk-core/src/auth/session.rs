//! Session lifecycle: login, logout and start-up restore.
//!
//! The current `SessionState` is published on a watch channel; navigation
//! subscribes to it and routes between the login screen and the dashboard.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{LoginRequest, ProfileResponse};
use crate::push::DeviceTokenRegistrar;

pub use crate::models::SessionIdentity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated(SessionIdentity),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn identity(&self) -> Option<&SessionIdentity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Profile endpoint used to confirm a restored session. `None` restores
    /// optimistically with a placeholder identity.
    pub profile_path: Option<String>,
}

#[derive(Clone)]
pub struct SessionManager {
    api: ApiClient,
    registrar: DeviceTokenRegistrar,
    options: SessionOptions,
    state: Arc<watch::Sender<SessionState>>,
    /// Login, logout and restore never interleave.
    transition: Arc<Mutex<()>>,
}

impl SessionManager {
    pub fn new(api: ApiClient, registrar: DeviceTokenRegistrar, options: SessionOptions) -> Self {
        let (state, _) = watch::channel(SessionState::Anonymous);
        Self {
            api,
            registrar,
            options,
            state: Arc::new(state),
            transition: Arc::new(Mutex::new(())),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<SessionIdentity> {
        self.state.borrow().identity().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: SessionState) {
        debug!(to = ?next, "Session state changed");
        self.state.send_replace(next);
    }

    /// Sign in and, if `remember` is set, keep the tokens across restarts.
    ///
    /// Push registration is attempted afterwards; its failure does not fail
    /// the login.
    pub async fn login(&self, email: &str, password: &str, remember: bool) -> Result<SessionIdentity, ApiError> {
        let _transition = self.transition.lock().await;
        let previous = self.state.send_replace(SessionState::Authenticating);

        let device_token = self.registrar.obtain_token().await;
        let request = LoginRequest {
            email,
            password,
            device_token: device_token.as_deref(),
            platform: self.registrar.platform(),
        };

        let response = match self.api.login(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.set_state(previous);
                return Err(e);
            }
        };

        self.api
            .credentials()
            .store(response.access_token, response.refresh_token, remember)
            .await;
        let identity = response.user;

        self.registrar.register_best_effort(device_token).await;

        info!(user_id = %identity.id, role = %identity.role, remember, "Signed in");
        self.set_state(SessionState::Authenticated(identity.clone()));
        Ok(identity)
    }

    /// Resume a session from stored tokens at start-up.
    ///
    /// With a profile path configured the session is confirmed with the
    /// server; a rejected session is cleared, an unreachable server keeps the
    /// session with a placeholder identity.
    pub async fn restore_on_startup(&self) -> SessionState {
        let _transition = self.transition.lock().await;

        if self.api.credentials().access_token().await.is_none() {
            debug!("No stored session");
            self.set_state(SessionState::Anonymous);
            return self.state();
        }

        let identity = match self.options.profile_path.as_deref() {
            None => SessionIdentity::placeholder(),
            Some(path) => {
                self.set_state(SessionState::Authenticating);
                match self.api.get::<ProfileResponse>(path).await {
                    Ok(profile) => profile.into_identity(),
                    Err(e) if e.is_auth_failure() => {
                        info!(reason = %e, "Stored session rejected by server");
                        self.api.credentials().clear().await;
                        self.set_state(SessionState::Anonymous);
                        return self.state();
                    }
                    Err(e) => {
                        warn!(error = %e, "Could not confirm stored session, restoring optimistically");
                        SessionIdentity::placeholder()
                    }
                }
            }
        };

        info!(user_id = %identity.id, "Session restored");
        self.set_state(SessionState::Authenticated(identity));
        self.state()
    }

    /// Sign out: deregister the push token (best-effort), then drop the tokens.
    pub async fn logout(&self) {
        let _transition = self.transition.lock().await;
        // Deregistration is an authenticated call.
        if self.api.credentials().is_authenticated().await {
            self.registrar.deregister_best_effort().await;
        }
        self.api.credentials().clear().await;
        self.set_state(SessionState::Anonymous);
        info!("Signed out");
    }

    /// Route back to the signed-out state after an auth failure surfaced by
    /// an API call. Returns true if `error` was an auth failure.
    pub async fn handle_auth_failure(&self, error: &ApiError) -> bool {
        if !error.is_auth_failure() {
            return false;
        }
        let _transition = self.transition.lock().await;
        self.api.credentials().clear().await;
        self.set_state(SessionState::Anonymous);
        info!(reason = %error, "Session ended by server");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_accessors() {
        assert!(!SessionState::Anonymous.is_authenticated());
        assert!(!SessionState::Authenticating.is_authenticated());

        let state = SessionState::Authenticated(SessionIdentity::placeholder());
        assert!(state.is_authenticated());
        assert!(state.identity().unwrap().is_placeholder());
        assert_eq!(SessionState::Anonymous.identity(), None);
    }
}
