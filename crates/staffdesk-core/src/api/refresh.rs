//! Single-flight access token refresh.
//!
//! Concurrent 401s must not produce concurrent calls to the refresh
//! endpoint: the first caller starts the exchange as a spawned task and
//! parks a shared handle to it in `in_flight`; everyone arriving while it
//! runs awaits that same handle. The task empties the slot when it settles,
//! so the next expiry starts a fresh attempt.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::CredentialStore;

use super::error::truncate_body;

const REFRESH_PATH: &str = "/mobile/refresh";

type InFlight = Shared<BoxFuture<'static, bool>>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
}

struct Inner {
    client: Client,
    refresh_url: String,
    credentials: CredentialStore,
    in_flight: Mutex<Option<InFlight>>,
}

/// Exchanges the refresh token for a new access token, one exchange at a time.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(client: Client, base_url: &str, credentials: CredentialStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                refresh_url: format!("{}{}", base_url, REFRESH_PATH),
                credentials,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Refresh the access token, joining an attempt that is already running.
    ///
    /// Returns true when a new access token is in the credential store. Any
    /// failure clears the whole session.
    pub async fn refresh(&self) -> bool {
        let attempt = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(running) => {
                    debug!("Joining in-flight token refresh");
                    running.clone()
                }
                None => {
                    let attempt = self.start();
                    *slot = Some(attempt.clone());
                    attempt
                }
            }
        };
        attempt.await
    }

    /// True while a refresh conversation is running.
    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    fn start(&self) -> InFlight {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let refreshed = inner.exchange().await;
            inner.in_flight.lock().take();
            refreshed
        });
        task.map(|joined| joined.unwrap_or(false)).boxed().shared()
    }
}

impl Inner {
    async fn exchange(&self) -> bool {
        let Some(refresh_token) = self.credentials.refresh_token().await else {
            debug!("No refresh token available");
            return false;
        };

        match self.request_access_token(&refresh_token).await {
            Some(access_token) => {
                if self.credentials.replace_access_token(&refresh_token, access_token) {
                    info!("Access token refreshed");
                    true
                } else {
                    // Logged out or logged in again meanwhile; not ours to touch.
                    debug!("Session changed during refresh, discarding new access token");
                    false
                }
            }
            None => {
                self.credentials.clear().await;
                false
            }
        }
    }

    async fn request_access_token(&self, refresh_token: &str) -> Option<String> {
        debug!(url = %self.refresh_url, "POST token refresh");
        let response = match self
            .client
            .post(&self.refresh_url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %truncate_body(&body), "Token refresh rejected");
            return None;
        }

        match response.json::<RefreshResponse>().await {
            Ok(RefreshResponse {
                access_token: Some(token),
            }) if !token.is_empty() => Some(token),
            Ok(_) => {
                warn!("Token refresh response carried no access token");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse token refresh response");
                None
            }
        }
    }
}
