use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::Platform;

/// Platform source of the push device token.
///
/// May prompt the user for notification permission; `None` means no token
/// is available (permission denied, simulator, desktop).
#[async_trait]
pub trait PushTokenProvider: Send + Sync {
    async fn obtain_token(&self) -> Option<String>;
}

/// Provider for platforms without push notifications.
pub struct NoPushTokens;

#[async_trait]
impl PushTokenProvider for NoPushTokens {
    async fn obtain_token(&self) -> Option<String> {
        None
    }
}

/// Registers this installation's push token with the server.
#[derive(Clone)]
pub struct DeviceTokenRegistrar {
    api: ApiClient,
    provider: Arc<dyn PushTokenProvider>,
    platform: Platform,
    /// Last token handed out by the provider, kept for logout when the live
    /// token can no longer be obtained.
    last_token: Arc<Mutex<Option<String>>>,
}

impl DeviceTokenRegistrar {
    pub fn new(api: ApiClient, provider: Arc<dyn PushTokenProvider>, platform: Platform) -> Self {
        Self {
            api,
            provider,
            platform,
            last_token: Arc::new(Mutex::new(None)),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub async fn obtain_token(&self) -> Option<String> {
        let token = self.provider.obtain_token().await.filter(|t| !t.is_empty());
        match token {
            Some(ref t) => *self.last_token.lock() = Some(t.clone()),
            None => debug!("No push token available"),
        }
        token
    }

    pub fn last_issued_token(&self) -> Option<String> {
        self.last_token.lock().clone()
    }

    pub async fn register(&self, token: &str, platform: Platform) -> Result<(), ApiError> {
        self.api.register_device_token(token, platform).await?;
        info!(%platform, "Device token registered");
        Ok(())
    }

    pub async fn deregister(&self, token: &str) -> Result<(), ApiError> {
        self.api.deregister_device_token(token).await?;
        info!("Device token deregistered");
        Ok(())
    }

    /// Register `token`, typically the one obtained before login. `None`
    /// means the provider had nothing to give and is not asked again.
    /// Failures are only logged.
    pub async fn register_best_effort(&self, token: Option<String>) -> bool {
        let Some(token) = token else {
            return false;
        };

        match self.register(&token, self.platform).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Device token registration failed");
                false
            }
        }
    }

    /// Deregister the last issued token, asking the provider when this
    /// process never obtained one (e.g. a session restored at start-up).
    /// Failures are only logged.
    pub async fn deregister_best_effort(&self) -> bool {
        let token = match self.last_issued_token() {
            Some(token) => Some(token),
            None => self.obtain_token().await,
        };
        let Some(token) = token else {
            debug!("No device token to deregister");
            return false;
        };

        match self.deregister(&token).await {
            Ok(()) => {
                let mut last = self.last_token.lock();
                if last.as_deref() == Some(token.as_str()) {
                    *last = None;
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "Device token deregistration failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::auth::CredentialStore;

    struct FixedToken(&'static str);

    #[async_trait]
    impl PushTokenProvider for FixedToken {
        async fn obtain_token(&self) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    /// Counts provider calls; never has a token.
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PushTokenProvider for CountingProvider {
        async fn obtain_token(&self) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    fn registrar(provider: Arc<dyn PushTokenProvider>) -> DeviceTokenRegistrar {
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1), CredentialStore::in_memory())
            .expect("client");
        DeviceTokenRegistrar::new(api, provider, Platform::Android)
    }

    #[tokio::test]
    async fn test_obtain_token_remembers_last_token() {
        let registrar = registrar(Arc::new(FixedToken("ExponentPushToken[1]")));
        assert_eq!(registrar.last_issued_token(), None);

        let token = registrar.obtain_token().await;
        assert_eq!(token.as_deref(), Some("ExponentPushToken[1]"));
        assert_eq!(registrar.last_issued_token().as_deref(), Some("ExponentPushToken[1]"));
    }

    #[tokio::test]
    async fn test_no_token_means_nothing_to_do() {
        let registrar = registrar(Arc::new(NoPushTokens));
        assert!(!registrar.register_best_effort(None).await);
        assert!(!registrar.deregister_best_effort().await);
        assert_eq!(registrar.last_issued_token(), None);
    }

    #[tokio::test]
    async fn test_register_does_not_ask_provider_again() {
        let provider = Arc::new(CountingProvider::default());
        let registrar = registrar(provider.clone());

        let token = registrar.obtain_token().await;
        assert!(!registrar.register_best_effort(token).await);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
