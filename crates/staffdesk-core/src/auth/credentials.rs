//! Access/refresh token storage.
//!
//! `CredentialStore` keeps the token pair in memory and, when the user asked
//! to be remembered, mirrors it into a durable `SecureStore` (the OS keychain
//! in production). The in-memory copy is authoritative once populated; the
//! durable store is only read on a cold start.

use std::collections::HashMap;
use std::sync::Arc;

use keyring::Entry;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

const SERVICE_NAME: &str = "staffdesk";

const ACCESS_KEY: &str = "access_token";
const REFRESH_KEY: &str = "refresh_token";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Storage task failed: {0}")]
    Task(String),
}

/// Durable key/value storage for secrets.
///
/// Implementations are blocking; `CredentialStore` calls them from
/// `spawn_blocking`.
pub trait SecureStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Deleting a missing entry is not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// OS keychain storage via keyring.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entry = Entry::new(&self.service, key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let entry = Entry::new(&self.service, key)?;
        entry.set_password(value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let entry = Entry::new(&self.service, key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store, for platforms without a keychain and for tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SecureStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Cached knowledge about one token.
#[derive(Debug, Clone, Default)]
enum Slot {
    /// Durable storage not consulted yet.
    #[default]
    Unknown,
    Absent,
    Present(String),
}

impl Slot {
    fn from_lookup(value: Option<String>) -> Self {
        match value {
            Some(v) if !v.is_empty() => Slot::Present(v),
            _ => Slot::Absent,
        }
    }

    /// `None` while unknown, otherwise the cached answer.
    fn resolved(&self) -> Option<Option<String>> {
        match self {
            Slot::Unknown => None,
            Slot::Absent => Some(None),
            Slot::Present(v) => Some(Some(v.clone())),
        }
    }
}

#[derive(Debug, Default)]
struct TokenCache {
    access: Slot,
    refresh: Slot,
}

#[derive(Debug, Clone, Copy)]
enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn key(self) -> &'static str {
        match self {
            TokenKind::Access => ACCESS_KEY,
            TokenKind::Refresh => REFRESH_KEY,
        }
    }

    fn slot(self, cache: &mut TokenCache) -> &mut Slot {
        match self {
            TokenKind::Access => &mut cache.access,
            TokenKind::Refresh => &mut cache.refresh,
        }
    }
}

struct Inner {
    durable: Arc<dyn SecureStore>,
    cache: Mutex<TokenCache>,
    /// Keeps durable writes and deletes in the order `store`/`clear` were called.
    write_order: tokio::sync::Mutex<()>,
}

/// Holder of the access/refresh token pair.
/// Clone is cheap and every clone sees the same tokens.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

impl CredentialStore {
    pub fn new(durable: Arc<dyn SecureStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                durable,
                cache: Mutex::new(TokenCache::default()),
                write_order: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Store with no durable backing at all.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub async fn access_token(&self) -> Option<String> {
        self.read(TokenKind::Access).await
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.read(TokenKind::Refresh).await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.access_token().await.is_some()
    }

    /// Replace the access token in memory only, leaving the persistence
    /// choice made at login untouched.
    pub fn set_access_token(&self, token: impl Into<String>) {
        self.inner.cache.lock().access = Slot::Present(token.into());
    }

    /// Set the access token only if `refresh_used` is still the current
    /// refresh token. Returns false when the session was cleared or replaced.
    pub(crate) fn replace_access_token(&self, refresh_used: &str, token: String) -> bool {
        let mut cache = self.inner.cache.lock();
        match &cache.refresh {
            Slot::Present(current) if current == refresh_used => {
                cache.access = Slot::Present(token);
                true
            }
            _ => false,
        }
    }

    /// Set both tokens, writing them to durable storage when `persist` is set.
    ///
    /// Without `persist`, any previously persisted pair is removed so a later
    /// cold start cannot resurrect an older session. Durable failures are
    /// logged and ignored; the in-memory pair stays valid for this process.
    pub async fn store(&self, access: impl Into<String>, refresh: impl Into<String>, persist: bool) {
        let access = access.into();
        let refresh = refresh.into();
        let _order = self.inner.write_order.lock().await;

        {
            let mut cache = self.inner.cache.lock();
            cache.access = Slot::Present(access.clone());
            cache.refresh = Slot::Present(refresh.clone());
        }

        if !persist {
            debug!("Credentials held in memory only");
            self.delete_durable().await;
            return;
        }

        let written = self
            .blocking(move |store| {
                store.set(ACCESS_KEY, &access)?;
                store.set(REFRESH_KEY, &refresh)
            })
            .await;

        if let Err(e) = written {
            warn!(error = %e, "Failed to persist credentials, keeping them in memory only");
            // Never leave half a pair behind.
            self.delete_durable().await;
        }
    }

    /// Forget both tokens. Safe to call repeatedly.
    pub async fn clear(&self) {
        let _order = self.inner.write_order.lock().await;
        {
            let mut cache = self.inner.cache.lock();
            cache.access = Slot::Absent;
            cache.refresh = Slot::Absent;
        }
        self.delete_durable().await;
    }

    async fn read(&self, kind: TokenKind) -> Option<String> {
        let cached = kind.slot(&mut self.inner.cache.lock()).resolved();
        if let Some(cached) = cached {
            return cached;
        }

        let loaded = match self.blocking(move |store| store.get(kind.key())).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = kind.key(), error = %e, "Failed to read credential, treating as absent");
                None
            }
        };

        let mut cache = self.inner.cache.lock();
        let slot = kind.slot(&mut cache);
        // A store/clear that finished during the read wins.
        if matches!(slot, Slot::Unknown) {
            *slot = Slot::from_lookup(loaded);
        }
        slot.resolved().flatten()
    }

    async fn delete_durable(&self) {
        for key in [ACCESS_KEY, REFRESH_KEY] {
            if let Err(e) = self.blocking(move |store| store.delete(key)).await {
                warn!(key, error = %e, "Failed to delete persisted credential");
            }
        }
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: FnOnce(&dyn SecureStore) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let durable = Arc::clone(&self.inner.durable);
        tokio::task::spawn_blocking(move || op(durable.as_ref()))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Durable store where every operation fails.
    struct BrokenStore;

    impl SecureStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Task("unavailable".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Task("unavailable".into()))
        }
        fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Task("unavailable".into()))
        }
    }

    /// Counts durable reads.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        reads: AtomicUsize,
    }

    impl SecureStore for CountingStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.inner.set(key, value)
        }
        fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.inner.delete(key)
        }
    }

    #[tokio::test]
    async fn test_persisted_pair_survives_restart() {
        let durable = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(durable.clone());
        store.store("A1", "R1", true).await;

        let restarted = CredentialStore::new(durable);
        assert_eq!(restarted.access_token().await.as_deref(), Some("A1"));
        assert_eq!(restarted.refresh_token().await.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_memory_only_pair_is_gone_after_restart() {
        let durable = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(durable.clone());
        store.store("A1", "R1", false).await;
        assert_eq!(store.access_token().await.as_deref(), Some("A1"));

        let restarted = CredentialStore::new(durable);
        assert_eq!(restarted.access_token().await, None);
        assert_eq!(restarted.refresh_token().await, None);
    }

    #[tokio::test]
    async fn test_memory_only_login_drops_older_persisted_pair() {
        let durable = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(durable.clone());
        store.store("A1", "R1", true).await;
        store.store("A2", "R2", false).await;

        assert!(durable.is_empty());
        assert_eq!(store.refresh_token().await.as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn test_clear_twice_leaves_empty_state() {
        let durable = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(durable.clone());
        store.store("A1", "R1", true).await;

        store.clear().await;
        store.clear().await;

        assert_eq!(store.access_token().await, None);
        assert_eq!(store.refresh_token().await, None);
        assert!(durable.is_empty());
    }

    #[tokio::test]
    async fn test_set_access_token_does_not_touch_durable_storage() {
        let durable = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(durable.clone());
        store.store("A1", "R1", true).await;

        store.set_access_token("A2");

        assert_eq!(store.access_token().await.as_deref(), Some("A2"));
        assert_eq!(durable.get(ACCESS_KEY).unwrap().as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_negative_lookup_is_cached() {
        let durable = Arc::new(CountingStore::default());
        let store = CredentialStore::new(durable.clone());

        assert_eq!(store.access_token().await, None);
        assert_eq!(store.access_token().await, None);
        assert_eq!(durable.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_storage_failures_are_absorbed() {
        let store = CredentialStore::new(Arc::new(BrokenStore));
        assert_eq!(store.access_token().await, None);

        store.store("A1", "R1", true).await;
        assert_eq!(store.access_token().await.as_deref(), Some("A1"));
        assert_eq!(store.refresh_token().await.as_deref(), Some("R1"));

        store.clear().await;
        assert_eq!(store.access_token().await, None);
    }

    #[tokio::test]
    async fn test_replace_access_token_requires_matching_refresh() {
        let store = CredentialStore::in_memory();
        store.store("A1", "R1", false).await;

        assert!(!store.replace_access_token("R0", "X".into()));
        assert_eq!(store.access_token().await.as_deref(), Some("A1"));

        assert!(store.replace_access_token("R1", "A2".into()));
        assert_eq!(store.access_token().await.as_deref(), Some("A2"));

        store.clear().await;
        assert!(!store.replace_access_token("R1", "A3".into()));
        assert_eq!(store.access_token().await, None);
    }
}
