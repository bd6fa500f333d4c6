//! In-memory credential store.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use agentforce_core::{Credential, CredentialStore, StoreError};
use async_trait::async_trait;

#[derive(Debug, Default, Clone)]
struct Entry {
    credential: Option<Credential>,
    state: Option<String>,
}

/// In-memory storage implementation.
///
/// Clones made with [`MemoryCredentialStore::reopen`] share the backing
/// map, which is how a reloaded widget finds the credential of its
/// predecessor. Data is lost when the process exits.
#[derive(Debug, Clone)]
pub struct MemoryCredentialStore {
    namespace: String,
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryCredentialStore {
    /// Create a store with its own backing map.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Open `namespace` on the same backing map.
    #[must_use]
    pub fn reopen(&self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: Arc::clone(&self.entries),
        }
    }

    fn update<T>(&self, f: impl FnOnce(&mut Entry) -> T) -> Result<T, StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(f(entries.entry(self.namespace.clone()).or_default()))
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new(super::DEFAULT_NAMESPACE)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn load(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self
            .entries
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .get(&self.namespace)
            .and_then(|entry| entry.credential.clone()))
    }

    async fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        self.update(|entry| entry.credential = Some(credential.clone()))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .remove(&self.namespace);
        Ok(())
    }

    async fn save_state(&self, state: &str) -> Result<(), StoreError> {
        self.update(|entry| entry.state = Some(state.to_string()))
    }

    async fn take_state(&self) -> Result<Option<String>, StoreError> {
        self.update(|entry| entry.state.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let widget_a = MemoryCredentialStore::new("a");
        let widget_b = widget_a.reopen("b");

        widget_a
            .save(&Credential::issued_now("tok-a", Duration::from_secs(60)))
            .await
            .unwrap();

        assert!(widget_b.load().await.unwrap().is_none());
        let reloaded = widget_a.reopen("a");
        assert_eq!(
            reloaded.load().await.unwrap().unwrap().access_token(),
            "tok-a"
        );
    }

    #[tokio::test]
    async fn test_state_is_single_use() {
        let store = MemoryCredentialStore::default();
        store.save_state("xyz").await.unwrap();
        assert_eq!(store.take_state().await.unwrap().as_deref(), Some("xyz"));
        assert_eq!(store.take_state().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let store = MemoryCredentialStore::default();
        store
            .save(&Credential::issued_now("tok", Duration::from_secs(60)))
            .await
            .unwrap();
        store.save_state("s").await.unwrap();

        tokio_test::assert_ok!(store.clear().await);
        assert!(store.load().await.unwrap().is_none());
        assert!(store.take_state().await.unwrap().is_none());
    }
}
