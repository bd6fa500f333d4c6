//! File-backed credential store.
//!
//! One JSON document per namespace. Survives restarts of the embedding
//! process, the way browser session storage survives page reloads.

use std::path::{Path, PathBuf};

use agentforce_core::{Credential, CredentialStore, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credential: Option<Credential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    oauth_state: Option<String>,
}

/// File-backed store.
pub struct FileCredentialStore {
    namespace: String,
    path: PathBuf,
    // Serializes read-modify-write cycles within the process.
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Store `namespace` under `dir`.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let path = dir.as_ref().join(format!("{namespace}.credential.json"));
        Self {
            namespace,
            path,
            lock: Mutex::new(()),
        }
    }

    /// Per-user cache directory for widget credentials.
    #[must_use]
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("agentforce-widget")
    }

    /// Location of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Document, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(doc) => Ok(doc),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), "discarding unreadable credential file: {e}");
                    Ok(Document::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, doc: &Document) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn load(&self) -> Result<Option<Credential>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.credential)
    }

    async fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        doc.credential = Some(credential.clone());
        self.write(&doc).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_state(&self, state: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        doc.oauth_state = Some(state.to_string());
        self.write(&doc).await
    }

    async fn take_state(&self) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let state = doc.oauth_state.take();
        if state.is_some() {
            self.write(&doc).await?;
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_credential_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path(), "sf");
        let credential = Credential::issued_now("tok1", Duration::from_secs(3600));
        store.save(&credential).await.unwrap();

        let reopened = FileCredentialStore::new(dir.path(), "sf");
        assert_eq!(reopened.load().await.unwrap(), Some(credential));
    }

    #[tokio::test]
    async fn test_state_roundtrip_keeps_credential() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path(), "sf");
        store
            .save(&Credential::issued_now("tok1", Duration::from_secs(3600)))
            .await
            .unwrap();
        store.save_state("abc").await.unwrap();

        assert_eq!(store.take_state().await.unwrap().as_deref(), Some("abc"));
        assert_eq!(store.take_state().await.unwrap(), None);
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path(), "sf");
        assert!(store.load().await.unwrap().is_none());
        tokio_test::assert_ok!(store.clear().await);

        tokio::fs::write(store.path(), b"not json").await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
