use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::SecretStore;
use crate::crypto::CryptoEngine;
use crate::error::AuthError;

/// File-backed store. Keys are plain, values are sealed with the
/// `CryptoEngine`, so the file never holds a token in the clear.
pub struct EncryptedFileStore {
    path: PathBuf,
    crypto: Arc<CryptoEngine>,
    // Serialises read-modify-write cycles within the process.
    write_lock: Mutex<()>,
}

impl EncryptedFileStore {
    pub fn new(path: impl Into<PathBuf>, crypto: Arc<CryptoEngine>) -> Self {
        Self {
            path: path.into(),
            crypto,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<BTreeMap<String, String>, AuthError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AuthError::Storage(format!("corrupt store {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(AuthError::Storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AuthError::Storage(format!("failed to create {}: {e}", parent.display()))
                })?;
            }
        }

        let bytes = serde_json::to_vec_pretty(map)
            .map_err(|e| AuthError::Storage(format!("failed to serialize store: {e}")))?;

        // Same directory as the target so the rename stays on one filesystem.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| AuthError::Storage(format!("failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AuthError::Storage(format!("failed to replace {}: {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl SecretStore for EncryptedFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let map = self.read_map().await?;
        match map.get(key) {
            Some(sealed) => Ok(Some(self.crypto.open(key, sealed)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let sealed = self.crypto.seal(key, value)?;

        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), sealed);
        self.write_map(&map).await
    }

    async fn delete(&self, key: &str) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await?;
        if map.remove(key).is_none() {
            return Ok(());
        }
        self.write_map(&map).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn crypto() -> Arc<CryptoEngine> {
        let key = base64::engine::general_purpose::STANDARD.encode([0x42u8; 32]);
        let hmac = base64::engine::general_purpose::STANDARD.encode([0x43u8; 32]);
        Arc::new(CryptoEngine::new(&key, &hmac).unwrap())
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::new(dir.path().join("tokens.json"), crypto());

        assert_eq!(store.get("garmin_tokens").await.unwrap(), None);
        store.set("garmin_tokens", "blob-1").await.unwrap();
        assert_eq!(
            store.get("garmin_tokens").await.unwrap().as_deref(),
            Some("blob-1")
        );

        store.delete("garmin_tokens").await.unwrap();
        assert_eq!(store.get("garmin_tokens").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_are_sealed_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = EncryptedFileStore::new(&path, crypto());

        store.set("garmin_tokens", "very-secret-access-token").await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("garmin_tokens"));
        assert!(!raw.contains("very-secret-access-token"));
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");
        let engine = crypto();

        EncryptedFileStore::new(&path, engine.clone())
            .set("k", "v")
            .await
            .unwrap();

        let reopened = EncryptedFileStore::new(&path, engine);
        assert_eq!(reopened.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = EncryptedFileStore::new(&path, crypto());

        store.delete("garmin_tokens").await.unwrap();
        store.delete("garmin_tokens").await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = EncryptedFileStore::new(&path, crypto());

        assert!(matches!(
            store.get("garmin_tokens").await,
            Err(AuthError::Storage(_))
        ));
    }
}
