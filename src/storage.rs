//! Media storage for submission uploads.
//!
//! Submissions store keys, never URLs. A key is resolved to a public URL
//! through the configured store whenever a submission is read back.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use compute::form::{Accepted, AcceptedForm, Upload};
use model::entities::user_activity::{FieldValue, FieldValues};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::config::{StorageDisk, StorageSettings};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Media store trait
#[async_trait]
pub trait MediaStore: Send + Sync + Debug {
    /// Store bytes under `key`
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Delete the object under `key`. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Public URL for `key`
    fn url(&self, key: &str) -> String;
}

/// Create the media store named by the settings
pub fn from_settings(settings: &StorageSettings) -> Arc<dyn MediaStore> {
    match settings.disk {
        StorageDisk::Local => Arc::new(LocalDiskStore::new(
            settings.root.clone(),
            settings.public_base_url.clone(),
        )),
        StorageDisk::Memory => Arc::new(MemoryMediaStore::new(settings.public_base_url.clone())),
    }
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// Stores objects as files below a root directory.
#[derive(Debug)]
pub struct LocalDiskStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDiskStore {
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        Self { root, public_base_url }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for LocalDiskStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        trace!("Writing {} bytes to {}", bytes.len(), path.display());
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(path).await?)
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }
}

/// Keeps objects in memory. Used by tests and throwaway deployments.
#[derive(Debug)]
pub struct MemoryMediaStore {
    public_base_url: String,
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryMediaStore {
    pub fn new(public_base_url: String) -> Self {
        Self {
            public_base_url,
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        self.objects.write().await.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.read().await.contains_key(key))
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }
}

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A unique key for an upload, grouped by submitting user.
fn key_for(owner: i32, upload: &Upload) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
    let extension = upload.extension().unwrap_or_else(|| "bin".to_string());
    format!("files/{}/{}-{}.{}", owner, stamp, seq, extension)
}

async fn put_upload(
    store: &dyn MediaStore,
    owner: i32,
    upload: &Upload,
    written: &mut Vec<String>,
) -> Result<String, StorageError> {
    let key = key_for(owner, upload);
    store.put(&key, &upload.bytes).await?;
    written.push(key.clone());
    Ok(key)
}

/// Writes every upload of `form` and returns the stored values together with
/// the keys written. If any write fails, the keys already written are removed.
pub async fn persist_form(
    store: &dyn MediaStore,
    owner: i32,
    form: AcceptedForm,
) -> Result<(FieldValues, Vec<String>), StorageError> {
    let mut written = Vec::with_capacity(form.upload_count());
    let mut values = FieldValues::default();

    for (name, accepted) in form.entries {
        let stored = match accepted {
            Accepted::Value(value) => Ok(value),
            Accepted::File(upload) => put_upload(store, owner, &upload, &mut written)
                .await
                .map(FieldValue::File),
            Accepted::Images(uploads) => {
                let mut keys = Vec::with_capacity(uploads.len());
                let mut failure = None;
                for upload in &uploads {
                    match put_upload(store, owner, upload, &mut written).await {
                        Ok(key) => keys.push(key),
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
                match failure {
                    Some(e) => Err(e),
                    None => Ok(FieldValue::Images(keys)),
                }
            }
        };

        match stored {
            Ok(value) => {
                values.0.insert(name, value);
            }
            Err(e) => {
                warn!("Storing upload for field '{}' failed, removing {} written objects", name, written.len());
                discard(store, &written).await;
                return Err(e);
            }
        }
    }

    debug!("Persisted {} uploads for user {}", written.len(), owner);
    Ok((values, written))
}

/// Best-effort removal of stored objects, e.g. after a failed transaction.
pub async fn discard<S: AsRef<str>>(store: &dyn MediaStore, keys: &[S]) {
    for key in keys {
        if let Err(e) = store.delete(key.as_ref()).await {
            warn!("Failed to remove stored object '{}': {}", key.as_ref(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compute::form::Accepted;

    fn upload(name: &str) -> Upload {
        Upload {
            file_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn persisting_keeps_image_order() {
        let store = MemoryMediaStore::new("https://cdn.test/media/".to_string());
        let mut form = AcceptedForm::default();
        form.entries.insert(
            "photos".to_string(),
            Accepted::Images(vec![upload("a.png"), upload("b.png"), upload("c.png")]),
        );
        form.entries.insert(
            "venue".to_string(),
            Accepted::Value(FieldValue::Text("School hall".to_string())),
        );

        let (values, keys) = persist_form(&store, 7, form).await.unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(store.len().await, 3);
        match values.get("photos") {
            Some(FieldValue::Images(stored)) => assert_eq!(stored, &keys),
            other => panic!("unexpected value: {other:?}"),
        }
        assert!(keys.iter().all(|k| k.starts_with("files/7/") && k.ends_with(".png")));
        assert_eq!(store.url("files/7/x.png"), "https://cdn.test/media/files/7/x.png");

        discard(&store, &keys).await;
        assert_eq!(store.len().await, 0);
    }

    #[test]
    fn local_store_rejects_escaping_keys() {
        let store = LocalDiskStore::new(PathBuf::from("/tmp/media"), "/storage".to_string());
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("/abs").is_err());
        assert!(store.path_for("files/1/a.png").is_ok());
    }

    #[tokio::test]
    async fn local_store_round_trips_files() {
        let root = std::env::temp_dir().join(format!("fieldops-media-{}", std::process::id()));
        let store = LocalDiskStore::new(root.clone(), "/storage".to_string());
        store.put("files/1/a.txt", b"hello").await.unwrap();
        assert!(store.exists("files/1/a.txt").await.unwrap());
        store.delete("files/1/a.txt").await.unwrap();
        store.delete("files/1/a.txt").await.unwrap();
        assert!(!store.exists("files/1/a.txt").await.unwrap());
        let _ = std::fs::remove_dir_all(root);
    }
}
