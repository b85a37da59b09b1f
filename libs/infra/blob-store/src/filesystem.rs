use crate::errors::BlobStoreError;
use crate::key::BlobKey;
use crate::store::BlobStore;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::instrument;
use uuid::Uuid;

/// Filesystem-backed submodel store, keyed by `{sha256(semantic_id)}/{submodel_id}.json`.
/// Because the on-disk layout is already sha256-keyed, the
/// legacy path interface needs no reverse lookup here.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    /// Validates the root directory is writable; a lack of write permission
    /// is fatal at startup.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, BlobStoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        let probe = root.join(format!(".write-probe-{}", Uuid::new_v4()));
        tokio::fs::write(&probe, b"").await.map_err(|e| {
            BlobStoreError::Configuration(format!("blob store root {} is not writable: {e}", root.display()))
        })?;
        tokio::fs::remove_file(&probe).await.ok();

        Ok(Self { root })
    }

    fn path_for(&self, sha256: &str, submodel_id: Uuid) -> PathBuf {
        self.root.join(sha256).join(format!("{submodel_id}.json"))
    }

    fn path_for_key(&self, key: &BlobKey) -> PathBuf {
        self.path_for(&key.semantic_sha256(), key.submodel_id)
    }

    async fn read_path(&self, path: &Path) -> Result<Value, BlobStoreError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(BlobStoreError::NotFound),
            Err(e) => return Err(BlobStoreError::Io(e)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    #[instrument(skip(self))]
    async fn read(&self, key: &BlobKey) -> Result<Value, BlobStoreError> {
        self.read_path(&self.path_for_key(key)).await
    }

    #[instrument(skip(self, payload))]
    async fn write(&self, key: &BlobKey, payload: &Value) -> Result<(), BlobStoreError> {
        let path = self.path_for_key(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(payload)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &BlobKey) -> Result<(), BlobStoreError> {
        let path = self.path_for_key(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobStoreError::Io(e)),
        }
    }

    #[instrument(skip(self))]
    async fn exists(&self, key: &BlobKey) -> Result<bool, BlobStoreError> {
        Ok(tokio::fs::try_exists(self.path_for_key(key)).await?)
    }

    #[instrument(skip(self))]
    async fn read_legacy(&self, semantic_sha256: &str, submodel_id: Uuid) -> Result<Value, BlobStoreError> {
        self.read_path(&self.path_for(semantic_sha256, submodel_id)).await
    }
}
