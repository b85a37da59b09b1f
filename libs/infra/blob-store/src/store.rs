use crate::errors::BlobStoreError;
use crate::key::BlobKey;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

/// Uniform contract over the filesystem and HTTP submodel blob backends.
/// All operations are keyed by `(semantic_id, submodel_id)`;
/// [`read_legacy`](BlobStore::read_legacy) additionally supports the
/// sha256-path form for interoperability with deployments that only know
/// the filesystem layout.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read(&self, key: &BlobKey) -> Result<Value, BlobStoreError>;
    async fn write(&self, key: &BlobKey, payload: &Value) -> Result<(), BlobStoreError>;
    async fn delete(&self, key: &BlobKey) -> Result<(), BlobStoreError>;
    async fn exists(&self, key: &BlobKey) -> Result<bool, BlobStoreError>;

    /// Reads a blob known only by the sha256 of its semantic id, the thin
    /// legacy path-based interface.
    async fn read_legacy(&self, semantic_sha256: &str, submodel_id: Uuid) -> Result<Value, BlobStoreError>;
}
