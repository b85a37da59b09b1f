use async_trait::async_trait;
use dtr_models::Bpn;

/// Hook into the `edr_connections` persisted table. The connector client calls this on eviction so a persistence
/// collaborator can keep its rows in sync; schema maintenance itself is out
/// of scope.
#[async_trait]
pub trait ConnectionPersistence: Send + Sync {
    async fn delete_by_checksum(&self, bpn: &Bpn, address: &str, query_checksum: &str, policy_checksum: &str);
    async fn delete_by_asset_id(&self, bpn: &Bpn, asset_id: &str);
}

/// A persistence collaborator that does nothing; the default when no
/// database-backed connection store is configured.
pub struct NoopPersistence;

#[async_trait]
impl ConnectionPersistence for NoopPersistence {
    async fn delete_by_checksum(&self, _bpn: &Bpn, _address: &str, _query_checksum: &str, _policy_checksum: &str) {}
    async fn delete_by_asset_id(&self, _bpn: &Bpn, _asset_id: &str) {}
}
