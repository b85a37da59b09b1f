use crate::catalog::{find_dtr_datasets, DEFAULT_DTR_TYPE_URI};
use crate::directory::ConnectorDirectory;
use dtr_connector_client::ConnectorClient;
use dtr_models::{Bpn, DiscoveryError, DtrEntry};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{instrument, warn};

struct Shard {
    refresh_at: Instant,
    dtrs: HashMap<String, DtrEntry>,
}

impl Shard {
    fn fresh(ttl: Duration) -> Self {
        Self {
            refresh_at: Instant::now() + ttl,
            dtrs: HashMap::new(),
        }
    }
}

pub struct DtrCacheConfig {
    pub ttl: Duration,
    pub dtr_type_uri: String,
}

impl Default for DtrCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            dtr_type_uri: DEFAULT_DTR_TYPE_URI.to_string(),
        }
    }
}

/// Per-BPN map of known DTR offerings with a per-BPN expiry timestamp
///. Protected by a single map-scoped lock; within one shard,
/// reads are deep copies so callers never observe a structure still being
/// mutated by a concurrent `get_dtrs` refresh.
pub struct DtrCache {
    shards: RwLock<HashMap<Bpn, Shard>>,
    config: DtrCacheConfig,
}

impl DtrCache {
    pub fn new(config: DtrCacheConfig) -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Idempotent: a duplicate `asset_id` within a BPN is a no-op beyond
    /// refreshing the shard's expiry.
    pub async fn add(&self, bpn: &Bpn, connector_url: &str, asset_id: &str, policies: Vec<Value>) {
        let mut shards = self.shards.write().await;
        let shard = shards.entry(bpn.clone()).or_insert_with(|| Shard::fresh(self.config.ttl));
        shard.refresh_at = Instant::now() + self.config.ttl;
        shard
            .dtrs
            .entry(asset_id.to_string())
            .or_insert_with(|| DtrEntry::new(connector_url, asset_id, policies));
    }

    pub async fn get_by_asset_id(&self, bpn: &Bpn, asset_id: &str) -> Option<DtrEntry> {
        let shards = self.shards.read().await;
        shards.get(bpn)?.dtrs.get(asset_id).cloned()
    }

    pub async fn list(&self, bpn: &Bpn) -> Vec<DtrEntry> {
        let shards = self.shards.read().await;
        shards.get(bpn).map(|shard| shard.dtrs.values().cloned().collect()).unwrap_or_default()
    }

    pub async fn delete(&self, bpn: &Bpn, asset_id: &str) {
        let mut shards = self.shards.write().await;
        if let Some(shard) = shards.get_mut(bpn) {
            shard.dtrs.remove(asset_id);
        }
    }

    pub async fn purge(&self, bpn: &Bpn) {
        self.shards.write().await.remove(bpn);
    }

    pub async fn purge_all(&self) {
        self.shards.write().await.clear();
    }

    pub async fn is_expired(&self, bpn: &Bpn) -> bool {
        let shards = self.shards.read().await;
        match shards.get(bpn) {
            None => true,
            Some(shard) => Instant::now() >= shard.refresh_at,
        }
    }

    /// High-level read: if the shard is fresh, returns
    /// the cached entries; otherwise resolves connector endpoints for the
    /// BPN, fetches their catalogs in parallel, and folds in every dataset
    /// that passes the DTR asset test before returning.
    #[instrument(skip(self, connector, directory))]
    pub async fn get_dtrs(
        &self,
        bpn: &Bpn,
        connector: &ConnectorClient,
        directory: &dyn ConnectorDirectory,
        timeout: Duration,
    ) -> Result<Vec<DtrEntry>, DiscoveryError> {
        if !self.is_expired(bpn).await {
            return Ok(self.list(bpn).await);
        }

        let connector_urls = directory.list_connectors(bpn).await?;
        let filter = serde_json::json!({});
        let catalogs = connector.get_catalogs_parallel(bpn, &connector_urls, &filter, timeout).await;

        for (connector_url, result) in catalogs {
            let catalog = match result {
                Ok(catalog) => catalog,
                Err(e) => {
                    warn!(connector_url, error = %e, "catalog fetch failed, skipping connector");
                    continue;
                }
            };
            for dataset in find_dtr_datasets(&catalog, &self.config.dtr_type_uri) {
                self.add(bpn, &connector_url, &dataset.asset_id, dataset.policies).await;
            }
        }

        Ok(self.list(bpn).await)
    }
}
