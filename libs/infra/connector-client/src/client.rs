use crate::checksum::{checksum_policies, checksum_str, checksum_value};
use crate::errors::ClientError;
use crate::negotiation::{HttpNegotiationBackend, NegotiatedAccess, NegotiationBackend};
use crate::persistence::{ConnectionPersistence, NoopPersistence};
use dtr_models::{Bpn, PolicyDocument};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, instrument, warn};

const DEFAULT_CATALOG_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    bpn: Bpn,
    address: String,
    query_checksum: String,
    policy_checksum: String,
}

#[derive(Clone)]
struct CachedEntry {
    access: NegotiatedAccess,
    /// Present for asset-keyed negotiations; lets `force_purge` scan by
    /// asset id when the caller's checksums don't match any live entry.
    asset_id: Option<String>,
}

type Slot = Arc<OnceCell<Result<CachedEntry, Arc<ClientError>>>>;

/// Abstracts the federated connector: negotiates contract access and caches
/// the resulting tokens, coalescing concurrent negotiations for the same
/// key.
pub struct ConnectorClient {
    http: reqwest::Client,
    backend: Arc<dyn NegotiationBackend>,
    persistence: Arc<dyn ConnectionPersistence>,
    cache: Mutex<HashMap<CacheKey, Slot>>,
    catalog_concurrency: usize,
}

impl ConnectorClient {
    pub fn new(http: reqwest::Client) -> Self {
        let backend = Arc::new(HttpNegotiationBackend::new(http.clone()));
        Self {
            http,
            backend,
            persistence: Arc::new(NoopPersistence),
            cache: Mutex::new(HashMap::new()),
            catalog_concurrency: DEFAULT_CATALOG_CONCURRENCY,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn NegotiationBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn ConnectionPersistence>) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn with_catalog_concurrency(mut self, n: usize) -> Self {
        self.catalog_concurrency = n.max(1);
        self
    }

    /// GETs the DCAT catalog from a connector; errors on non-200 or a null
    /// body.
    #[instrument(skip(self, filter))]
    pub async fn get_catalog(
        &self,
        connector_url: &str,
        filter: &Value,
        timeout: Duration,
    ) -> Result<Value, ClientError> {
        let filter_json = serde_json::to_string(filter)?;
        let response = self
            .http
            .get(connector_url)
            .timeout(timeout)
            .query(&[("filter", filter_json)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await.map_err(ClientError::Network)?;
        if body.is_null() {
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                body: "null catalog body".to_string(),
            });
        }
        Ok(body)
    }

    /// Fans out [`Self::get_catalog`] across connectors with bounded
    /// concurrency.
    #[instrument(skip(self, connector_urls, filter))]
    pub async fn get_catalogs_parallel(
        &self,
        _bpn: &Bpn,
        connector_urls: &[String],
        filter: &Value,
        timeout: Duration,
    ) -> HashMap<String, Result<Value, ClientError>> {
        stream::iter(connector_urls.iter().cloned())
            .map(|url| async move {
                let result = self.get_catalog(&url, filter, timeout).await;
                (url, result)
            })
            .buffer_unordered(self.catalog_concurrency)
            .collect()
            .await
    }

    /// Negotiates access to `counter_party_address` under `filter_expression`,
    /// consulting the connection cache first.
    #[instrument(skip(self, policies, filter_expression))]
    pub async fn negotiate(
        &self,
        bpn: &Bpn,
        counter_party_address: &str,
        policies: &[PolicyDocument],
        filter_expression: &Value,
        timeout: Duration,
    ) -> Result<(String, String), ClientError> {
        let query_checksum = checksum_value(filter_expression);
        let policy_checksum = checksum_policies(policies);
        let entry = self
            .negotiate_cached(
                bpn,
                counter_party_address,
                &query_checksum,
                &policy_checksum,
                None,
                |backend, timeout| {
                    let bpn = bpn.clone();
                    let address = counter_party_address.to_string();
                    let policies = policies.to_vec();
                    let filter = filter_expression.clone();
                    async move { backend.negotiate(&bpn, &address, &policies, &filter, timeout).await }
                },
                timeout,
            )
            .await?;
        Ok((entry.access.dataplane_url, entry.access.access_token))
    }

    /// Negotiates access keyed by asset id rather than a filter expression.
    #[instrument(skip(self, policies))]
    pub async fn negotiate_by_asset_id(
        &self,
        bpn: &Bpn,
        counter_party_address: &str,
        asset_id: &str,
        policies: &[PolicyDocument],
        timeout: Duration,
    ) -> Result<(String, String), ClientError> {
        let query_checksum = checksum_str(asset_id);
        let policy_checksum = checksum_policies(policies);
        let asset_filter = serde_json::json!({ "assetId": asset_id });
        let entry = self
            .negotiate_cached(
                bpn,
                counter_party_address,
                &query_checksum,
                &policy_checksum,
                Some(asset_id.to_string()),
                |backend, timeout| {
                    let bpn = bpn.clone();
                    let address = counter_party_address.to_string();
                    let policies = policies.to_vec();
                    let filter = asset_filter.clone();
                    async move { backend.negotiate(&bpn, &address, &policies, &filter, timeout).await }
                },
                timeout,
            )
            .await?;
        Ok((entry.access.dataplane_url, entry.access.access_token))
    }

    async fn negotiate_cached<F, Fut>(
        &self,
        bpn: &Bpn,
        address: &str,
        query_checksum: &str,
        policy_checksum: &str,
        asset_id: Option<String>,
        call_backend: F,
        timeout: Duration,
    ) -> Result<CachedEntry, ClientError>
    where
        F: FnOnce(Arc<dyn NegotiationBackend>, Duration) -> Fut,
        Fut: std::future::Future<Output = Result<NegotiatedAccess, ClientError>>,
    {
        let key = CacheKey {
            bpn: bpn.clone(),
            address: address.to_string(),
            query_checksum: query_checksum.to_string(),
            policy_checksum: policy_checksum.to_string(),
        };

        let slot = {
            let mut cache = self.cache.lock().await;
            cache.entry(key).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let backend = self.backend.clone();
        let result = slot
            .get_or_try_init(|| async {
                debug!("negotiating new connection");
                let access = call_backend(backend, timeout)
                    .await
                    .map_err(Arc::new)?;
                Ok(CachedEntry { access, asset_id })
            })
            .await
            .map_err(|arc_err| ClientError::Cached(arc_err.to_string()))?;

        Ok(result.clone())
    }

    /// Evicts a cached connection by its exact checksum key.
    #[instrument(skip(self))]
    pub async fn delete_connection(
        &self,
        bpn: &Bpn,
        address: &str,
        query_checksum: &str,
        policy_checksum: &str,
    ) -> bool {
        let key = CacheKey {
            bpn: bpn.clone(),
            address: address.to_string(),
            query_checksum: query_checksum.to_string(),
            policy_checksum: policy_checksum.to_string(),
        };
        let removed = {
            let mut cache = self.cache.lock().await;
            cache.remove(&key).is_some()
        };
        if removed {
            self.persistence
                .delete_by_checksum(bpn, address, query_checksum, policy_checksum)
                .await;
        }
        removed
    }

    /// Evicts a cached connection by asset id when the checksum-exact path
    /// misses.
    #[instrument(skip(self, policies))]
    pub async fn force_purge(
        &self,
        bpn: &Bpn,
        asset_id: &str,
        address: &str,
        policies: &[PolicyDocument],
    ) -> bool {
        let query_checksum = checksum_str(asset_id);
        let policy_checksum = checksum_policies(policies);
        if self
            .delete_connection(bpn, address, &query_checksum, &policy_checksum)
            .await
        {
            return true;
        }

        warn!(asset_id, "checksum mismatch on purge, scanning cache by asset id");
        let mut removed_any = false;
        {
            let mut cache = self.cache.lock().await;
            let keys_to_remove: Vec<CacheKey> = cache
                .iter()
                .filter(|(key, slot)| {
                    key.bpn == *bpn
                        && key.address == address
                        && slot
                            .get()
                            .and_then(|r| r.as_ref().ok())
                            .map(|entry| entry.asset_id.as_deref() == Some(asset_id))
                            .unwrap_or(false)
                })
                .map(|(key, _)| key.clone())
                .collect();
            for key in keys_to_remove {
                cache.remove(&key);
                removed_any = true;
            }
        }
        if removed_any {
            self.persistence.delete_by_asset_id(bpn, asset_id).await;
        }
        removed_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CountingBackend {
        calls: AtomicUsize,
    }

    impl CountingBackend {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl NegotiationBackend for CountingBackend {
        async fn negotiate(
            &self,
            _bpn: &Bpn,
            _counter_party_address: &str,
            _policies: &[PolicyDocument],
            _filter: &Value,
            _timeout: Duration,
        ) -> Result<NegotiatedAccess, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(NegotiatedAccess {
                dataplane_url: "https://dataplane.example/edr".to_string(),
                access_token: "token-123".to_string(),
            })
        }
    }

    struct FailingBackend;

    #[async_trait::async_trait]
    impl NegotiationBackend for FailingBackend {
        async fn negotiate(
            &self,
            _bpn: &Bpn,
            _counter_party_address: &str,
            _policies: &[PolicyDocument],
            _filter: &Value,
            _timeout: Duration,
        ) -> Result<NegotiatedAccess, ClientError> {
            Err(ClientError::Rejected {
                status: 503,
                body: "try again".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn concurrent_negotiations_for_same_key_coalesce() {
        let backend = Arc::new(CountingBackend::new());
        let client = ConnectorClient::new(reqwest::Client::new()).with_backend(backend.clone());
        let client = Arc::new(client);
        let bpn = Bpn::from("BPNL000000000001");
        let filter = serde_json::json!({"assetId": "a-1"});

        let mut handles = Vec::new();
        for _ in 0..5 {
            let client = client.clone();
            let bpn = bpn.clone();
            let filter = filter.clone();
            handles.push(tokio::spawn(async move {
                client
                    .negotiate(&bpn, "https://connector.example", &[], &filter, Duration::from_secs(5))
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_negotiation_does_not_poison_the_cache() {
        let client = ConnectorClient::new(reqwest::Client::new()).with_backend(Arc::new(FailingBackend));
        let bpn = Bpn::from("BPNL000000000001");
        let filter = serde_json::json!({"assetId": "a-1"});

        let first = client
            .negotiate(&bpn, "https://connector.example", &[], &filter, Duration::from_secs(5))
            .await;
        assert!(first.is_err());

        let second = client
            .negotiate(&bpn, "https://connector.example", &[], &filter, Duration::from_secs(5))
            .await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn get_catalog_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"dcat:dataset": []})))
            .mount(&server)
            .await;

        let client = ConnectorClient::new(reqwest::Client::new());
        let url = format!("{}/catalog", server.uri());
        let body = client
            .get_catalog(&url, &serde_json::json!({}), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(body, serde_json::json!({"dcat:dataset": []}));
    }

    #[tokio::test]
    async fn get_catalog_rejects_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = ConnectorClient::new(reqwest::Client::new());
        let url = format!("{}/catalog", server.uri());
        let err = client
            .get_catalog(&url, &serde_json::json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();

        match err {
            ClientError::Rejected { status, .. } => assert_eq!(status, 403),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn force_purge_falls_back_to_asset_id_scan() {
        let backend = Arc::new(CountingBackend::new());
        let client = ConnectorClient::new(reqwest::Client::new()).with_backend(backend);
        let bpn = Bpn::from("BPNL000000000001");

        client
            .negotiate_by_asset_id(&bpn, "https://connector.example", "asset-7", &[], Duration::from_secs(5))
            .await
            .unwrap();

        let purged = client
            .force_purge(&bpn, "asset-7", "https://connector.example", &[])
            .await;
        assert!(purged);

        let purged_again = client
            .force_purge(&bpn, "asset-7", "https://connector.example", &[])
            .await;
        assert!(!purged_again);
    }
}
