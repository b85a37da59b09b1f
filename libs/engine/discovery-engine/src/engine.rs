use crate::config::EngineConfig;
use crate::dataplane;
use crate::types::{PaginationInfo, ResolvedShell, ShellLookupResult, SubmodelDescriptorView, SubmodelResult, SubmodelStatus, SubmodelsResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dtr_connector_client::checksum::{checksum_policies, checksum_value};
use dtr_connector_client::ConnectorClient;
use dtr_discovery_core::{decode_page_token, distribute_limit, encode_page_token, is_cursor_compatible, ConnectorDirectory, DtrCache, DtrCacheConfig, ShellIndex, LIMIT_MISMATCH};
use dtr_models::{Bpn, DiscoveryError, DtrEntry, DtrPageState, PageState, PolicyDocument, SemanticKey, ShellDescriptor, SubmodelDescriptor};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

const DCT_TYPE_PROPERTY: &str = "http://purl.org/dc/terms/type";

fn dct_type_filter(type_uri: &str) -> Value {
    serde_json::json!({
        "key": DCT_TYPE_PROPERTY,
        "operator": "=",
        "value": type_uri,
    })
}

struct DtrFetchOutcome {
    dtr: DtrEntry,
    shell_ids: Vec<String>,
    next_cursor: Option<String>,
    error: Option<String>,
}

struct QueuedSubmodel {
    submodel_id: String,
    asset_id: String,
    connector_url: String,
    href: String,
    policies: Vec<PolicyDocument>,
}

/// Orchestrates the whole read path: DTR resolution, shell fanout, submodel
/// resolution and fetch, and the retry/purge protocol.
pub struct DiscoveryEngine {
    connector: Arc<ConnectorClient>,
    dtr_cache: Arc<DtrCache>,
    shell_index: Arc<ShellIndex>,
    directory: Arc<dyn ConnectorDirectory>,
    http: reqwest::Client,
    config: EngineConfig,
}

impl DiscoveryEngine {
    pub fn new(connector: Arc<ConnectorClient>, directory: Arc<dyn ConnectorDirectory>, config: EngineConfig) -> Self {
        let dtr_cache = Arc::new(DtrCache::new(DtrCacheConfig {
            ttl: config.dtr_cache_expiration,
            dtr_type_uri: config.dtr_type_uri.clone(),
        }));
        Self {
            connector,
            dtr_cache,
            shell_index: Arc::new(ShellIndex::new()),
            directory,
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn shell_index(&self) -> &ShellIndex {
        &self.shell_index
    }

    pub fn dtr_cache(&self) -> &DtrCache {
        &self.dtr_cache
    }

    /// Spec §4.2 `get_dtrs`, exposed at the engine boundary.
    #[instrument(skip(self))]
    pub async fn get_dtrs(&self, bpn: &Bpn) -> Result<Vec<DtrEntry>, DiscoveryError> {
        self.dtr_cache
            .get_dtrs(bpn, &self.connector, self.directory.as_ref(), self.config.catalog_timeout)
            .await
    }

    /// Spec §4.5.1.
    #[instrument(skip(self, query_spec, dtr_policies))]
    pub async fn discover_shells(
        &self,
        bpn: &Bpn,
        query_spec: &Value,
        dtr_policies: Option<&[PolicyDocument]>,
        limit: Option<u64>,
        cursor: Option<&str>,
    ) -> Result<ShellLookupResult, DiscoveryError> {
        let dtrs = self.get_dtrs(bpn).await?;
        if dtrs.is_empty() {
            return Err(DiscoveryError::not_found("No DTRs found"));
        }

        let pagination_enabled = limit.is_some() || cursor.is_some();
        let page_state = match cursor {
            Some(token) => {
                let decoded = decode_page_token(token)?;
                if !is_cursor_compatible(&decoded, limit) {
                    return Err(DiscoveryError::invalid_argument(format!(
                        "{LIMIT_MISMATCH}: cursor was minted under a different limit; restart pagination"
                    )));
                }
                decoded
            }
            None => PageState::first_page(limit),
        };

        let active_dtrs: Vec<DtrEntry> = dtrs
            .into_iter()
            .filter(|dtr| !page_state.dtr_states.get(&dtr.asset_id).map(|s| s.exhausted).unwrap_or(false))
            .collect();

        let per_dtr_limit = distribute_limit(limit, active_dtrs.len());

        let outcomes: Vec<DtrFetchOutcome> = stream::iter(active_dtrs.into_iter().map(|dtr| {
            let dtr_policies = dtr_policies.map(|p| p.to_vec());
            let dtr_cursor = page_state.dtr_states.get(&dtr.asset_id).and_then(|s| s.cursor.clone());
            async move {
                self.fetch_shells_for_dtr(bpn, dtr, dtr_policies, query_spec, per_dtr_limit, dtr_cursor).await
            }
        }))
        .buffered(self.config.shell_fanout_concurrency)
        .collect()
        .await;

        let mut new_dtr_states = page_state.dtr_states.clone();
        let mut dtrs_used = Vec::new();
        let mut merged_ids: Vec<String> = Vec::new();

        for outcome in outcomes {
            dtrs_used.push(outcome.dtr.clone());
            if let Some(error) = &outcome.error {
                warn!(asset_id = %outcome.dtr.asset_id, error = %error, "DTR shell lookup failed, continuing with remaining DTRs");
                continue;
            }
            merged_ids.extend(outcome.shell_ids.clone());
            new_dtr_states.insert(
                outcome.dtr.asset_id.clone(),
                DtrPageState {
                    cursor: outcome.next_cursor.clone(),
                    exhausted: outcome.next_cursor.is_none(),
                },
            );
        }

        let shells_found = merged_ids.len();
        if let Some(limit) = limit {
            merged_ids.truncate(limit as usize);
        }

        let mut shell_descriptors = Vec::with_capacity(merged_ids.len());
        for id in &merged_ids {
            if let Some(descriptor) = self.shell_index.get(id).await {
                shell_descriptors.push(descriptor);
            }
        }

        let pagination = if pagination_enabled {
            let next_state = PageState {
                dtr_states: new_dtr_states,
                page_number: page_state.page_number + 1,
                limit,
                previous_state: Some(Box::new(page_state.clone())),
            };
            let next = if next_state.has_more_data() {
                Some(encode_page_token(&next_state)?)
            } else {
                None
            };
            Some(PaginationInfo {
                page: page_state.page_number,
                next,
                previous: cursor.map(str::to_string),
            })
        } else {
            None
        };

        Ok(ShellLookupResult {
            shell_descriptors,
            dtrs: dtrs_used,
            shells_found,
            pagination,
        })
    }

    async fn fetch_shells_for_dtr(
        &self,
        bpn: &Bpn,
        dtr: DtrEntry,
        dtr_policies: Option<Vec<PolicyDocument>>,
        query_spec: &Value,
        per_dtr_limit: Option<u64>,
        cursor: Option<String>,
    ) -> DtrFetchOutcome {
        let effective_policies = dtr_policies.unwrap_or_else(|| dtr.policies.clone());
        let filter = dct_type_filter(&self.config.dtr_type_uri);

        let mut negotiated = None;
        let mut last_error = None;
        for _ in 0..self.config.shell_retry_policy.attempts() {
            match self
                .connector
                .negotiate(bpn, &dtr.connector_url, &effective_policies, &filter, self.config.dataplane_timeout)
                .await
            {
                Ok(access) => {
                    negotiated = Some(access);
                    break;
                }
                Err(e) => {
                    let query_checksum = checksum_value(&filter);
                    let policy_checksum = checksum_policies(&effective_policies);
                    self.connector
                        .delete_connection(bpn, &dtr.connector_url, &query_checksum, &policy_checksum)
                        .await;
                    last_error = Some(e.to_string());
                }
            }
        }

        let Some((dataplane_url, access_token)) = negotiated else {
            self.dtr_cache.delete(bpn, &dtr.asset_id).await;
            return DtrFetchOutcome {
                dtr,
                shell_ids: Vec::new(),
                next_cursor: None,
                error: Some(last_error.unwrap_or_else(|| "negotiation failed".to_string())),
            };
        };

        let page = match dataplane::lookup_shells_by_asset_link(
            &self.http,
            &dataplane_url,
            &access_token,
            query_spec,
            per_dtr_limit,
            cursor.as_deref(),
            self.config.dataplane_timeout,
        )
        .await
        {
            Ok(page) => page,
            Err(e) => {
                return DtrFetchOutcome {
                    dtr,
                    shell_ids: Vec::new(),
                    next_cursor: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let descriptors: Vec<(String, Option<Value>)> = stream::iter(page.shell_ids.iter().cloned().map(|shell_id| {
            let dataplane_url = dataplane_url.clone();
            let access_token = access_token.clone();
            async move {
                let body = dataplane::get_shell_descriptor(&self.http, &dataplane_url, &access_token, &shell_id, self.config.dataplane_timeout)
                    .await
                    .unwrap_or(None);
                (shell_id, body)
            }
        }))
        .buffered(self.config.shell_fanout_concurrency)
        .collect()
        .await;

        for (shell_id, body) in &descriptors {
            if let Some(body) = body {
                self.shell_index.put(shell_id.clone(), ShellDescriptor(body.clone())).await;
            }
        }

        DtrFetchOutcome {
            dtr,
            shell_ids: page.shell_ids,
            next_cursor: page.next_cursor,
            error: None,
        }
    }

    /// Spec §4.5.2. Sequential, first-match-wins across DTRs.
    #[instrument(skip(self, dtr_policies))]
    pub async fn discover_shell(
        &self,
        bpn: &Bpn,
        shell_id: &str,
        dtr_policies: Option<&[PolicyDocument]>,
    ) -> Result<ResolvedShell, DiscoveryError> {
        let dtrs = self.get_dtrs(bpn).await?;
        let filter = dct_type_filter(&self.config.dtr_type_uri);

        for dtr in &dtrs {
            let effective_policies = dtr_policies.map(|p| p.to_vec()).unwrap_or_else(|| dtr.policies.clone());
            let Ok((dataplane_url, access_token)) = self
                .connector
                .negotiate(bpn, &dtr.connector_url, &effective_policies, &filter, self.config.dataplane_timeout)
                .await
            else {
                continue;
            };

            match dataplane::get_shell_descriptor(&self.http, &dataplane_url, &access_token, shell_id, self.config.dataplane_timeout).await {
                Ok(Some(body)) => {
                    let descriptor = ShellDescriptor(body);
                    self.shell_index.put(shell_id, descriptor.clone()).await;
                    return Ok(ResolvedShell {
                        shell: descriptor,
                        dtr: dtr.clone(),
                    });
                }
                Ok(None) => continue,
                Err(_) => continue,
            }
        }

        Err(DiscoveryError::not_found(format!("shell {shell_id} not found across any DTR")))
    }

    /// Spec §4.5.3.
    #[instrument(skip(self, dtr_policies, governance))]
    pub async fn discover_submodels(
        &self,
        bpn: &Bpn,
        shell_id: &str,
        dtr_policies: Option<&[PolicyDocument]>,
        governance: Option<&HashMap<String, Vec<PolicyDocument>>>,
    ) -> Result<SubmodelsResult, DiscoveryError> {
        let resolved = self.discover_shell(bpn, shell_id, dtr_policies).await?;
        let descriptors = resolved.shell.submodel_descriptors();

        let mut views = HashMap::new();
        let mut queue = Vec::new();

        for descriptor in &descriptors {
            let Some(submodel_id) = descriptor.id().map(str::to_string) else { continue };
            let semantic = descriptor.semantic_id();

            let semantic_id_keys = semantic.as_ref().and_then(|sem| {
                serde_json::to_vec(&sem.keys).ok().map(|bytes| BASE64.encode(bytes))
            });

            let mut view = SubmodelDescriptorView {
                submodel_id: submodel_id.clone(),
                semantic_id: semantic.as_ref().map(|s| s.value.clone()),
                semantic_id_keys,
                asset_id: None,
                connector_url: None,
                href: None,
                status: SubmodelStatus::Pending,
                error: None,
            };

            let policies = match &semantic {
                None => {
                    view.status = SubmodelStatus::Error;
                    view.error = Some("no semantic id could be extracted".to_string());
                    None
                }
                Some(sem) => match governance.and_then(|g| g.get(&sem.value)) {
                    None => {
                        view.status = SubmodelStatus::GovernanceNotFound;
                        None
                    }
                    Some(policies) => Some(policies.clone()),
                },
            };

            if view.status == SubmodelStatus::Pending {
                queue_descriptor(descriptor, submodel_id.clone(), policies.unwrap_or_default(), &mut view, &mut queue);
            }

            views.insert(submodel_id, view);
        }

        let (submodel_descriptors, submodels) = self.run_submodel_pipeline(bpn, views, queue).await;
        Ok(SubmodelsResult {
            submodel_descriptors,
            submodels,
        })
    }

    /// Spec §4.5.5. Filters to descriptors whose full key set is a superset
    /// of `semantic_ids`; `governance` here is a flat policy list shared by
    /// every matching descriptor.
    #[instrument(skip(self, dtr_policies, governance, semantic_ids))]
    pub async fn discover_submodel_by_semantic_ids(
        &self,
        bpn: &Bpn,
        shell_id: &str,
        dtr_policies: Option<&[PolicyDocument]>,
        governance: &[PolicyDocument],
        semantic_ids: &[SemanticKey],
    ) -> Result<SubmodelsResult, DiscoveryError> {
        let resolved = self.discover_shell(bpn, shell_id, dtr_policies).await?;
        let descriptors = resolved.shell.submodel_descriptors();

        let matching: Vec<SubmodelDescriptor> = descriptors
            .into_iter()
            .filter(|descriptor| {
                descriptor
                    .semantic_id()
                    .map(|sem| sem.contains_all(semantic_ids))
                    .unwrap_or(false)
            })
            .collect();

        if matching.is_empty() {
            let criteria = semantic_ids
                .iter()
                .map(|k| format!("{}={}", k.key_type, k.value))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(DiscoveryError::not_found(format!(
                "no submodel matches semantic id criteria: [{criteria}]"
            )));
        }

        let mut views = HashMap::new();
        let mut queue = Vec::new();

        for descriptor in &matching {
            let Some(submodel_id) = descriptor.id().map(str::to_string) else { continue };
            let semantic = descriptor.semantic_id();
            let semantic_id_keys = semantic.as_ref().and_then(|sem| {
                serde_json::to_vec(&sem.keys).ok().map(|bytes| BASE64.encode(bytes))
            });

            let mut view = SubmodelDescriptorView {
                submodel_id: submodel_id.clone(),
                semantic_id: semantic.as_ref().map(|s| s.value.clone()),
                semantic_id_keys,
                asset_id: None,
                connector_url: None,
                href: None,
                status: SubmodelStatus::Pending,
                error: None,
            };

            queue_descriptor(descriptor, submodel_id.clone(), governance.to_vec(), &mut view, &mut queue);
            views.insert(submodel_id, view);
        }

        let (submodel_descriptors, submodels) = self.run_submodel_pipeline(bpn, views, queue).await;
        Ok(SubmodelsResult {
            submodel_descriptors,
            submodels,
        })
    }

    async fn run_submodel_pipeline(
        &self,
        bpn: &Bpn,
        mut views: HashMap<String, SubmodelDescriptorView>,
        queue: Vec<QueuedSubmodel>,
    ) -> (Vec<SubmodelDescriptorView>, HashMap<String, Value>) {
        let mut by_asset: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, item) in queue.iter().enumerate() {
            by_asset.entry(item.asset_id.clone()).or_default().push(idx);
        }

        let asset_groups: Vec<(String, String, Vec<PolicyDocument>)> = by_asset
            .keys()
            .map(|asset_id| {
                let first = &queue[by_asset[asset_id][0]];
                (asset_id.clone(), first.connector_url.clone(), first.policies.clone())
            })
            .collect();

        let negotiated: HashMap<String, Result<(String, String), String>> = stream::iter(asset_groups.into_iter().map(|(asset_id, connector_url, policies)| async move {
            let outcome = self
                .connector
                .negotiate_by_asset_id(bpn, &connector_url, &asset_id, &policies, self.config.dataplane_timeout)
                .await
                .map_err(|e| e.to_string());
            (asset_id, outcome)
        }))
        .buffer_unordered(self.config.submodel_negotiation_concurrency)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect();

        let mut fetch_queue = Vec::new();
        for item in &queue {
            match negotiated.get(&item.asset_id) {
                Some(Ok((_, token))) => {
                    fetch_queue.push((item.submodel_id.clone(), item.href.clone(), token.clone()));
                }
                Some(Err(msg)) => {
                    if let Some(view) = views.get_mut(&item.submodel_id) {
                        view.status = SubmodelStatus::Error;
                        view.error = Some(format!("asset negotiation failed: {msg}"));
                    }
                }
                None => {}
            }
        }

        let fetched: Vec<(String, Result<Value, String>)> = stream::iter(fetch_queue.into_iter().map(|(submodel_id, href, token)| async move {
            let result = dataplane::fetch_submodel_payload(&self.http, &href, &token, self.config.dataplane_timeout)
                .await
                .map_err(|e| e.to_string());
            (submodel_id, result)
        }))
        .buffer_unordered(self.config.submodel_fetch_concurrency)
        .collect()
        .await;

        let mut submodels = HashMap::new();
        for (submodel_id, result) in fetched {
            match result {
                Ok(payload) => {
                    if let Some(view) = views.get_mut(&submodel_id) {
                        view.status = SubmodelStatus::Success;
                    }
                    submodels.insert(submodel_id, payload);
                }
                Err(e) => {
                    if let Some(view) = views.get_mut(&submodel_id) {
                        view.status = SubmodelStatus::Error;
                        view.error = Some(e);
                    }
                }
            }
        }

        for view in views.values_mut() {
            if view.status == SubmodelStatus::Pending {
                view.status = SubmodelStatus::Error;
                view.error = Some("Processing was not completed".to_string());
            }
        }

        (views.into_values().collect(), submodels)
    }

    /// Spec §4.5.4. Direct lookup with the purge-sleep-retry cycle.
    #[instrument(skip(self, dtr_policies, governance))]
    pub async fn discover_submodel(
        &self,
        bpn: &Bpn,
        shell_id: &str,
        dtr_policies: Option<&[PolicyDocument]>,
        governance: Option<&HashMap<String, Vec<PolicyDocument>>>,
        submodel_id: &str,
    ) -> Result<SubmodelResult, DiscoveryError> {
        let dtrs = self.get_dtrs(bpn).await?;
        let retry = self.config.submodel_retry_policy;
        let filter = dct_type_filter(&self.config.dtr_type_uri);

        for dtr in &dtrs {
            let effective_policies = dtr_policies.map(|p| p.to_vec()).unwrap_or_else(|| dtr.policies.clone());
            let Ok((dataplane_url, dtr_token)) = self
                .connector
                .negotiate(bpn, &dtr.connector_url, &effective_policies, &filter, self.config.dataplane_timeout)
                .await
            else {
                continue;
            };

            let descriptor_body =
                dataplane::get_submodel_descriptor(&self.http, &dataplane_url, &dtr_token, shell_id, submodel_id, self.config.dataplane_timeout).await;
            let descriptor = match descriptor_body {
                Ok(Some(body)) => SubmodelDescriptor(body),
                Ok(None) => continue,
                Err(_) => continue,
            };

            let Some(endpoint) = descriptor.submodel_3_endpoint() else {
                return Ok(SubmodelResult {
                    submodel_id: submodel_id.to_string(),
                    status: SubmodelStatus::Error,
                    data: None,
                    error: Some("submodel descriptor does not resolve to an asset id".to_string()),
                });
            };

            let asset_policies = descriptor
                .semantic_id()
                .and_then(|sem| governance.and_then(|g| g.get(&sem.value)).cloned())
                .unwrap_or_default();

            let Ok((_, asset_token)) = self
                .connector
                .negotiate_by_asset_id(bpn, &endpoint.dsp_endpoint, &endpoint.asset_id, &asset_policies, self.config.dataplane_timeout)
                .await
            else {
                continue;
            };

            let first_fetch =
                dataplane::fetch_submodel_payload(&self.http, &endpoint.href, &asset_token, self.config.dataplane_timeout).await;
            if let Ok(payload) = &first_fetch {
                if !payload.is_null() {
                    return Ok(SubmodelResult {
                        submodel_id: submodel_id.to_string(),
                        status: SubmodelStatus::Success,
                        data: Some(payload.clone()),
                        error: None,
                    });
                }
            }

            self.connector
                .force_purge(bpn, &endpoint.asset_id, &endpoint.dsp_endpoint, &asset_policies)
                .await;
            tokio::time::sleep(retry.purge_sleep).await;

            let Ok((_, retried_token)) = self
                .connector
                .negotiate_by_asset_id(bpn, &endpoint.dsp_endpoint, &endpoint.asset_id, &asset_policies, self.config.dataplane_timeout)
                .await
            else {
                return Ok(SubmodelResult {
                    submodel_id: submodel_id.to_string(),
                    status: SubmodelStatus::Error,
                    data: None,
                    error: Some("asset renegotiation failed after purge".to_string()),
                });
            };

            return match dataplane::fetch_submodel_payload(&self.http, &endpoint.href, &retried_token, self.config.dataplane_timeout).await {
                Ok(payload) => Ok(SubmodelResult {
                    submodel_id: submodel_id.to_string(),
                    status: SubmodelStatus::Success,
                    data: Some(payload),
                    error: None,
                }),
                Err(e) => Ok(SubmodelResult {
                    submodel_id: submodel_id.to_string(),
                    status: SubmodelStatus::Error,
                    data: None,
                    error: Some(e.to_string()),
                }),
            };
        }

        Err(DiscoveryError::not_found(format!("submodel {submodel_id} not found across any DTR")))
    }
}

fn queue_descriptor(
    descriptor: &SubmodelDescriptor,
    submodel_id: String,
    policies: Vec<PolicyDocument>,
    view: &mut SubmodelDescriptorView,
    queue: &mut Vec<QueuedSubmodel>,
) {
    match descriptor.submodel_3_endpoint() {
        Some(endpoint) => {
            view.asset_id = Some(endpoint.asset_id.clone());
            view.connector_url = Some(endpoint.dsp_endpoint.clone());
            view.href = Some(endpoint.href.clone());
            queue.push(QueuedSubmodel {
                submodel_id,
                asset_id: endpoint.asset_id,
                connector_url: endpoint.dsp_endpoint,
                href: endpoint.href,
                policies,
            });
        }
        None => {
            view.status = SubmodelStatus::Error;
            view.error = Some("submodel descriptor is missing a SUBMODEL-3.0 endpoint".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeDirectory {
        connectors: Vec<String>,
    }

    #[async_trait]
    impl ConnectorDirectory for FakeDirectory {
        async fn list_connectors(&self, _bpn: &Bpn) -> Result<Vec<String>, DiscoveryError> {
            Ok(self.connectors.clone())
        }
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            dtr_type_uri: dtr_discovery_core::DEFAULT_DTR_TYPE_URI.to_string(),
            ..EngineConfig::default()
        }
    }

    async fn mount_catalog(server: &MockServer, asset_id: &str, connector_url: &str) {
        Mock::given(method("GET"))
            .and(path("/catalog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dcat:dataset": [{
                    "@id": asset_id,
                    "dct:type": dtr_discovery_core::DEFAULT_DTR_TYPE_URI,
                }]
            })))
            .mount(server)
            .await;
        let _ = connector_url;
    }

    async fn mount_negotiate(server: &MockServer, dataplane_url: &str, access_token: &str) {
        Mock::given(method("POST"))
            .and(path("/negotiate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dataplaneUrl": dataplane_url,
                "accessToken": access_token,
            })))
            .mount(server)
            .await;
    }

    fn engine_with(connector_urls: Vec<String>, config: EngineConfig) -> DiscoveryEngine {
        let connector = Arc::new(ConnectorClient::new(reqwest::Client::new()));
        let directory = Arc::new(FakeDirectory { connectors: connector_urls });
        DiscoveryEngine::new(connector, directory, config)
    }

    #[tokio::test]
    async fn discover_shell_resolves_first_matching_dtr() {
        let edc = MockServer::start().await;
        let dataplane = MockServer::start().await;

        mount_catalog(&edc, "dtr-asset-1", &edc.uri()).await;
        mount_negotiate(&edc, &dataplane.uri(), "token-abc").await;

        Mock::given(method("GET"))
            .and(path(format!("/shell-descriptors/{}", BASE64.encode("shell-1"))))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "shell-1"})))
            .mount(&dataplane)
            .await;

        let engine = engine_with(vec![format!("{}/catalog", edc.uri())], test_config());
        let bpn = Bpn::from("BPNL000000000001");

        let resolved = engine.discover_shell(&bpn, "shell-1", None).await.unwrap();
        assert_eq!(resolved.shell.id(), Some("shell-1"));
        assert_eq!(resolved.dtr.asset_id, "dtr-asset-1");
        assert_eq!(engine.shell_index().get("shell-1").await, Some(resolved.shell));
    }

    #[tokio::test]
    async fn discover_shell_returns_not_found_when_no_dtr_has_it() {
        let edc = MockServer::start().await;
        let dataplane = MockServer::start().await;

        mount_catalog(&edc, "dtr-asset-1", &edc.uri()).await;
        mount_negotiate(&edc, &dataplane.uri(), "token-abc").await;

        Mock::given(method("GET"))
            .and(path(format!("/shell-descriptors/{}", BASE64.encode("missing-shell"))))
            .respond_with(ResponseTemplate::new(404))
            .mount(&dataplane)
            .await;

        let engine = engine_with(vec![format!("{}/catalog", edc.uri())], test_config());
        let bpn = Bpn::from("BPNL000000000002");

        let err = engine.discover_shell(&bpn, "missing-shell", None).await.unwrap_err();
        assert_eq!(err.kind, dtr_models::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn discover_shells_paginates_across_a_single_dtr() {
        let edc = MockServer::start().await;
        let dataplane = MockServer::start().await;

        mount_catalog(&edc, "dtr-asset-1", &edc.uri()).await;
        mount_negotiate(&edc, &dataplane.uri(), "token-abc").await;

        Mock::given(method("POST"))
            .and(path("/lookup/shellsByAssetLink"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": ["shell-1", "shell-2"],
                "paging": {"cursor": "next-page"},
            })))
            .mount(&dataplane)
            .await;

        for id in ["shell-1", "shell-2"] {
            Mock::given(method("GET"))
                .and(path(format!("/shell-descriptors/{}", BASE64.encode(id))))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": id})))
                .mount(&dataplane)
                .await;
        }

        let engine = engine_with(vec![format!("{}/catalog", edc.uri())], test_config());
        let bpn = Bpn::from("BPNL000000000003");

        let result = engine
            .discover_shells(&bpn, &json!({"name": "partId", "value": "p-1"}), None, Some(10), None)
            .await
            .unwrap();

        assert_eq!(result.shells_found, 2);
        assert_eq!(result.shell_descriptors.len(), 2);
        let pagination = result.pagination.unwrap();
        assert!(pagination.next.is_some());
    }

    #[tokio::test]
    async fn discover_submodel_resolves_descriptor_and_fetches_payload() {
        let edc = MockServer::start().await;
        let dataplane = MockServer::start().await;

        mount_catalog(&edc, "dtr-asset-1", &edc.uri()).await;
        mount_negotiate(&edc, &dataplane.uri(), "dtr-token").await;
        mount_negotiate(&dataplane, &dataplane.uri(), "asset-token").await;

        let shell_id = "shell-1";
        let submodel_id = "sm-1";
        Mock::given(method("GET"))
            .and(path(format!(
                "/shell-descriptors/{}/submodel-descriptors/{}",
                BASE64.encode(shell_id),
                BASE64.encode(submodel_id)
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": submodel_id,
                "semanticId": {"keys": [{"type": "GlobalReference", "value": "urn:samm:io.catenax#Dpp"}]},
                "endpoints": [{
                    "interface": "SUBMODEL-3.0",
                    "protocolInformation": {
                        "href": format!("{}/submodel-data", dataplane.uri()),
                        "subprotocolBody": format!("id=asset-7;dspEndpoint={}", dataplane.uri()),
                    }
                }]
            })))
            .mount(&dataplane)
            .await;

        Mock::given(method("GET"))
            .and(path("/submodel-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": 42})))
            .mount(&dataplane)
            .await;

        let mut config = test_config();
        config.submodel_retry_policy = crate::retry::RetryPolicy {
            max_retries: 1,
            purge_sleep: std::time::Duration::from_millis(1),
        };

        let engine = engine_with(vec![format!("{}/catalog", edc.uri())], config);
        let bpn = Bpn::from("BPNL000000000004");

        let result = engine.discover_submodel(&bpn, shell_id, None, None, submodel_id).await.unwrap();
        assert_eq!(result.status, SubmodelStatus::Success);
        assert_eq!(result.data, Some(json!({"value": 42})));
    }

    #[tokio::test]
    async fn discover_submodel_retries_once_after_purge_on_failed_fetch() {
        let edc = MockServer::start().await;
        let dataplane = MockServer::start().await;

        mount_catalog(&edc, "dtr-asset-1", &edc.uri()).await;
        mount_negotiate(&edc, &dataplane.uri(), "dtr-token").await;
        mount_negotiate(&dataplane, &dataplane.uri(), "asset-token").await;

        let shell_id = "shell-1";
        let submodel_id = "sm-1";
        Mock::given(method("GET"))
            .and(path(format!(
                "/shell-descriptors/{}/submodel-descriptors/{}",
                BASE64.encode(shell_id),
                BASE64.encode(submodel_id)
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": submodel_id,
                "semanticId": {"keys": [{"type": "GlobalReference", "value": "urn:samm:io.catenax#Dpp"}]},
                "endpoints": [{
                    "interface": "SUBMODEL-3.0",
                    "protocolInformation": {
                        "href": format!("{}/submodel-data", dataplane.uri()),
                        "subprotocolBody": format!("id=asset-7;dspEndpoint={}", dataplane.uri()),
                    }
                }]
            })))
            .mount(&dataplane)
            .await;

        // First attempt fails; the engine purges and renegotiates before a
        // second, successful attempt.
        Mock::given(method("GET"))
            .and(path("/submodel-data"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&dataplane)
            .await;
        Mock::given(method("GET"))
            .and(path("/submodel-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": 7})))
            .with_priority(2)
            .mount(&dataplane)
            .await;

        let mut config = test_config();
        config.submodel_retry_policy = crate::retry::RetryPolicy {
            max_retries: 1,
            purge_sleep: std::time::Duration::from_millis(1),
        };

        let engine = engine_with(vec![format!("{}/catalog", edc.uri())], config);
        let bpn = Bpn::from("BPNL000000000005");

        let result = engine.discover_submodel(&bpn, shell_id, None, None, submodel_id).await.unwrap();
        assert_eq!(result.status, SubmodelStatus::Success);
        assert_eq!(result.data, Some(json!({"value": 7})));
    }
}
