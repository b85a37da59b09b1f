use crate::bpn_discovery::BpnDiscovery;
use crate::identifier::parse_identifier;
use crate::task_store::TaskStore;
use dtr_discovery_engine::DiscoveryEngine;
use dtr_models::{Bpn, DppStep, DppTask, PolicyDocument};
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Runs the six-step asynchronous DPP discovery workflow on top of a
/// [`DiscoveryEngine`] and an external [`BpnDiscovery`] collaborator
///. `submit` returns immediately with a task id; the caller
/// polls [`DppWorkflow::status`] for progress, matching the source
/// system's `202 Accepted` + poll pattern.
pub struct DppWorkflow {
    engine: Arc<DiscoveryEngine>,
    bpn_discovery: Arc<dyn BpnDiscovery>,
    store: Arc<TaskStore>,
}

impl DppWorkflow {
    pub fn new(engine: Arc<DiscoveryEngine>, bpn_discovery: Arc<dyn BpnDiscovery>) -> Self {
        Self {
            engine,
            bpn_discovery,
            store: Arc::new(TaskStore::new()),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Accepts a request and spawns the workflow in the background,
    /// returning the new task id without waiting for any step to run.
    #[instrument(skip(self, dtr_policies, governance))]
    pub async fn submit(
        &self,
        identifier: impl Into<String>,
        semantic_id: impl Into<String>,
        dtr_policies: Option<Vec<PolicyDocument>>,
        governance: Option<HashMap<String, Vec<PolicyDocument>>>,
    ) -> Uuid {
        let task_id = Uuid::new_v4();
        self.store.insert(DppTask::new(task_id)).await;

        let engine = self.engine.clone();
        let bpn_discovery = self.bpn_discovery.clone();
        let store = self.store.clone();
        let identifier = identifier.into();
        let semantic_id = semantic_id.into();

        tokio::spawn(async move {
            run(task_id, identifier, semantic_id, dtr_policies, governance, engine, bpn_discovery, store).await;
        });

        task_id
    }

    pub async fn status(&self, task_id: Uuid) -> Option<DppTask> {
        self.store.get(task_id).await
    }
}

async fn run(
    task_id: Uuid,
    identifier: String,
    semantic_id: String,
    dtr_policies: Option<Vec<PolicyDocument>>,
    governance: Option<HashMap<String, Vec<PolicyDocument>>>,
    engine: Arc<DiscoveryEngine>,
    bpn_discovery: Arc<dyn BpnDiscovery>,
    store: Arc<TaskStore>,
) {
    info!(%task_id, %identifier, "DPP workflow started");

    // Step 1: parsing (10).
    let parsed = match parse_identifier(&identifier) {
        Ok(parsed) => parsed,
        Err(message) => {
            store
                .update(task_id, |task| task.fail(format!("invalid_argument: {message}")))
                .await;
            return;
        }
    };

    // Step 2: discovering_bpn (25).
    store
        .update(task_id, |task| task.advance(DppStep::DiscoveringBpn, "Discovering business partners"))
        .await;

    let keys = vec![parsed.manufacturer_part_id.clone()];
    let bpns = match bpn_discovery.discover(&keys, "manufacturerPartId").await {
        Ok(bpns) if !bpns.is_empty() => bpns,
        Ok(_) => {
            store
                .update(task_id, |task| task.fail(format!("No BPN found for manufacturerPartId {}", parsed.manufacturer_part_id)))
                .await;
            return;
        }
        Err(e) => {
            store.update(task_id, |task| task.fail(e.to_string())).await;
            return;
        }
    };

    // Step 3: retrieving_twin (50).
    store
        .update(task_id, |task| task.advance(DppStep::RetrievingTwin, "Retrieving digital twin"))
        .await;

    let query_spec = build_query_spec(&parsed.manufacturer_part_id, &parsed.part_instance_id);
    let fetch_policies = dtr_policies.clone();

    let results: Vec<(Bpn, Result<dtr_discovery_engine::ShellLookupResult, dtr_models::DiscoveryError>)> =
        stream::iter(bpns.into_iter().map(|bpn| {
            let engine = engine.clone();
            let query_spec = query_spec.clone();
            let policies = fetch_policies.clone();
            async move {
                let result = engine.discover_shells(&bpn, &query_spec, policies.as_deref(), None, None).await;
                (bpn, result)
            }
        }))
        .buffered(8)
        .collect()
        .await;

    let mut matched = None;
    for (bpn, result) in results {
        let Ok(page) = result else { continue };
        let found = page
            .shell_descriptors
            .into_iter()
            .find(|shell| shell.submodel_descriptors().iter().any(|sm| matches_semantic_id(sm, &semantic_id)));
        if let Some(shell) = found {
            matched = Some((bpn, shell));
            break;
        }
    }

    let Some((bpn, shell)) = matched else {
        store
            .update(task_id, |task| task.fail(format!("No shell found carrying semantic id {semantic_id}")))
            .await;
        return;
    };

    // Step 4: looking_up_submodel (70).
    store
        .update(task_id, |task| task.advance(DppStep::LookingUpSubmodel, "Looking up submodel descriptor"))
        .await;

    let descriptor = shell.submodel_descriptors().into_iter().find(|sm| matches_semantic_id(sm, &semantic_id));
    let Some(descriptor) = descriptor else {
        store
            .update(task_id, |task| task.fail(format!("No submodel descriptor matches semantic id {semantic_id}")))
            .await;
        return;
    };
    let Some(submodel_id) = descriptor.id().map(str::to_string) else {
        store
            .update(task_id, |task| task.fail("submodel descriptor has no id"))
            .await;
        return;
    };

    let Some(shell_id) = shell.id().map(str::to_string) else {
        store.update(task_id, |task| task.fail("shell descriptor has no id")).await;
        return;
    };

    // Step 5: consuming_data (85).
    store
        .update(task_id, |task| task.advance(DppStep::ConsumingData, "Fetching submodel data"))
        .await;

    let result = engine
        .discover_submodel(&bpn, &shell_id, dtr_policies.as_deref(), governance.as_ref(), &submodel_id)
        .await;

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            store.update(task_id, |task| task.fail(e.to_string())).await;
            return;
        }
    };

    if result.status != dtr_discovery_engine::SubmodelStatus::Success {
        let error = result.error.unwrap_or_else(|| "submodel fetch did not succeed".to_string());
        store.update(task_id, |task| task.fail(error)).await;
        return;
    }

    // Step 6: complete (100).
    let data = result.data.unwrap_or(Value::Null);
    store.update(task_id, move |task| task.complete(shell.0, data)).await;
    info!(%task_id, "DPP workflow completed");
}

fn matches_semantic_id(descriptor: &dtr_models::SubmodelDescriptor, target: &str) -> bool {
    descriptor.semantic_id().map(|sem| sem.value == target).unwrap_or(false)
}

fn build_query_spec(manufacturer_part_id: &str, part_instance_id: &str) -> Value {
    json!([
        {"key": "manufacturerPartId", "value": manufacturer_part_id},
        {"key": "partInstanceId", "value": part_instance_id},
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use dtr_discovery_core::ConnectorDirectory;
    use dtr_discovery_engine::EngineConfig;
    use dtr_models::DiscoveryError;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeDirectory {
        connectors: HashMap<String, Vec<String>>,
    }

    #[async_trait]
    impl ConnectorDirectory for FakeDirectory {
        async fn list_connectors(&self, bpn: &Bpn) -> Result<Vec<String>, DiscoveryError> {
            Ok(self.connectors.get(bpn.as_str()).cloned().unwrap_or_default())
        }
    }

    struct FakeBpnDiscovery {
        bpns: Vec<Bpn>,
    }

    #[async_trait]
    impl BpnDiscovery for FakeBpnDiscovery {
        async fn discover(&self, _keys: &[String], _identifier_type: &str) -> Result<Vec<Bpn>, DiscoveryError> {
            Ok(self.bpns.clone())
        }
    }

    struct EmptyBpnDiscovery;

    #[async_trait]
    impl BpnDiscovery for EmptyBpnDiscovery {
        async fn discover(&self, _keys: &[String], _identifier_type: &str) -> Result<Vec<Bpn>, DiscoveryError> {
            Ok(Vec::new())
        }
    }

    async fn poll_until_terminal(workflow: &DppWorkflow, task_id: Uuid) -> DppTask {
        for _ in 0..200 {
            let task = workflow.status(task_id).await.unwrap();
            if task.status.is_terminal() {
                return task;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("workflow did not reach a terminal state in time");
    }

    #[tokio::test]
    async fn happy_path_reaches_complete_with_digital_twin_and_data() {
        let edc = MockServer::start().await;
        let dataplane = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/catalog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dcat:dataset": [{
                    "@id": "dtr-asset-1",
                    "dct:type": dtr_discovery_core::DEFAULT_DTR_TYPE_URI,
                }]
            })))
            .mount(&edc)
            .await;

        Mock::given(method("POST"))
            .and(path("/negotiate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dataplaneUrl": dataplane.uri(),
                "accessToken": "token-abc",
            })))
            .mount(&edc)
            .await;
        Mock::given(method("POST"))
            .and(path("/negotiate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dataplaneUrl": dataplane.uri(),
                "accessToken": "asset-token",
            })))
            .mount(&dataplane)
            .await;

        Mock::given(method("POST"))
            .and(path("/lookup/shellsByAssetLink"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": ["shell-1"], "paging": {}})))
            .mount(&dataplane)
            .await;

        let shell_id = "shell-1";
        let submodel_id = "sm-1";
        Mock::given(method("GET"))
            .and(path(format!(
                "/shell-descriptors/{}",
                base64::Engine::encode(&base64::engine::general_purpose::STANDARD, shell_id)
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": shell_id,
                "submodelDescriptors": [{
                    "id": submodel_id,
                    "semanticId": {"keys": [{"type": "GlobalReference", "value": "urn:samm:io.catenax#Dpp"}]},
                    "endpoints": [{
                        "interface": "SUBMODEL-3.0",
                        "protocolInformation": {
                            "href": format!("{}/submodel-data", dataplane.uri()),
                            "subprotocolBody": format!("id=asset-7;dspEndpoint={}", dataplane.uri()),
                        }
                    }]
                }]
            })))
            .mount(&dataplane)
            .await;

        Mock::given(method("GET"))
            .and(path(format!(
                "/shell-descriptors/{}/submodel-descriptors/{}",
                base64::Engine::encode(&base64::engine::general_purpose::STANDARD, shell_id),
                base64::Engine::encode(&base64::engine::general_purpose::STANDARD, submodel_id)
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
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"batteryCapacity": "80kWh"})))
            .mount(&dataplane)
            .await;

        let mut connectors = HashMap::new();
        connectors.insert("BPNL000000000002".to_string(), vec![format!("{}/catalog", edc.uri())]);

        let directory = Arc::new(FakeDirectory { connectors });
        let engine = Arc::new(DiscoveryEngine::new(
            Arc::new(dtr_connector_client::ConnectorClient::new(reqwest::Client::new())),
            directory,
            EngineConfig::default(),
        ));
        let bpn_discovery = Arc::new(FakeBpnDiscovery {
            bpns: vec![Bpn::from("BPNL000000000001"), Bpn::from("BPNL000000000002")],
        });

        let workflow = DppWorkflow::new(engine, bpn_discovery);
        let task_id = workflow.submit("CX:P-42:INST-1", "urn:samm:io.catenax#Dpp", None, None).await;

        let task = poll_until_terminal(&workflow, task_id).await;
        assert_eq!(task.status, dtr_models::TaskStatus::Completed);
        assert_eq!(task.step, DppStep::Complete);
        assert_eq!(task.progress, 100);
        assert!(task.digital_twin.is_some());
        assert_eq!(task.data, Some(json!({"batteryCapacity": "80kWh"})));
    }

    #[tokio::test]
    async fn empty_bpn_discovery_fails_at_discovering_bpn_step() {
        let directory = Arc::new(FakeDirectory {
            connectors: HashMap::new(),
        });
        let engine = Arc::new(DiscoveryEngine::new(
            Arc::new(dtr_connector_client::ConnectorClient::new(reqwest::Client::new())),
            directory,
            EngineConfig::default(),
        ));
        let workflow = DppWorkflow::new(engine, Arc::new(EmptyBpnDiscovery));

        let task_id = workflow.submit("CX:P-42:INST-1", "urn:samm:io.catenax#Dpp", None, None).await;
        let task = poll_until_terminal(&workflow, task_id).await;

        assert_eq!(task.status, dtr_models::TaskStatus::Failed);
        assert_eq!(task.step, DppStep::DiscoveringBpn);
        assert!(task.progress >= 25);
        assert!(task.error.unwrap().contains("No BPN found"));
    }

    #[tokio::test]
    async fn malformed_identifier_fails_at_parsing_step() {
        let directory = Arc::new(FakeDirectory {
            connectors: HashMap::new(),
        });
        let engine = Arc::new(DiscoveryEngine::new(
            Arc::new(dtr_connector_client::ConnectorClient::new(reqwest::Client::new())),
            directory,
            EngineConfig::default(),
        ));
        let workflow = DppWorkflow::new(engine, Arc::new(EmptyBpnDiscovery));

        let task_id = workflow.submit("not-a-valid-id", "urn:samm:io.catenax#Dpp", None, None).await;
        let task = poll_until_terminal(&workflow, task_id).await;

        assert_eq!(task.status, dtr_models::TaskStatus::Failed);
        assert_eq!(task.step, DppStep::Parsing);
        assert!(task.error.unwrap().contains("invalid_argument"));
    }
}
