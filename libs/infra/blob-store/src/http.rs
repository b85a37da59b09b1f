use crate::errors::BlobStoreError;
use crate::key::BlobKey;
use crate::store::BlobStore;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Bearer,
    ApiKey,
}

/// Authentication for the HTTP blob backend. `token` may use `${NAME}`
/// environment-variable substitution; resolution happens once,
/// at construction.
#[derive(Debug, Clone)]
pub struct HttpAuthConfig {
    pub kind: AuthKind,
    pub token: String,
    /// Header name for `ApiKey` auth; ignored for `Bearer`.
    pub key_name: String,
}

impl HttpAuthConfig {
    pub fn resolve(kind: AuthKind, token_or_ref: &str, key_name: impl Into<String>) -> Self {
        Self {
            kind,
            token: resolve_env_placeholder(token_or_ref),
            key_name: key_name.into(),
        }
    }
}

fn resolve_env_placeholder(raw: &str) -> String {
    if let Some(name) = raw.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(name).unwrap_or_default()
    } else {
        raw.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct HttpBlobStoreConfig {
    pub base_url: String,
    pub api_path: String,
    pub timeout: Duration,
    pub auth: Option<HttpAuthConfig>,
}

/// HTTP-backed submodel store. Issues
/// `{GET,POST,DELETE,HEAD} {base_url}{api_path}/{semantic_id}/{submodel_id}/submodel`,
/// url-encoding both path segments, and maintains an in-memory
/// sha256-to-semantic-id cache so the legacy path interface can resolve
/// ids it has already seen.
pub struct HttpBlobStore {
    http: reqwest::Client,
    config: HttpBlobStoreConfig,
    semantic_cache: Arc<Mutex<HashMap<String, String>>>,
}

impl HttpBlobStore {
    pub fn new(http: reqwest::Client, config: HttpBlobStoreConfig) -> Self {
        Self {
            http,
            config,
            semantic_cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn url_for(&self, semantic_id: &str, submodel_id: Uuid) -> String {
        format!(
            "{}{}/{}/{}/submodel",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_path,
            url::form_urlencoded::byte_serialize(semantic_id.as_bytes()).collect::<String>(),
            url::form_urlencoded::byte_serialize(submodel_id.to_string().as_bytes()).collect::<String>(),
        )
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth {
            Some(auth) if auth.kind == AuthKind::Bearer => builder.bearer_auth(&auth.token),
            Some(auth) => builder.header(auth.key_name.as_str(), auth.token.as_str()),
            None => builder,
        }
    }

    async fn remember(&self, key: &BlobKey) {
        let mut cache = self.semantic_cache.lock().await;
        cache.insert(key.semantic_sha256(), key.semantic_id.clone());
    }

    async fn send(&self, method: Method, semantic_id: &str, submodel_id: Uuid, body: Option<&Value>) -> Result<reqwest::Response, BlobStoreError> {
        let url = self.url_for(semantic_id, submodel_id);
        let mut builder = self.http.request(method, &url).timeout(self.config.timeout);
        builder = self.apply_auth(builder);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    fn map_status(status: StatusCode) -> Result<(), BlobStoreError> {
        match status.as_u16() {
            200 | 201 | 204 => Ok(()),
            404 => Err(BlobStoreError::NotFound),
            400 | 422 => Err(BlobStoreError::Invalid(format!("status {status}"))),
            401 | 403 => Err(BlobStoreError::PermissionDenied(format!("status {status}"))),
            code if code >= 500 => Err(BlobStoreError::Retriable(format!("status {status}"))),
            _ => Err(BlobStoreError::Invalid(format!("unexpected status {status}"))),
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    #[instrument(skip(self))]
    async fn read(&self, key: &BlobKey) -> Result<Value, BlobStoreError> {
        self.remember(key).await;
        let response = self.send(Method::GET, &key.semantic_id, key.submodel_id, None).await?;
        let status = response.status();
        Self::map_status(status)?;
        Ok(response.json().await.map_err(BlobStoreError::Network)?)
    }

    #[instrument(skip(self, payload))]
    async fn write(&self, key: &BlobKey, payload: &Value) -> Result<(), BlobStoreError> {
        self.remember(key).await;
        let response = self
            .send(Method::POST, &key.semantic_id, key.submodel_id, Some(payload))
            .await?;
        Self::map_status(response.status())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &BlobKey) -> Result<(), BlobStoreError> {
        self.remember(key).await;
        let response = self.send(Method::DELETE, &key.semantic_id, key.submodel_id, None).await?;
        match Self::map_status(response.status()) {
            Ok(()) | Err(BlobStoreError::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn exists(&self, key: &BlobKey) -> Result<bool, BlobStoreError> {
        self.remember(key).await;
        let response = self.send(Method::HEAD, &key.semantic_id, key.submodel_id, None).await?;
        match Self::map_status(response.status()) {
            Ok(()) => Ok(true),
            Err(BlobStoreError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn read_legacy(&self, semantic_sha256: &str, submodel_id: Uuid) -> Result<Value, BlobStoreError> {
        let semantic_id = {
            let cache = self.semantic_cache.lock().await;
            cache.get(semantic_sha256).cloned()
        };
        let semantic_id = semantic_id.ok_or_else(|| {
            BlobStoreError::Invalid(format!(
                "sha256 {semantic_sha256} not resolvable to a semantic id; no prior semantic-aware call seen it"
            ))
        })?;
        let key = BlobKey::new(semantic_id, submodel_id);
        self.read(&key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> HttpBlobStoreConfig {
        HttpBlobStoreConfig {
            base_url: server.uri(),
            api_path: "/api/submodels".to_string(),
            timeout: Duration::from_secs(5),
            auth: Some(HttpAuthConfig::resolve(AuthKind::Bearer, "static-token", "")),
        }
    }

    #[tokio::test]
    async fn read_returns_json_body_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/submodels/.+/.+/submodel$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let store = HttpBlobStore::new(reqwest::Client::new(), config(&server));
        let key = BlobKey::new("urn:samm:io.catenax#Battery", Uuid::new_v4());
        let body = store.read(&key).await.unwrap();
        assert_eq!(body, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn read_maps_404_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/submodels/.+/.+/submodel$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = HttpBlobStore::new(reqwest::Client::new(), config(&server));
        let key = BlobKey::new("urn:samm:io.catenax#Battery", Uuid::new_v4());
        let err = store.read(&key).await.unwrap_err();
        assert!(matches!(err, BlobStoreError::NotFound));
    }

    #[tokio::test]
    async fn legacy_read_requires_prior_semantic_aware_call() {
        let server = MockServer::start().await;
        let store = HttpBlobStore::new(reqwest::Client::new(), config(&server));
        let err = store.read_legacy("deadbeef", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, BlobStoreError::Invalid(_)));
    }

    #[test]
    fn env_placeholder_is_substituted() {
        std::env::set_var("BLOB_STORE_TEST_TOKEN", "resolved-value");
        let resolved = resolve_env_placeholder("${BLOB_STORE_TEST_TOKEN}");
        assert_eq!(resolved, "resolved-value");
        std::env::remove_var("BLOB_STORE_TEST_TOKEN");
    }
}
