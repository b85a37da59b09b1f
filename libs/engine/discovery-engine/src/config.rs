use crate::retry::RetryPolicy;
use std::time::Duration;

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Recognised configuration keys. Read from environment variables
/// via `dotenvy` for local development, following a
/// `dotenvy::dotenv().ok()` then `std::env::var` convention. Dotted Java-style
/// property names from the source system are mapped to upper-snake-case env
/// vars (`consumer.discovery.discovery_finder.url` ->
/// `CONSUMER_DISCOVERY_DISCOVERY_FINDER_URL`).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub discovery_finder_url: Option<String>,
    pub bpn_discovery_identifier_type: String,
    pub dtr_cache_expiration: Duration,
    pub catalog_timeout: Duration,
    pub dataplane_timeout: Duration,
    pub shell_retry_policy: RetryPolicy,
    pub submodel_retry_policy: RetryPolicy,
    pub shell_fanout_concurrency: usize,
    pub submodel_negotiation_concurrency: usize,
    pub submodel_fetch_concurrency: usize,
    pub dtr_type_uri: String,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            discovery_finder_url: std::env::var("CONSUMER_DISCOVERY_DISCOVERY_FINDER_URL").ok(),
            bpn_discovery_identifier_type: env_string(
                "CONSUMER_DISCOVERY_BPN_DISCOVERY_TYPE",
                "manufacturerPartId",
            ),
            dtr_cache_expiration: Duration::from_secs(60 * env_u64("DTR_CACHE_EXPIRATION_MINUTES", 60)),
            catalog_timeout: Duration::from_secs(env_u64("CATALOG_TIMEOUT_SECONDS", 30)),
            dataplane_timeout: Duration::from_secs(env_u64("DATAPLANE_TIMEOUT_SECONDS", 30)),
            shell_retry_policy: RetryPolicy::shells(),
            submodel_retry_policy: RetryPolicy::direct_submodel(),
            shell_fanout_concurrency: env_u64("SHELL_FANOUT_CONCURRENCY", 10) as usize,
            submodel_negotiation_concurrency: env_u64("SUBMODEL_NEGOTIATION_CONCURRENCY", 10) as usize,
            submodel_fetch_concurrency: env_u64("SUBMODEL_FETCH_CONCURRENCY", 20) as usize,
            dtr_type_uri: env_string(
                "DTR_TYPE_URI",
                dtr_discovery_core::DEFAULT_DTR_TYPE_URI,
            ),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            discovery_finder_url: None,
            bpn_discovery_identifier_type: "manufacturerPartId".to_string(),
            dtr_cache_expiration: Duration::from_secs(60 * 60),
            catalog_timeout: Duration::from_secs(30),
            dataplane_timeout: Duration::from_secs(30),
            shell_retry_policy: RetryPolicy::shells(),
            submodel_retry_policy: RetryPolicy::direct_submodel(),
            shell_fanout_concurrency: 10,
            submodel_negotiation_concurrency: 10,
            submodel_fetch_concurrency: 20,
            dtr_type_uri: dtr_discovery_core::DEFAULT_DTR_TYPE_URI.to_string(),
        }
    }
}
