use async_trait::async_trait;
use dtr_models::{Bpn, DiscoveryError};

/// External collaborator resolving which BPNs publish a given manufacturer
/// part id. Out of scope for this workflow beyond the trait boundary.
#[async_trait]
pub trait BpnDiscovery: Send + Sync {
    async fn discover(&self, keys: &[String], identifier_type: &str) -> Result<Vec<Bpn>, DiscoveryError>;
}
