use async_trait::async_trait;
use dtr_models::{Bpn, DiscoveryError};

/// External collaborator resolving which connector endpoints a BPN
/// publishes. Out of scope for this
/// engine beyond the trait boundary; callers supply a concrete
/// implementation backed by the Tractus-X Discovery Finder service or a
/// test double.
#[async_trait]
pub trait ConnectorDirectory: Send + Sync {
    async fn list_connectors(&self, bpn: &Bpn) -> Result<Vec<String>, DiscoveryError>;
}
