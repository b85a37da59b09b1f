use dtr_models::ShellDescriptor;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-wide `{shell_id -> ShellDescriptor}` map populated by lookups.
/// Never authoritative: `discover_shell` always re-fetches on
/// demand and simply write-throughs here, and there is no eviction policy
/// within the core.
#[derive(Default)]
pub struct ShellIndex {
    shells: RwLock<HashMap<String, ShellDescriptor>>,
}

impl ShellIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, shell_id: &str) -> Option<ShellDescriptor> {
        self.shells.read().await.get(shell_id).cloned()
    }

    pub async fn put(&self, shell_id: impl Into<String>, descriptor: ShellDescriptor) {
        self.shells.write().await.insert(shell_id.into(), descriptor);
    }

    pub async fn len(&self) -> usize {
        self.shells.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let index = ShellIndex::new();
        let descriptor = ShellDescriptor(json!({"id": "shell-1"}));
        index.put("shell-1", descriptor.clone()).await;
        assert_eq!(index.get("shell-1").await, Some(descriptor));
    }

    #[tokio::test]
    async fn unknown_shell_id_returns_none() {
        let index = ShellIndex::new();
        assert!(index.get("missing").await.is_none());
    }
}
