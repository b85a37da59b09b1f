use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Identity of a submodel blob: `(semantic_id, submodel_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey {
    pub semantic_id: String,
    pub submodel_id: Uuid,
}

impl BlobKey {
    pub fn new(semantic_id: impl Into<String>, submodel_id: Uuid) -> Self {
        Self {
            semantic_id: semantic_id.into(),
            submodel_id,
        }
    }

    pub fn semantic_sha256(&self) -> String {
        sha256_hex(&self.semantic_id)
    }
}

pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_deterministic() {
        assert_eq!(sha256_hex("urn:samm:io.catenax#Battery"), sha256_hex("urn:samm:io.catenax#Battery"));
        assert_ne!(sha256_hex("a"), sha256_hex("b"));
    }
}
