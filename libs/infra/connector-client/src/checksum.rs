use dtr_models::PolicyDocument;
use serde_json::Value;
use sha3::{Digest, Sha3_256};

/// `SHA3-256` over the canonicalised string form of a value. Canonicalisation here means `serde_json`'s stable key ordering
/// (`serde_json::Value`'s `Object` is a `BTreeMap`-backed ordering once
/// parsed, so two structurally-equal JSON payloads always checksum equal
/// regardless of input key order).
pub fn checksum_value(value: &Value) -> String {
    let canonical = serde_json::to_string(value).unwrap_or_default();
    checksum_str(&canonical)
}

pub fn checksum_policies(policies: &[PolicyDocument]) -> String {
    let canonical = serde_json::to_string(policies).unwrap_or_default();
    checksum_str(&canonical)
}

pub fn checksum_str(input: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checksum_is_deterministic() {
        let a = checksum_value(&json!({"b": 1, "a": 2}));
        let b = checksum_value(&json!({"b": 1, "a": 2}));
        assert_eq!(a, b);
    }

    #[test]
    fn checksum_differs_for_different_policies() {
        let a = checksum_policies(&[json!({"permission": "use"})]);
        let b = checksum_policies(&[json!({"permission": "display"})]);
        assert_ne!(a, b);
    }
}
