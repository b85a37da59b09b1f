use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `{type, value}` entry of a `semanticId.keys` sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SemanticKey {
    #[serde(rename = "type", default)]
    pub key_type: String,
    pub value: String,
}

/// The canonical form of a semantic id: its primary value (the first key's
/// value) plus the full ordered key list, used for subset matching in
/// `discover_submodel_by_semantic_ids`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalSemanticId {
    pub value: String,
    pub keys: Vec<SemanticKey>,
}

/// Tolerantly extracts a semantic id from one of the three shapes dynamic
/// descriptors use in the wild: `{keys:[{type,value}]}`, `{value}`, or a bare
/// string.
pub fn extract_semantic_id(raw: &Value) -> Option<CanonicalSemanticId> {
    match raw {
        Value::String(s) if !s.is_empty() => Some(CanonicalSemanticId {
            value: s.clone(),
            keys: vec![SemanticKey {
                key_type: String::new(),
                value: s.clone(),
            }],
        }),
        Value::Object(map) => {
            if let Some(Value::Array(raw_keys)) = map.get("keys") {
                let keys: Vec<SemanticKey> = raw_keys
                    .iter()
                    .filter_map(|k| {
                        let value = k.get("value")?.as_str()?.to_string();
                        let key_type = k
                            .get("type")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        Some(SemanticKey { key_type, value })
                    })
                    .collect();
                let value = keys.first()?.value.clone();
                if keys.is_empty() {
                    return None;
                }
                return Some(CanonicalSemanticId { value, keys });
            }
            if let Some(value) = map.get("value").and_then(Value::as_str) {
                return Some(CanonicalSemanticId {
                    value: value.to_string(),
                    keys: vec![SemanticKey {
                        key_type: String::new(),
                        value: value.to_string(),
                    }],
                });
            }
            None
        }
        _ => None,
    }
}

impl CanonicalSemanticId {
    /// True iff `target` (a set of `{type,value}` pairs) is a subset of this
    /// descriptor's key set.
    pub fn contains_all(&self, target: &[SemanticKey]) -> bool {
        target.iter().all(|t| self.keys.contains(t))
    }
}
