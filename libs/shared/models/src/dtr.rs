use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An ODRL-ish policy document, with `@id`/`@type` negotiation metadata
/// stripped. String-valued policies pass through untouched.
pub type PolicyDocument = Value;

/// Strips `@id` and `@type` from a policy object. String policies and
/// non-object values pass through unchanged.
pub fn clean_policy(policy: &Value) -> Value {
    match policy {
        Value::Object(map) => {
            let mut cleaned = map.clone();
            cleaned.remove("@id");
            cleaned.remove("@type");
            Value::Object(cleaned)
        }
        other => other.clone(),
    }
}

/// Normalises `odrl:hasPolicy`, which upstream may encode as either a single
/// policy object or a JSON array of them.
pub fn normalize_policies(raw: &Value) -> Vec<PolicyDocument> {
    match raw {
        Value::Array(items) => items.iter().map(clean_policy).collect(),
        Value::Null => Vec::new(),
        single => vec![clean_policy(single)],
    }
}

/// A single DTR offering known for a business partner: `(connector_url,
/// asset_id, policies)`, immutable after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DtrEntry {
    pub connector_url: String,
    pub asset_id: String,
    pub policies: Vec<PolicyDocument>,
}

impl DtrEntry {
    pub fn new(connector_url: impl Into<String>, asset_id: impl Into<String>, policies: Vec<PolicyDocument>) -> Self {
        Self {
            connector_url: connector_url.into(),
            asset_id: asset_id.into(),
            policies,
        }
    }
}
