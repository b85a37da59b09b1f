use dtr_models::dtr::{normalize_policies, PolicyDocument};
use serde_json::Value;

pub const DEFAULT_DTR_TYPE_URI: &str = "https://w3id.org/catenax/taxonomy#DigitalTwinRegistry";

const TYPE_PROPERTY_KEYS: [&str; 2] = ["dct:type", "http://purl.org/dc/terms/type"];
const POLICY_PROPERTY_KEY: &str = "odrl:hasPolicy";

/// One dataset entry pulled out of a DCAT catalog that passed the DTR asset
/// test.
pub struct DtrDataset {
    pub asset_id: String,
    pub policies: Vec<PolicyDocument>,
}

/// Scans a connector's DCAT catalog body for datasets whose `dct:type`
/// matches `type_uri`, cleaning each match's policies along the way.
pub fn find_dtr_datasets(catalog: &Value, type_uri: &str) -> Vec<DtrDataset> {
    datasets(catalog)
        .into_iter()
        .filter(|dataset| type_matches(dataset, type_uri))
        .filter_map(|dataset| {
            let asset_id = dataset.get("@id").and_then(Value::as_str)?.to_string();
            let policies = dataset
                .get(POLICY_PROPERTY_KEY)
                .map(normalize_policies)
                .unwrap_or_default();
            Some(DtrDataset { asset_id, policies })
        })
        .collect()
}

fn datasets(catalog: &Value) -> Vec<&Value> {
    match catalog.get("dcat:dataset") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => Vec::new(),
    }
}

fn type_matches(dataset: &Value, type_uri: &str) -> bool {
    TYPE_PROPERTY_KEYS
        .iter()
        .filter_map(|key| dataset.get(key))
        .any(|value| value_matches_type(value, type_uri))
}

fn value_matches_type(value: &Value, type_uri: &str) -> bool {
    match value {
        Value::String(s) => s == type_uri,
        Value::Object(map) => map.get("@id").and_then(Value::as_str) == Some(type_uri),
        Value::Array(items) => items.iter().any(|v| value_matches_type(v, type_uri)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_string_and_object_type_forms() {
        let catalog = json!({
            "dcat:dataset": [
                {"@id": "asset-1", "dct:type": "https://w3id.org/catenax/taxonomy#DigitalTwinRegistry"},
                {"@id": "asset-2", "dct:type": {"@id": "https://w3id.org/catenax/taxonomy#DigitalTwinRegistry"}},
                {"@id": "asset-3", "dct:type": "https://w3id.org/catenax/taxonomy#SomethingElse"},
            ]
        });

        let found = find_dtr_datasets(&catalog, DEFAULT_DTR_TYPE_URI);
        let ids: Vec<&str> = found.iter().map(|d| d.asset_id.as_str()).collect();
        assert_eq!(ids, vec!["asset-1", "asset-2"]);
    }

    #[test]
    fn normalizes_singleton_and_list_policies() {
        let catalog = json!({
            "dcat:dataset": [
                {
                    "@id": "asset-1",
                    "dct:type": DEFAULT_DTR_TYPE_URI,
                    "odrl:hasPolicy": {"@id": "policy-1", "permission": "use"}
                },
                {
                    "@id": "asset-2",
                    "dct:type": DEFAULT_DTR_TYPE_URI,
                    "odrl:hasPolicy": [{"@id": "policy-2", "permission": "use"}, {"permission": "display"}]
                }
            ]
        });

        let found = find_dtr_datasets(&catalog, DEFAULT_DTR_TYPE_URI);
        assert_eq!(found[0].policies, vec![json!({"permission": "use"})]);
        assert_eq!(
            found[1].policies,
            vec![json!({"permission": "use"}), json!({"permission": "display"})]
        );
    }

    #[test]
    fn single_dataset_object_is_accepted_without_array_wrapper() {
        let catalog = json!({
            "dcat:dataset": {"@id": "asset-1", "dct:type": DEFAULT_DTR_TYPE_URI}
        });
        assert_eq!(find_dtr_datasets(&catalog, DEFAULT_DTR_TYPE_URI).len(), 1);
    }
}
