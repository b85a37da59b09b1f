use crate::semantic::{extract_semantic_id, CanonicalSemanticId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `SUBMODEL-3.0` interface endpoint carries an `href` and a
/// `subprotocolBody` of the form `k1=v1;k2=v2;...`. This is the
/// parsed, canonical form the engine actually negotiates and fetches with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submodel3Endpoint {
    pub href: String,
    pub asset_id: String,
    pub dsp_endpoint: String,
}

/// A submodel descriptor within a shell: opaque JSON with at least `id`,
/// `semanticId`, and `endpoints[]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmodelDescriptor(pub Value);

impl SubmodelDescriptor {
    pub fn id(&self) -> Option<&str> {
        self.0.get("id")?.as_str()
    }

    pub fn semantic_id(&self) -> Option<CanonicalSemanticId> {
        self.0.get("semanticId").and_then(extract_semantic_id)
    }

    /// Extracts the `SUBMODEL-3.0` endpoint, stripping any `urn:uuid:` prefix
    /// from the href and parsing the `subprotocolBody` key-value string.
    pub fn submodel_3_endpoint(&self) -> Option<Submodel3Endpoint> {
        let endpoints = self.0.get("endpoints")?.as_array()?;
        for endpoint in endpoints {
            let interface = endpoint.get("interface").and_then(Value::as_str);
            if interface != Some("SUBMODEL-3.0") {
                continue;
            }
            let protocol_information = endpoint.get("protocolInformation")?;
            let raw_href = protocol_information.get("href")?.as_str()?;
            let href = raw_href
                .strip_prefix("urn:uuid:")
                .unwrap_or(raw_href)
                .to_string();
            let subprotocol_body = protocol_information
                .get("subprotocolBody")
                .and_then(Value::as_str)?;
            let fields = parse_subprotocol_body(subprotocol_body);
            let asset_id = fields.get("id")?.clone();
            let dsp_endpoint = fields.get("dspEndpoint")?.clone();
            return Some(Submodel3Endpoint {
                href,
                asset_id,
                dsp_endpoint,
            });
        }
        None
    }
}

/// Parses a `k1=v1;k2=v2;...` subprotocol body into a field map.
fn parse_subprotocol_body(body: &str) -> std::collections::HashMap<String, String> {
    body.split(';')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.trim();
            let value = parts.next()?.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
