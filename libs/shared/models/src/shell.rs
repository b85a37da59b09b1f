use crate::semantic::{extract_semantic_id, CanonicalSemanticId};
use crate::submodel::SubmodelDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A digital twin's shell descriptor. Kept as opaque JSON: callers
/// should not assume a schema beyond the fields this type exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShellDescriptor(pub Value);

impl ShellDescriptor {
    pub fn id(&self) -> Option<&str> {
        self.0.get("id")?.as_str()
    }

    pub fn semantic_id(&self) -> Option<CanonicalSemanticId> {
        self.0.get("semanticId").and_then(extract_semantic_id)
    }

    pub fn submodel_descriptors(&self) -> Vec<SubmodelDescriptor> {
        match self.0.get("submodelDescriptors") {
            Some(Value::Array(items)) => items
                .iter()
                .cloned()
                .map(SubmodelDescriptor)
                .collect(),
            _ => Vec::new(),
        }
    }
}
