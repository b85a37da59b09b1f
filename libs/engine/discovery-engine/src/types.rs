use dtr_models::{DtrEntry, ShellDescriptor};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct PaginationInfo {
    pub page: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShellLookupResult {
    pub shell_descriptors: Vec<ShellDescriptor>,
    pub dtrs: Vec<DtrEntry>,
    pub shells_found: usize,
    pub pagination: Option<PaginationInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedShell {
    pub shell: ShellDescriptor,
    pub dtr: DtrEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmodelStatus {
    Pending,
    Success,
    Error,
    GovernanceNotFound,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmodelDescriptorView {
    pub submodel_id: String,
    pub semantic_id: Option<String>,
    /// Base64 of the canonicalised `semanticId` JSON.
    pub semantic_id_keys: Option<String>,
    pub asset_id: Option<String>,
    pub connector_url: Option<String>,
    pub href: Option<String>,
    pub status: SubmodelStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmodelsResult {
    pub submodel_descriptors: Vec<SubmodelDescriptorView>,
    pub submodels: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmodelResult {
    pub submodel_id: String,
    pub status: SubmodelStatus,
    pub data: Option<Value>,
    pub error: Option<String>,
}
