use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-DTR pagination progress: the opaque cursor the DTR returned last, and
/// whether its upstream has signalled there is nothing more to page through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtrPageState {
    pub cursor: Option<String>,
    pub exhausted: bool,
}

/// The full pagination state a cursor encodes.
/// `dtr_states` is keyed by asset id so a resumed call can address each DTR's
/// independent cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageState {
    pub dtr_states: BTreeMap<String, DtrPageState>,
    pub page_number: u64,
    pub limit: Option<u64>,
    #[serde(default)]
    pub previous_state: Option<Box<PageState>>,
}

impl PageState {
    pub fn first_page(limit: Option<u64>) -> Self {
        Self {
            dtr_states: BTreeMap::new(),
            page_number: 0,
            limit,
            previous_state: None,
        }
    }

    /// True iff at least one DTR state is not yet exhausted.
    pub fn has_more_data(&self) -> bool {
        self.dtr_states.values().any(|s| !s.exhausted)
    }
}
