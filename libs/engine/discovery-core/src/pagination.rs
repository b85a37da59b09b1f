use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dtr_models::{DiscoveryError, PageState};

pub const LIMIT_MISMATCH: &str = "LIMIT_MISMATCH";

/// Wraps a [`PageState`] as an opaque base64 string.
pub fn encode_page_token(state: &PageState) -> Result<String, DiscoveryError> {
    let json = serde_json::to_vec(state)
        .map_err(|e| DiscoveryError::internal(format!("failed to encode page token: {e}")))?;
    Ok(BASE64.encode(json))
}

/// Inverse of [`encode_page_token`].
pub fn decode_page_token(token: &str) -> Result<PageState, DiscoveryError> {
    let bytes = BASE64
        .decode(token)
        .map_err(|e| DiscoveryError::invalid_argument(format!("malformed page token: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| DiscoveryError::invalid_argument(format!("malformed page token: {e}")))
}

/// Divides `total_limit` evenly (ceiling division) across the active DTRs;
/// `None` propagates as unbounded.
pub fn distribute_limit(total_limit: Option<u64>, active_dtr_count: usize) -> Option<u64> {
    total_limit.map(|limit| {
        if active_dtr_count == 0 {
            limit
        } else {
            (limit + active_dtr_count as u64 - 1) / active_dtr_count as u64
        }
    })
}

/// A cursor is incompatible with a newly requested limit iff it was minted
/// under a different limit.
pub fn is_cursor_compatible(state: &PageState, requested_limit: Option<u64>) -> bool {
    state.limit == requested_limit
}
