use dtr_models::{DiscoveryError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error talking to connector: {0}")]
    Network(#[from] reqwest::Error),

    #[error("connector returned status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed response from connector: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("negotiation timed out")]
    Timeout,

    /// Wraps an error observed by a concurrent caller that actually ran the
    /// negotiation; `OnceCell` does not let two callers own the same
    /// non-`Clone` error, so the piggy-backing caller gets this instead.
    #[error("{0}")]
    Cached(String),
}

impl From<ClientError> for DiscoveryError {
    fn from(err: ClientError) -> Self {
        match &err {
            ClientError::Network(_) => DiscoveryError::new(ErrorKind::Unavailable, err.to_string()),
            ClientError::Rejected { status, .. } if *status == 403 || *status == 401 => {
                DiscoveryError::new(ErrorKind::PermissionDenied, err.to_string())
            }
            ClientError::Rejected { status, .. } if *status == 404 => {
                DiscoveryError::new(ErrorKind::NotFound, err.to_string())
            }
            ClientError::Rejected { .. } => DiscoveryError::new(ErrorKind::ExternalApiFailure, err.to_string()),
            ClientError::Decode(_) => DiscoveryError::new(ErrorKind::ExternalApiFailure, err.to_string()),
            ClientError::Timeout => DiscoveryError::new(ErrorKind::Timeout, err.to_string()),
            ClientError::Cached(_) => DiscoveryError::new(ErrorKind::ExternalApiFailure, err.to_string()),
        }
    }
}
