use dtr_models::{DiscoveryError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("network error talking to dataplane: {0}")]
    Network(#[from] reqwest::Error),

    #[error("dataplane returned status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed dataplane response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<EngineError> for DiscoveryError {
    fn from(err: EngineError) -> Self {
        match &err {
            EngineError::Network(_) => DiscoveryError::new(ErrorKind::Unavailable, err.to_string()),
            EngineError::Rejected { status, .. } if *status == 403 || *status == 401 => {
                DiscoveryError::new(ErrorKind::PermissionDenied, err.to_string())
            }
            EngineError::Rejected { status, .. } if *status == 404 => {
                DiscoveryError::new(ErrorKind::NotFound, err.to_string())
            }
            EngineError::Rejected { .. } => DiscoveryError::new(ErrorKind::ExternalApiFailure, err.to_string()),
            EngineError::Decode(_) => DiscoveryError::new(ErrorKind::ExternalApiFailure, err.to_string()),
        }
    }
}
