use dtr_models::{DiscoveryError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("blob not found")]
    NotFound,

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("backend returned a retriable error: {0}")]
    Retriable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error talking to blob backend: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed blob payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<BlobStoreError> for DiscoveryError {
    fn from(err: BlobStoreError) -> Self {
        match &err {
            BlobStoreError::NotFound => DiscoveryError::new(ErrorKind::NotFound, err.to_string()),
            BlobStoreError::Invalid(_) => DiscoveryError::new(ErrorKind::InvalidArgument, err.to_string()),
            BlobStoreError::PermissionDenied(_) => {
                DiscoveryError::new(ErrorKind::PermissionDenied, err.to_string())
            }
            BlobStoreError::Retriable(_) => DiscoveryError::new(ErrorKind::ExternalApiFailure, err.to_string()),
            BlobStoreError::Io(_) => DiscoveryError::new(ErrorKind::Internal, err.to_string()),
            BlobStoreError::Network(_) => DiscoveryError::new(ErrorKind::Unavailable, err.to_string()),
            BlobStoreError::Decode(_) => DiscoveryError::new(ErrorKind::ExternalApiFailure, err.to_string()),
            BlobStoreError::Configuration(_) => DiscoveryError::new(ErrorKind::Internal, err.to_string()),
        }
    }
}
