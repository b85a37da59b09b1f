//! Error taxonomy shared by every crate in the workspace.
//!
//! Components raise a [`DiscoveryError`] carrying one of the [`ErrorKind`]
//! variants. Callers branch on the tagged kind rather than on
//! the message text; the message is for humans and logs only.

use thiserror::Error;

/// The error taxonomy every component in the engine reports through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    Unavailable,
    ExternalApiFailure,
    Timeout,
    Internal,
}

impl ErrorKind {
    /// Maps to the HTTP status an edge controller would use.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::InvalidArgument => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::AlreadyExists => 409,
            ErrorKind::PermissionDenied => 403,
            ErrorKind::Unavailable => 503,
            ErrorKind::ExternalApiFailure => 502,
            ErrorKind::Timeout => 504,
            ErrorKind::Internal => 500,
        }
    }
}

/// A tagged, displayable error carrying an [`ErrorKind`] and a human message.
#[derive(Debug, Error, Clone)]
#[error("{kind:?}: {message}")]
pub struct DiscoveryError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DiscoveryError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn external_api_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalApiFailure, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
