pub mod checksum;
pub mod client;
pub mod errors;
pub mod negotiation;
pub mod persistence;

pub use client::ConnectorClient;
pub use errors::ClientError;
pub use negotiation::{HttpNegotiationBackend, NegotiatedAccess, NegotiationBackend};
pub use persistence::{ConnectionPersistence, NoopPersistence};
