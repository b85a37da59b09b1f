pub mod errors;
pub mod filesystem;
pub mod http;
pub mod key;
pub mod store;

pub use errors::BlobStoreError;
pub use filesystem::FilesystemBlobStore;
pub use http::{AuthKind, HttpAuthConfig, HttpBlobStore, HttpBlobStoreConfig};
pub use key::BlobKey;
pub use store::BlobStore;
