pub mod catalog;
pub mod directory;
pub mod dtr_cache;
pub mod pagination;
pub mod shell_index;

pub use catalog::{find_dtr_datasets, DtrDataset, DEFAULT_DTR_TYPE_URI};
pub use directory::ConnectorDirectory;
pub use dtr_cache::{DtrCache, DtrCacheConfig};
pub use pagination::{decode_page_token, distribute_limit, encode_page_token, is_cursor_compatible, LIMIT_MISMATCH};
pub use shell_index::ShellIndex;
