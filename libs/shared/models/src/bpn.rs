use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque business partner number. The engine never interprets its
/// structure; it is only ever used as a cache and lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bpn(String);

impl Bpn {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bpn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Bpn {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Bpn {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for Bpn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
