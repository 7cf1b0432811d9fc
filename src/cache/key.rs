//! Cache key derivation.
//!
//! Maps `(namespace, identifier)` to a fixed-width SHA-256 key. Inputs are
//! length-prefixed before hashing so that namespace `"a:b"` + identifier `"c"`
//! can never collide with namespace `"a"` + identifier `"b:c"`.

use sha2::{Digest, Sha256};

/// A fixed-width cache key: the hex-encoded SHA-256 of the length-prefixed
/// `(namespace, identifier)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a `(namespace, identifier)` pair. Pure and
    /// deterministic.
    pub fn encode(namespace: &str, identifier: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((namespace.len() as u64).to_le_bytes());
        hasher.update(namespace.as_bytes());
        hasher.update((identifier.len() as u64).to_le_bytes());
        hasher.update(identifier.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// The hex digest, e.g. for log correlation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix used in log lines.
    pub(crate) fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
