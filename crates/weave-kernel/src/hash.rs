//! Content hashing.
//!
//! Contexts and plans are content-addressed: two values with the same
//! `ContentHash` were built from the same substantive content. The hash is
//! the cache key for plans and the identity compared when a persisted plan
//! is rehydrated.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 content hash, rendered as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute a content hash from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{hash:x}"))
    }

    /// Hash the canonical JSON encoding of a serializable value.
    ///
    /// Only meaningful for values whose encoding is order-stable (sorted
    /// maps, ordered vectors).
    pub fn of_json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::from_bytes(&serde_json::to_vec(value)?))
    }

    /// A builder for incrementally computing content hashes.
    pub fn builder() -> ContentHashBuilder {
        ContentHashBuilder {
            hasher: Sha256::new(),
        }
    }

    /// First twelve hex digits, for log lines and human output.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incremental content hash builder.
///
/// Feeds fields in a stable order to produce a deterministic hash.
pub struct ContentHashBuilder {
    hasher: Sha256,
}

impl ContentHashBuilder {
    /// Feed a string field into the hash.
    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.hasher.update(name.as_bytes());
        self.hasher.update(b":");
        self.hasher.update(value.as_bytes());
        self.hasher.update(b"\n");
        self
    }

    /// Feed an integer field into the hash.
    pub fn field_int(self, name: &str, value: i64) -> Self {
        self.field(name, &value.to_string())
    }

    /// Feed a displayable field into the hash.
    pub fn field_display(self, name: &str, value: &impl fmt::Display) -> Self {
        self.field(name, &value.to_string())
    }

    /// Feed an ordered list as one length-prefixed field.
    pub fn field_list<I, T>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        let rendered: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
        let joined = rendered
            .iter()
            .map(|v| format!("{}#{v}", v.len()))
            .collect::<Vec<_>>()
            .join(",");
        self.field_int(&format!("{name}.len"), rendered.len() as i64)
            .field(name, &joined)
    }

    /// Finalize and produce the content hash.
    pub fn finish(self) -> ContentHash {
        let hash = self.hasher.finalize();
        ContentHash(format!("{hash:x}"))
    }
}
