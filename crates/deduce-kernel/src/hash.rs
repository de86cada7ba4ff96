//! Content hashes for sequents and proof certificates.
//!
//! Two values with the same content hash carry the same substantive
//! content. Fields are fed in a stable order so hashes are deterministic
//! across runs and platforms.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 content hash, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn builder() -> ContentHashBuilder {
        ContentHashBuilder {
            hasher: Sha256::new(),
        }
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incremental content hash builder.
pub struct ContentHashBuilder {
    hasher: Sha256,
}

impl ContentHashBuilder {
    /// Feed a named field.
    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.hasher.update(name.as_bytes());
        self.hasher.update(b":");
        self.hasher.update(value.as_bytes());
        self.hasher.update(b"\n");
        self
    }

    /// Feed every value of a collection under the same field name.
    pub fn fields<I, T>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        values
            .into_iter()
            .fold(self, |builder, value| builder.field(name, &value.to_string()))
    }

    pub fn field_opt(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.field(name, v),
            None => self,
        }
    }

    pub fn finish(self) -> ContentHash {
        let hash = self.hasher.finalize();
        ContentHash(format!("{hash:x}"))
    }
}
