use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// SHA-256 digest of a config file's raw bytes, hex encoded.
///
/// Hashing bytes rather than the parsed document means a formatting-only edit
/// counts as a change, while a byte-identical re-save does not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigHash(String);

impl ConfigHash {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    pub fn of_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::of_bytes(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
