//! Content addressing
//!
//! Every wiki object is addressed by a 32-byte SHA-256 digest. Derived fields
//! (a page's block list, a space's member set) get addresses computed from
//! their parent's address and the field name, so they are reproducible from
//! declared fields alone.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Separator placed between hashed parts
const PART_SEPARATOR: &[u8] = b"/";

/// 32-byte content address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHash(pub [u8; 32]);

impl ObjectHash {
    /// Hash arbitrary bytes
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self::from_digest(&hasher.finalize())
    }

    /// Hash several parts joined by the part separator
    pub fn of_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                hasher.update(PART_SEPARATOR);
            }
            hasher.update(part);
        }
        Self::from_digest(&hasher.finalize())
    }

    fn from_digest(digest: &[u8]) -> Self {
        let mut output = [0u8; 32];
        output.copy_from_slice(digest);
        Self(output)
    }

    /// Address of a derived field owned by `self`
    pub fn derive(&self, field: &str) -> Self {
        Self::of_parts(&[self.0.as_slice(), field.as_bytes()])
    }

    /// Fresh random address, for objects whose identity is not content-derived
    pub fn random() -> Self {
        Self::of(uuid::Uuid::new_v4().as_bytes())
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated hex form used in log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHash({})", self.short())
    }
}

/// Objects with a stable content address
pub trait Hashed {
    /// The object's address
    fn hash(&self) -> ObjectHash;
}

impl<T: Hashed + ?Sized> Hashed for Arc<T> {
    fn hash(&self) -> ObjectHash {
        (**self).hash()
    }
}
