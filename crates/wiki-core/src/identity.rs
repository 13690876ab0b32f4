//! Actor identities
//!
//! An [`Identity`] is an opaque handle supplied by the embedding application.
//! Equality, ordering and hashing use the stable identifier only; the label is
//! informational.

use crate::hash::ObjectHash;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

fn derived_uuid(label: &[u8]) -> Uuid {
    let digest = ObjectHash::of_parts(&[b"identity".as_slice(), label]);
    let mut uuid_bytes = [0u8; 16];
    uuid_bytes.copy_from_slice(&digest.as_bytes()[..16]);
    Uuid::from_bytes(uuid_bytes)
}

/// Stable, comparable, serializable actor handle
#[derive(Clone, Serialize, Deserialize)]
pub struct Identity {
    id: Uuid,
    label: String,
}

impl Identity {
    /// Create a fresh identity with a random identifier
    pub fn generate(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
        }
    }

    /// Create an identity whose identifier is derived from `label`
    ///
    /// Two calls with the same label yield equal identities.
    pub fn named(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            id: derived_uuid(label.as_bytes()),
            label,
        }
    }

    /// Rebuild an identity from a known identifier
    pub fn from_parts(id: Uuid, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }

    /// Stable identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Human-readable label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Content address of this identity
    pub fn object_hash(&self) -> ObjectHash {
        ObjectHash::of_parts(&[b"identity".as_slice(), self.id.as_bytes()])
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Identity {}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({}:{})", self.label, self.id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_label() {
        let alice = Identity::named("alice");
        let relabeled = Identity::from_parts(alice.id(), "Alice (laptop)");
        assert_eq!(alice, relabeled);
    }

    #[test]
    fn named_identities_are_reproducible() {
        assert_eq!(Identity::named("bob"), Identity::named("bob"));
        assert_ne!(Identity::named("bob"), Identity::named("carol"));
    }

    #[test]
    fn generated_identities_are_unique() {
        assert_ne!(Identity::generate("x"), Identity::generate("x"));
    }
}
