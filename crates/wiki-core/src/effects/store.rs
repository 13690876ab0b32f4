//! Content-addressed object store

use crate::errors::WikiResult;
use crate::hash::ObjectHash;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serialized object keyed by its address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Object address
    pub hash: ObjectHash,
    /// Class tag used to pick the decoder
    pub class_name: String,
    /// Encoded record
    pub payload: Vec<u8>,
}

impl StoredObject {
    /// Encode `record` as JSON under `hash`
    pub fn encode<T: Serialize>(
        hash: ObjectHash,
        class_name: impl Into<String>,
        record: &T,
    ) -> WikiResult<Self> {
        Ok(Self {
            hash,
            class_name: class_name.into(),
            payload: serde_json::to_vec(record)?,
        })
    }

    /// Decode the payload
    pub fn decode<T: DeserializeOwned>(&self) -> WikiResult<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Persistence of objects by address
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Save `object`, replacing any previous version at the same address
    async fn save(&self, object: StoredObject) -> WikiResult<()>;

    /// Load the object at `hash`
    async fn load(&self, hash: &ObjectHash) -> WikiResult<Option<StoredObject>>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<ObjectHash, StoredObject>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Whether an object is stored at `hash`
    pub fn contains(&self, hash: &ObjectHash) -> bool {
        self.objects.read().contains_key(hash)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn save(&self, object: StoredObject) -> WikiResult<()> {
        tracing::trace!(object = %object.hash.short(), class = %object.class_name, "saving object");
        self.objects.write().insert(object.hash, object);
        Ok(())
    }

    async fn load(&self, hash: &ObjectHash) -> WikiResult<Option<StoredObject>> {
        Ok(self.objects.read().get(hash).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    #[tokio::test]
    async fn save_then_load() {
        let store = MemoryStore::new();
        let hash = ObjectHash::of(b"note");
        let note = Note {
            text: "hello".to_string(),
        };

        store
            .save(StoredObject::encode(hash, "note", &note).unwrap())
            .await
            .unwrap();

        let loaded = store.load(&hash).await.unwrap().unwrap();
        assert_eq!(loaded.class_name, "note");
        assert_eq!(loaded.decode::<Note>().unwrap(), note);
        assert!(store.contains(&hash));
        assert!(store.load(&ObjectHash::of(b"missing")).await.unwrap().is_none());
    }
}
