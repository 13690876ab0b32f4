//! Optional store binding shared by every node of the graph

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use wiki_core::{ObjectHash, ObjectStore, StoredObject, WikiResult};

#[derive(Default)]
pub(crate) struct StoreSlot {
    store: RwLock<Option<Arc<dyn ObjectStore>>>,
}

impl StoreSlot {
    pub(crate) fn get(&self) -> Option<Arc<dyn ObjectStore>> {
        self.store.read().clone()
    }

    pub(crate) fn set(&self, store: Arc<dyn ObjectStore>) {
        *self.store.write() = Some(store);
    }

    pub(crate) fn is_set(&self) -> bool {
        self.store.read().is_some()
    }

    /// Encode and save `record`; an unbound node has nothing to persist
    pub(crate) async fn save<T: Serialize>(
        &self,
        hash: ObjectHash,
        class_name: &str,
        record: &T,
    ) -> WikiResult<()> {
        // Clone the handle out so no guard is held across the await.
        let Some(store) = self.get() else {
            tracing::trace!(object = %hash.short(), class = class_name, "no store bound, skipping save");
            return Ok(());
        };
        store
            .save(StoredObject::encode(hash, class_name, record)?)
            .await
    }
}
