//! Collaborators the sync lifecycle runs against

use std::fmt;
use std::sync::Arc;
use wiki_core::{Identity, MeshEffects, ObjectStore};

/// Local identity, store and mesh handle
///
/// Identity and store are optional so that a misconfigured embedder gets a
/// configuration error from `start_sync` instead of a panic.
#[derive(Clone)]
pub struct SyncResources {
    /// Local peer identity
    pub identity: Option<Identity>,
    /// Local object store
    pub store: Option<Arc<dyn ObjectStore>>,
    /// Mesh node
    pub mesh: Arc<dyn MeshEffects>,
}

impl SyncResources {
    /// Resources with only a mesh configured
    pub fn new(mesh: Arc<dyn MeshEffects>) -> Self {
        Self {
            identity: None,
            store: None,
            mesh,
        }
    }

    /// Set the local identity
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Set the local store
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }
}

impl fmt::Debug for SyncResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncResources")
            .field("identity", &self.identity)
            .field("store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}
