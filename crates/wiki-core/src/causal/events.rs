//! Structural mutation notifications

use crate::hash::ObjectHash;
use std::sync::Arc;

/// What happened to a collection
#[derive(Debug, Clone)]
pub enum MutationAction<T> {
    /// A new element was admitted
    Added(T),
    /// An element was deleted
    Removed(T),
    /// Contents were replaced wholesale from a checkpoint
    Restored,
}

/// Notification emitted by a watched collection
#[derive(Debug, Clone)]
pub struct MutationEvent<T> {
    /// Address of the collection that changed
    pub emitter: ObjectHash,
    /// The change
    pub action: MutationAction<T>,
}

/// Callback installed by `watch`; must not block
pub type Observer<T> = Arc<dyn Fn(MutationEvent<T>) + Send + Sync>;
