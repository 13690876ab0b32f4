//! Effect traits for external collaborators
//!
//! - **Store**: content-addressed persistence of serialized objects
//! - **Mesh**: broadcast and subscription against a peer group
//!
//! Implementations live outside the core; [`MemoryStore`] is the in-process
//! store used by tests and embedders that do not need durability.

mod mesh;
mod store;

pub use mesh::{MeshEffects, PeerGroup, PeerGroupId, SyncMode, SyncTarget, TargetKind};
pub use store::{MemoryStore, ObjectStore, StoredObject};
