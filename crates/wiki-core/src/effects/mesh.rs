//! Mesh effect trait definitions
//!
//! The mesh node owns transport, discovery and causal merge. The wiki only
//! asks it to announce a root object and to keep individual objects in sync
//! with a peer group. Every call must be idempotent when its effect already
//! holds (syncing an already-synced target, stopping a stopped one).

use crate::errors::WikiResult;
use crate::hash::ObjectHash;
use crate::identity::Identity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the mesh should follow a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SyncMode {
    /// Sync the target object only
    #[default]
    Single,
    /// Sync the target and everything it references
    Recursive,
}

/// Which part of the document graph a subscription covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetKind {
    /// A space's ordered page collection
    Pages,
    /// A page's ordered block collection
    Blocks,
    /// A block's content
    Block,
    /// A space's moderator set
    Moderators,
    /// A space's member set
    Members,
    /// A space's write permission flags
    WriteFlags,
    /// A space's read permission flags
    ReadFlags,
    /// A space's title
    Title,
}

/// Object handed to the mesh for syncing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncTarget {
    /// Address of the synced object
    pub hash: ObjectHash,
    /// Role of the object in the document graph
    pub kind: TargetKind,
}

impl SyncTarget {
    /// Create a target
    pub fn new(hash: ObjectHash, kind: TargetKind) -> Self {
        Self { hash, kind }
    }
}

/// Peer group identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerGroupId(pub ObjectHash);

impl fmt::Display for PeerGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0.short())
    }
}

/// Peer group a space is synced with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerGroup {
    /// Group identifier, derived from the space address
    pub id: PeerGroupId,
    /// Local participant
    pub local_peer: Identity,
}

impl PeerGroup {
    /// Peer group for the space at `space`
    pub fn for_space(space: ObjectHash, local_peer: Identity) -> Self {
        Self {
            id: PeerGroupId(space),
            local_peer,
        }
    }
}

/// Mesh operations consumed by the sync lifecycle
#[async_trait]
pub trait MeshEffects: Send + Sync {
    /// Announce `object` so peers can discover it
    async fn broadcast(&self, object: ObjectHash) -> WikiResult<()>;

    /// Stop announcing `object`
    async fn stop_broadcast(&self, object: ObjectHash) -> WikiResult<()>;

    /// Start syncing `target` with `group`
    async fn sync(&self, target: SyncTarget, mode: SyncMode, group: &PeerGroup) -> WikiResult<()>;

    /// Stop syncing `target` with the group identified by `group`
    async fn stop_sync(&self, target: SyncTarget, group: &PeerGroupId) -> WikiResult<()>;
}
