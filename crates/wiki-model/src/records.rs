//! Persisted and exchanged forms of the document graph
//!
//! Records carry every declared field, derived addresses included, so a
//! receiver can rebuild the canonical object and compare.

use crate::block::BlockType;
use serde::{Deserialize, Serialize};
use wiki_authorization::PermissionLogicRecord;
use wiki_core::{Identity, ObjectHash};

/// Class tag for stored spaces
pub const WIKI_CLASS: &str = "wiki/v0/WikiSpace";
/// Class tag for stored pages
pub const PAGE_CLASS: &str = "wiki/v0/Page";
/// Class tag for stored blocks
pub const BLOCK_CLASS: &str = "wiki/v0/Block";

/// Stored form of a [`WikiSpace`](crate::WikiSpace)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiRecord {
    /// Space address
    pub id: ObjectHash,
    /// Permission logic shared by the whole space
    pub permission_logic: PermissionLogicRecord,
    /// Address of the title reference
    pub title_id: ObjectHash,
    /// Current title
    pub title: Option<String>,
    /// Address of the page collection
    pub pages_id: ObjectHash,
    /// Page addresses in order
    pub pages: Vec<ObjectHash>,
}

/// Stored form of a [`Page`](crate::Page)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Declared page address
    pub id: ObjectHash,
    /// Page name
    pub name: String,
    /// Address of the owning space
    pub wiki_hash: ObjectHash,
    /// Address of the permission logic the page is gated by
    pub permission_logic: ObjectHash,
    /// Author, when the page was created with one
    pub author: Option<Identity>,
    /// Address of the block collection
    pub blocks_id: ObjectHash,
    /// Block addresses in order
    pub blocks: Vec<ObjectHash>,
}

/// Stored form of a [`Block`](crate::Block)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Block address
    pub id: ObjectHash,
    /// Kind of content
    pub block_type: BlockType,
    /// Address of the permission logic the block is gated by
    pub permission_logic: ObjectHash,
    /// Address of the content reference
    pub content_id: ObjectHash,
    /// Current content
    pub content: Option<String>,
}
