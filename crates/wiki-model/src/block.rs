//! Content blocks

use crate::persist::StoreSlot;
use crate::records::{BlockRecord, BLOCK_CLASS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use wiki_authorization::PermissionLogic;
use wiki_core::{
    CausalReference, Hashed, Identity, ObjectHash, ObjectStore, WikiError, WikiResult,
};

/// Kind of content a block holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    /// Heading
    Title,
    /// Free text
    #[default]
    Text,
    /// Image reference
    Image,
}

/// Single piece of page content
///
/// A block owns one mutable content value gated by the permission logic of
/// its space.
pub struct Block {
    id: ObjectHash,
    block_type: BlockType,
    permission_logic: Arc<PermissionLogic>,
    content: CausalReference<String>,
    store: StoreSlot,
}

impl Block {
    /// Create a block at a fresh random address
    pub fn new(block_type: BlockType, permission_logic: Arc<PermissionLogic>) -> Self {
        Self::with_id(ObjectHash::random(), block_type, permission_logic)
    }

    /// Create a block at a chosen address
    ///
    /// Used when concurrent creators must converge on the same block.
    pub fn with_id(
        id: ObjectHash,
        block_type: BlockType,
        permission_logic: Arc<PermissionLogic>,
    ) -> Self {
        Self::assemble(id, block_type, permission_logic, id.derive("content"))
    }

    fn assemble(
        id: ObjectHash,
        block_type: BlockType,
        permission_logic: Arc<PermissionLogic>,
        content_id: ObjectHash,
    ) -> Self {
        let content = CausalReference::new(content_id, permission_logic.clone());
        Self {
            id,
            block_type,
            permission_logic,
            content,
            store: StoreSlot::default(),
        }
    }

    /// Block address
    pub fn id(&self) -> ObjectHash {
        self.id
    }

    /// Kind of content
    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    /// Permission logic gating this block
    pub fn permission_logic(&self) -> &Arc<PermissionLogic> {
        &self.permission_logic
    }

    /// Content reference
    pub fn content(&self) -> &CausalReference<String> {
        &self.content
    }

    /// Current content
    pub fn value(&self) -> Option<String> {
        self.content.value()
    }

    /// Replace the content on behalf of `actor`; returns whether it was admitted
    pub fn set_value(&self, value: impl Into<String>, actor: Option<&Identity>) -> bool {
        self.content.set_value(value.into(), actor)
    }

    /// Whether `actor` may currently edit this block
    pub fn can_update(&self, actor: Option<&Identity>) -> bool {
        self.permission_logic.can_update(actor)
    }

    /// Bind the store used by [`Block::save`]
    pub fn set_store(&self, store: Arc<dyn ObjectStore>) {
        self.store.set(store);
    }

    /// Persist the block to the bound store
    pub async fn save(&self) -> WikiResult<()> {
        self.store.save(self.id, BLOCK_CLASS, &self.record()).await
    }

    /// Check that derived fields match the declared ones
    pub fn validate(&self) -> bool {
        let canonical = Self::with_id(self.id, self.block_type, self.permission_logic.clone());
        canonical.content.id() == self.content.id() && self.permission_logic.validate()
    }

    /// Persistable form
    pub fn record(&self) -> BlockRecord {
        BlockRecord {
            id: self.id,
            block_type: self.block_type,
            permission_logic: self.permission_logic.hash(),
            content_id: self.content.id(),
            content: self.content.value(),
        }
    }

    /// Rebuild a block from `record` under `permission_logic`
    ///
    /// Fails when the record names a different permission logic. Derived
    /// addresses are taken as declared; call [`Block::validate`] before
    /// admitting the result.
    pub fn from_record(
        record: BlockRecord,
        permission_logic: Arc<PermissionLogic>,
    ) -> WikiResult<Self> {
        if record.permission_logic != permission_logic.hash() {
            return Err(WikiError::invalid(format!(
                "block {} is gated by foreign permission logic {}",
                record.id.short(),
                record.permission_logic.short()
            )));
        }

        let block = Self::assemble(
            record.id,
            record.block_type,
            permission_logic,
            record.content_id,
        );
        block.content.restore(record.content);
        Ok(block)
    }
}

impl Hashed for Block {
    fn hash(&self) -> ObjectHash {
        self.id
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.id)
            .field("block_type", &self.block_type)
            .field("content", &self.content.value())
            .field("stored", &self.store.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logic() -> Arc<PermissionLogic> {
        Arc::new(PermissionLogic::new([Identity::named("alice")]))
    }

    #[test]
    fn only_permitted_actors_edit_content() {
        let block = Block::new(BlockType::Text, logic());
        let alice = Identity::named("alice");

        assert!(!block.set_value("hi", Some(&Identity::named("bob"))));
        assert_eq!(block.value(), None);
        assert!(block.set_value("hi", Some(&alice)));
        assert_eq!(block.value().as_deref(), Some("hi"));
    }

    #[test]
    fn record_round_trip_keeps_content_and_validates() {
        let logic = logic();
        let block = Block::new(BlockType::Image, logic.clone());
        block.set_value("cat.png", Some(&Identity::named("alice")));

        let rebuilt = Block::from_record(block.record(), logic).unwrap();
        assert!(rebuilt.validate());
        assert_eq!(rebuilt.id(), block.id());
        assert_eq!(rebuilt.block_type(), BlockType::Image);
        assert_eq!(rebuilt.value().as_deref(), Some("cat.png"));
    }

    #[test]
    fn forged_content_address_fails_validation() {
        let logic = logic();
        let mut record = Block::new(BlockType::Text, logic.clone()).record();
        record.content_id = ObjectHash::of(b"elsewhere");

        assert!(!Block::from_record(record, logic).unwrap().validate());
    }

    #[test]
    fn foreign_permission_logic_is_refused() {
        let record = Block::new(BlockType::Text, logic()).record();
        let other = Arc::new(PermissionLogic::new([Identity::named("mallory")]));

        let err = Block::from_record(record, other).unwrap_err();
        assert!(matches!(err, WikiError::Invalid { .. }));
    }
}
