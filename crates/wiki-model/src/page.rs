//! Pages and their block collections

use crate::block::{Block, BlockType};
use crate::persist::StoreSlot;
use crate::records::{BlockRecord, PageRecord, PAGE_CLASS};
use std::fmt;
use std::sync::Arc;
use wiki_authorization::PermissionLogic;
use wiki_core::{
    CausalArray, Hashed, Identity, ObjectHash, ObjectStore, WikiError, WikiResult,
};

/// Named, ordered list of blocks inside a space
///
/// A page's address is a pure function of the space address, its name and
/// (when set) its author, so two peers creating "Ideas" in the same space
/// independently produce the same page.
pub struct Page {
    id: ObjectHash,
    name: String,
    wiki_hash: ObjectHash,
    author: Option<Identity>,
    permission_logic: Arc<PermissionLogic>,
    blocks: CausalArray<Arc<Block>>,
    store: StoreSlot,
}

impl Page {
    /// Create page `name` of the space at `wiki_hash`
    pub fn new(
        name: impl Into<String>,
        permission_logic: Arc<PermissionLogic>,
        wiki_hash: ObjectHash,
    ) -> Self {
        let name = name.into();
        let id = Self::derive_id(wiki_hash, &name, None);
        Self::assemble(id, name, wiki_hash, None, permission_logic, id.derive("blocks"))
    }

    fn assemble(
        id: ObjectHash,
        name: String,
        wiki_hash: ObjectHash,
        author: Option<Identity>,
        permission_logic: Arc<PermissionLogic>,
        blocks_id: ObjectHash,
    ) -> Self {
        let blocks = CausalArray::new(blocks_id, permission_logic.clone());
        Self {
            id,
            name,
            wiki_hash,
            author,
            permission_logic,
            blocks,
            store: StoreSlot::default(),
        }
    }

    /// Address of page `name` in the space at `wiki_hash`
    pub fn derive_id(wiki_hash: ObjectHash, name: &str, author: Option<&Identity>) -> ObjectHash {
        match author {
            None => ObjectHash::of_parts(&[wiki_hash.as_bytes().as_slice(), name.as_bytes()]),
            Some(author) => ObjectHash::of_parts(&[
                wiki_hash.as_bytes().as_slice(),
                name.as_bytes(),
                author.id().as_bytes().as_slice(),
            ]),
        }
    }

    /// Record `author` as the page's creator and re-derive its address
    pub fn set_author(&mut self, author: Identity) {
        self.author = Some(author);
        self.rederive();
    }

    /// Move the page to the space at `wiki_hash` and re-derive its address
    pub fn set_wiki_hash(&mut self, wiki_hash: ObjectHash) {
        self.wiki_hash = wiki_hash;
        self.rederive();
    }

    fn rederive(&mut self) {
        self.id = Self::derive_id(self.wiki_hash, &self.name, self.author.as_ref());
        let contents = self.blocks.contents();
        self.blocks = CausalArray::new(self.id.derive("blocks"), self.permission_logic.clone());
        self.blocks.restore_checkpoint(contents);
    }

    /// Page address
    pub fn id(&self) -> ObjectHash {
        self.id
    }

    /// Page name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address of the owning space
    pub fn wiki_hash(&self) -> ObjectHash {
        self.wiki_hash
    }

    /// Creator, if recorded
    pub fn author(&self) -> Option<&Identity> {
        self.author.as_ref()
    }

    /// Permission logic gating this page
    pub fn permission_logic(&self) -> &Arc<PermissionLogic> {
        &self.permission_logic
    }

    /// Ordered block collection
    pub fn blocks(&self) -> &CausalArray<Arc<Block>> {
        &self.blocks
    }

    /// Block addressed by `block`
    pub fn block(&self, block: &ObjectHash) -> Option<Arc<Block>> {
        self.blocks.get(block)
    }

    /// Whether `actor` may currently edit this page
    pub fn can_update(&self, actor: Option<&Identity>) -> bool {
        self.permission_logic.can_update(actor)
    }

    /// Bind the store used by [`Page::save`] and by blocks created later
    pub fn set_store(&self, store: Arc<dyn ObjectStore>) {
        self.store.set(store);
    }

    /// Add a new block of `block_type` at `index` (append when `None`)
    ///
    /// Returns the block when `actor` was admitted, `None` otherwise.
    pub async fn add_block(
        &self,
        index: Option<usize>,
        block_type: BlockType,
        actor: Option<&Identity>,
    ) -> WikiResult<Option<Arc<Block>>> {
        let block = Arc::new(Block::new(block_type, self.permission_logic.clone()));
        if let Some(store) = self.store.get() {
            block.set_store(store);
        }

        let admitted = match index {
            Some(index) => self.blocks.insert_at(block.clone(), index, actor),
            None => self.blocks.push(block.clone(), actor),
        };
        if !admitted {
            tracing::debug!(page = %self.id.short(), "block insertion not admitted");
            return Ok(None);
        }

        self.save().await?;
        block.save().await?;
        Ok(Some(block))
    }

    /// Move the block at `from` to `to`
    ///
    /// Returns whether a block was moved. An out of range `from` is a no-op.
    pub async fn move_block(
        &self,
        from: usize,
        to: usize,
        actor: Option<&Identity>,
    ) -> WikiResult<bool> {
        let Some(block) = self.blocks.value_at(from) else {
            return Ok(false);
        };
        if !self.blocks.insert_at(block, to, actor) {
            return Ok(false);
        }
        self.save().await?;
        Ok(true)
    }

    /// Remove the block addressed by `block`
    ///
    /// Returns whether a block was removed; removing an absent block is a
    /// no-op.
    pub async fn remove_block(
        &self,
        block: &ObjectHash,
        actor: Option<&Identity>,
    ) -> WikiResult<bool> {
        if !self.blocks.delete_element(block, actor) {
            return Ok(false);
        }
        self.save().await?;
        Ok(true)
    }

    /// Admit a block received from a peer
    ///
    /// The record is rebuilt under this page's permission logic and
    /// validated first; invalid records are dropped with a warning.
    pub async fn receive_block(
        &self,
        record: BlockRecord,
        actor: Option<&Identity>,
    ) -> WikiResult<Option<Arc<Block>>> {
        let block = match Block::from_record(record, self.permission_logic.clone()) {
            Ok(block) if block.validate() => Arc::new(block),
            Ok(block) => {
                tracing::warn!(page = %self.id.short(), block = %block.id().short(), "rejecting invalid block");
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(page = %self.id.short(), error = %e, "rejecting block");
                return Ok(None);
            }
        };

        if let Some(existing) = self.blocks.get(&block.id()) {
            return Ok(Some(existing));
        }
        if let Some(store) = self.store.get() {
            block.set_store(store);
        }
        if !self.blocks.push(block.clone(), actor) {
            return Ok(None);
        }
        self.save().await?;
        block.save().await?;
        Ok(Some(block))
    }

    /// Persist the page (its block list, not the blocks themselves)
    pub async fn save(&self) -> WikiResult<()> {
        self.store.save(self.id, PAGE_CLASS, &self.record()).await
    }

    /// Persist the page and every block it holds
    pub async fn save_all(&self) -> WikiResult<()> {
        self.save().await?;
        for block in self.blocks.contents() {
            block.save().await?;
        }
        Ok(())
    }

    /// Check the declared address against name, space and author
    ///
    /// Content (the blocks) does not participate.
    pub fn validate(&self) -> bool {
        let mut canonical = Self::new(
            self.name.clone(),
            self.permission_logic.clone(),
            self.wiki_hash,
        );
        if let Some(author) = &self.author {
            canonical.set_author(author.clone());
        }

        canonical.id == self.id
            && canonical.blocks.id() == self.blocks.id()
            && self.permission_logic.validate()
    }

    /// Persistable form
    pub fn record(&self) -> PageRecord {
        PageRecord {
            id: self.id,
            name: self.name.clone(),
            wiki_hash: self.wiki_hash,
            permission_logic: self.permission_logic.hash(),
            author: self.author.clone(),
            blocks_id: self.blocks.id(),
            blocks: self.blocks.contents().iter().map(|b| b.id()).collect(),
        }
    }

    /// Rebuild an empty page from `record` under `permission_logic`
    ///
    /// Blocks are restored separately. Addresses are taken as declared; call
    /// [`Page::validate`] before admitting the result.
    pub fn from_record(
        record: PageRecord,
        permission_logic: Arc<PermissionLogic>,
    ) -> WikiResult<Self> {
        if record.permission_logic != permission_logic.hash() {
            return Err(WikiError::invalid(format!(
                "page {} is gated by foreign permission logic {}",
                record.id.short(),
                record.permission_logic.short()
            )));
        }

        Ok(Self::assemble(
            record.id,
            record.name,
            record.wiki_hash,
            record.author,
            permission_logic,
            record.blocks_id,
        ))
    }
}

impl Hashed for Page {
    fn hash(&self) -> ObjectHash {
        self.id
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("wiki_hash", &self.wiki_hash)
            .field("author", &self.author)
            .field("blocks", &self.blocks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiki_core::MemoryStore;

    fn alice() -> Identity {
        Identity::named("alice")
    }

    fn page(name: &str) -> Page {
        let logic = Arc::new(PermissionLogic::new([alice()]));
        Page::new(name, logic, ObjectHash::of(b"wiki"))
    }

    #[test]
    fn author_and_space_participate_in_address() {
        let mut page = page("Ideas");
        let plain = page.id();

        page.set_author(alice());
        assert_ne!(page.id(), plain);
        assert_eq!(page.blocks().id(), page.id().derive("blocks"));
        assert!(page.validate());

        page.set_wiki_hash(ObjectHash::of(b"other wiki"));
        assert!(page.validate());
        assert_eq!(
            page.id(),
            Page::derive_id(ObjectHash::of(b"other wiki"), "Ideas", Some(&alice()))
        );
    }

    #[tokio::test]
    async fn denied_block_insertion_leaves_page_untouched() {
        let page = page("Ideas");
        let added = page
            .add_block(None, BlockType::Text, Some(&Identity::named("bob")))
            .await
            .unwrap();

        assert!(added.is_none());
        assert!(page.blocks().is_empty());
    }

    #[tokio::test]
    async fn moving_blocks_reorders_without_duplicates() {
        let page = page("Ideas");
        let a = page.add_block(None, BlockType::Title, Some(&alice())).await.unwrap().unwrap();
        let b = page.add_block(None, BlockType::Text, Some(&alice())).await.unwrap().unwrap();
        let c = page.add_block(Some(0), BlockType::Image, Some(&alice())).await.unwrap().unwrap();

        let order = |p: &Page| p.blocks().contents().iter().map(|x| x.id()).collect::<Vec<_>>();
        assert_eq!(order(&page), vec![c.id(), a.id(), b.id()]);

        assert!(page.move_block(0, 2, Some(&alice())).await.unwrap());
        assert_eq!(order(&page), vec![a.id(), b.id(), c.id()]);
        assert!(!page.move_block(7, 0, Some(&alice())).await.unwrap());
    }

    #[tokio::test]
    async fn blocks_added_later_inherit_the_store() {
        let store = Arc::new(MemoryStore::new());
        let page = page("Ideas");
        page.set_store(store.clone());

        let block = page.add_block(None, BlockType::Text, Some(&alice())).await.unwrap().unwrap();
        assert!(store.contains(&page.id()));
        assert!(store.contains(&block.id()));
    }

    #[tokio::test]
    async fn received_blocks_are_validated_then_gated() {
        let page = page("Ideas");
        let logic = page.permission_logic().clone();

        let mut forged = Block::new(BlockType::Text, logic.clone()).record();
        forged.content_id = ObjectHash::of(b"forged");
        assert!(page.receive_block(forged, Some(&alice())).await.unwrap().is_none());

        let honest = Block::new(BlockType::Text, logic).record();
        assert!(page
            .receive_block(honest.clone(), Some(&Identity::named("bob")))
            .await
            .unwrap()
            .is_none());
        assert!(page.receive_block(honest, Some(&alice())).await.unwrap().is_some());
        assert_eq!(page.blocks().len(), 1);
    }
}
