//! Wiki spaces: the root of the document graph

use crate::block::{Block, BlockType};
use crate::page::Page;
use crate::persist::StoreSlot;
use crate::records::{BlockRecord, PageRecord, WikiRecord, WIKI_CLASS};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use wiki_authorization::PermissionLogic;
use wiki_core::{
    CausalArray, CausalReference, Hashed, Identity, ObjectHash, ObjectStore, WikiError,
    WikiResult, WritersGate,
};

/// Name of the page created by [`WikiSpace::create_welcome_page`]
pub const WELCOME_PAGE: &str = "Welcome";

/// Root of a wiki: owners, permission logic, title and ordered pages
///
/// The permission logic is built once here and shared with every page and
/// block of the space.
pub struct WikiSpace {
    id: ObjectHash,
    permission_logic: Arc<PermissionLogic>,
    title: CausalReference<String>,
    pages: CausalArray<Arc<Page>>,
    store: StoreSlot,
}

impl WikiSpace {
    /// Create a space owned by `owners`
    pub fn new(owners: impl IntoIterator<Item = Identity>, title: impl Into<String>) -> Self {
        let id = ObjectHash::random();
        let space = Self::assemble(
            id,
            Arc::new(PermissionLogic::new(owners)),
            id.derive("title"),
            id.derive("pages"),
        );
        space.title.restore(Some(title.into()));
        space
    }

    fn assemble(
        id: ObjectHash,
        permission_logic: Arc<PermissionLogic>,
        title_id: ObjectHash,
        pages_id: ObjectHash,
    ) -> Self {
        let title_gate = WritersGate::new(permission_logic.owners().iter().cloned());
        Self {
            id,
            title: CausalReference::new(title_id, Arc::new(title_gate)),
            pages: CausalArray::new(pages_id, permission_logic.clone()),
            permission_logic,
            store: StoreSlot::default(),
        }
    }

    /// Load the space stored at `id`, with its pages and blocks
    pub async fn load(store: Arc<dyn ObjectStore>, id: ObjectHash) -> WikiResult<Self> {
        let record: WikiRecord = load_record(store.as_ref(), &id)
            .await?
            .ok_or_else(|| WikiError::not_found(format!("wiki {}", id.short())))?;

        let permission_logic = PermissionLogic::from_record(record.permission_logic);
        if !permission_logic.validate() {
            return Err(WikiError::invalid(format!(
                "wiki {} carries inconsistent permission logic",
                id.short()
            )));
        }

        let space = Self::assemble(
            record.id,
            Arc::new(permission_logic),
            record.title_id,
            record.pages_id,
        );
        if !space.validate() {
            return Err(WikiError::invalid(format!(
                "wiki {} declares foreign derived fields",
                id.short()
            )));
        }

        space.set_store(store);
        space.load_checkpoint().await?;
        Ok(space)
    }

    /// Space address
    pub fn id(&self) -> ObjectHash {
        self.id
    }

    /// Permission logic shared by every node of the space
    pub fn permission_logic(&self) -> &Arc<PermissionLogic> {
        &self.permission_logic
    }

    /// Immutable owner set
    pub fn owners(&self) -> &BTreeSet<Identity> {
        self.permission_logic.owners()
    }

    /// Title reference
    pub fn title_reference(&self) -> &CausalReference<String> {
        &self.title
    }

    /// Current title
    pub fn title(&self) -> Option<String> {
        self.title.value()
    }

    /// Rename the space; only owners are admitted
    pub fn set_title(&self, title: impl Into<String>, actor: Option<&Identity>) -> bool {
        self.title.set_value(title.into(), actor)
    }

    /// Ordered page collection
    pub fn pages(&self) -> &CausalArray<Arc<Page>> {
        &self.pages
    }

    /// Whether `actor` may currently edit this space
    pub fn can_update(&self, actor: Option<&Identity>) -> bool {
        self.permission_logic.can_update(actor)
    }

    /// Bind the store used for persistence by the space and its pages
    pub fn set_store(&self, store: Arc<dyn ObjectStore>) {
        for page in self.pages.contents() {
            page.set_store(store.clone());
            for block in page.blocks().contents() {
                block.set_store(store.clone());
            }
        }
        self.store.set(store);
    }

    /// Build (but do not add) page `name` of this space
    pub fn create_page(&self, name: impl Into<String>) -> Page {
        let page = Page::new(name, self.permission_logic.clone(), self.id);
        if let Some(store) = self.store.get() {
            page.set_store(store);
        }
        page
    }

    /// Page named `name`, if present
    ///
    /// The shared (authorless) page wins; otherwise the first authored page
    /// carrying that name.
    pub fn get_page(&self, name: &str) -> Option<Arc<Page>> {
        self.pages
            .get(&Page::derive_id(self.id, name, None))
            .or_else(|| {
                self.pages
                    .contents()
                    .into_iter()
                    .find(|page| page.name() == name)
            })
    }

    /// Whether a page named `name` is present
    pub fn has_page(&self, name: &str) -> bool {
        self.get_page(name).is_some()
    }

    /// Page named `name`, created on behalf of `actor` when absent
    ///
    /// Returns `None` when the page is absent and `actor` may not add it.
    pub async fn navigate_to(
        &self,
        name: &str,
        actor: Option<&Identity>,
    ) -> WikiResult<Option<Arc<Page>>> {
        if let Some(page) = self.get_page(name) {
            return Ok(Some(page));
        }

        let page = Arc::new(self.create_page(name));
        if !self.pages.push(page.clone(), actor) {
            tracing::debug!(wiki = %self.id.short(), page = name, "page creation not admitted");
            return Ok(None);
        }
        page.save().await?;
        self.save().await?;
        Ok(Some(page))
    }

    /// Append `page` on behalf of `actor`
    ///
    /// Pages built for another space (or under other permission logic) are
    /// refused with [`WikiError::Invalid`]. Returns whether the page was
    /// admitted.
    pub async fn add_page(&self, page: Arc<Page>, actor: Option<&Identity>) -> WikiResult<bool> {
        if page.wiki_hash() != self.id {
            return Err(WikiError::invalid(format!(
                "page {} belongs to wiki {}, not {}",
                page.name(),
                page.wiki_hash().short(),
                self.id.short()
            )));
        }
        if page.permission_logic().hash() != self.permission_logic.hash() {
            return Err(WikiError::invalid(format!(
                "page {} is gated by foreign permission logic",
                page.name()
            )));
        }

        if !self.pages.push(page.clone(), actor) {
            return Ok(false);
        }
        if let Some(store) = self.store.get() {
            page.set_store(store);
        }
        page.save().await?;
        self.save().await?;
        Ok(true)
    }

    /// Move the page at `from` to `to`; returns whether a page was moved
    pub async fn move_page(
        &self,
        from: usize,
        to: usize,
        actor: Option<&Identity>,
    ) -> WikiResult<bool> {
        let Some(page) = self.pages.value_at(from) else {
            return Ok(false);
        };
        if !self.pages.insert_at(page, to, actor) {
            return Ok(false);
        }
        self.save().await?;
        Ok(true)
    }

    /// Remove the page addressed by `page`; removing an absent page is a no-op
    pub async fn remove_page(&self, page: &ObjectHash, actor: Option<&Identity>) -> WikiResult<bool> {
        if !self.pages.delete_element(page, actor) {
            return Ok(false);
        }
        self.save().await?;
        Ok(true)
    }

    /// Create the "Welcome" page with one introductory text block
    ///
    /// The block address is derived from the space address, so peers that
    /// create the welcome page concurrently converge on one block.
    pub async fn create_welcome_page(
        &self,
        title: &str,
        actor: Option<&Identity>,
    ) -> WikiResult<Option<Arc<Page>>> {
        if !self.can_update(actor) {
            tracing::debug!(wiki = %self.id.short(), "welcome page creation not admitted");
            return Ok(None);
        }

        let page = match self.get_page(WELCOME_PAGE) {
            Some(page) => page,
            None => {
                let page = Arc::new(self.create_page(WELCOME_PAGE));
                if !self.pages.push(page.clone(), actor) {
                    return Ok(None);
                }
                page
            }
        };

        let block_id = self.id.derive("welcome-block");
        if page.blocks().contains(&block_id) {
            return Ok(Some(page));
        }

        let block = Arc::new(Block::with_id(
            block_id,
            BlockType::Text,
            self.permission_logic.clone(),
        ));
        if let Some(store) = self.store.get() {
            block.set_store(store);
        }
        if !block.set_value(format!("This is the first page of \"{title}\"."), actor)
            || !page.blocks().push(block.clone(), actor)
        {
            return Ok(None);
        }

        self.save().await?;
        page.save().await?;
        block.save().await?;
        Ok(Some(page))
    }

    /// Admit a page received from a peer
    ///
    /// The record is rebuilt under this space's permission logic and checked
    /// against its declared name and space; invalid records are dropped with
    /// a warning. A page already present is returned as is.
    pub async fn receive_page(
        &self,
        record: PageRecord,
        actor: Option<&Identity>,
    ) -> WikiResult<Option<Arc<Page>>> {
        let page = match Page::from_record(record, self.permission_logic.clone()) {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(wiki = %self.id.short(), error = %e, "rejecting page");
                return Ok(None);
            }
        };
        if page.wiki_hash() != self.id || !page.validate() {
            tracing::warn!(wiki = %self.id.short(), page = %page.id().short(), "rejecting invalid page");
            return Ok(None);
        }

        if let Some(existing) = self.pages.get(&page.id()) {
            return Ok(Some(existing));
        }

        let page = Arc::new(page);
        if !self.pages.push(page.clone(), actor) {
            return Ok(None);
        }
        if let Some(store) = self.store.get() {
            page.set_store(store);
        }
        page.save().await?;
        self.save().await?;
        Ok(Some(page))
    }

    /// Persist the space record (title and page list)
    pub async fn save(&self) -> WikiResult<()> {
        self.store.save(self.id, WIKI_CLASS, &self.record()).await
    }

    /// Persist the space, every page and every block
    pub async fn save_all(&self) -> WikiResult<()> {
        self.save().await?;
        for page in self.pages.contents() {
            page.save_all().await?;
        }
        Ok(())
    }

    /// Replace pages and title with the stored checkpoint
    ///
    /// Every page and block record is validated; invalid or missing ones are
    /// skipped with a warning. The page collection is restored through its
    /// checkpoint entry point, which notifies its watcher. Returns the number
    /// of pages restored.
    pub async fn load_checkpoint(&self) -> WikiResult<usize> {
        let Some(store) = self.store.get() else {
            return Err(WikiError::config(
                "Cannot load checkpoint: a local store has not been configured.",
            ));
        };

        let record: WikiRecord = load_record(store.as_ref(), &self.id)
            .await?
            .ok_or_else(|| WikiError::not_found(format!("wiki {}", self.id.short())))?;
        if record.pages_id != self.pages.id() || record.title_id != self.title.id() {
            return Err(WikiError::invalid(format!(
                "checkpoint for wiki {} declares foreign derived fields",
                self.id.short()
            )));
        }

        let mut pages = Vec::with_capacity(record.pages.len());
        for page_hash in &record.pages {
            if let Some(page) = self.restore_page(&store, page_hash).await? {
                pages.push(Arc::new(page));
            }
        }

        let restored = pages.len();
        self.title.restore(record.title);
        self.pages.restore_checkpoint(pages);
        tracing::debug!(wiki = %self.id.short(), pages = restored, "checkpoint loaded");
        Ok(restored)
    }

    async fn restore_page(
        &self,
        store: &Arc<dyn ObjectStore>,
        hash: &ObjectHash,
    ) -> WikiResult<Option<Page>> {
        let Some(record) = load_record::<PageRecord>(store.as_ref(), hash).await? else {
            tracing::warn!(wiki = %self.id.short(), page = %hash.short(), "page missing from store");
            return Ok(None);
        };

        let block_hashes = record.blocks.clone();
        let page = match Page::from_record(record, self.permission_logic.clone()) {
            Ok(page) if page.wiki_hash() == self.id && page.validate() => page,
            _ => {
                tracing::warn!(wiki = %self.id.short(), page = %hash.short(), "skipping invalid stored page");
                return Ok(None);
            }
        };

        let mut blocks = Vec::with_capacity(block_hashes.len());
        for block_hash in &block_hashes {
            let Some(record) = load_record::<BlockRecord>(store.as_ref(), block_hash).await? else {
                tracing::warn!(page = %hash.short(), block = %block_hash.short(), "block missing from store");
                continue;
            };
            match Block::from_record(record, self.permission_logic.clone()) {
                Ok(block) if block.validate() => {
                    block.set_store(store.clone());
                    blocks.push(Arc::new(block));
                }
                _ => {
                    tracing::warn!(page = %hash.short(), block = %block_hash.short(), "skipping invalid stored block");
                }
            }
        }

        page.blocks().restore_checkpoint(blocks);
        page.set_store(store.clone());
        Ok(Some(page))
    }

    /// Check derived fields against the declared address and owners
    pub fn validate(&self) -> bool {
        self.permission_logic.validate()
            && self.title.id() == self.id.derive("title")
            && self.pages.id() == self.id.derive("pages")
    }

    /// Persistable form
    pub fn record(&self) -> WikiRecord {
        WikiRecord {
            id: self.id,
            permission_logic: self.permission_logic.record(),
            title_id: self.title.id(),
            title: self.title.value(),
            pages_id: self.pages.id(),
            pages: self.pages.contents().iter().map(|p| p.id()).collect(),
        }
    }
}

async fn load_record<T: serde::de::DeserializeOwned>(
    store: &dyn ObjectStore,
    hash: &ObjectHash,
) -> WikiResult<Option<T>> {
    match store.load(hash).await? {
        Some(object) => Ok(Some(object.decode()?)),
        None => Ok(None),
    }
}

impl Hashed for WikiSpace {
    fn hash(&self) -> ObjectHash {
        self.id
    }
}

impl fmt::Debug for WikiSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WikiSpace")
            .field("id", &self.id)
            .field("title", &self.title.value())
            .field("owners", self.permission_logic.owners())
            .field("pages", &self.pages.len())
            .finish_non_exhaustive()
    }
}
