//! Sync lifecycle of one wiki space
//!
//! Desired and actual sync state are two booleans. `start_sync` and
//! `stop_sync` only set the desired state and call [`WikiSync::reconcile`],
//! which brings the actual state into agreement under a try-lock: a caller
//! that finds the lock taken returns at once and the holder picks up the new
//! desired state before it exits.
//!
//! Structural changes observed while running go through the
//! [`EventQueue`] and are applied by [`WikiSync::drain_events`], under its
//! own try-lock. Both paths share one subscription registry, which keeps
//! every mesh subscription unique, and one effects lock: a start or stop
//! pass and the application of a single event never interleave their mesh
//! calls.

use crate::config::SyncConfig;
use crate::queue::{EventQueue, StructuralEvent};
use crate::registry::{PageClaim, SubscriptionRegistry};
use crate::resources::SyncResources;
use crate::session::MeshSession;
use async_lock::Mutex as AsyncMutex;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use wiki_core::{Identity, ObjectHash, SyncTarget, TargetKind, WikiError, WikiResult};
use wiki_model::{Page, WikiSpace};

/// Keeps the mesh subscriptions of a [`WikiSpace`] in line with its graph
pub struct WikiSync {
    space: Arc<WikiSpace>,
    config: SyncConfig,
    resources: SyncResources,

    desired: AtomicBool,
    actual: AtomicBool,
    reconcile_lock: AsyncMutex<()>,
    effects: AsyncMutex<()>,

    session: RwLock<Option<Arc<MeshSession>>>,
    registry: Mutex<SubscriptionRegistry>,
    queue: Arc<EventQueue>,
}

impl WikiSync {
    /// Sync manager for `space`
    pub fn new(space: Arc<WikiSpace>, config: SyncConfig, resources: SyncResources) -> Arc<Self> {
        Arc::new(Self {
            space,
            config,
            resources,
            desired: AtomicBool::new(false),
            actual: AtomicBool::new(false),
            reconcile_lock: AsyncMutex::new(()),
            effects: AsyncMutex::new(()),
            session: RwLock::new(None),
            registry: Mutex::new(SubscriptionRegistry::default()),
            queue: Arc::new(EventQueue::new()),
        })
    }

    /// The synced space
    pub fn space(&self) -> &Arc<WikiSpace> {
        &self.space
    }

    /// Active configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Request sync and reconcile
    pub async fn start_sync(&self) -> WikiResult<()> {
        self.desired.store(true, Ordering::SeqCst);
        self.reconcile().await
    }

    /// Request teardown and reconcile
    pub async fn stop_sync(&self) -> WikiResult<()> {
        self.desired.store(false, Ordering::SeqCst);
        self.reconcile().await
    }

    /// Whether sync is currently running
    pub fn is_synchronizing(&self) -> bool {
        self.actual.load(Ordering::SeqCst)
    }

    /// Whether sync has been requested
    pub fn should_be_synchronizing(&self) -> bool {
        self.desired.load(Ordering::SeqCst)
    }

    /// Bring actual sync state into agreement with desired state
    ///
    /// Returns immediately when another reconciliation is in progress. A
    /// failed pass leaves the actual state unchanged and returns the error;
    /// calling again resumes from what was already subscribed.
    pub async fn reconcile(&self) -> WikiResult<()> {
        loop {
            let Some(guard) = self.reconcile_lock.try_lock() else {
                return Ok(());
            };
            let result = self.reconcile_locked().await;
            drop(guard);
            result?;

            // A desired-state change that landed while we were releasing
            // found the lock taken; pick it up here.
            if self.desired.load(Ordering::SeqCst) == self.actual.load(Ordering::SeqCst) {
                return Ok(());
            }
        }
    }

    async fn reconcile_locked(&self) -> WikiResult<()> {
        let _effects = self.effects.lock().await;
        loop {
            let running = self.actual.load(Ordering::SeqCst);
            if self.desired.load(Ordering::SeqCst) == running {
                if !running && self.session().is_some() {
                    // leftovers of a start that failed part way
                    self.do_stop().await?;
                }
                return Ok(());
            }
            if running {
                self.do_stop().await?;
            } else {
                self.do_start().await?;
            }
            self.actual.store(!running, Ordering::SeqCst);
        }
    }

    async fn do_start(&self) -> WikiResult<()> {
        let identity = self.resources.identity.clone().ok_or_else(|| {
            WikiError::config("Cannot start sync: local identity has not been defined.")
        })?;
        let store = self.resources.store.clone().ok_or_else(|| {
            WikiError::config("Cannot start sync: a local store has not been configured.")
        })?;

        self.space.set_store(store);
        let session = self.open_session(identity);
        tracing::debug!(wiki = %self.space.id().short(), group = %session.group().id, "starting sync");

        for page in self.space.pages().contents() {
            self.subscribe_page(&session, &page).await?;
        }

        if !self.registry.lock().is_broadcasting() {
            session.broadcast(self.space.id()).await?;
            self.registry.lock().set_broadcasting(true);
        }
        for kind in ROOT_TARGETS {
            self.subscribe_root(&session, kind).await?;
        }
        self.arm_space_watch();

        // Pages added or removed between the traversal and arming the watch.
        self.resubscribe_pages(&session).await?;

        tracing::debug!(wiki = %self.space.id().short(), "done starting sync");
        Ok(())
    }

    async fn do_stop(&self) -> WikiResult<()> {
        let Some(session) = self.session() else {
            return Ok(());
        };
        tracing::debug!(wiki = %self.space.id().short(), "stopping sync");

        self.space.pages().unwatch();
        let page_ids = self.registry.lock().page_ids();

        for page_id in &page_ids {
            if let Some(page) = self.registry.lock().page(page_id) {
                page.blocks().unwatch();
            }
            self.unsubscribe_blocks(&session, page_id).await?;
        }
        for page_id in &page_ids {
            self.unsubscribe_page(&session, page_id).await?;
        }

        if self.registry.lock().is_broadcasting() {
            session.stop_broadcast(self.space.id()).await?;
            self.registry.lock().set_broadcasting(false);
        }
        let roots = self.registry.lock().root_kinds();
        for kind in roots {
            session
                .unsubscribe(SyncTarget::new(self.root_hash(kind), kind))
                .await?;
            self.registry.lock().release_root(kind);
        }

        *self.session.write() = None;
        tracing::debug!(wiki = %self.space.id().short(), "done stopping sync");
        Ok(())
    }

    fn open_session(&self, identity: Identity) -> Arc<MeshSession> {
        let mut slot = self.session.write();
        slot.get_or_insert_with(|| {
            Arc::new(MeshSession::open(
                self.resources.mesh.clone(),
                self.space.id(),
                identity,
                &self.config,
            ))
        })
        .clone()
    }

    fn session(&self) -> Option<Arc<MeshSession>> {
        self.session.read().clone()
    }

    fn root_hash(&self, kind: TargetKind) -> ObjectHash {
        let logic = self.space.permission_logic();
        match kind {
            TargetKind::Pages => self.space.pages().id(),
            TargetKind::Moderators => logic.moderators().id(),
            TargetKind::Members => logic.members().id(),
            TargetKind::WriteFlags => logic.write_flags().id(),
            TargetKind::ReadFlags => logic.read_flags().id(),
            TargetKind::Title => self.space.title_reference().id(),
            // per-page targets; never subscribed at space level
            TargetKind::Blocks | TargetKind::Block => self.space.id(),
        }
    }

    async fn subscribe_root(&self, session: &MeshSession, kind: TargetKind) -> WikiResult<()> {
        if !self.registry.lock().claim_root(kind) {
            return Ok(());
        }
        let result = session
            .subscribe(SyncTarget::new(self.root_hash(kind), kind))
            .await;
        if result.is_err() {
            self.registry.lock().release_root(kind);
        }
        result
    }

    /// Subscribe a page's block collection and every block, and arm its watch
    async fn subscribe_page(&self, session: &MeshSession, page: &Arc<Page>) -> WikiResult<()> {
        let claim = self.registry.lock().claim_page(page);
        match claim {
            PageClaim::New => {
                tracing::debug!(wiki = %self.space.id().short(), page = page.name(), "subscribing page");
                let target = SyncTarget::new(page.blocks().id(), TargetKind::Blocks);
                if let Err(e) = session.subscribe(target).await {
                    self.registry.lock().release_page(&page.id());
                    return Err(e);
                }
            }
            PageClaim::Replaced(previous) => {
                previous.blocks().unwatch();
                self.prune_blocks(session, page).await?;
            }
            PageClaim::Existing => {}
        }

        self.arm_page_watch(page);
        for block in page.blocks().contents() {
            self.subscribe_block(session, &page.id(), block.id()).await?;
        }
        Ok(())
    }

    async fn subscribe_block(
        &self,
        session: &MeshSession,
        page: &ObjectHash,
        block: ObjectHash,
    ) -> WikiResult<()> {
        if !self.registry.lock().claim_block(page, block) {
            return Ok(());
        }
        tracing::debug!(page = %page.short(), block = %block.short(), "subscribing block");
        let result = session
            .subscribe(SyncTarget::new(block, TargetKind::Block))
            .await;
        if result.is_err() {
            self.registry.lock().release_block(page, &block);
        }
        result
    }

    async fn unsubscribe_block(
        &self,
        session: &MeshSession,
        page: &ObjectHash,
        block: ObjectHash,
    ) -> WikiResult<()> {
        if !self.registry.lock().is_block_tracked(page, &block) {
            return Ok(());
        }
        tracing::debug!(page = %page.short(), block = %block.short(), "unsubscribing block");
        session
            .unsubscribe(SyncTarget::new(block, TargetKind::Block))
            .await?;
        self.registry.lock().release_block(page, &block);
        Ok(())
    }

    async fn unsubscribe_blocks(&self, session: &MeshSession, page: &ObjectHash) -> WikiResult<()> {
        let blocks = self.registry.lock().blocks_of(page);
        for block in blocks {
            self.unsubscribe_block(session, page, block).await?;
        }
        Ok(())
    }

    /// Tear down a page's block collection; its blocks must already be gone
    async fn unsubscribe_page(&self, session: &MeshSession, page_id: &ObjectHash) -> WikiResult<()> {
        let Some(page) = self.registry.lock().page(page_id) else {
            return Ok(());
        };
        tracing::debug!(wiki = %self.space.id().short(), page = page.name(), "unsubscribing page");
        page.blocks().unwatch();
        session
            .unsubscribe(SyncTarget::new(page.blocks().id(), TargetKind::Blocks))
            .await?;
        self.registry.lock().release_page(page_id);
        Ok(())
    }

    /// Tear down a page and everything under it
    async fn drop_page(&self, session: &MeshSession, page_id: &ObjectHash) -> WikiResult<()> {
        if let Some(page) = self.registry.lock().page(page_id) {
            page.blocks().unwatch();
        }
        self.unsubscribe_blocks(session, page_id).await?;
        self.unsubscribe_page(session, page_id).await
    }

    fn arm_space_watch(&self) {
        let queue = Arc::downgrade(&self.queue);
        self.space.pages().watch(Arc::new(move |event| {
            if let Some(queue) = queue.upgrade() {
                queue.push(StructuralEvent::from_pages(event));
            }
        }));
    }

    fn arm_page_watch(&self, page: &Page) {
        let queue = Arc::downgrade(&self.queue);
        let page_id = page.id();
        page.blocks().watch(Arc::new(move |event| {
            if let Some(queue) = queue.upgrade() {
                queue.push(StructuralEvent::from_blocks(page_id, event));
            }
        }));
    }

    /// Apply every queued structural event, in arrival order
    ///
    /// Returns the number of events applied by this call; 0 when another
    /// drain is already running. A failing event is logged and skipped. Each
    /// event waits for a running start or stop pass to finish, so an event
    /// applied after a stop finds no session and is dropped.
    pub async fn drain_events(&self) -> usize {
        let mut applied = 0;
        loop {
            let Some(mut consumer) = self.queue.try_consume() else {
                return applied;
            };
            while let Some(event) = consumer.pop() {
                if let Err(e) = self.apply_event(&event).await {
                    tracing::warn!(wiki = %self.space.id().short(), ?event, error = %e, "failed to apply structural event");
                }
                applied += 1;
            }
            drop(consumer);

            // Events pushed while we were releasing the consumer.
            if self.queue.pending() == 0 {
                return applied;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Number of structural events waiting to be applied
    pub fn pending_events(&self) -> usize {
        self.queue.pending()
    }

    async fn apply_event(&self, event: &StructuralEvent) -> WikiResult<()> {
        // waits out a start or stop pass; the session is read afterwards
        let _effects = self.effects.lock().await;
        let Some(session) = self.session() else {
            tracing::trace!(wiki = %self.space.id().short(), ?event, "not synchronizing, dropping event");
            return Ok(());
        };

        match event {
            StructuralEvent::PageAdded(page) => self.subscribe_page(&session, page).await,
            StructuralEvent::PageRemoved(page) => self.drop_page(&session, &page.id()).await,
            StructuralEvent::PagesRestored => self.resubscribe_pages(&session).await,
            StructuralEvent::BlockAdded { page, block } => {
                self.subscribe_block(&session, page, block.id()).await
            }
            StructuralEvent::BlockRemoved { page, block } => {
                self.unsubscribe_block(&session, page, block.id()).await
            }
            StructuralEvent::BlocksRestored(page) => self.resubscribe_blocks(&session, page).await,
        }
    }

    async fn resubscribe_pages(&self, session: &MeshSession) -> WikiResult<()> {
        let pages = self.space.pages().contents();
        let current: BTreeSet<ObjectHash> = pages.iter().map(|p| p.id()).collect();

        let stale: Vec<ObjectHash> = self
            .registry
            .lock()
            .page_ids()
            .into_iter()
            .filter(|id| !current.contains(id))
            .collect();
        for page_id in &stale {
            self.drop_page(session, page_id).await?;
        }

        for page in &pages {
            self.subscribe_page(session, page).await?;
        }
        Ok(())
    }

    async fn resubscribe_blocks(&self, session: &MeshSession, page_id: &ObjectHash) -> WikiResult<()> {
        let Some(page) = self.registry.lock().page(page_id) else {
            return Ok(());
        };
        self.prune_blocks(session, &page).await?;
        for block in page.blocks().contents() {
            self.subscribe_block(session, page_id, block.id()).await?;
        }
        Ok(())
    }

    /// Unsubscribe tracked blocks of `page` that it no longer holds
    async fn prune_blocks(&self, session: &MeshSession, page: &Page) -> WikiResult<()> {
        let page_id = page.id();
        let stale: Vec<ObjectHash> = self
            .registry
            .lock()
            .blocks_of(&page_id)
            .into_iter()
            .filter(|id| !page.blocks().contains(id))
            .collect();
        for block in stale {
            self.unsubscribe_block(session, &page_id, block).await?;
        }
        Ok(())
    }

    /// Spawn a task that drains the queue whenever events arrive
    ///
    /// The task holds only a weak reference and ends once this manager is
    /// dropped and another event wakes it.
    pub fn spawn_event_pump(self: &Arc<Self>) -> JoinHandle<()> {
        let sync: Weak<Self> = Arc::downgrade(self);
        let queue = self.queue.clone();
        tokio::spawn(async move {
            loop {
                queue.notified().await;
                let Some(sync) = sync.upgrade() else {
                    break;
                };
                sync.drain_events().await;
            }
        })
    }

    /// Whether `page` currently has a live subscription
    pub fn is_page_subscribed(&self, page: &ObjectHash) -> bool {
        self.registry.lock().is_page_tracked(page)
    }

    /// Whether `block` of `page` currently has a live subscription
    pub fn is_block_subscribed(&self, page: &ObjectHash, block: &ObjectHash) -> bool {
        self.registry.lock().is_block_tracked(page, block)
    }

    /// Number of pages with a live subscription
    pub fn subscribed_pages(&self) -> usize {
        self.registry.lock().page_count()
    }

    /// Number of blocks with a live subscription
    pub fn subscribed_blocks(&self) -> usize {
        self.registry.lock().block_count()
    }

    /// Whether nothing is subscribed or broadcast
    pub fn is_idle(&self) -> bool {
        self.registry.lock().is_empty() && self.session.read().is_none()
    }
}

/// Space-level targets subscribed after the pages, in order
const ROOT_TARGETS: [TargetKind; 6] = [
    TargetKind::Pages,
    TargetKind::Moderators,
    TargetKind::Members,
    TargetKind::WriteFlags,
    TargetKind::ReadFlags,
    TargetKind::Title,
];

impl fmt::Debug for WikiSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WikiSync")
            .field("wiki", &self.space.id())
            .field("desired", &self.should_be_synchronizing())
            .field("actual", &self.is_synchronizing())
            .field("pending_events", &self.pending_events())
            .finish_non_exhaustive()
    }
}
