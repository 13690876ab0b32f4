//! Bookkeeping of what is currently subscribed
//!
//! Entries are claimed before the mesh call and released when the call fails
//! or the target is torn down, so concurrent paths (initial traversal and the
//! event queue) never subscribe the same object twice.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use wiki_core::{ObjectHash, TargetKind};
use wiki_model::Page;

/// Outcome of claiming a page
pub(crate) enum PageClaim {
    /// The page was not tracked
    New,
    /// The same page object is already tracked
    Existing,
    /// A different object with the same address was tracked (after a
    /// checkpoint restore); it is returned so its watch can be disarmed
    Replaced(Arc<Page>),
}

struct PageEntry {
    page: Arc<Page>,
    blocks: BTreeSet<ObjectHash>,
}

/// Subscribed pages with their blocks, root aggregates and broadcast state
#[derive(Default)]
pub struct SubscriptionRegistry {
    pages: BTreeMap<ObjectHash, PageEntry>,
    roots: BTreeSet<TargetKind>,
    broadcasting: bool,
}

impl SubscriptionRegistry {
    pub(crate) fn claim_page(&mut self, page: &Arc<Page>) -> PageClaim {
        if let Some(entry) = self.pages.get_mut(&page.id()) {
            if Arc::ptr_eq(&entry.page, page) {
                return PageClaim::Existing;
            }
            return PageClaim::Replaced(std::mem::replace(&mut entry.page, page.clone()));
        }

        self.pages.insert(
            page.id(),
            PageEntry {
                page: page.clone(),
                blocks: BTreeSet::new(),
            },
        );
        PageClaim::New
    }

    pub(crate) fn release_page(&mut self, page: &ObjectHash) -> Option<Arc<Page>> {
        self.pages.remove(page).map(|entry| entry.page)
    }

    /// Claim `block` of `page`; false when already claimed or the page is not
    /// tracked
    pub(crate) fn claim_block(&mut self, page: &ObjectHash, block: ObjectHash) -> bool {
        self.pages
            .get_mut(page)
            .is_some_and(|entry| entry.blocks.insert(block))
    }

    pub(crate) fn release_block(&mut self, page: &ObjectHash, block: &ObjectHash) -> bool {
        self.pages
            .get_mut(page)
            .is_some_and(|entry| entry.blocks.remove(block))
    }

    pub(crate) fn claim_root(&mut self, kind: TargetKind) -> bool {
        self.roots.insert(kind)
    }

    pub(crate) fn release_root(&mut self, kind: TargetKind) -> bool {
        self.roots.remove(&kind)
    }

    pub(crate) fn root_kinds(&self) -> Vec<TargetKind> {
        self.roots.iter().copied().collect()
    }

    pub(crate) fn set_broadcasting(&mut self, broadcasting: bool) -> bool {
        std::mem::replace(&mut self.broadcasting, broadcasting)
    }

    pub(crate) fn page(&self, page: &ObjectHash) -> Option<Arc<Page>> {
        self.pages.get(page).map(|entry| entry.page.clone())
    }

    pub(crate) fn page_ids(&self) -> Vec<ObjectHash> {
        self.pages.keys().copied().collect()
    }

    pub(crate) fn blocks_of(&self, page: &ObjectHash) -> Vec<ObjectHash> {
        self.pages
            .get(page)
            .map(|entry| entry.blocks.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `page` is tracked
    pub fn is_page_tracked(&self, page: &ObjectHash) -> bool {
        self.pages.contains_key(page)
    }

    /// Whether `block` of `page` is tracked
    pub fn is_block_tracked(&self, page: &ObjectHash, block: &ObjectHash) -> bool {
        self.pages
            .get(page)
            .is_some_and(|entry| entry.blocks.contains(block))
    }

    /// Number of tracked pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of tracked blocks across all pages
    pub fn block_count(&self) -> usize {
        self.pages.values().map(|entry| entry.blocks.len()).sum()
    }

    /// Whether the space itself is being broadcast
    pub fn is_broadcasting(&self) -> bool {
        self.broadcasting
    }

    /// Whether nothing at all is tracked
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.roots.is_empty() && !self.broadcasting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiki_authorization::PermissionLogic;
    use wiki_core::Identity;

    fn page(name: &str) -> Arc<Page> {
        let logic = Arc::new(PermissionLogic::new([Identity::named("alice")]));
        Arc::new(Page::new(name, logic, ObjectHash::of(b"wiki")))
    }

    #[test]
    fn blocks_need_a_tracked_page() {
        let mut registry = SubscriptionRegistry::default();
        let ideas = page("Ideas");
        let block = ObjectHash::of(b"block");

        assert!(!registry.claim_block(&ideas.id(), block));
        assert!(matches!(registry.claim_page(&ideas), PageClaim::New));
        assert!(registry.claim_block(&ideas.id(), block));
        assert!(!registry.claim_block(&ideas.id(), block));
        assert_eq!(registry.block_count(), 1);
    }

    #[test]
    fn reclaiming_distinguishes_same_and_replaced_objects() {
        let mut registry = SubscriptionRegistry::default();
        let first = page("Ideas");
        let twin = page("Ideas");

        registry.claim_page(&first);
        assert!(matches!(registry.claim_page(&first), PageClaim::Existing));
        match registry.claim_page(&twin) {
            PageClaim::Replaced(old) => assert!(Arc::ptr_eq(&old, &first)),
            _ => panic!("expected replacement"),
        }
        assert_eq!(registry.page_count(), 1);
    }

    #[test]
    fn releasing_a_page_drops_its_blocks() {
        let mut registry = SubscriptionRegistry::default();
        let ideas = page("Ideas");
        registry.claim_page(&ideas);
        registry.claim_block(&ideas.id(), ObjectHash::of(b"a"));
        registry.claim_root(TargetKind::Pages);

        assert!(registry.release_page(&ideas.id()).is_some());
        assert!(registry.release_page(&ideas.id()).is_none());
        assert_eq!(registry.block_count(), 0);
        assert!(!registry.is_empty());
        assert!(registry.release_root(TargetKind::Pages));
        assert!(registry.is_empty());
    }
}
