use crate::authorizer::{Authorizer, WriteGate};
use crate::hash::ObjectHash;
use crate::identity::Identity;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

struct SetInner<T> {
    id: ObjectHash,
    elements: RwLock<BTreeSet<T>>,
    gate: Arc<dyn WriteGate>,
}

/// Growable set whose writes are gated
///
/// Cloning yields another handle to the same set.
pub struct CausalSet<T> {
    inner: Arc<SetInner<T>>,
}

impl<T> Clone for CausalSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> CausalSet<T>
where
    T: Ord + Clone + Send + Sync + 'static,
{
    /// Create an empty set at `id` gated by `gate`
    pub fn new(id: ObjectHash, gate: Arc<dyn WriteGate>) -> Self {
        Self {
            inner: Arc::new(SetInner {
                id,
                elements: RwLock::new(BTreeSet::new()),
                gate,
            }),
        }
    }

    /// Address of this set
    pub fn id(&self) -> ObjectHash {
        self.inner.id
    }

    /// Whether `actor` may currently write
    pub fn can_write(&self, actor: Option<&Identity>) -> bool {
        self.inner.gate.write_authorizer(actor).attempt()
    }

    /// Add `element` on behalf of `actor`; returns whether the write was admitted
    pub fn add(&self, element: T, actor: Option<&Identity>) -> bool {
        if !self.can_write(actor) {
            tracing::trace!(set = %self.inner.id.short(), "add rejected by write gate");
            return false;
        }
        self.inner.elements.write().insert(element);
        true
    }

    /// Delete `element` on behalf of `actor`; returns whether the write was admitted
    pub fn delete(&self, element: &T, actor: Option<&Identity>) -> bool {
        if !self.can_write(actor) {
            tracing::trace!(set = %self.inner.id.short(), "delete rejected by write gate");
            return false;
        }
        self.inner.elements.write().remove(element);
        true
    }

    /// Membership test against current state
    pub fn has(&self, element: &T) -> bool {
        self.inner.elements.read().contains(element)
    }

    /// Snapshot of current members
    pub fn values(&self) -> Vec<T> {
        self.inner.elements.read().iter().cloned().collect()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.inner.elements.read().len()
    }

    /// Whether the set has no members
    pub fn is_empty(&self) -> bool {
        self.inner.elements.read().is_empty()
    }

    /// Authorizer admitting while `element` is a member
    pub fn membership_authorizer(&self, element: T) -> Authorizer {
        let set = self.clone();
        Authorizer::probe(move || set.has(&element))
    }
}

/// Authorizer admitting while `element` is in `set`
pub fn membership_of<T>(set: &CausalSet<T>, element: T) -> Authorizer
where
    T: Ord + Clone + Send + Sync + 'static,
{
    set.membership_authorizer(element)
}

impl<T: fmt::Debug> fmt::Debug for CausalSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CausalSet")
            .field("id", &self.inner.id)
            .field("elements", &*self.inner.elements.read())
            .finish()
    }
}
