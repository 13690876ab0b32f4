use crate::authorizer::WriteGate;
use crate::hash::ObjectHash;
use crate::identity::Identity;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

struct ReferenceInner<T> {
    id: ObjectHash,
    value: RwLock<Option<T>>,
    gate: Arc<dyn WriteGate>,
}

/// Single mutable value whose writes are gated
pub struct CausalReference<T> {
    inner: Arc<ReferenceInner<T>>,
}

impl<T> Clone for CausalReference<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> CausalReference<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an unset reference at `id` gated by `gate`
    pub fn new(id: ObjectHash, gate: Arc<dyn WriteGate>) -> Self {
        Self {
            inner: Arc::new(ReferenceInner {
                id,
                value: RwLock::new(None),
                gate,
            }),
        }
    }

    /// Address of this reference
    pub fn id(&self) -> ObjectHash {
        self.inner.id
    }

    /// Whether `actor` may currently write
    pub fn can_write(&self, actor: Option<&Identity>) -> bool {
        self.inner.gate.write_authorizer(actor).attempt()
    }

    /// Set the value on behalf of `actor`; returns whether the write was admitted
    pub fn set_value(&self, value: T, actor: Option<&Identity>) -> bool {
        if !self.can_write(actor) {
            tracing::trace!(reference = %self.inner.id.short(), "update rejected by write gate");
            return false;
        }
        *self.inner.value.write() = Some(value);
        true
    }

    /// Load a value from a checkpoint without gating
    pub fn restore(&self, value: Option<T>) {
        *self.inner.value.write() = value;
    }

    /// Current value
    pub fn value(&self) -> Option<T> {
        self.inner.value.read().clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for CausalReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CausalReference")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::causal::WritersGate;

    #[test]
    fn only_writers_update() {
        let owner = Identity::named("owner");
        let title = CausalReference::new(
            ObjectHash::of(b"title"),
            Arc::new(WritersGate::new([owner.clone()])),
        );

        assert!(!title.set_value("defaced".to_string(), Some(&Identity::named("guest"))));
        assert_eq!(title.value(), None);

        assert!(title.set_value("Handbook".to_string(), Some(&owner)));
        assert_eq!(title.value().as_deref(), Some("Handbook"));
    }
}
