use super::events::{MutationAction, MutationEvent, Observer};
use crate::authorizer::WriteGate;
use crate::hash::{Hashed, ObjectHash};
use crate::identity::Identity;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

struct ArrayInner<T> {
    id: ObjectHash,
    elements: RwLock<Vec<T>>,
    gate: Arc<dyn WriteGate>,
    observer: RwLock<Option<Observer<T>>>,
}

/// Ordered collection of hashed elements whose writes are gated
///
/// Elements are unique by address. Inserting an element that is already
/// present moves it; no separate delete is needed. Cloning yields another
/// handle to the same array.
pub struct CausalArray<T> {
    inner: Arc<ArrayInner<T>>,
}

impl<T> Clone for CausalArray<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> CausalArray<T>
where
    T: Hashed + Clone + Send + Sync + 'static,
{
    /// Create an empty array at `id` gated by `gate`
    pub fn new(id: ObjectHash, gate: Arc<dyn WriteGate>) -> Self {
        Self {
            inner: Arc::new(ArrayInner {
                id,
                elements: RwLock::new(Vec::new()),
                gate,
                observer: RwLock::new(None),
            }),
        }
    }

    /// Address of this array
    pub fn id(&self) -> ObjectHash {
        self.inner.id
    }

    /// Whether `actor` may currently write
    pub fn can_write(&self, actor: Option<&Identity>) -> bool {
        self.inner.gate.write_authorizer(actor).attempt()
    }

    /// Insert `element` at `index` (clamped to the end) on behalf of `actor`
    ///
    /// Returns whether the write was admitted. An element already present is
    /// moved to `index` and no `Added` notification is emitted for it.
    pub fn insert_at(&self, element: T, index: usize, actor: Option<&Identity>) -> bool {
        if !self.can_write(actor) {
            tracing::trace!(array = %self.inner.id.short(), "insert rejected by write gate");
            return false;
        }

        let address = element.hash();
        let is_new = {
            let mut elements = self.inner.elements.write();
            let existing = elements.iter().position(|e| e.hash() == address);
            if let Some(pos) = existing {
                elements.remove(pos);
            }
            let index = index.min(elements.len());
            elements.insert(index, element.clone());
            existing.is_none()
        };

        if is_new {
            self.emit(MutationAction::Added(element));
        }
        true
    }

    /// Append `element` on behalf of `actor`
    pub fn push(&self, element: T, actor: Option<&Identity>) -> bool {
        self.insert_at(element, usize::MAX, actor)
    }

    /// Delete the element addressed by `address` on behalf of `actor`
    ///
    /// Returns true only when the write was admitted and the element existed.
    pub fn delete_element(&self, address: &ObjectHash, actor: Option<&Identity>) -> bool {
        if !self.can_write(actor) {
            tracing::trace!(array = %self.inner.id.short(), "delete rejected by write gate");
            return false;
        }

        let removed = {
            let mut elements = self.inner.elements.write();
            elements
                .iter()
                .position(|e| e.hash() == *address)
                .map(|pos| elements.remove(pos))
        };

        match removed {
            Some(element) => {
                self.emit(MutationAction::Removed(element));
                true
            }
            None => false,
        }
    }

    /// Replace the contents from a checkpoint
    ///
    /// Checkpoints come from the substrate's own storage and are not re-gated.
    /// Duplicate addresses keep their first occurrence. Emits `Restored`.
    pub fn restore_checkpoint(&self, contents: Vec<T>) {
        {
            let mut elements = self.inner.elements.write();
            elements.clear();
            for element in contents {
                let address = element.hash();
                if !elements.iter().any(|e| e.hash() == address) {
                    elements.push(element);
                }
            }
        }
        self.emit(MutationAction::Restored);
    }

    /// Element at `index`
    pub fn value_at(&self, index: usize) -> Option<T> {
        self.inner.elements.read().get(index).cloned()
    }

    /// Element addressed by `address`
    pub fn get(&self, address: &ObjectHash) -> Option<T> {
        self.inner
            .elements
            .read()
            .iter()
            .find(|e| e.hash() == *address)
            .cloned()
    }

    /// Position of the element addressed by `address`
    pub fn position_of(&self, address: &ObjectHash) -> Option<usize> {
        self.inner
            .elements
            .read()
            .iter()
            .position(|e| e.hash() == *address)
    }

    /// Membership test by address
    pub fn contains(&self, address: &ObjectHash) -> bool {
        self.position_of(address).is_some()
    }

    /// Snapshot of current contents in order
    pub fn contents(&self) -> Vec<T> {
        self.inner.elements.read().clone()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.inner.elements.read().len()
    }

    /// Whether the array is empty
    pub fn is_empty(&self) -> bool {
        self.inner.elements.read().is_empty()
    }

    /// Arm the structural watch, replacing any previous observer
    pub fn watch(&self, observer: Observer<T>) {
        *self.inner.observer.write() = Some(observer);
    }

    /// Disarm the structural watch
    pub fn unwatch(&self) {
        *self.inner.observer.write() = None;
    }

    /// Whether a structural watch is armed
    pub fn is_watched(&self) -> bool {
        self.inner.observer.read().is_some()
    }

    fn emit(&self, action: MutationAction<T>) {
        // Observer runs outside every lock so it may read this array.
        let observer = self.inner.observer.read().clone();
        if let Some(observer) = observer {
            observer(MutationEvent {
                emitter: self.inner.id,
                action,
            });
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CausalArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CausalArray")
            .field("id", &self.inner.id)
            .field("elements", &*self.inner.elements.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::causal::{OpenGate, WritersGate};
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(&'static str);

    impl Hashed for Item {
        fn hash(&self) -> ObjectHash {
            ObjectHash::of(self.0.as_bytes())
        }
    }

    fn open_array() -> CausalArray<Item> {
        CausalArray::new(ObjectHash::of(b"array"), Arc::new(OpenGate))
    }

    fn recorder(array: &CausalArray<Item>) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        array.watch(Arc::new(move |ev: MutationEvent<Item>| {
            let entry = match ev.action {
                MutationAction::Added(item) => format!("+{}", item.0),
                MutationAction::Removed(item) => format!("-{}", item.0),
                MutationAction::Restored => "restored".to_string(),
            };
            sink.lock().push(entry);
        }));
        log
    }

    #[test]
    fn reinsertion_moves_without_duplicating() {
        let array = open_array();
        array.push(Item("a"), None);
        array.push(Item("b"), None);
        array.push(Item("c"), None);

        assert!(array.insert_at(Item("c"), 0, None));
        assert_eq!(array.contents(), vec![Item("c"), Item("a"), Item("b")]);
        assert_eq!(array.len(), 3);
    }

    #[test]
    fn move_emits_no_added_event() {
        let array = open_array();
        let log = recorder(&array);
        array.push(Item("a"), None);
        array.push(Item("b"), None);
        array.insert_at(Item("a"), 1, None);

        assert_eq!(*log.lock(), vec!["+a".to_string(), "+b".to_string()]);
    }

    #[test]
    fn delete_twice_is_safe() {
        let array = open_array();
        let log = recorder(&array);
        array.push(Item("a"), None);

        assert!(array.delete_element(&Item("a").hash(), None));
        assert!(!array.delete_element(&Item("a").hash(), None));
        assert_eq!(*log.lock(), vec!["+a".to_string(), "-a".to_string()]);
    }

    #[test]
    fn gated_writes_are_not_admitted() {
        let owner = Identity::named("owner");
        let array: CausalArray<Item> = CausalArray::new(
            ObjectHash::of(b"gated"),
            Arc::new(WritersGate::new([owner.clone()])),
        );
        let log = recorder(&array);

        assert!(!array.push(Item("a"), Some(&Identity::named("guest"))));
        assert!(array.is_empty());
        assert!(log.lock().is_empty());

        assert!(array.push(Item("a"), Some(&owner)));
        assert_eq!(array.value_at(0), Some(Item("a")));
    }

    #[test]
    fn restore_replaces_contents_and_notifies() {
        let array = open_array();
        array.push(Item("old"), None);
        let log = recorder(&array);

        array.restore_checkpoint(vec![Item("x"), Item("y"), Item("x")]);
        assert_eq!(array.contents(), vec![Item("x"), Item("y")]);
        assert_eq!(*log.lock(), vec!["restored".to_string()]);
    }

    #[test]
    fn unwatched_arrays_stay_silent() {
        let array = open_array();
        let log = recorder(&array);
        array.unwatch();
        assert!(!array.is_watched());
        array.push(Item("a"), None);
        assert!(log.lock().is_empty());
    }
}
