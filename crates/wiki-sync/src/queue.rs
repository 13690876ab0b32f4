//! Structural mutation event queue
//!
//! Collection observers run synchronously inside the mutating call, so they
//! only push onto this queue. A single consumer, guarded by a try-lock,
//! pops events in arrival order and applies their sync effects.

use async_lock::{Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use wiki_core::{MutationAction, MutationEvent, ObjectHash};
use wiki_model::{Block, Page};

/// Structural change observed in the document graph
#[derive(Clone)]
pub enum StructuralEvent {
    /// A page was added to the space
    PageAdded(Arc<Page>),
    /// A page was removed from the space
    PageRemoved(Arc<Page>),
    /// The page collection was replaced from a checkpoint
    PagesRestored,
    /// A block was added to a page
    BlockAdded {
        /// Address of the page
        page: ObjectHash,
        /// The new block
        block: Arc<Block>,
    },
    /// A block was removed from a page
    BlockRemoved {
        /// Address of the page
        page: ObjectHash,
        /// The removed block
        block: Arc<Block>,
    },
    /// A page's block collection was replaced from a checkpoint
    BlocksRestored(ObjectHash),
}

impl StructuralEvent {
    /// Translate a page collection notification
    pub fn from_pages(event: MutationEvent<Arc<Page>>) -> Self {
        match event.action {
            MutationAction::Added(page) => Self::PageAdded(page),
            MutationAction::Removed(page) => Self::PageRemoved(page),
            MutationAction::Restored => Self::PagesRestored,
        }
    }

    /// Translate a notification from the block collection of `page`
    pub fn from_blocks(page: ObjectHash, event: MutationEvent<Arc<Block>>) -> Self {
        match event.action {
            MutationAction::Added(block) => Self::BlockAdded { page, block },
            MutationAction::Removed(block) => Self::BlockRemoved { page, block },
            MutationAction::Restored => Self::BlocksRestored(page),
        }
    }
}

impl fmt::Debug for StructuralEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageAdded(page) => write!(f, "PageAdded({})", page.id().short()),
            Self::PageRemoved(page) => write!(f, "PageRemoved({})", page.id().short()),
            Self::PagesRestored => f.write_str("PagesRestored"),
            Self::BlockAdded { page, block } => {
                write!(f, "BlockAdded({}/{})", page.short(), block.id().short())
            }
            Self::BlockRemoved { page, block } => {
                write!(f, "BlockRemoved({}/{})", page.short(), block.id().short())
            }
            Self::BlocksRestored(page) => write!(f, "BlocksRestored({})", page.short()),
        }
    }
}

/// Unbounded FIFO of structural events with a single drain consumer
pub struct EventQueue {
    sender: mpsc::UnboundedSender<StructuralEvent>,
    receiver: Mutex<mpsc::UnboundedReceiver<StructuralEvent>>,
    pending: AtomicUsize,
    notify: Notify,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            pending: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    /// Append `event` without blocking and wake the consumer
    pub fn push(&self, event: StructuralEvent) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(event)) = self.sender.send(event) {
            // the receiver is owned by the queue and never closed while it lives
            self.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::trace!(?event, "queue closed, dropping event");
            return;
        }
        self.notify.notify_one();
    }

    /// Number of events pushed but not yet taken
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Become the consumer, unless another drain is running
    pub(crate) fn try_consume(&self) -> Option<Consumer<'_>> {
        self.receiver.try_lock().map(|receiver| Consumer {
            receiver,
            pending: &self.pending,
        })
    }

    /// Wait until an event is pushed
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to the queue's receiving end
pub(crate) struct Consumer<'a> {
    receiver: MutexGuard<'a, mpsc::UnboundedReceiver<StructuralEvent>>,
    pending: &'a AtomicUsize,
}

impl Consumer<'_> {
    /// Pop the oldest event, if any
    pub(crate) fn pop(&mut self) -> Option<StructuralEvent> {
        let event = self.receiver.try_recv().ok()?;
        self.pending.fetch_sub(1, Ordering::SeqCst);
        Some(event)
    }
}
