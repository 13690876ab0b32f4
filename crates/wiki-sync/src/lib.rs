//! # Wiki Sync
//!
//! Keeps a live mesh subscription tree consistent with a [`WikiSpace`]'s
//! document graph while the graph changes concurrently:
//!
//! - [`WikiSync`] reconciles desired and actual sync state, subscribing the
//!   space, its permission sets, pages and blocks on start and tearing them
//!   down on stop
//! - [`EventQueue`] serializes structural notifications (child added,
//!   removed, checkpoint restored) for a single consumer
//! - [`SyncConfig`] selects the sync mode, retry policy and call timeout
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wiki_sync::{SyncConfig, SyncResources, WikiSync};
//! # use wiki_core::{Identity, MemoryStore, MeshEffects};
//! # use wiki_model::WikiSpace;
//!
//! # async fn example(mesh: Arc<dyn MeshEffects>) -> wiki_core::WikiResult<()> {
//! let alice = Identity::named("alice");
//! let space = Arc::new(WikiSpace::new([alice.clone()], "Demo"));
//! let resources = SyncResources::new(mesh)
//!     .with_identity(alice)
//!     .with_store(Arc::new(MemoryStore::new()));
//!
//! let sync = WikiSync::new(space, SyncConfig::default(), resources);
//! let _pump = sync.spawn_event_pump();
//! sync.start_sync().await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`WikiSpace`]: wiki_model::WikiSpace

#![forbid(unsafe_code)]

pub mod config;
pub mod lifecycle;
pub mod queue;
mod registry;
pub mod resources;
mod session;

pub use config::{RetryPolicy, SyncConfig};
pub use lifecycle::WikiSync;
pub use queue::{EventQueue, StructuralEvent};
pub use resources::SyncResources;
