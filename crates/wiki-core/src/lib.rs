//! # Wiki Core - Layer 1: Foundation
//!
//! Foundation types shared by every wiki crate:
//! - [`Identity`] actor handles and [`ObjectHash`] content addresses
//! - The unified [`WikiError`] type
//! - The [`Authorizer`] expression tree and the [`WriteGate`] hook
//! - Causal collection substrate contracts ([`CausalSet`], [`CausalArray`],
//!   [`CausalReference`]) with local, single-replica implementations
//! - Effect traits for the external store and mesh collaborators
//!
//! ## Design Principles
//!
//! - **Live evaluation**: authorizers read role state at `attempt()` time and
//!   are never cached
//! - **Gated writes**: every collection mutation, local or remote, passes its
//!   write gate before it is admitted
//! - **Boundary only**: merge semantics, transport and storage engines live
//!   outside this workspace; the traits here are the seams

#![forbid(unsafe_code)]

pub mod authorizer;
pub mod causal;
pub mod effects;
pub mod errors;
pub mod hash;
pub mod identity;

pub use authorizer::{Authorizer, WriteGate};
pub use causal::{
    membership_of, CausalArray, CausalReference, CausalSet, MutationAction, MutationEvent,
    Observer, OpenGate, WritersGate,
};
pub use effects::{
    MemoryStore, MeshEffects, ObjectStore, PeerGroup, PeerGroupId, StoredObject, SyncMode,
    SyncTarget, TargetKind,
};
pub use errors::{WikiError, WikiResult};
pub use hash::{Hashed, ObjectHash};
pub use identity::Identity;
