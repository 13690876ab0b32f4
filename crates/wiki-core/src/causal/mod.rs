//! Causal collection substrate
//!
//! Local, single-replica implementations of the collection contracts the wiki
//! consumes: a growable set, an ordered array and a single-value reference.
//! Merging concurrent operations from several replicas is the substrate's job
//! and is not modelled here; what is modelled is the part the wiki depends on:
//!
//! - every mutation passes the collection's [`WriteGate`](crate::WriteGate)
//!   before it is admitted, with the authorizer evaluated at that moment;
//! - collections are shared handles, so probes built from them read live state;
//! - arrays report structural changes to an optional observer ("watch").

mod array;
mod events;
mod gate;
mod reference;
mod set;

pub use array::CausalArray;
pub use events::{MutationAction, MutationEvent, Observer};
pub use gate::{OpenGate, WritersGate};
pub use reference::CausalReference;
pub use set::{membership_of, CausalSet};
