//! # Wiki Model
//!
//! The replicated document graph: a [`WikiSpace`] holds an ordered list of
//! [`Page`]s, each holding an ordered list of [`Block`]s. Every node shares
//! the space's single [`PermissionLogic`](wiki_authorization::PermissionLogic)
//! and routes all write gating through it.
//!
//! Graph operations report authorization outcomes as values (`bool`,
//! `Option`); errors are reserved for storage failures and objects that do
//! not belong to the space.
//!
//! Objects arriving from peers or from storage are rebuilt from their
//! declared fields and validated before being admitted.

#![forbid(unsafe_code)]

pub mod block;
pub mod page;
mod persist;
pub mod records;
pub mod space;

pub use block::{Block, BlockType};
pub use page::Page;
pub use records::{BlockRecord, PageRecord, WikiRecord, BLOCK_CLASS, PAGE_CLASS, WIKI_CLASS};
pub use space::{WikiSpace, WELCOME_PAGE};
