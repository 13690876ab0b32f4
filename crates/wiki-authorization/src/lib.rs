//! # Wiki Authorization
//!
//! Decides, at the moment of each write attempt, whether an actor may mutate
//! an object of a wiki space.
//!
//! A space has an immutable owner set fixed at creation, two growable role
//! sets (moderators, members) and a flag set selecting which roles are enough
//! to write. [`PermissionLogic`] bundles them and is shared by reference with
//! every page and block of the space; it is the only place permissions are
//! evaluated.
//!
//! The decision rule lives in [`create_perm_authorizer`]. It produces a live
//! [`Authorizer`](wiki_core::Authorizer): role and flag changes made after the
//! authorizer was built are visible to its next `attempt()`.

#![forbid(unsafe_code)]

pub mod composer;
pub mod flags;
pub mod logic;

pub use composer::{create_perm_authorizer, evaluate};
pub use flags::PermFlag;
pub use logic::{PermissionLogic, PermissionLogicRecord};
