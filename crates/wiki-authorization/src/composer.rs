//! Permission decision rule
//!
//! ```text
//! identity = owners empty                       -> always
//!          | actor in owners                    -> always
//!          | actor given, not owner             -> (flags ∋ members    ∧ actor ∈ members)
//!                                                ∨ (flags ∋ moderators ∧ actor ∈ moderators)
//!          | anonymous                          -> never
//! result   = identity ∨ (flags ∋ everyone)
//! ```
//!
//! Owners are immutable, so branching on them while building is safe; every
//! test against a growable set is a live probe.

use crate::flags::PermFlag;
use std::collections::BTreeSet;
use wiki_core::{membership_of, Authorizer, CausalSet, Identity};

/// Build the authorizer deciding whether `actor` may write
pub fn create_perm_authorizer(
    owners: &BTreeSet<Identity>,
    moderators: &CausalSet<Identity>,
    members: &CausalSet<Identity>,
    flags: &CausalSet<PermFlag>,
    actor: Option<&Identity>,
) -> Authorizer {
    let identity_auth = if owners.is_empty() {
        // no owners: open document
        Authorizer::always()
    } else {
        match actor {
            Some(actor) if owners.contains(actor) => Authorizer::always(),
            Some(actor) => Authorizer::one_of([
                Authorizer::all_of([
                    membership_of(flags, PermFlag::Members),
                    membership_of(members, actor.clone()),
                ]),
                Authorizer::all_of([
                    membership_of(flags, PermFlag::Moderators),
                    membership_of(moderators, actor.clone()),
                ]),
            ]),
            None => Authorizer::never(),
        }
    };

    let anonymous_auth = membership_of(flags, PermFlag::Everyone);

    Authorizer::one_of([identity_auth, anonymous_auth])
}

/// Evaluate the decision rule against current state
pub fn evaluate(
    owners: &BTreeSet<Identity>,
    moderators: &CausalSet<Identity>,
    members: &CausalSet<Identity>,
    flags: &CausalSet<PermFlag>,
    actor: Option<&Identity>,
) -> bool {
    create_perm_authorizer(owners, moderators, members, flags, actor).attempt()
}
