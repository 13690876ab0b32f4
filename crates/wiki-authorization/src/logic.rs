//! Shared permission state of a wiki space

use crate::composer::create_perm_authorizer;
use crate::flags::PermFlag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use wiki_core::{Authorizer, CausalSet, Identity, ObjectHash, WriteGate, WritersGate};

/// Class tag for stored permission logic records
pub const PERMISSION_LOGIC_CLASS: &str = "wiki/v0/PermissionLogic";

/// Owners, role sets and flags of one space
///
/// Created once per space and shared (`Arc`) by the space, its pages and
/// blocks. Its address is a function of the owner set alone, and the role and
/// flag sets are derived fields addressed from it.
///
/// Who may change what:
/// - moderators: owners
/// - members: owners and moderators
/// - write and read flags: owners
pub struct PermissionLogic {
    hash: ObjectHash,
    owners: BTreeSet<Identity>,
    moderators: CausalSet<Identity>,
    members: CausalSet<Identity>,
    write_flags: CausalSet<PermFlag>,
    read_flags: CausalSet<PermFlag>,
}

impl PermissionLogic {
    /// Build the permission logic for `owners`
    pub fn new(owners: impl IntoIterator<Item = Identity>) -> Self {
        let owners: BTreeSet<Identity> = owners.into_iter().collect();
        let hash = Self::hash_for_owners(&owners);
        Self::with_declared_hash(hash, owners)
    }

    fn with_declared_hash(hash: ObjectHash, owners: BTreeSet<Identity>) -> Self {
        let owner_gate = || Arc::new(WritersGate::new(owners.iter().cloned()));

        let moderators = CausalSet::new(hash.derive("moderators"), owner_gate());
        let member_gate = if owners.is_empty() {
            // open space: the member set is as open as everything else
            WritersGate::new([])
        } else {
            WritersGate::new(owners.iter().cloned()).with_mutable_writers(moderators.clone())
        };
        let members = CausalSet::new(hash.derive("members"), Arc::new(member_gate));
        let write_flags = CausalSet::new(hash.derive("write-flags"), owner_gate());
        let read_flags = CausalSet::new(hash.derive("read-flags"), owner_gate());

        Self {
            hash,
            owners,
            moderators,
            members,
            write_flags,
            read_flags,
        }
    }

    /// Address derived from an owner set
    pub fn hash_for_owners(owners: &BTreeSet<Identity>) -> ObjectHash {
        let ids: Vec<_> = owners.iter().map(Identity::id).collect();
        let mut parts: Vec<&[u8]> = vec![PERMISSION_LOGIC_CLASS.as_bytes()];
        parts.extend(ids.iter().map(|id| id.as_bytes().as_slice()));
        ObjectHash::of_parts(&parts)
    }

    /// Address of this permission logic
    pub fn hash(&self) -> ObjectHash {
        self.hash
    }

    /// Immutable owner set
    pub fn owners(&self) -> &BTreeSet<Identity> {
        &self.owners
    }

    /// Whether `actor` is an owner
    pub fn is_owner(&self, actor: &Identity) -> bool {
        self.owners.contains(actor)
    }

    /// Moderator set
    pub fn moderators(&self) -> &CausalSet<Identity> {
        &self.moderators
    }

    /// Member set
    pub fn members(&self) -> &CausalSet<Identity> {
        &self.members
    }

    /// Flags consulted for writes
    pub fn write_flags(&self) -> &CausalSet<PermFlag> {
        &self.write_flags
    }

    /// Flags consulted for reads
    pub fn read_flags(&self) -> &CausalSet<PermFlag> {
        &self.read_flags
    }

    /// Live authorizer for a write by `actor`
    pub fn update_authorizer(&self, actor: Option<&Identity>) -> Authorizer {
        create_perm_authorizer(
            &self.owners,
            &self.moderators,
            &self.members,
            &self.write_flags,
            actor,
        )
    }

    /// Live authorizer for a read by `actor`
    pub fn read_authorizer(&self, actor: Option<&Identity>) -> Authorizer {
        create_perm_authorizer(
            &self.owners,
            &self.moderators,
            &self.members,
            &self.read_flags,
            actor,
        )
    }

    /// Whether `actor` may write right now
    pub fn can_update(&self, actor: Option<&Identity>) -> bool {
        self.update_authorizer(actor).attempt()
    }

    /// Whether `actor` may read right now
    pub fn can_read(&self, actor: Option<&Identity>) -> bool {
        self.read_authorizer(actor).attempt()
    }

    /// Persistable form
    pub fn record(&self) -> PermissionLogicRecord {
        PermissionLogicRecord {
            hash: self.hash,
            owners: self.owners.iter().cloned().collect(),
        }
    }

    /// Rebuild from a record, keeping the declared address
    ///
    /// Call [`PermissionLogic::validate`] before trusting the result.
    pub fn from_record(record: PermissionLogicRecord) -> Self {
        Self::with_declared_hash(record.hash, record.owners.into_iter().collect())
    }

    /// Check that the address and derived fields match the owner set
    pub fn validate(&self) -> bool {
        let canonical = Self::new(self.owners.iter().cloned());
        canonical.hash == self.hash
            && canonical.moderators.id() == self.moderators.id()
            && canonical.members.id() == self.members.id()
            && canonical.write_flags.id() == self.write_flags.id()
            && canonical.read_flags.id() == self.read_flags.id()
    }
}

impl WriteGate for PermissionLogic {
    fn write_authorizer(&self, actor: Option<&Identity>) -> Authorizer {
        self.update_authorizer(actor)
    }
}

impl fmt::Debug for PermissionLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionLogic")
            .field("hash", &self.hash)
            .field("owners", &self.owners)
            .field("moderators", &self.moderators)
            .field("members", &self.members)
            .field("write_flags", &self.write_flags)
            .finish_non_exhaustive()
    }
}

/// Stored form of [`PermissionLogic`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLogicRecord {
    /// Declared address
    pub hash: ObjectHash,
    /// Owner set
    pub owners: Vec<Identity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::named("alice")
    }

    #[test]
    fn address_depends_only_on_owners() {
        let a = PermissionLogic::new([alice(), Identity::named("bob")]);
        let b = PermissionLogic::new([Identity::named("bob"), alice()]);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), PermissionLogic::new([alice()]).hash());
    }

    #[test]
    fn only_owners_appoint_moderators() {
        let logic = PermissionLogic::new([alice()]);
        let bob = Identity::named("bob");

        assert!(!logic.moderators().add(bob.clone(), Some(&bob)));
        assert!(logic.moderators().add(bob.clone(), Some(&alice())));
        assert!(logic.moderators().has(&bob));
    }

    #[test]
    fn moderators_may_add_members_but_not_flags() {
        let logic = PermissionLogic::new([alice()]);
        let moderator = Identity::named("mod");
        let carol = Identity::named("carol");
        logic.moderators().add(moderator.clone(), Some(&alice()));

        assert!(logic.members().add(carol.clone(), Some(&moderator)));
        assert!(!logic.write_flags().add(PermFlag::Everyone, Some(&moderator)));
        assert!(!logic.members().add(moderator.clone(), Some(&carol)));
    }

    #[test]
    fn read_and_write_flags_are_independent() {
        let logic = PermissionLogic::new([alice()]);
        logic.read_flags().add(PermFlag::Everyone, Some(&alice()));

        assert!(logic.can_read(None));
        assert!(!logic.can_update(None));
    }

    #[test]
    fn record_round_trip_validates() {
        let logic = PermissionLogic::new([alice()]);
        let rebuilt = PermissionLogic::from_record(logic.record());
        assert!(rebuilt.validate());
        assert_eq!(rebuilt.hash(), logic.hash());
    }

    #[test]
    fn tampered_owner_set_fails_validation() {
        let logic = PermissionLogic::new([alice()]);
        let mut record = logic.record();
        record.owners.push(Identity::named("mallory"));

        assert!(!PermissionLogic::from_record(record).validate());
    }
}
