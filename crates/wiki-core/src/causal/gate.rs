//! Stock write gates

use super::set::CausalSet;
use crate::authorizer::{Authorizer, WriteGate};
use crate::identity::Identity;
use std::collections::BTreeSet;

/// Gate that admits every write
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

impl WriteGate for OpenGate {
    fn write_authorizer(&self, _actor: Option<&Identity>) -> Authorizer {
        Authorizer::always()
    }
}

/// Fixed writers plus an optional, growable set of additional writers
///
/// With no fixed writers and no mutable writer set the gate is open.
#[derive(Debug, Clone)]
pub struct WritersGate {
    writers: BTreeSet<Identity>,
    mutable_writers: Option<CausalSet<Identity>>,
}

impl WritersGate {
    /// Gate restricted to `writers`
    pub fn new(writers: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            writers: writers.into_iter().collect(),
            mutable_writers: None,
        }
    }

    /// Also admit anyone currently in `mutable_writers`
    pub fn with_mutable_writers(mut self, mutable_writers: CausalSet<Identity>) -> Self {
        self.mutable_writers = Some(mutable_writers);
        self
    }
}

impl WriteGate for WritersGate {
    fn write_authorizer(&self, actor: Option<&Identity>) -> Authorizer {
        if self.writers.is_empty() && self.mutable_writers.is_none() {
            return Authorizer::always();
        }

        let Some(actor) = actor else {
            return Authorizer::never();
        };

        if self.writers.contains(actor) {
            return Authorizer::always();
        }

        match &self.mutable_writers {
            Some(set) => set.membership_authorizer(actor.clone()),
            None => Authorizer::never(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::ObjectHash;
    use std::sync::Arc;

    #[test]
    fn empty_gate_is_open() {
        let gate = WritersGate::new([]);
        assert!(gate.write_authorizer(None).attempt());
    }

    #[test]
    fn mutable_writers_are_read_live() {
        let owner = Identity::named("owner");
        let editor = Identity::named("editor");
        let editors = CausalSet::new(ObjectHash::of(b"editors"), Arc::new(OpenGate));
        let gate = WritersGate::new([owner.clone()]).with_mutable_writers(editors.clone());

        let auth = gate.write_authorizer(Some(&editor));
        assert!(!auth.attempt());

        editors.add(editor.clone(), Some(&owner));
        assert!(auth.attempt());
        assert!(gate.write_authorizer(Some(&owner)).attempt());
        assert!(!gate.write_authorizer(None).attempt());
    }
}
