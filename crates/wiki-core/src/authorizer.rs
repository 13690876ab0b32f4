//! Authorizer algebra
//!
//! An [`Authorizer`] is a small boolean expression tree. Leaves are either
//! constants or live probes that read current role-set state when
//! [`Authorizer::attempt`] runs. Nothing is cached: the sets behind a probe may
//! change between two attempts, and each attempt sees the change.

use crate::identity::Identity;
use std::fmt;
use std::sync::Arc;

/// Live predicate evaluated at attempt time
pub type Probe = Arc<dyn Fn() -> bool + Send + Sync>;

/// Composable, side-effect-free write predicate
#[derive(Clone)]
pub enum Authorizer {
    /// Always admits
    Always,
    /// Never admits
    Never,
    /// Admits when every member admits (short-circuits on the first denial)
    AllOf(Vec<Authorizer>),
    /// Admits when any member admits (short-circuits on the first admission)
    OneOf(Vec<Authorizer>),
    /// Admits when the probe currently returns true
    Probe(Probe),
}

impl Authorizer {
    /// Constant admission
    pub fn always() -> Self {
        Self::Always
    }

    /// Constant denial
    pub fn never() -> Self {
        Self::Never
    }

    /// Conjunction of `authorizers`; empty conjunction admits
    pub fn all_of(authorizers: impl IntoIterator<Item = Authorizer>) -> Self {
        Self::AllOf(authorizers.into_iter().collect())
    }

    /// Disjunction of `authorizers`; empty disjunction denies
    pub fn one_of(authorizers: impl IntoIterator<Item = Authorizer>) -> Self {
        Self::OneOf(authorizers.into_iter().collect())
    }

    /// Leaf backed by a live predicate
    pub fn probe<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self::Probe(Arc::new(predicate))
    }

    /// Evaluate against current state
    pub fn attempt(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::AllOf(members) => members.iter().all(Authorizer::attempt),
            Self::OneOf(members) => members.iter().any(Authorizer::attempt),
            Self::Probe(predicate) => predicate(),
        }
    }
}

impl fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "Always"),
            Self::Never => write!(f, "Never"),
            Self::AllOf(members) => f.debug_tuple("AllOf").field(members).finish(),
            Self::OneOf(members) => f.debug_tuple("OneOf").field(members).finish(),
            Self::Probe(_) => write!(f, "Probe(..)"),
        }
    }
}

/// Pluggable write-authorizer hook consulted by causal collections
///
/// Collections call [`WriteGate::write_authorizer`] for every mutation attempt,
/// local or remote, and admit the mutation only if the returned authorizer
/// admits.
pub trait WriteGate: Send + Sync {
    /// Build the authorizer for a write by `actor` (`None` for anonymous)
    fn write_authorizer(&self, actor: Option<&Identity>) -> Authorizer;
}
