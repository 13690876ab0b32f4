//! Permission flags

use serde::{Deserialize, Serialize};
use std::fmt;

/// Flag selecting which roles may write (or read)
///
/// The enum is the whole domain: a flag set cannot hold anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermFlag {
    /// Members may write
    Members,
    /// Moderators may write
    Moderators,
    /// Owners may write (owners always can; kept for parity with read flags)
    Owners,
    /// Anyone, including anonymous actors, may write
    Everyone,
}

impl PermFlag {
    /// Every flag
    pub const ALL: [PermFlag; 4] = [
        PermFlag::Members,
        PermFlag::Moderators,
        PermFlag::Owners,
        PermFlag::Everyone,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            PermFlag::Members => "members",
            PermFlag::Moderators => "moderators",
            PermFlag::Owners => "owners",
            PermFlag::Everyone => "everyone",
        }
    }
}

impl fmt::Display for PermFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
