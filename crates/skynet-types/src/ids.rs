//! Identifiers used across the simulation.
//!
//! Factions are addressed by a dense zero-based index because the fair-share
//! ledger and the rendezvous slots are both fixed-size tables. Whole runs are
//! tagged with a UUID v7 so log lines and emitted results can be correlated.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one simulation run (UUID v7, time-ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Allocate a fresh run id stamped with the current time.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying [`Uuid`].
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "run-{}", self.0.simple())
    }
}

/// Dense zero-based index of a faction (`0..F`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactionId(pub usize);

impl FactionId {
    /// Return the zero-based index of this faction.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl core::fmt::Display for FactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "faction-{}", self.0)
    }
}

impl From<usize> for FactionId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// A party to the day/night rendezvous.
///
/// There is always exactly one [`Participant::Factory`] and one
/// [`Participant::Faction`] per configured faction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Participant {
    /// The single producer.
    Factory,
    /// One of the consumers.
    Faction(FactionId),
}

impl Participant {
    /// Return the rendezvous slot for this participant.
    ///
    /// The factory always occupies slot 0; faction `i` occupies slot `i + 1`.
    /// Returns `None` only for an index at `usize::MAX`.
    pub const fn slot(self) -> Option<usize> {
        match self {
            Self::Factory => Some(0),
            Self::Faction(id) => id.0.checked_add(1),
        }
    }
}

impl core::fmt::Display for Participant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Factory => f.write_str("factory"),
            Self::Faction(id) => write!(f, "{id}"),
        }
    }
}
