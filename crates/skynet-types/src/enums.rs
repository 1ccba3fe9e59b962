//! Enumeration types for the Skynet simulation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Part kinds
// ---------------------------------------------------------------------------

/// A kind of robot part produced by the factory.
///
/// The set is closed. A robot needs exactly one part of every kind.
/// Iteration always follows declaration order (see [`PartKind::ALL`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartKind {
    /// Robot head.
    Head,
    /// Robot torso.
    Torso,
    /// Robot hand.
    Hand,
    /// Robot feet.
    Feet,
}

impl PartKind {
    /// Number of distinct part kinds.
    pub const COUNT: usize = 4;

    /// Every part kind, in the fixed iteration order.
    pub const ALL: [Self; Self::COUNT] = [Self::Head, Self::Torso, Self::Hand, Self::Feet];

    /// Ordinal of this kind within [`PartKind::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Self::Head => 0,
            Self::Torso => 1,
            Self::Hand => 2,
            Self::Feet => 3,
        }
    }

    /// Look up a kind by its ordinal.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Head),
            1 => Some(Self::Torso),
            2 => Some(Self::Hand),
            3 => Some(Self::Feet),
            _ => None,
        }
    }

    /// Human-readable display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Head => "Head",
            Self::Torso => "Torso",
            Self::Hand => "Hand",
            Self::Feet => "Feet",
        }
    }
}

impl core::fmt::Display for PartKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The half of a cycle the simulation is currently in.
///
/// The factory produces during [`Phase::Day`]; factions collect and
/// assemble during [`Phase::Night`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Production phase. Initial phase of every run.
    #[default]
    Day,
    /// Collection and assembly phase.
    Night,
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Day => f.write_str("day"),
            Self::Night => f.write_str("night"),
        }
    }
}
