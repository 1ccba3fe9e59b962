//! Final simulation result and per-faction reports.
//!
//! A [`SimulationResult`] is produced exactly once, after every participant
//! has stopped. It holds snapshots, never live references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{FactionId, RunId};
use crate::inventory::Inventory;

/// Label used when no faction strictly out-builds every other.
pub const TIE_LABEL: &str = "Tie";

/// Frozen state of one faction at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionReport {
    /// Dense faction index.
    pub id: FactionId,
    /// Display name (e.g. `"World"`).
    pub label: String,
    /// Robots completed over the whole run.
    pub robots: u32,
    /// Leftover parts that never formed a complete robot.
    pub inventory: Inventory,
    /// Parts granted to this faction by the factory's fair-share ledger.
    pub parts_collected: u64,
}

/// Who won the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Outcome {
    /// A single faction built strictly more robots than each other faction.
    Winner(String),
    /// The top robot count is shared (or there are no factions).
    Tie,
}

impl Outcome {
    /// Decide the outcome from the final reports.
    ///
    /// The faction with the unique strict maximum robot count wins; any
    /// shared maximum is a tie. With two factions this is the plain
    /// "strictly greater" comparison.
    pub fn decide(reports: &[FactionReport]) -> Self {
        let Some(best) = reports.iter().map(|report| report.robots).max() else {
            return Self::Tie;
        };
        let mut leaders = reports.iter().filter(|report| report.robots == best);
        match (leaders.next(), leaders.next()) {
            (Some(leader), None) => Self::Winner(leader.label.clone()),
            _ => Self::Tie,
        }
    }

    /// Winner label, or `"Tie"`.
    pub fn label(&self) -> &str {
        match self {
            Self::Winner(label) => label,
            Self::Tie => TIE_LABEL,
        }
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Winner(label) => label,
            Outcome::Tie => TIE_LABEL.to_owned(),
        }
    }
}

impl From<String> for Outcome {
    fn from(label: String) -> Self {
        if label == TIE_LABEL {
            Self::Tie
        } else {
            Self::Winner(label)
        }
    }
}

impl core::fmt::Display for Outcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Summary record emitted once per completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Identifier of this run.
    pub run_id: RunId,
    /// Winning faction label or tie.
    pub winner: Outcome,
    /// One report per faction, in faction index order.
    pub factions: Vec<FactionReport>,
    /// Value of the day counter when the run ended.
    pub days_elapsed: u32,
    /// Total parts the factory produced.
    pub parts_produced: u64,
    /// Parts still sitting in the factory pool.
    pub parts_remaining: u64,
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end of the run.
    pub finished_at: DateTime<Utc>,
}

impl SimulationResult {
    /// Look up a faction report by label.
    pub fn faction(&self, label: &str) -> Option<&FactionReport> {
        self.factions.iter().find(|report| report.label == label)
    }

    /// Robots built by the faction with the given label.
    pub fn robots_of(&self, label: &str) -> Option<u32> {
        self.faction(label).map(|report| report.robots)
    }

    /// Final inventory of the faction with the given label.
    pub fn inventory_of(&self, label: &str) -> Option<Inventory> {
        self.faction(label).map(|report| report.inventory)
    }

    /// Robots built across all factions.
    pub fn total_robots(&self) -> u64 {
        self.factions
            .iter()
            .map(|report| u64::from(report.robots))
            .sum()
    }

    /// Parts held in faction inventories at the end of the run.
    pub fn leftover_parts(&self) -> u64 {
        self.factions
            .iter()
            .map(|report| report.inventory.total())
            .sum()
    }
}
