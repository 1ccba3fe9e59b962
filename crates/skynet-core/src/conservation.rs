//! Part conservation check for a finished run.
//!
//! Parts are created only by the factory and destroyed only by robot
//! assembly, four at a time. At the end of a run:
//!
//! ```text
//! produced == pooled + sum(held by factions) + 4 * sum(robots)
//! ```
//!
//! Each faction must also account for everything the factory ledger says it
//! received:
//!
//! ```text
//! ledger[f] == held[f] + 4 * robots[f]
//! ```
//!
//! Both hold by construction; a violation means parts were duplicated or
//! lost somewhere and the result must not be published.

use serde::Serialize;
use skynet_types::{FactionId, FactionReport, PartKind};

/// The result of a conservation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// Every part is accounted for.
    Balanced,
    /// Parts are missing or duplicated.
    Anomaly(ConservationAnomaly),
}

/// Details of a failed conservation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConservationAnomaly {
    /// Parts the factory produced.
    pub produced: u64,
    /// Parts still in the factory pool.
    pub pooled: u64,
    /// Parts held in faction inventories.
    pub held: u64,
    /// Parts consumed by robot assembly.
    pub assembled: u64,
    /// Factions whose ledger total disagrees with what they hold and built.
    pub unbalanced_factions: Vec<FactionId>,
}

impl core::fmt::Display for ConservationAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "produced {} != pooled {} + held {} + assembled {}",
            self.produced, self.pooled, self.held, self.assembled
        )?;
        if !self.unbalanced_factions.is_empty() {
            write!(f, " (unbalanced factions: {:?})", self.unbalanced_factions)?;
        }
        Ok(())
    }
}

/// Parts consumed by `robots` complete robots.
pub fn parts_in_robots(robots: u32) -> u64 {
    u64::from(robots).saturating_mul(as_u64(PartKind::COUNT))
}

/// Verify part conservation for a finished run.
pub fn verify(produced: u64, pooled: u64, reports: &[FactionReport]) -> ConservationResult {
    let held = reports
        .iter()
        .fold(0_u64, |total, report| total.saturating_add(report.inventory.total()));
    let assembled = reports.iter().fold(0_u64, |total, report| {
        total.saturating_add(parts_in_robots(report.robots))
    });

    let unbalanced_factions: Vec<FactionId> = reports
        .iter()
        .filter(|report| {
            report.parts_collected
                != report
                    .inventory
                    .total()
                    .saturating_add(parts_in_robots(report.robots))
        })
        .map(|report| report.id)
        .collect();

    let accounted = pooled.saturating_add(held).saturating_add(assembled);
    if accounted == produced && unbalanced_factions.is_empty() {
        ConservationResult::Balanced
    } else {
        ConservationResult::Anomaly(ConservationAnomaly {
            produced,
            pooled,
            held,
            assembled,
            unbalanced_factions,
        })
    }
}

fn as_u64(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use skynet_types::Inventory;

    use super::*;

    fn report(index: usize, robots: u32, inventory: Inventory, parts_collected: u64) -> FactionReport {
        FactionReport {
            id: FactionId(index),
            label: format!("F{index}"),
            robots,
            inventory,
            parts_collected,
        }
    }

    #[test]
    fn balanced_run() {
        let reports = vec![
            report(0, 2, Inventory::from_counts([(PartKind::Head, 1)]), 9),
            report(1, 1, Inventory::from_counts([(PartKind::Feet, 2)]), 6),
        ];
        // 5 pooled + 3 held + 12 assembled = 20.
        assert_eq!(verify(20, 5, &reports), ConservationResult::Balanced);
    }

    #[test]
    fn lost_part_is_detected() {
        let reports = vec![report(0, 1, Inventory::new(), 4)];
        let ConservationResult::Anomaly(anomaly) = verify(10, 5, &reports) else {
            panic!("expected an anomaly");
        };
        assert_eq!(anomaly.assembled, 4);
        assert_eq!(anomaly.pooled, 5);
        assert!(anomaly.unbalanced_factions.is_empty());
        assert!(anomaly.to_string().contains("produced 10"));
    }

    #[test]
    fn ledger_mismatch_is_detected() {
        let reports = vec![
            report(0, 0, Inventory::from_counts([(PartKind::Hand, 3)]), 2),
            report(1, 0, Inventory::from_counts([(PartKind::Hand, 1)]), 2),
        ];
        let ConservationResult::Anomaly(anomaly) = verify(4, 0, &reports) else {
            panic!("expected an anomaly");
        };
        assert_eq!(anomaly.unbalanced_factions, vec![FactionId(0), FactionId(1)]);
    }

    #[test]
    fn empty_run_is_balanced() {
        assert_eq!(verify(0, 0, &[]), ConservationResult::Balanced);
    }
}
