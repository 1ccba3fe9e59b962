//! A consumer participant: collects parts at night and assembles robots.
//!
//! Each faction owns its inventory and robot counter outright. Nothing else
//! reads them until the run is over, so they need no synchronization; the
//! only shared state a faction touches is the [`Factory`] pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use skynet_types::{FactionId, FactionReport, Inventory, Participant, PartKind};
use tracing::{debug, warn};

use crate::coordinator::{Coordinator, CoordinatorError};
use crate::factory::Factory;

/// Cloneable cooperative stop signal for one faction.
#[derive(Debug, Clone)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Ask the faction to leave its loop at the next cycle boundary.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What one night of work produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightReport {
    /// Parts received from the factory.
    pub collected: usize,
    /// Robots assembled from the inventory.
    pub assembled: u32,
}

/// One competing faction.
#[derive(Debug)]
pub struct Faction {
    id: FactionId,
    label: String,
    factory: Arc<Factory>,
    max_parts_per_night: usize,
    inventory: Inventory,
    robots: u32,
    stop: StopFlag,
}

impl Faction {
    /// Create a faction with an empty inventory.
    pub fn new(
        id: FactionId,
        label: impl Into<String>,
        factory: Arc<Factory>,
        max_parts_per_night: usize,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            factory,
            max_parts_per_night,
            inventory: Inventory::new(),
            robots: 0,
            stop: StopFlag::new(),
        }
    }

    /// Dense faction index.
    pub const fn id(&self) -> FactionId {
        self.id
    }

    /// Display name.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Copy of the current inventory.
    pub const fn inventory_snapshot(&self) -> Inventory {
        self.inventory
    }

    /// Robots completed so far.
    pub const fn completed_robots(&self) -> u32 {
        self.robots
    }

    /// Request a cooperative stop.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Whether the faction loop may continue.
    pub fn is_running(&self) -> bool {
        !self.stop.is_stopped()
    }

    /// Handle that can stop this faction after it has moved into a task.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Add received parts to the inventory.
    pub fn stock(&mut self, parts: &[PartKind]) {
        self.inventory.stock(parts);
    }

    /// Turn every complete set of parts into a robot. Returns how many were built.
    pub fn assemble(&mut self) -> u32 {
        let built = self.inventory.assemble();
        self.robots = self.robots.saturating_add(built);
        built
    }

    /// Collect from the factory, stock the parts, and assemble robots.
    pub fn work_night(&mut self) -> NightReport {
        let parts = self.factory.collect(self.max_parts_per_night, self.id);
        self.stock(&parts);
        let assembled = self.assemble();
        NightReport {
            collected: parts.len(),
            assembled,
        }
    }

    /// Freeze the faction's final state into a report.
    pub fn report(&self) -> FactionReport {
        FactionReport {
            id: self.id,
            label: self.label.clone(),
            robots: self.robots,
            inventory: self.inventory,
            parts_collected: self.factory.parts_collected_by(self.id),
        }
    }

    /// Run the faction side of the day/night cycle until the horizon.
    ///
    /// Each cycle: wait for the end of day, work the night, wait for the end
    /// of night. The cycle number is tracked locally; it always matches the
    /// coordinator's counter once the end-of-night rendezvous has released.
    ///
    /// # Errors
    ///
    /// Returns the [`CoordinatorError`] raised at either rendezvous. An
    /// interrupted cycle assembles nothing.
    pub async fn run(&mut self, coordinator: &Coordinator) -> Result<(), CoordinatorError> {
        let participant = Participant::Faction(self.id);
        let mut day = coordinator.current_day();

        while self.is_running() && coordinator.is_day_scheduled(day) {
            coordinator.wait_for_day_end(participant).await?;
            let night = self.work_night();
            debug!(
                faction = %self.label,
                day,
                collected = night.collected,
                assembled = night.assembled,
                robots = self.robots,
                "Night complete"
            );
            coordinator.wait_for_night_end(participant).await?;
            day = day.saturating_add(1);
        }

        if coordinator.is_day_scheduled(day) {
            warn!(
                faction = %self.label,
                day,
                "Faction left before the horizon, releasing peers"
            );
            coordinator.stop_simulation();
        }
        Ok(())
    }
}
