//! The single producer: daily part output and fair-share collection.
//!
//! During the day the factory appends `P` uniformly sampled parts to its
//! pool. During the night factions call [`Factory::collect`]; the grant is
//! capped by the fair-share policy so that no faction's running total can
//! drift far from the others.
//!
//! # Fair-share policy
//!
//! With `A` parts in the pool, a request for `M`, the caller's ledger value
//! `m`, and `o` the mean ledger value of the other factions, let
//! `Δ = m - o`:
//!
//! | condition | grant |
//! |---|---|
//! | `A == 0` | `0` |
//! | `Δ > Δ_max` | `min(1, M, A)` |
//! | `Δ < -Δ_max` | `min(M, A)` |
//! | otherwise | `min(M, A, A / F + 1)` |
//!
//! The mean is never computed directly: both sides are scaled by the number
//! of other factions (floored at 1) so the comparison stays in integers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use skynet_types::{FactionId, Participant, PartKind};
use tracing::{debug, warn};

use crate::config::SimulationConfig;
use crate::coordinator::{Coordinator, CoordinatorError};
use crate::runner::DayCallback;
use crate::source::PartSource;

/// Compute how many parts a request may take under the fair-share policy.
///
/// `ledger` holds every faction's running total; `faction` indexes into it.
/// Unknown factions and empty requests are granted nothing.
pub fn fair_share_grant(
    available: usize,
    requested: usize,
    ledger: &[u64],
    faction: usize,
    imbalance_threshold: u64,
) -> usize {
    if available == 0 || requested == 0 {
        return 0;
    }
    let Some(&mine) = ledger.get(faction) else {
        return 0;
    };

    let others_total = ledger
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != faction)
        .fold(0_u64, |total, (_, collected)| total.saturating_add(*collected));
    let others = u64::try_from(ledger.len().saturating_sub(1).max(1)).unwrap_or(u64::MAX);

    let mine_scaled = mine.saturating_mul(others);
    let margin = imbalance_threshold.saturating_mul(others);

    if mine_scaled > others_total.saturating_add(margin) {
        // Ahead: throttle to a single part.
        return 1;
    }
    if mine_scaled.saturating_add(margin) < others_total {
        // Behind: uncapped.
        return requested.min(available);
    }

    let split = available
        .checked_div(ledger.len())
        .unwrap_or(available)
        .saturating_add(1);
    requested.min(available).min(split)
}

/// Observation of the factory taken at the end of a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    /// Day counter after the cycle completed.
    pub day: u32,
    /// Parts produced since the start of the run.
    pub parts_produced: u64,
    /// Parts left unclaimed in the pool.
    pub parts_available: usize,
    /// Running total of parts granted to each faction.
    pub ledger: Vec<u64>,
}

impl DaySummary {
    /// Largest difference between any two ledger entries.
    pub fn ledger_spread(&self) -> u64 {
        let max = self.ledger.iter().copied().max().unwrap_or(0);
        let min = self.ledger.iter().copied().min().unwrap_or(0);
        max.saturating_sub(min)
    }
}

/// Pool, ledger, and sampler; always locked together.
struct FactoryState {
    pool: VecDeque<PartKind>,
    ledger: Vec<u64>,
    produced: u64,
    source: Box<dyn PartSource>,
}

impl core::fmt::Debug for FactoryState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FactoryState")
            .field("pool", &self.pool.len())
            .field("ledger", &self.ledger)
            .field("produced", &self.produced)
            .finish_non_exhaustive()
    }
}

/// The part producer shared by the factory task and every faction.
#[derive(Debug)]
pub struct Factory {
    /// Parts produced per day (`P`).
    parts_per_day: usize,

    /// Ledger imbalance threshold (`Δ_max`).
    imbalance_threshold: u64,

    /// Independent of the coordinator so the factory can be driven alone.
    running: AtomicBool,

    state: Mutex<FactoryState>,
}

impl Factory {
    /// Create an empty factory for the configured factions.
    pub fn new(config: &SimulationConfig, source: Box<dyn PartSource>) -> Self {
        Self::from_parts(config, source, Vec::new(), Vec::new())
    }

    /// Restore a factory with an existing pool and collection ledger.
    ///
    /// The ledger is padded with zeros (or truncated) to the configured
    /// faction count. Restored parts, both pooled and already handed out,
    /// count as produced.
    pub fn from_parts(
        config: &SimulationConfig,
        source: Box<dyn PartSource>,
        pool: Vec<PartKind>,
        mut ledger: Vec<u64>,
    ) -> Self {
        ledger.resize(config.faction_count(), 0);
        let handed_out = ledger
            .iter()
            .fold(0_u64, |total, collected| total.saturating_add(*collected));
        let produced = as_u64(pool.len()).saturating_add(handed_out);

        Self {
            parts_per_day: config.production.parts_per_day,
            imbalance_threshold: config.fair_share.imbalance_threshold,
            running: AtomicBool::new(true),
            state: Mutex::new(FactoryState {
                pool: pool.into(),
                ledger,
                produced,
                source,
            }),
        }
    }

    /// Append `count` freshly sampled parts to the pool.
    pub fn produce(&self, count: usize) {
        let mut state = self.lock();
        for _ in 0..count {
            let kind = state.source.sample();
            state.pool.push_back(kind);
        }
        state.produced = state.produced.saturating_add(as_u64(count));
        debug!(
            produced = count,
            available = state.pool.len(),
            total_produced = state.produced,
            "Parts produced"
        );
    }

    /// Remove up to `max_parts` from the head of the pool for `faction`.
    ///
    /// The grant is capped by the fair-share policy and may be empty even
    /// when parts are available. The ledger grows by the number returned.
    pub fn collect(&self, max_parts: usize, faction: FactionId) -> Vec<PartKind> {
        let mut state = self.lock();
        let available = state.pool.len();
        let grant = fair_share_grant(
            available,
            max_parts,
            &state.ledger,
            faction.index(),
            self.imbalance_threshold,
        );
        let parts: Vec<PartKind> = state.pool.drain(..grant).collect();

        match state.ledger.get_mut(faction.index()) {
            Some(collected) => *collected = collected.saturating_add(as_u64(parts.len())),
            None => warn!(%faction, "Collection request from unknown faction"),
        }

        debug!(
            %faction,
            requested = max_parts,
            granted = parts.len(),
            available,
            "Parts collected"
        );
        parts
    }

    /// Number of parts waiting in the pool.
    pub fn available_parts_count(&self) -> usize {
        self.lock().pool.len()
    }

    /// Parts granted to `faction` so far (0 for an unknown faction).
    pub fn parts_collected_by(&self, faction: FactionId) -> u64 {
        self.lock()
            .ledger
            .get(faction.index())
            .copied()
            .unwrap_or(0)
    }

    /// Copy of the whole collection ledger.
    pub fn ledger(&self) -> Vec<u64> {
        self.lock().ledger.clone()
    }

    /// Parts produced since the factory was created.
    pub fn parts_produced(&self) -> u64 {
        self.lock().produced
    }

    /// Copy of the pool contents, oldest first.
    pub fn pool_contents(&self) -> Vec<PartKind> {
        self.lock().pool.iter().copied().collect()
    }

    /// Parts produced per day.
    pub const fn parts_per_day(&self) -> usize {
        self.parts_per_day
    }

    /// Take a consistent observation of the pool and ledger.
    pub fn day_summary(&self, day: u32) -> DaySummary {
        let state = self.lock();
        DaySummary {
            day,
            parts_produced: state.produced,
            parts_available: state.pool.len(),
            ledger: state.ledger.clone(),
        }
    }

    /// Stop the production loop after the current cycle.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Whether the production loop may continue.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run the factory side of the day/night cycle until the horizon.
    ///
    /// Each cycle: produce `P` parts, pass the end-of-day rendezvous, pass
    /// the end-of-night rendezvous, advance the day, report it to
    /// `callback`, then rest for `pacing`. A stop ends the rest early.
    ///
    /// # Errors
    ///
    /// Returns the [`CoordinatorError`] raised at either rendezvous.
    pub async fn run(
        &self,
        coordinator: &Coordinator,
        pacing: Duration,
        callback: &mut dyn DayCallback,
    ) -> Result<(), CoordinatorError> {
        while self.is_running() && coordinator.is_simulation_running() {
            self.produce(self.parts_per_day);
            coordinator.wait_for_day_end(Participant::Factory).await?;
            coordinator.wait_for_night_end(Participant::Factory).await?;

            let day = coordinator.next_day();
            let summary = self.day_summary(day);
            debug!(
                day,
                available = summary.parts_available,
                ledger_spread = summary.ledger_spread(),
                "Day complete"
            );
            callback.on_day(&summary);

            if !pacing.is_zero() && coordinator.is_simulation_running() {
                tokio::select! {
                    () = tokio::time::sleep(pacing) => {}
                    () = coordinator.stopped() => {
                        debug!(day, "Pacing cut short by stop");
                    }
                }
            }
        }

        if coordinator.is_simulation_running() {
            warn!(
                day = coordinator.current_day(),
                "Factory left before the horizon, releasing factions"
            );
            coordinator.stop_simulation();
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, FactoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn as_u64(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::runner::NoOpCallback;
    use crate::source::{CyclicPartSource, UniformPartSource};

    fn factory() -> Factory {
        Factory::new(&SimulationConfig::default(), Box::new(CyclicPartSource::new()))
    }

    const WORLD: FactionId = FactionId(0);
    const WEDNESDAY: FactionId = FactionId(1);

    #[test]
    fn starts_empty_and_running() {
        let factory = factory();
        assert_eq!(factory.available_parts_count(), 0);
        assert_eq!(factory.parts_produced(), 0);
        assert_eq!(factory.ledger(), vec![0, 0]);
        assert!(factory.is_running());
    }

    #[test]
    fn produce_appends_to_pool() {
        let factory = factory();
        factory.produce(10);
        assert_eq!(factory.available_parts_count(), 10);
        factory.produce(5);
        assert_eq!(factory.available_parts_count(), 15);
        assert_eq!(factory.parts_produced(), 15);
    }

    #[test]
    fn collect_from_empty_pool_returns_nothing() {
        let factory = factory();
        assert!(factory.collect(5, WORLD).is_empty());
        assert_eq!(factory.parts_collected_by(WORLD), 0);
    }

    #[test]
    fn collect_zero_is_a_noop() {
        let factory = factory();
        factory.produce(10);
        assert!(factory.collect(0, WORLD).is_empty());
        assert_eq!(factory.available_parts_count(), 10);
        assert_eq!(factory.ledger(), vec![0, 0]);
    }

    #[test]
    fn collect_takes_oldest_parts_first() {
        let factory = factory();
        factory.produce(6);
        let parts = factory.collect(3, WORLD);
        assert_eq!(parts, vec![PartKind::Head, PartKind::Torso, PartKind::Hand]);
        assert_eq!(
            factory.pool_contents(),
            vec![PartKind::Feet, PartKind::Head, PartKind::Torso]
        );
    }

    #[test]
    fn collect_never_exceeds_request() {
        let factory = factory();
        factory.produce(5);
        assert_eq!(factory.collect(2, WORLD).len(), 2);
        assert_eq!(factory.available_parts_count(), 3);
    }

    #[test]
    fn equal_split_between_two_factions() {
        let factory = factory();
        factory.produce(10);

        assert_eq!(factory.collect(5, WORLD).len(), 5);
        assert_eq!(factory.collect(5, WEDNESDAY).len(), 5);
        assert_eq!(factory.ledger(), vec![5, 5]);
        assert_eq!(factory.available_parts_count(), 0);
    }

    #[test]
    fn greedy_request_is_capped() {
        let factory = factory();
        factory.produce(10);

        let first = factory.collect(10, WORLD);
        let second = factory.collect(10, WEDNESDAY);
        assert_eq!(first.len(), 6);
        assert_eq!(second.len(), 4);
    }

    #[test]
    fn faction_ahead_is_throttled() {
        let factory = Factory::from_parts(
            &SimulationConfig::default(),
            Box::new(CyclicPartSource::new()),
            vec![PartKind::Head; 10],
            vec![10, 0],
        );

        assert_eq!(factory.collect(5, WORLD).len(), 1);
        assert_eq!(factory.available_parts_count(), 9);
        assert_eq!(factory.ledger(), vec![11, 0]);
    }

    #[test]
    fn faction_behind_is_uncapped() {
        let factory = Factory::from_parts(
            &SimulationConfig::default(),
            Box::new(CyclicPartSource::new()),
            vec![PartKind::Feet; 10],
            vec![10, 0],
        );

        assert_eq!(factory.collect(5, WEDNESDAY).len(), 5);
        assert_eq!(factory.available_parts_count(), 5);
        assert_eq!(factory.ledger(), vec![10, 5]);
    }

    #[test]
    fn repeated_rounds_stay_balanced() {
        let factory = factory();
        factory.produce(20);
        for _ in 0..4 {
            factory.collect(5, WORLD);
            factory.collect(5, WEDNESDAY);
        }
        let world = factory.parts_collected_by(WORLD);
        let wednesday = factory.parts_collected_by(WEDNESDAY);
        assert!(world > 0 && wednesday > 0);
        assert!(world.abs_diff(wednesday) <= 3);
    }

    #[test]
    fn unknown_faction_gets_nothing() {
        let factory = factory();
        factory.produce(4);
        assert!(factory.collect(4, FactionId(9)).is_empty());
        assert_eq!(factory.available_parts_count(), 4);
        assert_eq!(factory.parts_collected_by(FactionId(9)), 0);
    }

    #[test]
    fn from_parts_counts_restored_parts_as_produced() {
        let factory = Factory::from_parts(
            &SimulationConfig::default(),
            Box::new(CyclicPartSource::new()),
            vec![PartKind::Hand; 3],
            vec![4],
        );
        assert_eq!(factory.ledger(), vec![4, 0]);
        assert_eq!(factory.parts_produced(), 7);
    }

    #[test]
    fn stop_clears_running_flag() {
        let factory = factory();
        factory.stop();
        assert!(!factory.is_running());
    }

    #[test]
    fn grant_table() {
        // Empty pool.
        assert_eq!(fair_share_grant(0, 5, &[0, 0], 0, 2), 0);
        // Balanced: rough equal split.
        assert_eq!(fair_share_grant(10, 5, &[0, 0], 0, 2), 5);
        assert_eq!(fair_share_grant(3, 5, &[0, 0], 0, 2), 2);
        // Exactly at the threshold is still balanced.
        assert_eq!(fair_share_grant(10, 5, &[2, 0], 0, 2), 5);
        assert_eq!(fair_share_grant(10, 5, &[0, 2], 0, 2), 5);
        // Ahead by more than the threshold.
        assert_eq!(fair_share_grant(10, 5, &[3, 0], 0, 2), 1);
        // Behind by more than the threshold.
        assert_eq!(fair_share_grant(3, 5, &[0, 3], 0, 2), 3);
    }

    #[test]
    fn grant_averages_other_factions() {
        // Others average (6 + 0) / 2 = 3; caller at 6 is ahead by 3.
        assert_eq!(fair_share_grant(12, 5, &[6, 6, 0], 0, 2), 1);
        // Caller at 0 is behind the average of 6 by more than 2.
        assert_eq!(fair_share_grant(12, 5, &[6, 6, 0], 2, 2), 5);
        // Caller at 4, others average 3: balanced, split is 12 / 3 + 1.
        assert_eq!(fair_share_grant(12, 9, &[4, 6, 0], 0, 2), 5);
    }

    #[test]
    fn grant_with_single_faction_does_not_divide_by_zero() {
        assert_eq!(fair_share_grant(10, 5, &[0], 0, 2), 5);
        assert_eq!(fair_share_grant(10, 5, &[3], 0, 2), 1);
    }

    #[test]
    fn concurrent_collectors_never_overdraw() {
        let mut config = SimulationConfig::default();
        config.factions.labels = (0..5).map(|index| format!("Collector{index}")).collect();
        let factory = Arc::new(Factory::new(
            &config,
            Box::new(UniformPartSource::seeded(11)),
        ));
        factory.produce(40);

        let handles: Vec<_> = (0..5)
            .map(|index| {
                let factory = Arc::clone(&factory);
                std::thread::spawn(move || {
                    (0..4)
                        .map(|_| factory.collect(2, FactionId(index)).len())
                        .sum::<usize>()
                })
            })
            .collect();

        let taken: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        let ledger_total: u64 = factory.ledger().iter().sum();
        assert_eq!(u64::try_from(taken).unwrap(), ledger_total);
        assert_eq!(taken + factory.available_parts_count(), 40);
    }

    #[tokio::test]
    async fn stop_cuts_pacing_short() {
        let coordinator = Arc::new(Coordinator::new(100, 0));
        let factory = factory();
        let stopper = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                coordinator.stop_simulation();
            })
        };

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            factory.run(&coordinator, Duration::from_secs(3), &mut NoOpCallback),
        )
        .await
        .unwrap();
        stopper.await.unwrap();

        assert_eq!(outcome, Ok(()));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(coordinator.current_day(), 1);
        assert_eq!(factory.parts_produced(), 10);
    }

    #[test]
    fn day_summary_reports_spread() {
        let summary = DaySummary {
            day: 3,
            parts_produced: 30,
            parts_available: 2,
            ledger: vec![14, 11],
        };
        assert_eq!(summary.ledger_spread(), 3);
    }
}
