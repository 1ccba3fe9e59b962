//! Simulation driver: wires the participants, runs them, and freezes the result.
//!
//! [`Simulation`] owns construction order (coordinator, factory, factions),
//! spawns one task for the factory and one per faction, waits for the
//! factory to reach the horizon, then joins the factions and builds a
//! [`SimulationResult`] from their final state.
//!
//! Any participant failure aborts the run: the coordinator is stopped so
//! every parked participant is released, and no result is produced.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use skynet_types::{FactionId, FactionReport, Outcome, RunId, SimulationResult};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{ConfigError, SimulationConfig};
use crate::conservation::{self, ConservationAnomaly, ConservationResult};
use crate::coordinator::{Coordinator, CoordinatorError};
use crate::factory::{DaySummary, Factory};
use crate::faction::Faction;
use crate::source::{PartSource, UniformPartSource};

/// Errors that abort a simulation run.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The configuration is unusable.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// A participant was interrupted or misused a rendezvous.
    #[error("coordination error: {source}")]
    Coordinator {
        /// The underlying coordinator error.
        #[from]
        source: CoordinatorError,
    },

    /// A participant task panicked or was cancelled.
    #[error("participant task failed: {message}")]
    Join {
        /// Description of the join failure.
        message: String,
    },

    /// Parts were lost or duplicated.
    #[error("conservation violated: {anomaly}")]
    Conservation {
        /// What did not add up.
        anomaly: ConservationAnomaly,
    },
}

/// Callback invoked by the factory after each cycle completes.
///
/// Implementations can use this to log progress or check invariants while
/// the run is in flight.
pub trait DayCallback: Send {
    /// Called after the day counter advances.
    fn on_day(&mut self, summary: &DaySummary);
}

/// A no-op day callback.
pub struct NoOpCallback;

impl DayCallback for NoOpCallback {
    fn on_day(&mut self, _summary: &DaySummary) {}
}

/// Stops the coordinator if a participant task ends without disarming it,
/// including by panic, so peers parked at a rendezvous are released.
struct ReleaseOnDrop {
    coordinator: Arc<Coordinator>,
    armed: bool,
}

impl ReleaseOnDrop {
    fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.stop_simulation();
        }
    }
}

/// A fully wired simulation, ready to run once.
pub struct Simulation {
    config: SimulationConfig,
    coordinator: Arc<Coordinator>,
    factory: Arc<Factory>,
    factions: Vec<Faction>,
}

impl Simulation {
    /// Build a simulation from configuration.
    ///
    /// Parts are sampled from a seeded source when `world.seed` is set and
    /// from OS entropy otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Config`] if the configuration is invalid.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        let source: Box<dyn PartSource> = match config.world.seed {
            Some(seed) => Box::new(UniformPartSource::seeded(seed)),
            None => Box::new(UniformPartSource::from_entropy()),
        };
        Self::with_source(config, source)
    }

    /// Build a simulation with an explicit part source.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Config`] if the configuration is invalid.
    pub fn with_source(
        config: SimulationConfig,
        source: Box<dyn PartSource>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;

        let coordinator = Arc::new(Coordinator::new(config.world.days, config.faction_count()));
        let factory = Arc::new(Factory::new(&config, source));
        let factions = config
            .factions
            .labels
            .iter()
            .enumerate()
            .map(|(index, label)| {
                Faction::new(
                    FactionId(index),
                    label.clone(),
                    Arc::clone(&factory),
                    config.factions.max_parts_per_night,
                )
            })
            .collect();

        Ok(Self {
            config,
            coordinator,
            factory,
            factions,
        })
    }

    /// The shared coordinator. Clone it to stop the run from outside.
    pub const fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// The shared factory.
    pub const fn factory(&self) -> &Arc<Factory> {
        &self.factory
    }

    /// The factions, in index order.
    pub fn factions(&self) -> &[Faction] {
        &self.factions
    }

    /// The configuration this simulation was built from.
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run every participant to the horizon and return the frozen result.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Coordinator`] if any participant was
    /// interrupted, [`SimulationError::Join`] if a participant task failed,
    /// and [`SimulationError::Conservation`] if the final state does not
    /// account for every part produced.
    pub async fn run(
        self,
        callback: Box<dyn DayCallback>,
    ) -> Result<SimulationResult, SimulationError> {
        let Self {
            config,
            coordinator,
            factory,
            factions,
        } = self;

        let run_id = RunId::new();
        let started_at = Utc::now();
        info!(
            %run_id,
            days = config.world.days,
            parts_per_day = config.production.parts_per_day,
            max_parts_per_night = config.factions.max_parts_per_night,
            factions = ?config.factions.labels,
            seeded = config.world.seed.is_some(),
            "Simulation starting"
        );

        let pacing = Duration::from_millis(config.world.day_interval_ms);
        let factory_task = spawn_factory(&coordinator, &factory, pacing, callback);

        let stop_flags: Vec<_> = factions.iter().map(Faction::stop_flag).collect();
        let faction_tasks: Vec<_> = factions
            .into_iter()
            .map(|faction| spawn_faction(&coordinator, faction))
            .collect();

        let mut failure: Option<SimulationError> = match factory_task.await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.into()),
            Err(err) => Some(SimulationError::Join {
                message: format!("factory: {err}"),
            }),
        };
        if failure.is_some() {
            coordinator.stop_simulation();
        }

        for flag in &stop_flags {
            flag.stop();
        }

        let mut finished = Vec::with_capacity(faction_tasks.len());
        for task in faction_tasks {
            match task.await {
                Ok((faction, Ok(()))) => finished.push(faction),
                Ok((faction, Err(err))) => {
                    warn!(faction = faction.label(), error = %err, "Faction aborted");
                    failure.get_or_insert(err.into());
                }
                Err(err) => {
                    failure.get_or_insert(SimulationError::Join {
                        message: format!("faction: {err}"),
                    });
                }
            }
        }

        // Every participant may exit cleanly if the stop landed between
        // rendezvous points; a stopped run still publishes nothing.
        if failure.is_none() && coordinator.is_interrupted() {
            failure = Some(SimulationError::Coordinator {
                source: CoordinatorError::Interrupted {
                    phase: coordinator.phase(),
                },
            });
        }

        if let Some(err) = failure {
            error!(%run_id, day = coordinator.current_day(), error = %err, "Simulation aborted");
            return Err(err);
        }

        let reports: Vec<FactionReport> = finished.iter().map(Faction::report).collect();
        let parts_produced = factory.parts_produced();
        let parts_remaining = u64::try_from(factory.available_parts_count()).unwrap_or(u64::MAX);

        if let ConservationResult::Anomaly(anomaly) =
            conservation::verify(parts_produced, parts_remaining, &reports)
        {
            error!(%run_id, %anomaly, "Part conservation violated");
            return Err(SimulationError::Conservation { anomaly });
        }

        let result = SimulationResult {
            run_id,
            winner: Outcome::decide(&reports),
            factions: reports,
            days_elapsed: coordinator.current_day(),
            parts_produced,
            parts_remaining,
            started_at,
            finished_at: Utc::now(),
        };
        log_simulation_end(&result);
        Ok(result)
    }
}

/// Run a simulation from configuration with no day callback.
///
/// # Errors
///
/// See [`Simulation::new`] and [`Simulation::run`].
pub async fn run_simulation(config: SimulationConfig) -> Result<SimulationResult, SimulationError> {
    Simulation::new(config)?.run(Box::new(NoOpCallback)).await
}

fn spawn_factory(
    coordinator: &Arc<Coordinator>,
    factory: &Arc<Factory>,
    pacing: Duration,
    mut callback: Box<dyn DayCallback>,
) -> JoinHandle<Result<(), CoordinatorError>> {
    let coordinator = Arc::clone(coordinator);
    let factory = Arc::clone(factory);
    tokio::spawn(async move {
        let mut guard = ReleaseOnDrop::new(Arc::clone(&coordinator));
        let outcome = factory
            .run(&coordinator, pacing, callback.as_mut())
            .await;
        if outcome.is_ok() {
            guard.disarm();
        }
        outcome
    })
}

fn spawn_faction(
    coordinator: &Arc<Coordinator>,
    mut faction: Faction,
) -> JoinHandle<(Faction, Result<(), CoordinatorError>)> {
    let coordinator = Arc::clone(coordinator);
    tokio::spawn(async move {
        let mut guard = ReleaseOnDrop::new(Arc::clone(&coordinator));
        let outcome = faction.run(&coordinator).await;
        if outcome.is_ok() {
            guard.disarm();
        }
        (faction, outcome)
    })
}

/// Log the final result of a completed run.
pub fn log_simulation_end(result: &SimulationResult) {
    for report in &result.factions {
        info!(
            faction = %report.label,
            robots = report.robots,
            parts_collected = report.parts_collected,
            leftover = %report.inventory,
            "Faction final state"
        );
    }
    info!(
        run_id = %result.run_id,
        winner = %result.winner,
        days = result.days_elapsed,
        parts_produced = result.parts_produced,
        parts_remaining = result.parts_remaining,
        total_robots = result.total_robots(),
        "Simulation ended"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use std::sync::Mutex;

    use skynet_types::PartKind;

    use super::*;
    use crate::source::CyclicPartSource;

    fn short_config(days: u32) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.world.days = days;
        config.world.seed = Some(5);
        config
    }

    struct Recorder(Arc<Mutex<Vec<DaySummary>>>);

    impl DayCallback for Recorder {
        fn on_day(&mut self, summary: &DaySummary) {
            self.0.lock().unwrap().push(summary.clone());
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = SimulationConfig::default();
        config.factions.labels.clear();
        assert!(matches!(
            Simulation::new(config),
            Err(SimulationError::Config { .. })
        ));
    }

    #[test]
    fn wires_one_faction_per_label() {
        let simulation = Simulation::new(short_config(3)).unwrap();
        let labels: Vec<&str> = simulation.factions().iter().map(Faction::label).collect();
        assert_eq!(labels, vec!["World", "Wednesday"]);
        assert_eq!(simulation.coordinator().participants(), 3);
        assert_eq!(simulation.factory().available_parts_count(), 0);
    }

    #[tokio::test]
    async fn short_run_reaches_horizon() {
        let simulation = Simulation::new(short_config(5)).unwrap();
        let coordinator = Arc::clone(simulation.coordinator());

        let result = simulation.run(Box::new(NoOpCallback)).await.unwrap();

        assert_eq!(coordinator.current_day(), 5);
        assert_eq!(result.days_elapsed, 5);
        assert_eq!(result.parts_produced, 50);
        assert_eq!(result.factions.len(), 2);
    }

    #[tokio::test]
    async fn cyclic_source_splits_evenly() {
        let simulation =
            Simulation::with_source(short_config(4), Box::new(CyclicPartSource::new())).unwrap();
        let days = Arc::new(Mutex::new(Vec::new()));

        let result = simulation
            .run(Box::new(Recorder(Arc::clone(&days))))
            .await
            .unwrap();

        let days = days.lock().unwrap();
        assert_eq!(days.len(), 4);
        assert_eq!(days.last().unwrap().day, 4);
        // Ten parts a day, five requested by each faction: nothing is left over.
        assert!(days.iter().all(|summary| summary.parts_available == 0));
        assert_eq!(result.parts_remaining, 0);
        assert_eq!(
            result.total_robots() * 4 + result.leftover_parts(),
            result.parts_produced
        );
        for report in &result.factions {
            assert_eq!(report.parts_collected, 20);
            assert!(report.inventory.iter().all(|(kind, _)| PartKind::ALL.contains(&kind)));
        }
    }

    #[tokio::test]
    async fn stop_during_pacing_returns_promptly() {
        let mut config = short_config(100);
        config.world.day_interval_ms = 3000;
        let simulation = Simulation::new(config).unwrap();
        let coordinator = Arc::clone(simulation.coordinator());

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            coordinator.stop_simulation();
        });

        let started = std::time::Instant::now();
        let outcome = simulation.run(Box::new(NoOpCallback)).await;
        let elapsed = started.elapsed();
        stopper.await.unwrap();

        assert!(outcome.is_err());
        assert!(elapsed < Duration::from_secs(1), "stop took {elapsed:?}");
    }

    #[tokio::test]
    async fn external_stop_aborts_without_result() {
        let mut config = short_config(1000);
        config.world.day_interval_ms = 5;
        let simulation = Simulation::new(config).unwrap();
        let coordinator = Arc::clone(simulation.coordinator());

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            coordinator.stop_simulation();
        });

        let outcome = simulation.run(Box::new(NoOpCallback)).await;
        stopper.await.unwrap();
        assert!(matches!(
            outcome,
            Err(SimulationError::Coordinator {
                source: CoordinatorError::Interrupted { .. }
            })
        ));
    }
}
