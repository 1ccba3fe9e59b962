//! Day/night cadence for the factory and the factions.
//!
//! The coordinator is the single source of truth for the phase and the day
//! counter. It owns two reusable rendezvous points:
//!
//! - **End of day**: passed by every participant once production is done.
//!   Releasing it switches the phase to [`Phase::Night`].
//! - **End of night**: passed by every participant once collection and
//!   assembly are done. Releasing it switches the phase back to
//!   [`Phase::Day`].
//!
//! Only the factory calls [`Coordinator::next_day`], after the end-of-night
//! rendezvous, so every participant observes the same day number for the
//! whole cycle. The running flag goes from `true` to `false` exactly once:
//! either when the counter reaches the horizon or on
//! [`Coordinator::stop_simulation`]. Stopping also breaks both rendezvous
//! points so parked participants wake with [`CoordinatorError::Interrupted`].

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use skynet_types::{Participant, Phase};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::rendezvous::{Arrival, Rendezvous};

/// Errors surfaced to a participant at a rendezvous point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    /// The rendezvous was cancelled while waiting, or had already been broken.
    #[error("{phase} synchronization interrupted")]
    Interrupted {
        /// The phase whose end was being awaited.
        phase: Phase,
    },

    /// A participant arrived twice in one cycle, or is not part of this run.
    #[error("protocol violation: {participant} arrived out of turn at end of {phase}")]
    ProtocolViolation {
        /// The offending participant.
        participant: Participant,
        /// The phase whose end was being awaited.
        phase: Phase,
    },
}

/// Shared cycle state for one simulation run.
///
/// Wrapped in [`Arc`](std::sync::Arc) and shared by every participant task.
#[derive(Debug)]
pub struct Coordinator {
    /// Number of days to simulate (`D`).
    horizon: u32,

    /// Number of factions (`F`). Participants are the factory plus `F` factions.
    factions: usize,

    /// Day counter, advanced once per cycle by the factory.
    day: AtomicU32,

    /// Cleared at the horizon or on stop. Never set again.
    running: AtomicBool,

    /// `true` between end-of-day and end-of-night releases.
    night: AtomicBool,

    day_end: Rendezvous,
    night_end: Rendezvous,

    /// Flips to `true` on [`Coordinator::stop_simulation`]; wakes [`Coordinator::stopped`].
    stop: watch::Sender<bool>,
}

impl Coordinator {
    /// Create a coordinator for `factions` consumers over `horizon` days.
    pub fn new(horizon: u32, factions: usize) -> Self {
        let participants = factions.saturating_add(1);
        Self {
            horizon,
            factions,
            day: AtomicU32::new(0),
            running: AtomicBool::new(true),
            night: AtomicBool::new(false),
            day_end: Rendezvous::new(participants),
            night_end: Rendezvous::new(participants),
            stop: watch::channel(false).0,
        }
    }

    /// Block until every participant has finished the day.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Interrupted`] if the simulation is stopped
    /// before or while waiting, and [`CoordinatorError::ProtocolViolation`]
    /// if `participant` already arrived this cycle.
    pub async fn wait_for_day_end(&self, participant: Participant) -> Result<(), CoordinatorError> {
        let slot = self.slot(participant, Phase::Day)?;
        let arrival = self
            .day_end
            .wait(slot, || self.night.store(true, Ordering::Release))
            .await;
        Self::settle(arrival, participant, Phase::Day)
    }

    /// Block until every participant has finished the night.
    ///
    /// # Errors
    ///
    /// Same conditions as [`wait_for_day_end`](Self::wait_for_day_end).
    pub async fn wait_for_night_end(
        &self,
        participant: Participant,
    ) -> Result<(), CoordinatorError> {
        let slot = self.slot(participant, Phase::Night)?;
        let arrival = self
            .night_end
            .wait(slot, || self.night.store(false, Ordering::Release))
            .await;
        Self::settle(arrival, participant, Phase::Night)
    }

    /// Advance the day counter. Returns the new day.
    ///
    /// Called by the factory only, after the end-of-night rendezvous. Clears
    /// the running flag once the counter reaches the horizon, where it then
    /// saturates.
    pub fn next_day(&self) -> u32 {
        let advanced = self.day.fetch_update(Ordering::AcqRel, Ordering::Acquire, |day| {
            if day < self.horizon {
                Some(day.saturating_add(1))
            } else {
                None
            }
        });
        let day = match advanced {
            Ok(previous) => previous.saturating_add(1),
            Err(current) => current,
        };
        if day >= self.horizon && self.running.swap(false, Ordering::AcqRel) {
            info!(day, horizon = self.horizon, "Simulation horizon reached");
        }
        day
    }

    /// Whether another cycle should run.
    ///
    /// `false` once stopped or once the day counter has reached the horizon.
    pub fn is_simulation_running(&self) -> bool {
        self.is_day_scheduled(self.current_day())
    }

    /// Whether the cycle numbered `day` will run.
    ///
    /// Factions track their own cycle number with this instead of reading the
    /// shared counter, which the factory advances concurrently with their
    /// loop check.
    pub fn is_day_scheduled(&self, day: u32) -> bool {
        self.running.load(Ordering::Acquire) && day < self.horizon
    }

    /// Stop the simulation and release every parked participant.
    ///
    /// Parked and future rendezvous calls fail with
    /// [`CoordinatorError::Interrupted`]. Idempotent.
    pub fn stop_simulation(&self) {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        self.stop.send_replace(true);
        self.day_end.break_barrier();
        self.night_end.break_barrier();
        if was_running {
            warn!(day = self.current_day(), "Simulation stopped before the horizon");
        }
    }

    /// Resolve once [`stop_simulation`](Self::stop_simulation) has been called.
    ///
    /// Returns immediately if the stop already happened. Reaching the horizon
    /// does not count as a stop.
    pub async fn stopped(&self) {
        let mut receiver = self.stop.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = receiver.wait_for(|stopped| *stopped).await;
    }

    /// Whether [`stop_simulation`](Self::stop_simulation) has broken the rendezvous points.
    pub fn is_interrupted(&self) -> bool {
        self.day_end.is_broken() || self.night_end.is_broken()
    }

    /// Current value of the day counter.
    pub fn current_day(&self) -> u32 {
        self.day.load(Ordering::Acquire)
    }

    /// Current phase, derived from which rendezvous released last.
    pub fn phase(&self) -> Phase {
        if self.night.load(Ordering::Acquire) {
            Phase::Night
        } else {
            Phase::Day
        }
    }

    /// Simulation horizon in days.
    pub const fn horizon(&self) -> u32 {
        self.horizon
    }

    /// Number of factions taking part.
    pub const fn faction_count(&self) -> usize {
        self.factions
    }

    /// Number of rendezvous parties (factory plus factions).
    pub const fn participants(&self) -> usize {
        self.day_end.parties()
    }

    fn slot(&self, participant: Participant, phase: Phase) -> Result<usize, CoordinatorError> {
        participant
            .slot()
            .filter(|slot| *slot < self.participants())
            .ok_or(CoordinatorError::ProtocolViolation { participant, phase })
    }

    const fn settle(
        arrival: Arrival,
        participant: Participant,
        phase: Phase,
    ) -> Result<(), CoordinatorError> {
        match arrival {
            Arrival::Released => Ok(()),
            Arrival::Broken => Err(CoordinatorError::Interrupted { phase }),
            Arrival::Misuse => Err(CoordinatorError::ProtocolViolation { participant, phase }),
        }
    }
}
