//! Reusable, breakable barrier for a fixed set of participants.
//!
//! Each party occupies a numbered slot. A generation completes when every
//! slot has arrived; the last arrival runs the release hook while still
//! holding the arrival lock and then wakes everyone through a
//! [`tokio::sync::watch`] channel. Breaking the barrier wakes every parked
//! party immediately and makes all later arrivals fail fast. A broken
//! barrier never recovers.

use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

/// How a call to [`Rendezvous::wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arrival {
    /// Every party arrived; the generation was released.
    Released,
    /// The barrier was broken before or while waiting.
    Broken,
    /// The slot already arrived in this generation, or does not exist.
    Misuse,
}

/// Value broadcast to parked parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Signal {
    released: u64,
    broken: bool,
}

#[derive(Debug)]
struct Arrivals {
    generation: u64,
    arrived: Vec<bool>,
    count: usize,
    broken: bool,
}

/// A cyclic rendezvous point for `parties` participants.
#[derive(Debug)]
pub(crate) struct Rendezvous {
    parties: usize,
    arrivals: Mutex<Arrivals>,
    signal: watch::Sender<Signal>,
}

impl Rendezvous {
    /// Create a rendezvous for `parties` slots (`0..parties`).
    pub(crate) fn new(parties: usize) -> Self {
        let (signal, _) = watch::channel(Signal {
            released: 0,
            broken: false,
        });
        Self {
            parties,
            arrivals: Mutex::new(Arrivals {
                generation: 0,
                arrived: vec![false; parties],
                count: 0,
                broken: false,
            }),
            signal,
        }
    }

    /// Number of parties that must arrive per generation.
    pub(crate) const fn parties(&self) -> usize {
        self.parties
    }

    /// Arrive at the barrier from `slot` and wait for the generation to release.
    ///
    /// `on_release` runs exactly once per generation, on the last arrival,
    /// before anyone is woken.
    pub(crate) async fn wait(&self, slot: usize, on_release: impl FnOnce()) -> Arrival {
        let mut receiver = self.signal.subscribe();

        let generation = {
            let mut arrivals = self.arrivals.lock().unwrap_or_else(PoisonError::into_inner);
            if arrivals.broken {
                return Arrival::Broken;
            }
            let Some(seen) = arrivals.arrived.get_mut(slot) else {
                return Arrival::Misuse;
            };
            if *seen {
                return Arrival::Misuse;
            }
            *seen = true;
            arrivals.count = arrivals.count.saturating_add(1);

            if arrivals.count >= self.parties {
                arrivals.arrived.iter_mut().for_each(|seen| *seen = false);
                arrivals.count = 0;
                arrivals.generation = arrivals.generation.saturating_add(1);
                let released = arrivals.generation;
                on_release();
                self.signal.send_modify(|signal| signal.released = released);
                return Arrival::Released;
            }
            arrivals.generation
        };

        let outcome = receiver
            .wait_for(|signal| signal.broken || signal.released > generation)
            .await
            .map(|signal| *signal);

        match outcome {
            Ok(signal) if signal.released > generation => Arrival::Released,
            _ => Arrival::Broken,
        }
    }

    /// Break the barrier: wake every parked party with [`Arrival::Broken`].
    pub(crate) fn break_barrier(&self) {
        let mut arrivals = self.arrivals.lock().unwrap_or_else(PoisonError::into_inner);
        arrivals.broken = true;
        self.signal.send_modify(|signal| signal.broken = true);
    }

    /// Whether [`break_barrier`](Self::break_barrier) has been called.
    pub(crate) fn is_broken(&self) -> bool {
        self.arrivals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .broken
    }
}
