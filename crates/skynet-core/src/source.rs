//! Random source of part kinds.
//!
//! The factory never touches an RNG directly. It asks a [`PartSource`] for
//! one kind at a time, so tests can inject a seeded or scripted source.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skynet_types::PartKind;

/// Supplier of part kinds for the factory.
pub trait PartSource: Send {
    /// Draw the next part kind.
    fn sample(&mut self) -> PartKind;
}

/// Uniform sampling over every [`PartKind`].
#[derive(Debug, Clone)]
pub struct UniformPartSource<R> {
    rng: R,
}

impl<R: Rng> UniformPartSource<R> {
    /// Wrap an existing random number generator.
    pub const fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl UniformPartSource<StdRng> {
    /// Deterministic source for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Source seeded from operating-system entropy.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng + Send> PartSource for UniformPartSource<R> {
    fn sample(&mut self) -> PartKind {
        let index = self.rng.random_range(0..PartKind::COUNT);
        PartKind::from_index(index).unwrap_or(PartKind::Head)
    }
}

/// Cycles through [`PartKind::ALL`] in declaration order.
///
/// Every run of four consecutive samples forms one complete robot.
#[derive(Debug, Clone, Default)]
pub struct CyclicPartSource {
    next: usize,
}

impl CyclicPartSource {
    /// Start the cycle at [`PartKind::Head`].
    pub const fn new() -> Self {
        Self { next: 0 }
    }
}

impl PartSource for CyclicPartSource {
    fn sample(&mut self) -> PartKind {
        let kind = PartKind::from_index(self.next).unwrap_or(PartKind::Head);
        self.next = self.next.saturating_add(1).checked_rem(PartKind::COUNT).unwrap_or(0);
        kind
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn seeded_sources_repeat() {
        let mut first = UniformPartSource::seeded(42);
        let mut second = UniformPartSource::seeded(42);
        let a: Vec<PartKind> = (0..64).map(|_| first.sample()).collect();
        let b: Vec<PartKind> = (0..64).map(|_| second.sample()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn uniform_source_covers_every_kind() {
        let mut source = UniformPartSource::seeded(7);
        let mut seen: BTreeMap<PartKind, u32> = BTreeMap::new();
        for _ in 0..4000 {
            *seen.entry(source.sample()).or_insert(0) += 1;
        }
        assert_eq!(seen.len(), 4);
        // Each kind should land near 1000; a wide band keeps this seed-agnostic.
        assert!(seen.values().all(|count| (700..1300).contains(count)));
    }

    #[test]
    fn cyclic_source_walks_declaration_order() {
        let mut source = CyclicPartSource::new();
        let drawn: Vec<PartKind> = (0..6).map(|_| source.sample()).collect();
        assert_eq!(
            drawn,
            vec![
                PartKind::Head,
                PartKind::Torso,
                PartKind::Hand,
                PartKind::Feet,
                PartKind::Head,
                PartKind::Torso,
            ]
        );
    }
}
