//! Injectable randomness for session setup, pricing and risk draws

use std::hash::{DefaultHasher, Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform integer draws
pub trait RandomSource: Send {
    /// Uniform draw from the inclusive range `[min, max]`
    fn uniform(&mut self, min: i64, max: i64) -> i64;

    /// Random permutation of `0..len` (Fisher-Yates over `uniform`)
    fn permutation(&mut self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        for i in (1..len).rev() {
            let j = self.uniform(0, i as i64) as usize;
            order.swap(i, j);
        }
        order
    }
}

/// Return `items` in shuffled order
pub fn shuffled<T: Clone>(rng: &mut dyn RandomSource, items: &[T]) -> Vec<T> {
    rng.permutation(items.len())
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}

/// `StdRng`-backed source, reproducible from its seed
#[derive(Clone, Debug)]
pub struct SeededRandom {
    seed: u64,
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed drawn from OS entropy
    pub fn from_entropy() -> Self {
        Self::new(rand::random::<u64>())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Independent stream derived from this seed and a stream label
    pub fn derive(seed: u64, stream: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        stream.hash(&mut hasher);
        Self::new(hasher.finish())
    }
}

impl RandomSource for SeededRandom {
    fn uniform(&mut self, min: i64, max: i64) -> i64 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..=max)
    }
}

/// Replays a fixed list of draws, cycling when exhausted.
///
/// Each draw is clamped into the requested range, so a script of `[100]`
/// always yields the upper end of whatever range is asked for.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRandom {
    draws: Vec<i64>,
    cursor: usize,
}

impl ScriptedRandom {
    pub fn new(draws: Vec<i64>) -> Self {
        Self { draws, cursor: 0 }
    }

    /// Number of draws consumed so far
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ScriptedRandom {
    fn uniform(&mut self, min: i64, max: i64) -> i64 {
        if self.draws.is_empty() {
            return min;
        }
        let draw = self.draws[self.cursor % self.draws.len()];
        self.cursor += 1;
        draw.clamp(min, max.max(min))
    }
}

/// The three independent streams a negotiation consumes.
///
/// Pricing draws never share a stream with risk rolls, so replaying the
/// pricing stream alone reproduces the seller's offers.
pub struct RandomStreams {
    pub session: Box<dyn RandomSource>,
    pub pricing: Box<dyn RandomSource>,
    pub risk: Box<dyn RandomSource>,
    seed: Option<u64>,
}

impl RandomStreams {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            session: Box::new(SeededRandom::derive(seed, "session")),
            pricing: Box::new(Self::pricing_stream(seed)),
            risk: Box::new(SeededRandom::derive(seed, "risk")),
            seed: Some(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self::from_seed(rand::random::<u64>())
    }

    /// Caller-supplied sources (deterministic sequences in tests)
    pub fn from_sources(
        session: Box<dyn RandomSource>,
        pricing: Box<dyn RandomSource>,
        risk: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            session,
            pricing,
            risk,
            seed: None,
        }
    }

    /// The pricing stream a seeded session uses
    pub fn pricing_stream(seed: u64) -> SeededRandom {
        SeededRandom::derive(seed, "pricing")
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

impl std::fmt::Debug for RandomStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomStreams")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_draws_are_reproducible() {
        let mut a = SeededRandom::new(42);
        let mut b = SeededRandom::new(42);
        let draws_a: Vec<i64> = (0..20).map(|_| a.uniform(1, 100)).collect();
        let draws_b: Vec<i64> = (0..20).map(|_| b.uniform(1, 100)).collect();
        assert_eq!(draws_a, draws_b);
        assert!(draws_a.iter().all(|d| (1..=100).contains(d)));
    }

    #[test]
    fn test_derived_streams_differ() {
        let mut pricing = SeededRandom::derive(9, "pricing");
        let mut risk = SeededRandom::derive(9, "risk");
        let p: Vec<i64> = (0..10).map(|_| pricing.uniform(0, 1_000_000)).collect();
        let r: Vec<i64> = (0..10).map(|_| risk.uniform(0, 1_000_000)).collect();
        assert_ne!(p, r);

        let mut again = SeededRandom::derive(9, "pricing");
        let p2: Vec<i64> = (0..10).map(|_| again.uniform(0, 1_000_000)).collect();
        assert_eq!(p, p2);
    }

    #[test]
    fn test_degenerate_range() {
        let mut rng = SeededRandom::new(1);
        assert_eq!(rng.uniform(5, 5), 5);
        assert_eq!(rng.uniform(9, 3), 9);
    }

    #[test]
    fn test_scripted_random_clamps_and_cycles() {
        let mut rng = ScriptedRandom::new(vec![0, 50, 500]);
        assert_eq!(rng.uniform(1, 100), 1);
        assert_eq!(rng.uniform(1, 100), 50);
        assert_eq!(rng.uniform(1, 100), 100);
        assert_eq!(rng.uniform(1, 100), 1);
        assert_eq!(rng.consumed(), 4);
    }

    #[test]
    fn test_permutation_covers_all_indices() {
        let mut rng = SeededRandom::new(3);
        let mut perm = rng.permutation(6);
        perm.sort_unstable();
        assert_eq!(perm, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_shuffled_keeps_elements() {
        let mut rng = ScriptedRandom::new(vec![0]);
        let factors = shuffled(&mut rng, &[1.0, 1.3, 1.5]);
        assert_eq!(factors.len(), 3);
        assert!(factors.contains(&1.0) && factors.contains(&1.3) && factors.contains(&1.5));
    }
}
