//! Deterministic random number generation.
//!
//! RULE: Nothing in the pipeline may call any platform RNG.
//! All randomness flows through ModelRng instances derived
//! from the single run seed in PipelineConfig.
//!
//! Each {model, partition} task gets its own RNG stream, seeded
//! deterministically from (seed XOR slot_index). This means:
//!   - Fitting tasks can run in any order, on any thread.
//!   - Each task's stream is fully reproducible in isolation.

use crate::types::{ModelKind, Partition};
use rand::{
    seq::{index, SliceRandom},
    RngCore, SeedableRng,
};
use rand_pcg::Pcg64Mcg;

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// A named, deterministic RNG for a single fitting task.
pub struct ModelRng {
    pub name: &'static str,
    seed: u64,
    inner: Pcg64Mcg,
}

impl ModelRng {
    /// Create an RNG from a base seed and a stable stream index.
    /// The index must never change once assigned.
    pub fn new(seed: u64, stream: u64) -> Self {
        let derived_seed = seed ^ stream.wrapping_mul(GOLDEN_GAMMA);
        Self {
            name: "unnamed",
            seed: derived_seed,
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Derive an independent child stream, e.g. one per isolation tree.
    /// Depends only on this stream's seed, never on how far it has advanced.
    pub fn fork(&self, child: u64) -> ModelRng {
        ModelRng::new(self.seed, child.wrapping_add(1)).with_name(self.name)
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Roll a usize in [0, n).
    pub fn next_below(&mut self, n: usize) -> usize {
        assert!(n > 0, "n must be > 0");
        (self.inner.next_u64() % n as u64) as usize
    }

    /// Uniform float in [low, high).
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Sample N(mean, std) via the Box-Muller transform.
    pub fn gaussian(&mut self, mean: f64, std: f64) -> f64 {
        let u1 = self.next_f64().max(1e-300);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        mean + std * z
    }

    /// In-place uniform shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.inner);
    }

    /// Draw `k` distinct indices from 0..n, in draw order.
    pub fn sample_indices(&mut self, n: usize, k: usize) -> Vec<usize> {
        index::sample(&mut self.inner, n, k.min(n)).into_vec()
    }
}

/// All task RNGs for a single run, indexed by stable slot.
pub struct RngBank {
    seed: u64,
}

impl RngBank {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn for_slot(&self, slot: ModelSlot) -> ModelRng {
        ModelRng::new(self.seed, slot as u64).with_name(slot.name())
    }
}

/// Stable slot assignments, one per {model, partition} task.
/// NEVER reorder or remove entries; only append.
/// Reordering changes every task's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum ModelSlot {
    LocalDensityConfidential = 0,
    LocalDensityOrdinary = 1,
    IsolationConfidential = 2,
    IsolationOrdinary = 3,
}

impl ModelSlot {
    pub fn of(model: ModelKind, partition: Partition) -> Self {
        match (model, partition) {
            (ModelKind::LocalDensity, Partition::Confidential) => Self::LocalDensityConfidential,
            (ModelKind::LocalDensity, Partition::Ordinary)     => Self::LocalDensityOrdinary,
            (ModelKind::Isolation, Partition::Confidential)    => Self::IsolationConfidential,
            (ModelKind::Isolation, Partition::Ordinary)        => Self::IsolationOrdinary,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LocalDensityConfidential => "local_density/confidential",
            Self::LocalDensityOrdinary     => "local_density/ordinary",
            Self::IsolationConfidential    => "isolation/confidential",
            Self::IsolationOrdinary        => "isolation/ordinary",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_slot_same_stream() {
        let mut a = RngBank::new(42).for_slot(ModelSlot::IsolationOrdinary);
        let mut b = RngBank::new(42).for_slot(ModelSlot::IsolationOrdinary);
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn slots_are_independent_streams() {
        let mut a = RngBank::new(42).for_slot(ModelSlot::LocalDensityOrdinary);
        let mut b = RngBank::new(42).for_slot(ModelSlot::IsolationOrdinary);
        let same = (0..16).filter(|_| a.next_u64() == b.next_u64()).count();
        assert!(same < 16, "Distinct slots produced identical streams");
    }

    #[test]
    fn fork_ignores_parent_position() {
        let mut parent = ModelRng::new(7, 3);
        let early = parent.fork(5).next_u64();
        for _ in 0..100 {
            parent.next_u64();
        }
        let late = parent.fork(5).next_u64();
        assert_eq!(early, late);
    }

    #[test]
    fn sample_indices_are_distinct() {
        let mut rng = ModelRng::new(1, 1);
        let mut picked = rng.sample_indices(50, 20);
        assert_eq!(picked.len(), 20);
        picked.sort_unstable();
        picked.dedup();
        assert_eq!(picked.len(), 20);
        assert!(picked.iter().all(|&i| i < 50));
        assert_eq!(rng.sample_indices(5, 9).len(), 5);
    }

    #[test]
    fn shuffle_is_a_seeded_permutation() {
        let mut a: Vec<u32> = (0..30).collect();
        let mut b = a.clone();
        ModelRng::new(4, 2).shuffle(&mut a);
        ModelRng::new(4, 2).shuffle(&mut b);
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn gaussian_is_centred() {
        let mut rng = ModelRng::new(99, 0);
        let n = 20_000;
        let mean = (0..n).map(|_| rng.gaussian(0.0, 1.0)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "Sample mean too far from 0: {mean}");
    }
}
