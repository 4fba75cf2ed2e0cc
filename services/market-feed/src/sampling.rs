//! Random sources for synthetic ticks
//!
//! The price walk and the traded quantity draw from injected sources so that
//! tests can replay exact sequences. Any `FnMut() -> f64` closure is a
//! [`NormalSource`] and any `FnMut() -> u64` closure is a [`VolumeSource`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

/// Source of standard-normal samples (mean 0, std 1).
pub trait NormalSource: Send {
    fn next_gaussian(&mut self) -> f64;
}

impl<F> NormalSource for F
where
    F: FnMut() -> f64 + Send,
{
    fn next_gaussian(&mut self) -> f64 {
        self()
    }
}

/// Source of traded quantities for one tick.
pub trait VolumeSource: Send {
    fn next_quantity(&mut self) -> u64;
}

impl<F> VolumeSource for F
where
    F: FnMut() -> u64 + Send,
{
    fn next_quantity(&mut self) -> u64 {
        self()
    }
}

/// Deterministic seeded sampler backed by ChaCha8.
pub struct SeededSampler {
    rng: ChaCha8Rng,
    min_quantity: u64,
    max_quantity: u64,
}

impl SeededSampler {
    /// Create a sampler; the same seed replays the same sequence.
    ///
    /// Quantities are drawn uniformly from `[min_quantity, max_quantity]`;
    /// the bounds are swapped if given in the wrong order.
    pub fn new(seed: u64, min_quantity: u64, max_quantity: u64) -> Self {
        let (lo, hi) = if min_quantity <= max_quantity {
            (min_quantity, max_quantity)
        } else {
            (max_quantity, min_quantity)
        };
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            min_quantity: lo,
            max_quantity: hi,
        }
    }

    /// Seed from OS entropy.
    pub fn from_entropy(min_quantity: u64, max_quantity: u64) -> Self {
        Self::new(rand::thread_rng().gen(), min_quantity, max_quantity)
    }
}

impl NormalSource for SeededSampler {
    fn next_gaussian(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }
}

impl VolumeSource for SeededSampler {
    fn next_quantity(&mut self) -> u64 {
        self.rng.gen_range(self.min_quantity..=self.max_quantity)
    }
}

/// Replays a fixed list of gaussian samples, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct FixedSequence {
    samples: Vec<f64>,
    cursor: usize,
}

impl FixedSequence {
    pub fn new(samples: Vec<f64>) -> Self {
        Self { samples, cursor: 0 }
    }
}

impl NormalSource for FixedSequence {
    fn next_gaussian(&mut self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let value = self.samples[self.cursor % self.samples.len()];
        self.cursor += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SeededSampler::new(42, 1, 500);
        let mut b = SeededSampler::new(42, 1, 500);

        for _ in 0..100 {
            assert_eq!(a.next_gaussian(), b.next_gaussian());
            assert_eq!(a.next_quantity(), b.next_quantity());
        }
    }

    #[test]
    fn test_quantity_within_bounds() {
        let mut sampler = SeededSampler::new(7, 10, 20);
        for _ in 0..1_000 {
            let q = sampler.next_quantity();
            assert!((10..=20).contains(&q));
        }
    }

    #[test]
    fn test_inverted_bounds_are_swapped() {
        let mut sampler = SeededSampler::new(7, 20, 10);
        let q = sampler.next_quantity();
        assert!((10..=20).contains(&q));
    }

    #[test]
    fn test_gaussian_is_roughly_standard() {
        let mut sampler = SeededSampler::new(1234, 1, 1);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| sampler.next_gaussian()).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;

        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.05, "variance {}", var);
    }

    #[test]
    fn test_closures_are_sources() {
        let mut g = || 0.5_f64;
        let mut v = || 42_u64;
        assert_eq!(NormalSource::next_gaussian(&mut g), 0.5);
        assert_eq!(VolumeSource::next_quantity(&mut v), 42);
    }

    #[test]
    fn test_fixed_sequence_cycles() {
        let mut seq = FixedSequence::new(vec![1.0, -1.0]);
        assert_eq!(seq.next_gaussian(), 1.0);
        assert_eq!(seq.next_gaussian(), -1.0);
        assert_eq!(seq.next_gaussian(), 1.0);

        let mut empty = FixedSequence::new(Vec::new());
        assert_eq!(empty.next_gaussian(), 0.0);
    }
}
