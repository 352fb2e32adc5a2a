//! Deterministic channel-keyed noise lookup.
//!
//! All per-coordinate placement decisions in the world (forest density,
//! rock mottling, vegetation rolls, blend draws) go through a
//! [`NoiseSource`] so that re-carving a chunk reproduces it exactly,
//! independent of generation order. Each named channel gets its own
//! generator, seeded from the world seed and the channel name.

use ahash::RandomState;
use noise::{Fbm, MultiFractal, NoiseFn, OpenSimplex};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};

/// Default frequency for smooth channel noise, in cycles per world cell.
const SMOOTH_FREQUENCY: f64 = 0.05;

/// Octaves for smooth channel noise.
const SMOOTH_OCTAVES: usize = 3;

/// Deterministic 2D scalar noise keyed by world coordinate and channel name.
///
/// `sample` returns smooth, spatially correlated noise (terrain fields);
/// `white` returns a decorrelated per-cell value (random rolls and picks).
/// Both are pure functions of `(channel, x, y)` for a fixed world seed.
pub struct NoiseSource {
    /// World seed all channels derive from.
    seed: u64,
    /// Lazily built smooth generators, one per channel.
    channels: RwLock<HashMap<String, Fbm<OpenSimplex>>>,
}

impl NoiseSource {
    /// Creates a noise source for the given world seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the world seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Derives a per-channel seed from the world seed and channel name.
    fn channel_seed(&self, channel: &str) -> u64 {
        // Fixed hasher keys keep channel seeds stable across runs.
        let state = RandomState::with_seeds(
            0x9E37_79B9_7F4A_7C15,
            0xBF58_476D_1CE4_E5B9,
            0x94D0_49BB_1331_11EB,
            self.seed,
        );
        let mut hasher = state.build_hasher();
        channel.hash(&mut hasher);
        hasher.finish() ^ self.seed
    }

    /// Smooth noise in `[-1, 1]` at a world coordinate.
    #[must_use]
    pub fn sample(&self, channel: &str, x: i64, y: i64) -> f64 {
        {
            let channels = self.channels.read();
            if let Some(fbm) = channels.get(channel) {
                return fbm.get([x as f64, y as f64]).clamp(-1.0, 1.0);
            }
        }

        let fbm = Fbm::<OpenSimplex>::new(self.channel_seed(channel) as u32)
            .set_octaves(SMOOTH_OCTAVES)
            .set_frequency(SMOOTH_FREQUENCY);
        let value = fbm.get([x as f64, y as f64]).clamp(-1.0, 1.0);
        self.channels.write().insert(channel.to_owned(), fbm);
        value
    }

    /// Smooth noise remapped to `[0, 1]`.
    #[must_use]
    pub fn sample01(&self, channel: &str, x: i64, y: i64) -> f64 {
        (self.sample(channel, x, y) + 1.0) * 0.5
    }

    /// Decorrelated per-cell value in `[0, 1)`.
    #[must_use]
    pub fn white(&self, channel: &str, x: i64, y: i64) -> f64 {
        let mixed = mix64(
            self.channel_seed(channel)
                .wrapping_add((x as u64).wrapping_mul(0xA24B_AED4_963E_E407))
                .wrapping_add((y as u64).wrapping_mul(0x9FB2_1C65_1E98_DF25)),
        );
        // 53 mantissa bits of the mix, as a float in [0, 1).
        (mixed >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Per-cell boolean roll with probability `p`.
    #[must_use]
    pub fn roll(&self, channel: &str, x: i64, y: i64, p: f64) -> bool {
        self.white(channel, x, y) < p
    }

    /// Per-cell weighted index draw over `weights`.
    ///
    /// Returns `None` when the weight sum is not positive.
    #[must_use]
    pub fn pick_weighted(&self, channel: &str, x: i64, y: i64, weights: &[f32]) -> Option<usize> {
        let total: f32 = weights.iter().copied().filter(|w| *w > 0.0).sum();
        if total <= 0.0 {
            return None;
        }
        let mut target = (self.white(channel, x, y) as f32) * total;
        for (i, w) in weights.iter().enumerate() {
            if *w <= 0.0 {
                continue;
            }
            if target < *w {
                return Some(i);
            }
            target -= *w;
        }
        // Floating point slop lands on the last positive weight.
        weights.iter().rposition(|w| *w > 0.0)
    }
}

impl std::fmt::Debug for NoiseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseSource").field("seed", &self.seed).finish()
    }
}

/// Finalizing mix (splitmix64).
const fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_deterministic() {
        let a = NoiseSource::new(42);
        let b = NoiseSource::new(42);
        assert_eq!(a.sample("forest density", 10, -7), b.sample("forest density", 10, -7));
        assert_eq!(a.white("veg roll", 3, 3), b.white("veg roll", 3, 3));
    }

    #[test]
    fn test_channels_independent() {
        let n = NoiseSource::new(42);
        let forest = n.sample("forest density", 100, 100);
        let rock = n.sample("rock mottling", 100, 100);
        assert_ne!(forest, rock);
    }

    #[test]
    fn test_seed_changes_output() {
        let a = NoiseSource::new(1);
        let b = NoiseSource::new(2);
        assert_ne!(a.white("veg roll", 5, 5), b.white("veg roll", 5, 5));
    }

    #[test]
    fn test_white_in_unit_range() {
        let n = NoiseSource::new(7);
        for x in -50..50 {
            let v = n.white("roll", x, -x);
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_pick_weighted_respects_zero_weights() {
        let n = NoiseSource::new(7);
        for x in 0..100 {
            let idx = n.pick_weighted("pick", x, 0, &[0.0, 1.0, 0.0]);
            assert_eq!(idx, Some(1));
        }
        assert_eq!(n.pick_weighted("pick", 0, 0, &[0.0, 0.0]), None);
    }

    #[test]
    fn test_pick_weighted_hits_all_positive_entries() {
        let n = NoiseSource::new(7);
        let mut seen = [false; 3];
        for x in 0..500 {
            if let Some(i) = n.pick_weighted("pick", x, 9, &[1.0, 2.0, 1.0]) {
                seen[i] = true;
            }
        }
        assert_eq!(seen, [true, true, true]);
    }
}
