//! Deterministic pseudo-random helpers for synthetic datasets.
//!
//! The functions here avoid `thread_rng` and do not depend on the internal
//! algorithm of `rand` RNGs. This keeps synthetic datasets stable across
//! versions and platforms.

use crate::{Real, Vec3};

/// Deterministic uniform noise in `[-max_abs, +max_abs]` per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformNoise {
    /// Base seed controlling the pseudo-random sequence.
    pub seed: u64,
    /// Maximum absolute per-axis noise.
    pub max_abs: Real,
}

impl Default for UniformNoise {
    fn default() -> Self {
        Self {
            seed: 0,
            max_abs: 0.0,
        }
    }
}

impl UniformNoise {
    /// Sample a deterministic 3D noise vector for a given point index.
    #[inline]
    pub fn sample(&self, point_idx: usize) -> Vec3 {
        let max_abs = self.max_abs.abs();
        if max_abs == 0.0 {
            return Vec3::zeros();
        }
        let u = unit_triple(self.seed, point_idx);
        u.map(|v| (v - 0.5) * 2.0 * max_abs)
    }
}

/// Three deterministic values in `[0, 1)` for a `(seed, index)` key.
pub fn unit_triple(seed: u64, idx: usize) -> Vec3 {
    let key = mix_key(seed, idx);
    Vec3::new(
        u64_to_unit_f64(splitmix64(key)),
        u64_to_unit_f64(splitmix64(key ^ 0x94D0_49BB_1331_11EB)),
        u64_to_unit_f64(splitmix64(key ^ 0xD6E8_FEB8_6659_FD93)),
    )
}

#[inline]
fn mix_key(seed: u64, idx: usize) -> u64 {
    seed ^ (idx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn u64_to_unit_f64(x: u64) -> Real {
    // Top 53 bits -> [0, 1).
    let mantissa = x >> 11;
    (mantissa as Real) * (1.0 / ((1u64 << 53) as Real))
}
