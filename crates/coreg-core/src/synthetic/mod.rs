//! Deterministic synthetic registration data.
//!
//! Small building blocks for tests and benchmarks: scattered survey points,
//! seeded rigid transforms and noise. Everything is reproducible from a seed.

pub mod noise;

pub use noise::{unit_triple, UniformNoise};

use crate::{compose_affine, transform_point, Mat3, Mat4, Pt3, Real};
use nalgebra::{Quaternion, UnitQuaternion};
use std::f64::consts::PI;

/// `n` points scattered uniformly in the cube `[-half_extent, half_extent]³`.
pub fn scattered_points(n: usize, seed: u64, half_extent: Real) -> Vec<Pt3> {
    (0..n)
        .map(|i| {
            let u = unit_triple(seed, i);
            Pt3::from(u.map(|v| (v - 0.5) * 2.0 * half_extent))
        })
        .collect()
}

/// Uniformly distributed rotation derived from a seed (Shoemake's method).
pub fn rotation_from_seed(seed: u64) -> Mat3 {
    let u = unit_triple(seed, usize::MAX);
    let (r1, r2) = ((1.0 - u.x).sqrt(), u.x.sqrt());
    let (t1, t2) = (2.0 * PI * u.y, 2.0 * PI * u.z);
    let q = Quaternion::new(r2 * t2.cos(), r1 * t1.sin(), r1 * t1.cos(), r2 * t2.sin());
    UnitQuaternion::from_quaternion(q)
        .to_rotation_matrix()
        .into_inner()
}

/// Seeded rotation plus a translation with components in `[-max_t, max_t]`.
pub fn rigid_transform_from_seed(seed: u64, max_t: Real) -> Mat4 {
    let t = unit_triple(seed ^ 0x5EED, 0).map(|v| (v - 0.5) * 2.0 * max_t);
    compose_affine(&rotation_from_seed(seed), &t)
}

/// Apply `m` to every point.
pub fn transform_points(m: &Mat4, points: &[Pt3]) -> Vec<Pt3> {
    points.iter().map(|p| transform_point(m, p)).collect()
}

/// Add deterministic noise to every point.
pub fn perturb_points(points: &[Pt3], noise: &UniformNoise) -> Vec<Pt3> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| *p + noise.sample(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_rotation_is_proper() {
        for seed in 0..16 {
            let r = rotation_from_seed(seed);
            assert!((r.determinant() - 1.0).abs() < 1e-12);
            assert!((r.transpose() * r - Mat3::identity()).norm() < 1e-12);
        }
    }

    #[test]
    fn scattered_points_are_reproducible() {
        let a = scattered_points(8, 42, 10.0);
        let b = scattered_points(8, 42, 10.0);
        assert_eq!(a, b);
        assert!(a.iter().all(|p| p.coords.amax() <= 10.0));
    }
}
