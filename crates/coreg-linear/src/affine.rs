//! Least-squares similarity registration of two matched 3D point sets.
//!
//! Both point sets are centred on their centroids, the rotation is recovered
//! from the cross-covariance (Kabsch, via SVD) or from Horn's quaternion
//! eigenproblem, and an optional uniform scale is taken as the ratio of RMS
//! deviations from the centroids. The result is a 4×4 homogeneous matrix `M`
//! with `M · v0 ≈ v1`.

use coreg_core::{centroid, compose_affine, translation_matrix, Mat3, Mat4, Pt3, Real, Vec3};
use log::{debug, warn};
use nalgebra::{Matrix4, Quaternion, SymmetricEigen, UnitQuaternion};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dimensionality of the coordinate space.
pub const DIMS: usize = 3;

/// Minimum number of correspondences accepted by the estimator.
pub const MIN_POINTS: usize = DIMS + 1;

/// Relative eigenvalue threshold below which a scatter direction counts as empty.
const RANK_TOL: Real = 1e-10;

/// Errors that can occur during affine estimation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AffineError {
    /// Point lists differ in length or are too short.
    #[error("input arrays are of wrong shape: {v0_len} vs {v1_len} points (need equal lengths of at least {min})")]
    Dimension {
        v0_len: usize,
        v1_len: usize,
        min: usize,
    },
    /// An input coordinate is NaN or infinite.
    #[error("point {index} has a non-finite coordinate")]
    NonFinite { index: usize },
    /// SVD did not return the requested factors.
    #[error("svd failed during affine estimation")]
    SvdFailed,
}

/// Rank-deficient source geometry.
///
/// Reported alongside a usable estimate rather than as a hard failure: badly
/// conditioned but usable fits occur in practice and the operator decides.
#[derive(Debug, Error, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[error("degenerate point geometry: points span {rank} of 3 dimensions (rms extents {extents:?})")]
pub struct DegenerateGeometry {
    /// Number of non-empty scatter directions (0..=2).
    pub rank: usize,
    /// RMS extent of the centred points along each principal axis, descending.
    pub extents: [Real; 3],
    /// Whether the rotation is still uniquely determined (rank 2 with the
    /// right-handedness constraint).
    pub unique_rotation: bool,
}

/// Algorithm used to recover the rotation block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationMethod {
    /// Kabsch: SVD of the cross-covariance matrix.
    #[default]
    Svd,
    /// Horn: eigenvector of the 4×4 quaternion matrix.
    Quaternion,
}

/// Options for [`affine_matrix_from_points`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineOptions {
    /// Estimate a uniform scale factor; otherwise the fit is rigid.
    pub scale: bool,
    pub method: RotationMethod,
}

impl Default for AffineOptions {
    fn default() -> Self {
        Self {
            scale: true,
            method: RotationMethod::Svd,
        }
    }
}

/// Result of an affine fit.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineEstimate {
    /// Homogeneous transform with `matrix[(3, 3)] == 1`.
    pub matrix: Mat4,
    /// Singular values of the cross-covariance; the last one is negated when
    /// the reflection guard fired.
    pub singular_values: Vec3,
    /// The naive solution was a reflection and has been flipped.
    pub reflection_corrected: bool,
    /// Uniform scale applied to the rotation (1 for rigid fits).
    pub scale: Real,
    /// Set when the source points do not span 3D space.
    pub degeneracy: Option<DegenerateGeometry>,
    rotation: Mat3,
}

impl AffineEstimate {
    /// Proper rotation found before scaling.
    ///
    /// Kept separately so it stays defined when the scale is zero (all
    /// destination points coincide).
    pub fn rotation(&self) -> Mat3 {
        self.rotation
    }

    pub fn is_degenerate(&self) -> bool {
        self.degeneracy.is_some()
    }
}

/// Return the affine matrix registering `v0` onto `v1`.
///
/// `v0[i]` and `v1[i]` are the same physical location in the two frames.
/// With `opts.scale == false` a rigid (Euclidean) transform is returned;
/// otherwise a similarity transform with uniform scale.
///
/// # Errors
///
/// [`AffineError::Dimension`] if the lists differ in length or hold fewer than
/// [`MIN_POINTS`] points, [`AffineError::NonFinite`] for NaN/inf input and
/// [`AffineError::SvdFailed`] if the decomposition yields no factors.
///
/// # Example
///
/// ```
/// use coreg_core::{transform_point, Pt3};
/// use coreg_linear::{affine_matrix_from_points, AffineOptions};
///
/// let v0 = vec![
///     Pt3::new(0.0, 0.0, 0.0),
///     Pt3::new(1.0, 0.0, 0.0),
///     Pt3::new(0.0, 1.0, 0.0),
///     Pt3::new(0.0, 0.0, 1.0),
/// ];
/// let v1: Vec<Pt3> = v0.iter().map(|p| Pt3::new(p.x + 2.0, p.y, p.z - 1.0)).collect();
///
/// let est = affine_matrix_from_points(&v0, &v1, &AffineOptions::default()).unwrap();
/// let p = transform_point(&est.matrix, &v0[1]);
/// assert!((p - v1[1]).norm() < 1e-9);
/// ```
pub fn affine_matrix_from_points(
    v0: &[Pt3],
    v1: &[Pt3],
    opts: &AffineOptions,
) -> Result<AffineEstimate, AffineError> {
    if v0.len() != v1.len() || v0.len() < MIN_POINTS {
        return Err(AffineError::Dimension {
            v0_len: v0.len(),
            v1_len: v1.len(),
            min: MIN_POINTS,
        });
    }
    if let Some(index) = v0
        .iter()
        .zip(v1.iter())
        .position(|(a, b)| !a.coords.iter().chain(b.coords.iter()).all(|c| c.is_finite()))
    {
        return Err(AffineError::NonFinite { index });
    }

    // move centroids to origin
    let c0 = centroid(v0);
    let c1 = centroid(v1);
    let d0: Vec<Vec3> = v0.iter().map(|p| p.coords - c0).collect();
    let d1: Vec<Vec3> = v1.iter().map(|p| p.coords - c1).collect();

    // C = V1c · V0cᵀ
    let mut cov = Mat3::zeros();
    for (a, b) in d0.iter().zip(d1.iter()) {
        cov += b * a.transpose();
    }

    let degeneracy = scatter_degeneracy(&d0);
    if let Some(deg) = &degeneracy {
        warn!("{deg}");
    }

    let (rotation, singular_values, reflection_corrected) = match opts.method {
        RotationMethod::Svd => rotation_svd(&cov)?,
        RotationMethod::Quaternion => {
            let s = cov.singular_values();
            (rotation_quaternion(&d0, &d1), s, false)
        }
    };

    let scale = if opts.scale {
        // ratio of RMS deviations from centroid
        let ss0: Real = d0.iter().map(|d| d.norm_squared()).sum();
        let ss1: Real = d1.iter().map(|d| d.norm_squared()).sum();
        if ss1 <= Real::EPSILON {
            warn!("destination points coincide, scale collapses to {:.3e}", ss1.sqrt());
        }
        if ss0 > Real::EPSILON {
            (ss1 / ss0).sqrt()
        } else {
            1.0
        }
    } else {
        1.0
    };

    // move centroids back: M = T1⁻¹ · [sR 0; 0 1] · T0
    let rs = compose_affine(&(rotation * scale), &Vec3::zeros());
    let mut matrix = translation_matrix(&c1) * rs * translation_matrix(&(-c0));
    let w = matrix[(3, 3)];
    matrix /= w;

    debug!(
        "affine fit: n={} scale={:.6} sv={:?} reflection_corrected={}",
        v0.len(),
        scale,
        singular_values.as_slice(),
        reflection_corrected
    );

    Ok(AffineEstimate {
        matrix,
        singular_values,
        reflection_corrected,
        scale,
        degeneracy,
        rotation,
    })
}

/// Rigid or similarity superimposition using the SVD method.
///
/// Thin wrapper over [`affine_matrix_from_points`] returning only the matrix.
pub fn superimposition_matrix(v0: &[Pt3], v1: &[Pt3], scale: bool) -> Result<Mat4, AffineError> {
    let opts = AffineOptions {
        scale,
        method: RotationMethod::Svd,
    };
    affine_matrix_from_points(v0, v1, &opts).map(|est| est.matrix)
}

/// RMS and maximum distance between `M · v0[i]` and `v1[i]`.
///
/// Returns `(0, 0)` for empty input.
pub fn alignment_error(matrix: &Mat4, v0: &[Pt3], v1: &[Pt3]) -> (Real, Real) {
    if v0.is_empty() {
        return (0.0, 0.0);
    }
    let mut sum_sq = 0.0;
    let mut max_sq: Real = 0.0;
    for (a, b) in v0.iter().zip(v1.iter()) {
        let d = (coreg_core::transform_point(matrix, a) - b).norm_squared();
        sum_sq += d;
        max_sq = max_sq.max(d);
    }
    ((sum_sq / v0.len() as Real).sqrt(), max_sq.sqrt())
}

/// Rotation from the SVD of the cross-covariance, forced right-handed.
fn rotation_svd(cov: &Mat3) -> Result<(Mat3, Vec3, bool), AffineError> {
    let svd = cov.svd(true, true);
    let u = svd.u.ok_or(AffineError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(AffineError::SvdFailed)?;
    let mut s = svd.singular_values;

    let mut r = u * v_t;
    let mut corrected = false;
    if r.determinant() < 0.0 {
        // R does not constitute a right-handed system
        r -= (u.column(DIMS - 1) * v_t.row(DIMS - 1)) * 2.0;
        s[DIMS - 1] *= -1.0;
        corrected = true;
    }
    Ok((r, s, corrected))
}

/// Rotation from Horn's closed-form unit quaternion.
fn rotation_quaternion(d0: &[Vec3], d1: &[Vec3]) -> Mat3 {
    // s[(a, b)] = Σ d0_a · d1_b
    let mut s = Mat3::zeros();
    for (a, b) in d0.iter().zip(d1.iter()) {
        s += a * b.transpose();
    }
    let (xx, xy, xz) = (s[(0, 0)], s[(0, 1)], s[(0, 2)]);
    let (yx, yy, yz) = (s[(1, 0)], s[(1, 1)], s[(1, 2)]);
    let (zx, zy, zz) = (s[(2, 0)], s[(2, 1)], s[(2, 2)]);

    #[rustfmt::skip]
    let n = Matrix4::new(
        xx + yy + zz, yz - zy,      zx - xz,      xy - yx,
        yz - zy,      xx - yy - zz, xy + yx,      zx + xz,
        zx - xz,      xy + yx,      yy - xx - zz, yz + zy,
        xy - yx,      zx + xz,      yz + zy,      zz - xx - yy,
    );

    // quaternion: eigenvector of the most positive eigenvalue
    let eig = SymmetricEigen::new(n);
    let best = eig.eigenvalues.imax();
    let q = eig.eigenvectors.column(best);
    let quat = Quaternion::new(q[0], q[1], q[2], q[3]);
    UnitQuaternion::from_quaternion(quat)
        .to_rotation_matrix()
        .into_inner()
}

/// Rank of the centred source scatter, if below 3.
fn scatter_degeneracy(d0: &[Vec3]) -> Option<DegenerateGeometry> {
    let mut scatter = Mat3::zeros();
    for d in d0 {
        scatter += d * d.transpose();
    }
    let mut eig: Vec<Real> = scatter
        .symmetric_eigenvalues()
        .iter()
        .map(|v| v.max(0.0))
        .collect();
    eig.sort_by(|a, b| b.total_cmp(a));

    let top = eig[0];
    let rank = if top <= 0.0 {
        0
    } else {
        eig.iter().filter(|&&v| v > RANK_TOL * top).count()
    };
    if rank == DIMS {
        return None;
    }

    let n = d0.len() as Real;
    Some(DegenerateGeometry {
        rank,
        extents: [(eig[0] / n).sqrt(), (eig[1] / n).sqrt(), (eig[2] / n).sqrt()],
        unique_rotation: rank >= 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreg_core::synthetic::{rigid_transform_from_seed, scattered_points, transform_points};
    use coreg_core::{linear_block, transform_point};

    fn tetra() -> Vec<Pt3> {
        vec![
            Pt3::new(0.0, 0.0, 0.0),
            Pt3::new(1.0, 0.0, 0.0),
            Pt3::new(0.0, 1.0, 0.0),
            Pt3::new(0.0, 0.0, 1.0),
            Pt3::new(1.0, 1.0, 1.0),
        ]
    }

    #[test]
    fn identity_for_identical_sets() {
        let v0 = scattered_points(10, 3, 1.0);
        let est = affine_matrix_from_points(&v0, &v0, &AffineOptions::default()).unwrap();
        assert!((est.matrix - Mat4::identity()).norm() < 1e-10);
        assert!(!est.reflection_corrected);
        assert!(!est.is_degenerate());
    }

    #[test]
    fn rigid_fit_recovers_seeded_transform() {
        let t = rigid_transform_from_seed(11, 20.0);
        let v0 = scattered_points(12, 5, 10.0);
        let v1 = transform_points(&t, &v0);

        let opts = AffineOptions {
            scale: false,
            method: RotationMethod::Svd,
        };
        let est = affine_matrix_from_points(&v0, &v1, &opts).unwrap();
        assert!(
            (est.matrix - t).norm() < 1e-8,
            "matrix error too large: {}",
            (est.matrix - t).norm()
        );
    }

    #[test]
    fn quaternion_method_matches_svd() {
        let t = rigid_transform_from_seed(29, 3.0);
        let v0 = scattered_points(9, 8, 2.0);
        let v1 = transform_points(&t, &v0);

        let svd = affine_matrix_from_points(&v0, &v1, &AffineOptions::default()).unwrap();
        let quat = affine_matrix_from_points(
            &v0,
            &v1,
            &AffineOptions {
                scale: true,
                method: RotationMethod::Quaternion,
            },
        )
        .unwrap();
        assert!((svd.matrix - quat.matrix).norm() < 1e-8);
    }

    #[test]
    fn rotation_about_z_with_translation() {
        let v0 = tetra();
        let rz = Mat3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let t = compose_affine(&rz, &Vec3::new(5.0, 5.0, 5.0));
        let v1 = transform_points(&t, &v0);

        let m = superimposition_matrix(&v0, &v1, false).unwrap();
        let p = transform_point(&m, &Pt3::new(1.0, 0.0, 0.0));
        assert!((p - Pt3::new(5.0, 6.0, 5.0)).norm() < 1e-9);
        assert!((linear_block(&m).determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mirrored_points_give_proper_rotation() {
        let v0 = tetra();
        let v1: Vec<Pt3> = v0.iter().map(|p| Pt3::new(-p.x, p.y, p.z)).collect();

        let est = affine_matrix_from_points(
            &v0,
            &v1,
            &AffineOptions {
                scale: false,
                method: RotationMethod::Svd,
            },
        )
        .unwrap();
        assert!(est.reflection_corrected);
        assert!(est.singular_values[2] <= 0.0);
        assert!(linear_block(&est.matrix).determinant() > 0.0);
    }

    #[test]
    fn too_few_points_is_dimension_error() {
        let v0 = tetra()[..3].to_vec();
        let err = affine_matrix_from_points(&v0, &v0, &AffineOptions::default()).unwrap_err();
        assert_eq!(
            err,
            AffineError::Dimension {
                v0_len: 3,
                v1_len: 3,
                min: MIN_POINTS
            }
        );
    }

    #[test]
    fn mismatched_lengths_is_dimension_error() {
        let v0 = tetra();
        let v1 = tetra()[..4].to_vec();
        assert!(matches!(
            affine_matrix_from_points(&v0, &v1, &AffineOptions::default()),
            Err(AffineError::Dimension { .. })
        ));
    }

    #[test]
    fn nan_input_is_rejected() {
        let v0 = tetra();
        let mut v1 = tetra();
        v1[2].y = Real::NAN;
        assert_eq!(
            affine_matrix_from_points(&v0, &v1, &AffineOptions::default()),
            Err(AffineError::NonFinite { index: 2 })
        );
    }

    #[test]
    fn coplanar_points_are_flagged_but_returned() {
        let v0: Vec<Pt3> = (0..6)
            .map(|i| Pt3::new(i as Real, (i * i) as Real * 0.5, 0.0))
            .collect();
        let t = rigid_transform_from_seed(2, 1.0);
        let v1 = transform_points(&t, &v0);

        let est = affine_matrix_from_points(&v0, &v1, &AffineOptions::default()).unwrap();
        let deg = est.degeneracy.expect("coplanar input should be flagged");
        assert_eq!(deg.rank, 2);
        assert!(deg.unique_rotation);
        assert!(alignment_error(&est.matrix, &v0, &v1).0 < 1e-8);
    }

    #[test]
    fn collinear_points_have_no_unique_rotation() {
        let v0: Vec<Pt3> = (0..5).map(|i| Pt3::new(i as Real, 0.0, 0.0)).collect();
        let est = affine_matrix_from_points(&v0, &v0, &AffineOptions::default()).unwrap();
        let deg = est.degeneracy.unwrap();
        assert_eq!(deg.rank, 1);
        assert!(!deg.unique_rotation);
    }

    #[test]
    fn alignment_error_reports_rms_and_max() {
        let v0 = vec![Pt3::origin(), Pt3::origin()];
        let v1 = vec![Pt3::new(3.0, 0.0, 0.0), Pt3::new(0.0, 4.0, 0.0)];
        let (rms, max) = alignment_error(&Mat4::identity(), &v0, &v1);
        assert!((rms - (12.5_f64).sqrt()).abs() < 1e-12);
        assert!((max - 4.0).abs() < 1e-12);
    }

    #[test]
    fn coincident_destination_keeps_a_finite_rotation() {
        let v0 = tetra();
        let target = Pt3::new(3.0, -1.0, 2.0);
        let v1 = vec![target; v0.len()];

        let est = affine_matrix_from_points(&v0, &v1, &AffineOptions::default()).unwrap();
        assert_eq!(est.scale, 0.0);
        let r = est.rotation();
        assert!(r.iter().all(|v| v.is_finite()));
        assert!((r.determinant() - 1.0).abs() < 1e-9);
        for p in &v0 {
            assert!((transform_point(&est.matrix, p) - target).norm() < 1e-12);
        }
    }
}
