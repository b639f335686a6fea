//! Non-linear refinement of axis coupling in a registration matrix.
//!
//! A similarity fit assumes orthogonal stage axes. Real stages show small
//! coupling between nominally orthogonal axes, which shows up in the
//! off-diagonal entries of the linear block. This module frees those six
//! entries, keeps the diagonal and the translation column fixed, and
//! minimises `‖v2 − M · v1‖²` with a least-squares backend.

use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use coreg_core::{is_homogeneous_affine, Mat4, Pt3, Real};
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Matrix positions of the free parameters, in parameter-vector order.
pub const OFF_DIAGONAL_INDICES: [(usize, usize); 6] =
    [(0, 1), (1, 0), (0, 2), (2, 0), (1, 2), (2, 1)];

/// The six off-diagonal entries of the 3×3 linear block.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OffDiagonal {
    pub m01: Real,
    pub m10: Real,
    pub m02: Real,
    pub m20: Real,
    pub m12: Real,
    pub m21: Real,
}

impl OffDiagonal {
    pub fn from_matrix(m: &Mat4) -> Self {
        Self {
            m01: m[(0, 1)],
            m10: m[(1, 0)],
            m02: m[(0, 2)],
            m20: m[(2, 0)],
            m12: m[(1, 2)],
            m21: m[(2, 1)],
        }
    }

    pub fn from_slice(x: &[Real]) -> Self {
        Self {
            m01: x[0],
            m10: x[1],
            m02: x[2],
            m20: x[3],
            m12: x[4],
            m21: x[5],
        }
    }

    pub fn to_array(&self) -> [Real; 6] {
        [self.m01, self.m10, self.m02, self.m20, self.m12, self.m21]
    }

    /// Copy of `base` with these off-diagonal entries.
    pub fn apply_to(&self, base: &Mat4) -> Mat4 {
        let mut m = *base;
        for (&(r, c), v) in OFF_DIAGONAL_INDICES.iter().zip(self.to_array()) {
            m[(r, c)] = v;
        }
        m
    }
}

/// Errors that can occur during refinement.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RefineError {
    #[error("point sets must be non-empty and of equal length: {v1_len} vs {v2_len}")]
    Dimension { v1_len: usize, v2_len: usize },
    #[error("initial matrix is not a homogeneous affine transform")]
    NotAffine,
    /// The solver stopped without meeting its tolerances.
    ///
    /// `unrefined` is the input matrix; using it instead is the caller's call.
    #[error("refinement did not converge after {} evaluations ({})", .report.iterations, .report.termination)]
    Convergence {
        report: SolveReport,
        unrefined: Mat4,
    },
}

/// Least-squares problem over the six off-diagonal entries.
#[derive(Debug, Clone)]
pub struct OffDiagonalProblem<'a> {
    base: Mat4,
    source: &'a [Pt3],
    target: &'a [Pt3],
}

impl<'a> OffDiagonalProblem<'a> {
    pub fn new(base: Mat4, source: &'a [Pt3], target: &'a [Pt3]) -> Self {
        debug_assert_eq!(source.len(), target.len());
        Self {
            base,
            source,
            target,
        }
    }

    pub fn initial_params(&self) -> DVector<Real> {
        DVector::from_row_slice(&OffDiagonal::from_matrix(&self.base).to_array())
    }

    pub fn matrix(&self, x: &DVector<Real>) -> Mat4 {
        OffDiagonal::from_slice(x.as_slice()).apply_to(&self.base)
    }
}

impl NllsProblem for OffDiagonalProblem<'_> {
    fn num_params(&self) -> usize {
        OFF_DIAGONAL_INDICES.len()
    }

    fn num_residuals(&self) -> usize {
        3 * self.source.len()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let m = self.matrix(x);
        let mut r = DVector::zeros(self.num_residuals());
        for (k, (s, t)) in self.source.iter().zip(self.target.iter()).enumerate() {
            // homogeneous row is identically zero, only x/y/z contribute
            let pred = m.fixed_view::<3, 3>(0, 0) * s.coords + m.fixed_view::<3, 1>(0, 3);
            r.fixed_rows_mut::<3>(3 * k).copy_from(&(t.coords - pred));
        }
        r
    }

    fn jacobian(&self, _x: &DVector<Real>) -> DMatrix<Real> {
        // r_{k,i} = t_{k,i} - Σ_j M_ij s_{k,j}  =>  ∂r_{k,i}/∂M_ij = -s_{k,j}
        let mut j = DMatrix::zeros(self.num_residuals(), self.num_params());
        for (k, s) in self.source.iter().enumerate() {
            for (p, &(row, col)) in OFF_DIAGONAL_INDICES.iter().enumerate() {
                j[(3 * k + row, p)] = -s[col];
            }
        }
        j
    }
}

/// Outcome of a successful refinement.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinedTransform {
    pub matrix: Mat4,
    pub params: OffDiagonal,
    pub report: SolveReport,
    /// Sum of squared residuals of the input matrix.
    pub initial_sse: Real,
    /// Sum of squared residuals of the refined matrix.
    pub final_sse: Real,
}

/// Refine the off-diagonal coupling terms of `initial` so that
/// `initial · v1 ≈ v2` in the least-squares sense.
///
/// The diagonal and translation column of `initial` are kept; the input is
/// not modified and a new matrix is returned.
///
/// # Errors
///
/// [`RefineError::Dimension`] for empty or mismatched point lists,
/// [`RefineError::NotAffine`] if `initial` has a non-affine bottom row and
/// [`RefineError::Convergence`] when the solver exhausts its budget or hits a
/// numerical failure.
pub fn refine_off_diagonal<B: NllsSolverBackend>(
    backend: &B,
    initial: &Mat4,
    v1: &[Pt3],
    v2: &[Pt3],
    opts: &SolveOptions,
) -> Result<RefinedTransform, RefineError> {
    if v1.is_empty() || v1.len() != v2.len() {
        return Err(RefineError::Dimension {
            v1_len: v1.len(),
            v2_len: v2.len(),
        });
    }
    if !is_homogeneous_affine(initial, 1e-12) {
        return Err(RefineError::NotAffine);
    }

    let problem = OffDiagonalProblem::new(*initial, v1, v2);
    let x0 = problem.initial_params();
    let initial_sse = problem.sum_of_squares(&x0);

    let (x_opt, report) = backend.solve(&problem, x0, opts);
    if !report.converged || !report.final_cost.is_finite() {
        return Err(RefineError::Convergence {
            report,
            unrefined: *initial,
        });
    }

    let final_sse = problem.sum_of_squares(&x_opt);
    debug!(
        "off-diagonal refinement: sse {:.3e} -> {:.3e} in {} evaluations",
        initial_sse, final_sse, report.iterations
    );

    Ok(RefinedTransform {
        matrix: problem.matrix(&x_opt),
        params: OffDiagonal::from_slice(x_opt.as_slice()),
        report,
        initial_sse,
        final_sse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend_lm::LmBackend;
    use coreg_core::synthetic::scattered_points;

    fn finite_difference_jacobian(p: &OffDiagonalProblem, x: &DVector<Real>) -> DMatrix<Real> {
        let base = p.residuals(x);
        let eps = 1e-6;
        let mut j = DMatrix::zeros(p.num_residuals(), p.num_params());
        for k in 0..p.num_params() {
            let mut xp = x.clone();
            xp[k] += eps;
            j.set_column(k, &((p.residuals(&xp) - &base) / eps));
        }
        j
    }

    #[test]
    fn analytic_jacobian_matches_finite_differences() {
        let src = scattered_points(5, 1, 2.0);
        let dst = scattered_points(5, 2, 2.0);
        let mut base = Mat4::identity();
        base[(0, 3)] = 0.3;
        let problem = OffDiagonalProblem::new(base, &src, &dst);
        let x = DVector::from_row_slice(&[0.1, -0.2, 0.05, 0.0, 0.3, -0.1]);

        let diff = problem.jacobian(&x) - finite_difference_jacobian(&problem, &x);
        assert!(diff.amax() < 1e-6, "max jacobian diff {}", diff.amax());
    }

    #[test]
    fn params_round_trip_through_matrix() {
        let mut m = Mat4::identity();
        for (i, &(r, c)) in OFF_DIAGONAL_INDICES.iter().enumerate() {
            m[(r, c)] = i as Real + 1.0;
        }
        let p = OffDiagonal::from_matrix(&m);
        assert_eq!(p.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(p.apply_to(&Mat4::identity()), m);
    }

    #[test]
    fn refinement_recovers_exact_coupling() {
        let src = scattered_points(12, 4, 5.0);
        let mut truth = Mat4::identity();
        truth[(0, 1)] = 0.02;
        truth[(2, 0)] = -0.015;
        truth[(1, 2)] = 0.01;
        truth[(0, 3)] = 1.5;
        let dst = coreg_core::synthetic::transform_points(&truth, &src);

        let refined = refine_off_diagonal(
            &LmBackend,
            &Mat4::new_translation(&coreg_core::Vec3::new(1.5, 0.0, 0.0)),
            &src,
            &dst,
            &SolveOptions::default(),
        )
        .unwrap();

        assert!((refined.matrix - truth).amax() < 1e-9);
        assert!(refined.final_sse < 1e-16);
        assert!(refined.initial_sse > 0.0);
        // diagonal and translation untouched
        assert_eq!(refined.matrix[(1, 1)], 1.0);
        assert_eq!(refined.matrix[(0, 3)], 1.5);
    }

    #[test]
    fn empty_input_is_dimension_error() {
        let err = refine_off_diagonal(
            &LmBackend,
            &Mat4::identity(),
            &[],
            &[],
            &SolveOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, RefineError::Dimension { v1_len: 0, v2_len: 0 });
    }

    #[test]
    fn non_affine_initial_matrix_is_rejected() {
        let pts = scattered_points(6, 9, 1.0);
        let mut m = Mat4::identity();
        m[(3, 0)] = 1.0;
        assert_eq!(
            refine_off_diagonal(&LmBackend, &m, &pts, &pts, &SolveOptions::default()),
            Err(RefineError::NotAffine)
        );
    }
}
