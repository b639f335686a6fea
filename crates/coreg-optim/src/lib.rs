//! Non-linear least-squares refinement of registration matrices.
//!
//! The crate keeps the solver behind a small seam: problems implement
//! [`NllsProblem`] (dense residuals and Jacobian) and backends implement
//! [`NllsSolverBackend`]. [`LmBackend`] wraps the `levenberg-marquardt`
//! crate. The only problem shipped here is the off-diagonal coupling
//! refinement used after the closed-form fit from `coreg-linear`.

pub mod backend_lm;
pub mod refine;
mod traits;

pub use backend_lm::LmBackend;
pub use refine::{
    refine_off_diagonal, OffDiagonal, OffDiagonalProblem, RefineError, RefinedTransform,
    OFF_DIAGONAL_INDICES,
};
pub use traits::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
