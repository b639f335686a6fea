//! Closed-form registration of matched 3D point sets.
//!
//! The entry point is [`affine_matrix_from_points`], which returns the
//! similarity (or rigid) transform that best maps one point list onto
//! another in the least-squares sense. Its output seeds the non-linear
//! refinement in `coreg-optim`.

mod affine;

pub use affine::*;
