//! High-level entry crate for the `coreg` workspace.
//!
//! `coreg` registers 3D coordinate frames against each other from points
//! recorded in both (for example a microscope and a sample stage), persists
//! the fitted 4×4 transforms and maps further points between the frames.
//!
//! ## Workflow API
//!
//! ```no_run
//! use coreg::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let uscope = Frame::new("IDE_Microscope", ["m1", "m2", "m3"]);
//! let stage = Frame::xyz("SampleStage");
//! let mut points = MemoryPointStore::new();
//! // ... at least six fiducials saved in both frames ...
//!
//! let mut transforms = JsonFileTransformStore::new("transforms.json");
//! calibrate_pair(&points, &mut transforms, &uscope, &stage, &RegistrationConfig::default())?;
//!
//! let summary = map_points(&mut points, &transforms, &uscope, &stage, &MapOptions::default())?;
//! for failure in &summary.failures {
//!     eprintln!("{}: {}", failure.label, failure.error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Building blocks
//!
//! ```
//! use coreg::core::synthetic::{rigid_transform_from_seed, scattered_points, transform_points};
//! use coreg::linear::{affine_matrix_from_points, AffineOptions};
//!
//! let truth = rigid_transform_from_seed(1, 10.0);
//! let v0 = scattered_points(8, 2, 5.0);
//! let v1 = transform_points(&truth, &v0);
//!
//! let est = affine_matrix_from_points(&v0, &v1, &AffineOptions::default()).unwrap();
//! assert!((est.matrix - truth).norm() < 1e-8);
//! ```
//!
//! ## Module Organization
//!
//! - **[`core`]**: Math aliases, frames, point stores, synthetic data
//! - **[`linear`]**: Closed-form similarity fit
//! - **[`optim`]**: Off-diagonal refinement and the solver backend
//! - **[`pipeline`]**: Registration workflow, transform stores, mapping
//! - **[`prelude`]**: Convenient re-exports for common use cases

/// Math types, frames and point-set storage.
pub mod core {
    pub use coreg_core::*;
}

/// Closed-form (SVD or quaternion) registration of matched point sets.
pub mod linear {
    pub use coreg_linear::*;
}

/// Non-linear least-squares refinement.
pub mod optim {
    pub use coreg_optim::*;
}

/// Calibration and application workflows over pluggable stores.
pub mod pipeline {
    pub use coreg_pipeline::*;
}

/// Convenient re-exports for common use cases.
///
/// Import with `use coreg::prelude::*;` to get started quickly.
pub mod prelude {
    pub use crate::core::{
        Frame, FrameId, Mat4, MemoryPointStore, NamedPoint, PointSetStore, Pt3, Real, Vec3,
    };

    pub use crate::linear::{affine_matrix_from_points, AffineOptions, RotationMethod};

    pub use crate::optim::SolveOptions;

    pub use crate::pipeline::{
        calibrate_pair, map_points, register, JsonFileTransformStore, MapOptions,
        MemoryTransformStore, RegistrationConfig, Transform, TransformStore,
    };
}
