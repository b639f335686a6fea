//! Core math, frame and point-store primitives for `coreg`.
//!
//! This crate provides the foundational building blocks used by all other
//! crates in the workspace:
//!
//! - linear algebra type aliases (`Real`, `Vec3`, `Pt3`, `Mat4`, ...) and
//!   homogeneous-matrix helpers,
//! - coordinate frames ([`FrameId`], [`Frame`]) and named positions,
//! - the [`PointSetStore`] seam through which registration reads survey
//!   points and writes mapped ones, with an in-memory implementation,
//! - deterministic synthetic data for tests and benchmarks.
//!
//! # Example
//!
//! ```
//! use coreg_core::{Frame, MemoryPointStore, PointSetStore, Pt3};
//!
//! let uscope = Frame::new("IDE_Microscope", ["m1", "m2", "m3"]);
//! let mut store = MemoryPointStore::new();
//! store.insert_point(&uscope, "fiducial_1", Pt3::new(1.0, 2.0, 3.0));
//!
//! assert_eq!(store.list_labels(&uscope), vec!["fiducial_1"]);
//! assert_eq!(store.get_point(&uscope, "fiducial_1").unwrap(), Pt3::new(1.0, 2.0, 3.0));
//! ```

mod frame;
/// Linear algebra type aliases and helpers.
mod math;
mod point;
mod store;
/// Deterministic synthetic data generation helpers.
pub mod synthetic;

pub use frame::*;
pub use math::*;
pub use point::*;
pub use store::*;
