//! Registration workflow, transform persistence and point mapping.
//!
//! This crate glues the estimators together into the two operator-facing
//! paths:
//!
//! - **Calibration**: [`calibrate_pair`] reads the positions two frames have
//!   in common, fits `a → b` and `b → a` ([`register`]) and saves both in a
//!   [`TransformStore`].
//! - **Application**: [`map_points`] loads a saved transform and writes every
//!   point of the source frame into the destination frame.
//!
//! ```no_run
//! use coreg_core::{Frame, MemoryPointStore};
//! use coreg_pipeline::{
//!     calibrate_pair, map_points, JsonFileTransformStore, MapOptions, RegistrationConfig,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let uscope = Frame::new("IDE_Microscope", ["m1", "m2", "m3"]);
//! let stage = Frame::xyz("SampleStage");
//! let mut points = MemoryPointStore::new();
//! // ... record the same fiducials in both frames ...
//!
//! let mut transforms = JsonFileTransformStore::new("transforms.json");
//! let cal = calibrate_pair(&points, &mut transforms, &uscope, &stage, &RegistrationConfig::default())?;
//! println!("forward rms {:.3e}", cal.forward.final_error.rms);
//!
//! let summary = map_points(&mut points, &transforms, &uscope, &stage, &MapOptions::default())?;
//! assert!(summary.is_complete());
//! # Ok(())
//! # }
//! ```

mod correspondence;
mod mapper;
mod registration;
pub mod store;
mod transform;

pub use correspondence::CorrespondenceSet;
pub use mapper::{apply_transform, map_points, LabelFailure, MapError, MapOptions, MappingSummary};
pub use registration::{
    calibrate_pair, calibrate_pair_with, register, register_with, Calibration, Registration,
    RegistrationConfig, RegistrationError, ResidualStats, MIN_CORRESPONDENCES,
};
pub use store::{JsonFileTransformStore, MemoryTransformStore, StoreError, TransformStore};
pub use transform::{
    current_timestamp, parse_transform_key, transform_key, Transform, TransformRecord,
    AFFINE_ROW_TOL,
};
