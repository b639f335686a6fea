//! Transform persistence.
//!
//! [`TransformStore`] is the seam between the registration workflow and
//! wherever transforms live. Entries are keyed by the ordered
//! `(source, dest)` pair; saving replaces the previous entry, no history is
//! kept.

mod json_file;
mod memory;

pub use json_file::JsonFileTransformStore;
pub use memory::MemoryTransformStore;

use crate::transform::{Transform, AFFINE_ROW_TOL};
use coreg_core::{is_homogeneous_affine, FrameId};
use thiserror::Error;

/// Repository of the latest transform per ordered frame pair.
pub trait TransformStore {
    /// Save `transform`, overwriting any entry for the same `(source, dest)`.
    fn save(&mut self, transform: Transform) -> Result<(), StoreError>;

    /// Save several transforms.
    ///
    /// The default saves them one by one and stops at the first error, so
    /// earlier entries may already be stored. Both bundled backends override
    /// it to write all or nothing.
    fn save_all(&mut self, transforms: Vec<Transform>) -> Result<(), StoreError> {
        for transform in transforms {
            self.save(transform)?;
        }
        Ok(())
    }

    /// Load the transform from `source` to `dest`.
    ///
    /// Fails with [`StoreError::NotFound`] when no entry exists.
    fn load(&self, source: &FrameId, dest: &FrameId) -> Result<Transform, StoreError>;

    /// Stored `(source, dest)` pairs in key order.
    fn keys(&self) -> Result<Vec<(FrameId, FrameId)>, StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no transform from {source_frame} to {dest_frame}")]
    NotFound {
        source_frame: FrameId,
        dest_frame: FrameId,
    },
    #[error("transform {key} does not have a homogeneous [0, 0, 0, 1] bottom row")]
    NotAffine { key: String },
    #[error("malformed transform key {0:?}")]
    MalformedKey(String),
    /// Two distinct frame pairs map to the same key (frame names that differ
    /// only in spaces vs underscores).
    #[error("key {key} already holds the transform from {stored_source} to {stored_dest}")]
    KeyCollision {
        key: String,
        stored_source: FrameId,
        stored_dest: FrameId,
    },
    #[error("transform store i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("transform store json: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(source: &FrameId, dest: &FrameId) -> Self {
        Self::NotFound {
            source_frame: source.clone(),
            dest_frame: dest.clone(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Reject matrices whose bottom row is not `[0, 0, 0, 1]`.
pub(crate) fn check_affine(transform: &Transform) -> Result<(), StoreError> {
    if is_homogeneous_affine(&transform.matrix, AFFINE_ROW_TOL) {
        Ok(())
    } else {
        Err(StoreError::NotAffine {
            key: transform.key(),
        })
    }
}
