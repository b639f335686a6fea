//! Batch application of a stored transform to every point of a frame.

use crate::store::{StoreError, TransformStore};
use coreg_core::{
    transform_point, Frame, FrameId, Mat4, NamedPoint, PointError, PointSetStore, Pt3, Vec3,
};
use log::{info, warn};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::Display;
use thiserror::Error;

/// How mapped points are written into the destination frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    /// Appended to every label in the destination frame.
    pub suffix: String,
    /// Added to every mapped point, in destination coordinates.
    pub offset: Vec3,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            suffix: String::new(),
            offset: Vec3::zeros(),
        }
    }
}

/// A label that could not be mapped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelFailure {
    pub label: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: PointError,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MappingSummary {
    /// Points written to the destination frame, under their new labels.
    pub mapped: Vec<NamedPoint>,
    pub failures: Vec<LabelFailure>,
}

impl MappingSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("no transform from {source_frame} to {dest_frame}; calibrate the pair first")]
    TransformNotFound {
        source_frame: FrameId,
        dest_frame: FrameId,
    },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for MapError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound {
                source_frame,
                dest_frame,
            } => Self::TransformNotFound {
                source_frame,
                dest_frame,
            },
            other => Self::Store(other),
        }
    }
}

/// `matrix · [p, 1] + offset`.
pub fn apply_transform(matrix: &Mat4, p: &Pt3, offset: &Vec3) -> Pt3 {
    transform_point(matrix, p) + *offset
}

/// Map every point of `source` into `dest` using the stored transform.
///
/// Labels are visited in sorted order and written as `label + suffix`.
/// Existing destination points with the same label are overwritten, so
/// repeating the call gives the same coordinates. A point that cannot be
/// read or written is recorded in [`MappingSummary::failures`] and the rest
/// are still mapped.
///
/// # Errors
///
/// [`MapError::TransformNotFound`] if the pair was never calibrated; nothing
/// is written in that case.
pub fn map_points<S, T>(
    store: &mut S,
    transforms: &T,
    source: &Frame,
    dest: &Frame,
    opts: &MapOptions,
) -> Result<MappingSummary, MapError>
where
    S: PointSetStore + ?Sized,
    T: TransformStore + ?Sized,
{
    let transform = transforms.load(&source.id, &dest.id)?;

    let mut summary = MappingSummary::default();
    for label in store.list_labels(source) {
        let mapped = store.get_point(source, &label).and_then(|p| {
            let q = apply_transform(&transform.matrix, &p, &opts.offset);
            let new_label = format!("{label}{}", opts.suffix);
            store.put_point(dest, &new_label, &q)?;
            Ok(NamedPoint::new(new_label, dest.id.clone(), q))
        });
        match mapped {
            Ok(point) => summary.mapped.push(point),
            Err(error) => {
                warn!("could not map {label:?} from {} to {}: {error}", source.id, dest.id);
                summary.failures.push(LabelFailure { label, error });
            }
        }
    }

    info!(
        "mapped {} points from {} to {} ({} failed)",
        summary.mapped.len(),
        source.id,
        dest.id,
        summary.failures.len()
    );
    Ok(summary)
}

fn serialize_display<T: Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}
