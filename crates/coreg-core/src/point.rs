//! Named positions and the errors raised when reading them as 3D points.

use crate::{Frame, FrameId, Pt3, Real};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A labelled 3D point in a given frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPoint {
    pub label: String,
    pub frame: FrameId,
    pub coordinates: Pt3,
}

impl NamedPoint {
    pub fn new(label: impl Into<String>, frame: FrameId, coordinates: Pt3) -> Self {
        Self {
            label: label.into(),
            frame,
            coordinates,
        }
    }
}

/// Stored position: axis name → value.
///
/// A position may carry more axes than its frame uses (fine stages, theta);
/// only the frame's three axes are read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position {
    pub values: BTreeMap<String, Real>,
}

impl Position {
    /// Position holding exactly the frame's three axes.
    pub fn from_point(frame: &Frame, p: &Pt3) -> Self {
        let values = frame
            .axes
            .iter()
            .cloned()
            .zip([p.x, p.y, p.z])
            .collect();
        Self { values }
    }

    /// Read the frame's `x, y, z` axes.
    pub fn to_point(&self, frame: &Frame) -> Result<Pt3, PointError> {
        let mut xyz = [0.0; 3];
        for (slot, axis) in xyz.iter_mut().zip(frame.axes.iter()) {
            let value = *self
                .values
                .get(axis)
                .ok_or_else(|| PointError::MissingAxis { axis: axis.clone() })?;
            if !value.is_finite() {
                return Err(PointError::NonFinite {
                    axis: axis.clone(),
                    value,
                });
            }
            *slot = value;
        }
        Ok(Pt3::new(xyz[0], xyz[1], xyz[2]))
    }

    /// Overwrite the frame's three axes, keeping any other axes untouched.
    pub fn set_point(&mut self, frame: &Frame, p: &Pt3) {
        for (axis, value) in frame.axes.iter().zip([p.x, p.y, p.z]) {
            self.values.insert(axis.clone(), value);
        }
    }
}

/// Errors from reading or writing a single named position.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PointError {
    #[error("frame {frame} has no position named {label:?}")]
    UnknownLabel { frame: FrameId, label: String },
    #[error("position is missing axis {axis:?}")]
    MissingAxis { axis: String },
    #[error("axis {axis:?} has non-finite value {value}")]
    NonFinite { axis: String, value: Real },
    #[error("store rejected position: {0}")]
    Store(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> Frame {
        Frame::new("stage", ["sx", "sy", "sz"])
    }

    #[test]
    fn reads_only_frame_axes() {
        let mut pos = Position::from_point(&stage(), &Pt3::new(1.0, 2.0, 3.0));
        pos.values.insert("theta".to_string(), 45.0);

        let p = pos.to_point(&stage()).unwrap();
        assert_eq!(p, Pt3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn missing_axis_is_malformed() {
        let mut pos = Position::from_point(&stage(), &Pt3::new(1.0, 2.0, 3.0));
        pos.values.remove("sy");
        assert_eq!(
            pos.to_point(&stage()),
            Err(PointError::MissingAxis {
                axis: "sy".to_string()
            })
        );
    }

    #[test]
    fn nan_axis_is_malformed() {
        let mut pos = Position::from_point(&stage(), &Pt3::new(1.0, 2.0, 3.0));
        pos.values.insert("sz".to_string(), Real::NAN);
        assert!(matches!(
            pos.to_point(&stage()),
            Err(PointError::NonFinite { .. })
        ));
    }

    #[test]
    fn set_point_keeps_extra_axes() {
        let mut pos = Position::default();
        pos.values.insert("fine_x".to_string(), 0.25);
        pos.set_point(&stage(), &Pt3::new(4.0, 5.0, 6.0));

        assert_eq!(pos.values.len(), 4);
        assert_eq!(pos.values["fine_x"], 0.25);
        assert_eq!(pos.to_point(&stage()).unwrap(), Pt3::new(4.0, 5.0, 6.0));
    }
}
