//! Point-set storage seam and an in-memory implementation.

use crate::{Frame, FrameId, PointError, Position, Pt3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source of named positions for each coordinate frame.
///
/// Labels are the correspondence key between frames. Implementations must
/// return labels in a deterministic (sorted) order.
pub trait PointSetStore {
    /// Sorted labels saved for `frame`. Unknown frames have no labels.
    fn list_labels(&self, frame: &Frame) -> Vec<String>;

    /// Read a named position as a point in `frame`.
    fn get_point(&self, frame: &Frame, label: &str) -> Result<Pt3, PointError>;

    /// Save a named position, overwriting an existing one with the same label.
    fn put_point(&mut self, frame: &Frame, label: &str, p: &Pt3) -> Result<(), PointError>;
}

/// Positions saved for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePositions {
    pub axes: [String; 3],
    #[serde(default)]
    pub positions: BTreeMap<String, Position>,
}

/// In-memory [`PointSetStore`], serializable as a single JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryPointStore {
    pub frames: BTreeMap<FrameId, FramePositions>,
}

impl MemoryPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a frame (no-op if it already exists).
    pub fn add_frame(&mut self, frame: &Frame) {
        self.frames
            .entry(frame.id.clone())
            .or_insert_with(|| FramePositions {
                axes: frame.axes.clone(),
                positions: BTreeMap::new(),
            });
    }

    /// Frame definition for `id`, if registered.
    pub fn frame(&self, id: &FrameId) -> Option<Frame> {
        self.frames.get(id).map(|f| Frame {
            id: id.clone(),
            axes: f.axes.clone(),
        })
    }

    /// Insert a raw position, registering the frame if needed.
    pub fn insert_position(&mut self, frame: &Frame, label: impl Into<String>, pos: Position) {
        self.add_frame(frame);
        if let Some(f) = self.frames.get_mut(&frame.id) {
            f.positions.insert(label.into(), pos);
        }
    }

    /// Insert a point built from the frame's three axes.
    pub fn insert_point(&mut self, frame: &Frame, label: impl Into<String>, p: Pt3) {
        self.insert_position(frame, label, Position::from_point(frame, &p));
    }

    /// Raw position lookup.
    pub fn position(&self, frame: &FrameId, label: &str) -> Option<&Position> {
        self.frames.get(frame)?.positions.get(label)
    }
}

impl PointSetStore for MemoryPointStore {
    fn list_labels(&self, frame: &Frame) -> Vec<String> {
        // BTreeMap keys are already sorted.
        self.frames
            .get(&frame.id)
            .map(|f| f.positions.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn get_point(&self, frame: &Frame, label: &str) -> Result<Pt3, PointError> {
        self.position(&frame.id, label)
            .ok_or_else(|| PointError::UnknownLabel {
                frame: frame.id.clone(),
                label: label.to_string(),
            })?
            .to_point(frame)
    }

    fn put_point(&mut self, frame: &Frame, label: &str, p: &Pt3) -> Result<(), PointError> {
        self.add_frame(frame);
        let f = self
            .frames
            .get_mut(&frame.id)
            .ok_or_else(|| PointError::Store(format!("frame {} not registered", frame.id)))?;
        f.positions
            .entry(label.to_string())
            .or_default()
            .set_point(frame, p);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_sorted() {
        let frame = Frame::xyz("uscope");
        let mut store = MemoryPointStore::new();
        for label in ["zeta", "alpha", "mid"] {
            store.insert_point(&frame, label, Pt3::origin());
        }
        assert_eq!(store.list_labels(&frame), vec!["alpha", "mid", "zeta"]);
        assert!(store.list_labels(&Frame::xyz("other")).is_empty());
    }

    #[test]
    fn put_point_overwrites() {
        let frame = Frame::xyz("stage");
        let mut store = MemoryPointStore::new();
        store.put_point(&frame, "A", &Pt3::new(1.0, 1.0, 1.0)).unwrap();
        store.put_point(&frame, "A", &Pt3::new(2.0, 3.0, 4.0)).unwrap();

        assert_eq!(store.list_labels(&frame).len(), 1);
        assert_eq!(store.get_point(&frame, "A").unwrap(), Pt3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn unknown_label_is_reported() {
        let frame = Frame::xyz("stage");
        let store = MemoryPointStore::new();
        assert!(matches!(
            store.get_point(&frame, "nope"),
            Err(PointError::UnknownLabel { .. })
        ));
    }
}
