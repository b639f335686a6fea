//! Coordinate frame identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a coordinate frame (e.g. `"IDE_Microscope"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(String);

impl FrameId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name with spaces replaced by underscores, as used in storage keys.
    ///
    /// Not injective: `"A B"` and `"A_B"` give the same key name.
    pub fn key_name(&self) -> String {
        self.0.replace(' ', "_")
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrameId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FrameId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A 3-axis coordinate space: an identifier plus the ordered `x, y, z` axis names.
///
/// Axis names select the three coordinates out of a stored position and are
/// recorded in persisted transforms. They carry no hardware meaning here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub id: FrameId,
    pub axes: [String; 3],
}

impl Frame {
    pub fn new(id: impl Into<FrameId>, axes: [&str; 3]) -> Self {
        Self {
            id: id.into(),
            axes: axes.map(str::to_owned),
        }
    }

    /// Frame whose axes are literally named `x`, `y` and `z`.
    pub fn xyz(id: impl Into<FrameId>) -> Self {
        Self::new(id, ["x", "y", "z"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_name_replaces_spaces() {
        let id = FrameId::new("IDE Sample Stage");
        assert_eq!(id.key_name(), "IDE_Sample_Stage");
        assert_eq!(id.to_string(), "IDE Sample Stage");
    }

    #[test]
    fn frame_id_serializes_as_plain_string() {
        let frame = Frame::new("uscope", ["13IDE:m1", "13IDE:m2", "13IDE:m3"]);
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"id\":\"uscope\""));
        let restored: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, frame);
    }
}
