//! Persisted frame-to-frame transforms.

use crate::store::StoreError;
use coreg_core::{
    is_homogeneous_affine, mat4_from_rows, mat4_to_rows, transform_point, Frame, FrameId, Mat4,
    Mat4Rows, Pt3, Real,
};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

const KEY_PREFIX: &str = "CoordTrans";

/// Tolerance used when validating the bottom row of a loaded matrix.
pub const AFFINE_ROW_TOL: Real = 1e-9;

/// Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Store key of the `(source, dest)` pair: `CoordTrans:<source>:<dest>`.
///
/// Spaces in frame names become underscores, so names differing only in
/// spaces vs underscores share a key; the file store refuses to let one
/// such pair overwrite the other. The pair is ordered, so the forward and
/// inverse transforms live under different keys.
pub fn transform_key(source: &FrameId, dest: &FrameId) -> String {
    format!("{KEY_PREFIX}:{}:{}", source.key_name(), dest.key_name())
}

/// Split a key back into its frame names.
pub fn parse_transform_key(key: &str) -> Option<(FrameId, FrameId)> {
    let rest = key.strip_prefix(KEY_PREFIX)?.strip_prefix(':')?;
    let (source, dest) = rest.split_once(':')?;
    if source.is_empty() || dest.is_empty() {
        return None;
    }
    Some((FrameId::new(source), FrameId::new(dest)))
}

/// Homogeneous transform mapping points of `source` into `dest`.
///
/// `dest_h = matrix · source_h`; the bottom row is `[0, 0, 0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub source: Frame,
    pub dest: Frame,
    #[serde(with = "mat4_rows")]
    pub matrix: Mat4,
    /// Unix seconds.
    pub created_at: u64,
}

impl Transform {
    pub fn new(source: Frame, dest: Frame, matrix: Mat4) -> Self {
        Self {
            source,
            dest,
            matrix,
            created_at: current_timestamp(),
        }
    }

    pub fn key(&self) -> String {
        transform_key(&self.source.id, &self.dest.id)
    }

    pub fn apply(&self, p: &Pt3) -> Pt3 {
        transform_point(&self.matrix, p)
    }

    pub fn to_record(&self) -> TransformRecord {
        TransformRecord {
            source: self.source.axes.clone(),
            dest: self.dest.axes.clone(),
            rotmat: mat4_to_rows(&self.matrix),
            source_frame: Some(self.source.id.to_string()),
            dest_frame: Some(self.dest.id.to_string()),
            created_at: Some(self.created_at),
        }
    }

    /// Rebuild a transform from its record.
    ///
    /// Frame names missing from older records are taken from `key`.
    pub fn from_record(key: &str, record: TransformRecord) -> Result<Self, StoreError> {
        let matrix = mat4_from_rows(&record.rotmat);
        if !is_homogeneous_affine(&matrix, AFFINE_ROW_TOL) {
            return Err(StoreError::NotAffine {
                key: key.to_string(),
            });
        }

        let (source_id, dest_id) = match (record.source_frame, record.dest_frame) {
            (Some(s), Some(d)) => (FrameId::new(s), FrameId::new(d)),
            _ => parse_transform_key(key).ok_or_else(|| StoreError::MalformedKey(key.to_string()))?,
        };

        Ok(Self {
            source: Frame {
                id: source_id,
                axes: record.source,
            },
            dest: Frame {
                id: dest_id,
                axes: record.dest,
            },
            matrix,
            created_at: record.created_at.unwrap_or(0),
        })
    }
}

/// On-disk layout of a transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    /// Axis names of the source frame.
    pub source: [String; 3],
    /// Axis names of the destination frame.
    pub dest: [String; 3],
    /// Row-major 4×4 matrix.
    pub rotmat: Mat4Rows,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_frame: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_frame: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
}

/// Serialize a [`Mat4`] as four rows instead of nalgebra's flat column-major array.
pub(crate) mod mat4_rows {
    use coreg_core::{mat4_from_rows, mat4_to_rows, Mat4, Mat4Rows};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(m: &Mat4, s: S) -> Result<S::Ok, S::Error> {
        mat4_to_rows(m).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Mat4, D::Error> {
        <Mat4Rows as Deserialize>::deserialize(d).map(|rows| mat4_from_rows(&rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreg_core::Vec3;

    fn sample() -> Transform {
        let mut m = Mat4::new_translation(&Vec3::new(5.0, 5.0, 5.0));
        m[(0, 1)] = -1.0;
        m[(1, 0)] = 1.0;
        m[(0, 0)] = 0.0;
        m[(1, 1)] = 0.0;
        Transform::new(
            Frame::new("IDE Microscope", ["m1", "m2", "m3"]),
            Frame::new("SampleStage", ["sx", "sy", "sz"]),
            m,
        )
    }

    #[test]
    fn key_replaces_spaces_and_keeps_order() {
        let t = sample();
        assert_eq!(t.key(), "CoordTrans:IDE_Microscope:SampleStage");
        assert_eq!(
            transform_key(&t.dest.id, &t.source.id),
            "CoordTrans:SampleStage:IDE_Microscope"
        );
    }

    #[test]
    fn parse_key_inverts_transform_key() {
        assert_eq!(
            parse_transform_key("CoordTrans:A:B"),
            Some((FrameId::new("A"), FrameId::new("B")))
        );
        assert_eq!(parse_transform_key("CoordTrans:A"), None);
        assert_eq!(parse_transform_key("Other:A:B"), None);
        assert_eq!(parse_transform_key("CoordTrans::B"), None);
    }

    #[test]
    fn record_layout_is_row_major() {
        let t = sample();
        let json = serde_json::to_value(t.to_record()).unwrap();
        assert_eq!(json["rotmat"][0], serde_json::json!([0.0, -1.0, 0.0, 5.0]));
        assert_eq!(json["rotmat"][3], serde_json::json!([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(json["source"], serde_json::json!(["m1", "m2", "m3"]));
        assert_eq!(json["source_frame"], "IDE Microscope");
    }

    #[test]
    fn legacy_record_recovers_frames_from_key() {
        let json = r#"{
            "source": ["m1", "m2", "m3"],
            "dest": ["sx", "sy", "sz"],
            "rotmat": [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]]
        }"#;
        let record: TransformRecord = serde_json::from_str(json).unwrap();
        let t = Transform::from_record("CoordTrans:IDE_Microscope:SampleStage", record).unwrap();
        assert_eq!(t.source.id, FrameId::new("IDE_Microscope"));
        assert_eq!(t.dest.axes, ["sx", "sy", "sz"]);
        assert_eq!(t.matrix, Mat4::identity());
        assert_eq!(t.created_at, 0);
    }

    #[test]
    fn non_affine_record_is_rejected() {
        let mut record = sample().to_record();
        record.rotmat[3] = [0.0, 0.0, 1.0, 1.0];
        assert!(matches!(
            Transform::from_record("CoordTrans:A:B", record),
            Err(StoreError::NotAffine { .. })
        ));
    }

    #[test]
    fn transform_serializes_matrix_as_rows() {
        let t = sample();
        let json = serde_json::to_string(&t).unwrap();
        let back: Transform = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["matrix"][1], serde_json::json!([1.0, 0.0, 0.0, 5.0]));
    }
}
