use super::{check_affine, StoreError, TransformStore};
use crate::transform::Transform;
use coreg_core::FrameId;
use std::collections::BTreeMap;

/// Process-local [`TransformStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTransformStore {
    entries: BTreeMap<(FrameId, FrameId), Transform>,
}

impl MemoryTransformStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TransformStore for MemoryTransformStore {
    fn save(&mut self, transform: Transform) -> Result<(), StoreError> {
        self.save_all(vec![transform])
    }

    fn save_all(&mut self, transforms: Vec<Transform>) -> Result<(), StoreError> {
        transforms.iter().try_for_each(check_affine)?;
        for transform in transforms {
            let key = (transform.source.id.clone(), transform.dest.id.clone());
            self.entries.insert(key, transform);
        }
        Ok(())
    }

    fn load(&self, source: &FrameId, dest: &FrameId) -> Result<Transform, StoreError> {
        self.entries
            .get(&(source.clone(), dest.clone()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(source, dest))
    }

    fn keys(&self) -> Result<Vec<(FrameId, FrameId)>, StoreError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreg_core::{Frame, Mat4};

    #[test]
    fn save_overwrites_per_ordered_pair() {
        let a = Frame::xyz("A");
        let b = Frame::xyz("B");
        let mut store = MemoryTransformStore::new();

        store
            .save(Transform::new(a.clone(), b.clone(), Mat4::identity()))
            .unwrap();
        let mut m = Mat4::identity();
        m[(0, 3)] = 2.0;
        store.save(Transform::new(a.clone(), b.clone(), m)).unwrap();
        store
            .save(Transform::new(b.clone(), a.clone(), Mat4::identity()))
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.load(&a.id, &b.id).unwrap().matrix, m);
        assert_eq!(store.load(&b.id, &a.id).unwrap().matrix, Mat4::identity());
        assert_eq!(
            store.keys().unwrap(),
            vec![(a.id.clone(), b.id.clone()), (b.id, a.id)]
        );
    }

    #[test]
    fn missing_pair_is_not_found() {
        let store = MemoryTransformStore::new();
        let err = store
            .load(&FrameId::new("A"), &FrameId::new("B"))
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "no transform from A to B");
    }

    #[test]
    fn batch_with_non_affine_matrix_stores_nothing() {
        let a = Frame::xyz("A");
        let b = Frame::xyz("B");
        let mut bad = Mat4::identity();
        bad[(3, 2)] = 0.5;
        let mut store = MemoryTransformStore::new();

        let err = store
            .save_all(vec![
                Transform::new(a.clone(), b.clone(), Mat4::identity()),
                Transform::new(b, a, bad),
            ])
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAffine { .. }));
        assert!(store.is_empty());
    }
}
