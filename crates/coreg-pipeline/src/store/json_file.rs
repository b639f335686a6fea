use super::{check_affine, StoreError, TransformStore};
use crate::transform::{parse_transform_key, transform_key, Transform, TransformRecord};
use coreg_core::FrameId;
use log::{debug, info};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

type Document = BTreeMap<String, TransformRecord>;

/// Frame pair a record was saved for, when the record names it.
fn record_frames(record: &TransformRecord) -> Option<(FrameId, FrameId)> {
    match (&record.source_frame, &record.dest_frame) {
        (Some(s), Some(d)) => Some((FrameId::new(s.as_str()), FrameId::new(d.as_str()))),
        _ => None,
    }
}

/// [`TransformStore`] backed by a single JSON document `{key: record}`.
///
/// Every save re-reads the document, replaces its entries and writes the
/// whole document to a temporary file in the same directory before renaming
/// it over the original, so readers never observe a partial file. A missing
/// or empty file is an empty store.
///
/// The read-modify-write is not locked across processes: two writers saving
/// at the same time can lose one of the updates. Calibration is expected to
/// be driven by a single operator at a time.
///
/// Keys replace spaces with underscores, so frames such as `"A B"` and
/// `"A_B"` share a key. Saving over an entry recorded for a different frame
/// pair fails with [`StoreError::KeyCollision`], and loading a pair whose key
/// holds another pair's record is [`StoreError::NotFound`].
#[derive(Debug, Clone)]
pub struct JsonFileTransformStore {
    path: PathBuf,
}

impl JsonFileTransformStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Document, StoreError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(e.into()),
        };
        if data.trim().is_empty() {
            return Ok(Document::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn write_document(&self, doc: &Document) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, doc)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl TransformStore for JsonFileTransformStore {
    fn save(&mut self, transform: Transform) -> Result<(), StoreError> {
        self.save_all(vec![transform])
    }

    /// All entries land in one document write; on error the file is unchanged.
    fn save_all(&mut self, transforms: Vec<Transform>) -> Result<(), StoreError> {
        transforms.iter().try_for_each(check_affine)?;

        let mut doc = self.read_document()?;
        let mut keys = Vec::with_capacity(transforms.len());
        for transform in &transforms {
            let key = transform.key();
            let pair = (transform.source.id.clone(), transform.dest.id.clone());
            if let Some((stored_source, stored_dest)) = doc.get(&key).and_then(record_frames) {
                if (&stored_source, &stored_dest) != (&pair.0, &pair.1) {
                    return Err(StoreError::KeyCollision {
                        key,
                        stored_source,
                        stored_dest,
                    });
                }
            }
            let replaced = doc.insert(key.clone(), transform.to_record()).is_some();
            keys.push((key, replaced));
        }

        self.write_document(&doc)?;
        for (key, replaced) in keys {
            if replaced {
                info!("replaced {key} in {}", self.path.display());
            } else {
                info!("saved {key} to {}", self.path.display());
            }
        }
        Ok(())
    }

    fn load(&self, source: &FrameId, dest: &FrameId) -> Result<Transform, StoreError> {
        let key = transform_key(source, dest);
        let mut doc = self.read_document()?;
        let record = doc
            .remove(&key)
            .ok_or_else(|| StoreError::not_found(source, dest))?;
        if let Some((s, d)) = record_frames(&record) {
            if (&s, &d) != (source, dest) {
                debug!("{key} holds {s} -> {d}, not {source} -> {dest}");
                return Err(StoreError::not_found(source, dest));
            }
        }
        debug!("loaded {key} from {}", self.path.display());
        Transform::from_record(&key, record)
    }

    fn keys(&self) -> Result<Vec<(FrameId, FrameId)>, StoreError> {
        self.read_document()?
            .into_iter()
            .map(|(key, record)| {
                record_frames(&record)
                    .or_else(|| parse_transform_key(&key))
                    .ok_or(StoreError::MalformedKey(key))
            })
            .collect()
    }
}
