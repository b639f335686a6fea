use coreg_core::{Frame, PointSetStore, Pt3};
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeSet;

/// Points saved under the same label in two frames.
///
/// `source[i]` and `dest[i]` are the positions of `labels[i]`; labels are
/// sorted. Labels whose stored position cannot be read as a point in either
/// frame are listed in `dropped` instead.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CorrespondenceSet {
    pub labels: Vec<String>,
    pub source: Vec<Pt3>,
    pub dest: Vec<Pt3>,
    pub dropped: Vec<String>,
}

impl CorrespondenceSet {
    pub fn between<S: PointSetStore + ?Sized>(store: &S, source: &Frame, dest: &Frame) -> Self {
        let dest_labels: BTreeSet<String> = store.list_labels(dest).into_iter().collect();
        let common: BTreeSet<String> = store
            .list_labels(source)
            .into_iter()
            .filter(|l| dest_labels.contains(l))
            .collect();

        let mut set = Self::default();
        for label in common {
            let pair = store
                .get_point(source, &label)
                .and_then(|s| store.get_point(dest, &label).map(|d| (s, d)));
            match pair {
                Ok((s, d)) => {
                    set.labels.push(label);
                    set.source.push(s);
                    set.dest.push(d);
                }
                Err(e) => {
                    warn!("dropping {label:?} from {} -> {}: {e}", source.id, dest.id);
                    set.dropped.push(label);
                }
            }
        }
        debug!(
            "{} common labels between {} and {} ({} dropped)",
            set.len(),
            source.id,
            dest.id,
            set.dropped.len()
        );
        set
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
