use std::collections::BTreeSet;

use serde::Serialize;

use crate::images::ImageIndex;
use crate::slug::normalize;

/// The slice of a `tree_data` row the image pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRow {
    pub id: i64,
    pub tree_name: String,
    pub image_path: Option<String>,
}

/// New `image_path` for row `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageUpdate {
    pub path: String,
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub updates: Vec<ImageUpdate>,
    pub matched: usize,
    pub missing: usize,
    /// Rows whose name found no image, in input order.
    pub unmatched_rows: Vec<ImageRow>,
    /// Index keys no row claimed.
    pub unused_keys: Vec<String>,
}

/// Decide which rows need a new `image_path`. Performs no writes.
///
/// A row whose current path already equals the indexed one counts as matched but
/// produces no update, so re-running against an up-to-date table is a no-op.
pub fn reconcile(rows: &[ImageRow], index: &ImageIndex) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();
    let mut claimed = BTreeSet::new();

    for row in rows {
        let key = normalize(&row.tree_name);
        match index.get(&key) {
            Some(path) => {
                outcome.matched += 1;
                claimed.insert(key);
                if row.image_path.as_deref() != Some(path) {
                    outcome.updates.push(ImageUpdate {
                        path: path.to_string(),
                        id: row.id,
                    });
                }
            }
            None => {
                outcome.missing += 1;
                outcome.unmatched_rows.push(row.clone());
            }
        }
    }

    outcome.unused_keys = index
        .entries
        .keys()
        .filter(|key| !claimed.contains(*key))
        .cloned()
        .collect();
    outcome
}
