use serde::Serialize;
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::reconcile::ImageUpdate;
use crate::store::{TreeStore, UNIQUE_COLUMNS, UNIQUE_CONSTRAINT};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    pub removed_ids: Vec<i64>,
    pub constraint_created: bool,
}

impl DedupReport {
    pub fn removed(&self) -> usize {
        self.removed_ids.len()
    }
}

/// Write the change set as one batch. Either every update lands or none does.
pub fn apply_updates<S: TreeStore + ?Sized>(
    store: &mut S,
    updates: &[ImageUpdate],
) -> StoreResult<usize> {
    if updates.is_empty() {
        return Ok(0);
    }
    let applied = store.write_image_paths(updates)?;
    info!(applied, "image paths updated");
    Ok(applied)
}

/// Remove duplicate `(tree_name, scientific_name)` rows, keeping the lowest id, then
/// add the named uniqueness constraint unless it already exists. Safe to repeat.
pub fn deduplicate_and_constrain<S: TreeStore + ?Sized>(store: &mut S) -> StoreResult<DedupReport> {
    let removed_ids = store.remove_duplicate_rows()?;
    for id in &removed_ids {
        info!(id, "removed duplicate tree_data row");
    }

    let constraint_created = ensure_unique_constraint(store)?;
    Ok(DedupReport {
        removed_ids,
        constraint_created,
    })
}

/// Create `tree_unique_name_scientific` if no constraint of that name exists.
/// Returns whether it was created by this call.
pub fn ensure_unique_constraint<S: TreeStore + ?Sized>(store: &mut S) -> StoreResult<bool> {
    if store.constraint_exists(UNIQUE_CONSTRAINT)? {
        return Ok(false);
    }
    if let Err(error) = store.add_unique_constraint(UNIQUE_CONSTRAINT, UNIQUE_COLUMNS) {
        // A concurrent run may have created it between the check and the create.
        if store.constraint_exists(UNIQUE_CONSTRAINT)? {
            debug!(constraint = UNIQUE_CONSTRAINT, "uniqueness constraint created concurrently");
            return Ok(false);
        }
        return Err(error);
    }
    info!(constraint = UNIQUE_CONSTRAINT, "uniqueness constraint added");
    Ok(true)
}
