use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::images::{KeyCollision, build_index, load_overrides};
use crate::reconcile::{ImageUpdate, reconcile};
use crate::runtime::ResolvedPaths;
use crate::store::TreeStore;
use crate::updater::apply_updates;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub dry_run: bool,
    /// Read the override table at `paths.overrides_path` when it exists.
    pub use_overrides: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            use_overrides: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub images_dir: String,
    pub overrides_file: Option<String>,
    pub images_indexed: usize,
    pub overrides_applied: usize,
    pub skipped_files: usize,
    pub collisions: Vec<KeyCollision>,
    pub rows_scanned: usize,
    pub matched: usize,
    pub missing: usize,
    pub updated: usize,
    pub pending: Vec<ImageUpdate>,
    pub unmatched_rows: Vec<String>,
    pub unused_images: Vec<String>,
}

/// Index images, reconcile against `tree_data`, and write changed paths in one batch.
pub fn run_image_sync<S: TreeStore + ?Sized>(
    paths: &ResolvedPaths,
    options: &SyncOptions,
    store: &mut S,
) -> Result<SyncReport> {
    let overrides_file = (options.use_overrides && paths.overrides_path.is_file())
        .then(|| paths.overrides_path.clone());
    let overrides = match &overrides_file {
        Some(path) => Some(
            load_overrides(path)
                .with_context(|| format!("failed to load overrides from {}", path.display()))?,
        ),
        None => None,
    };

    let index = build_index(
        &paths.project_root,
        &paths.images_dir,
        &paths.image_extensions,
        overrides.as_deref(),
    )?;
    info!(
        keys = index.len(),
        files = index.assets.len(),
        overrides = index.overrides_applied,
        "image index built"
    );

    let rows = store.fetch_image_rows()?;
    let outcome = reconcile(&rows, &index);
    for row in &outcome.unmatched_rows {
        warn!(id = row.id, tree_name = %row.tree_name, "no image matches this tree");
    }
    for key in &outcome.unused_keys {
        warn!(key = %key, "image has no matching tree_data row");
    }

    let updated = if options.dry_run {
        0
    } else {
        apply_updates(store, &outcome.updates)?
    };

    Ok(SyncReport {
        dry_run: options.dry_run,
        images_dir: paths.relative_to_root(&paths.images_dir),
        overrides_file: overrides_file.map(|path| paths.relative_to_root(&path)),
        images_indexed: index.assets.len(),
        overrides_applied: index.overrides_applied,
        skipped_files: index.skipped_files,
        collisions: index.collisions,
        rows_scanned: rows.len(),
        matched: outcome.matched,
        missing: outcome.missing,
        updated,
        pending: if options.dry_run {
            outcome.updates
        } else {
            Vec::new()
        },
        unmatched_rows: outcome
            .unmatched_rows
            .into_iter()
            .map(|row| row.tree_name)
            .collect(),
        unused_images: outcome
            .unused_keys
            .iter()
            .filter_map(|key| index.entries.get(key).cloned())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    use super::*;
    use crate::runtime::{PathOverrides, ResolutionContext, resolve_paths_with_lookup};
    use crate::store::{SqliteStore, StoreConfig, TreeStore};

    fn project(root: &Path, images: &[&str]) -> ResolvedPaths {
        let dir = root.join("assets/tree_images");
        fs::create_dir_all(&dir).expect("images dir");
        for image in images {
            fs::write(dir.join(image), b"img").expect("write image");
        }
        let context = ResolutionContext {
            cwd: root.to_path_buf(),
            executable_dir: None,
        };
        let overrides = PathOverrides {
            project_root: Some(root.to_path_buf()),
            ..PathOverrides::default()
        };
        resolve_paths_with_lookup(&context, &overrides, |_| None).expect("resolve paths")
    }

    fn store_with(paths: &ResolvedPaths, names: &[&str]) -> SqliteStore {
        let store = SqliteStore::create(paths.store_config()).expect("create store");
        let connection = rusqlite::Connection::open(&paths.db_path).expect("open");
        for name in names {
            connection
                .execute("INSERT INTO tree_data (tree_name) VALUES (?1)", [name])
                .expect("insert");
        }
        store
    }

    #[test]
    fn sync_writes_paths_and_second_run_is_a_no_op() {
        let temp = tempdir().expect("tempdir");
        let paths = project(temp.path(), &["Brants_Oak.png", "Olive.png", "Unused.webp"]);
        let mut store = store_with(&paths, &["Brant's Oak", "Olive", "Carob"]);

        let report = run_image_sync(&paths, &SyncOptions::default(), &mut store).expect("sync");
        assert_eq!(report.images_indexed, 3);
        assert_eq!(report.matched, 2);
        assert_eq!(report.missing, 1);
        assert_eq!(report.updated, 2);
        assert_eq!(report.unmatched_rows, vec!["Carob".to_string()]);
        assert_eq!(
            report.unused_images,
            vec!["assets/tree_images/Unused.webp".to_string()]
        );

        let rows = store.fetch_image_rows().expect("fetch");
        assert_eq!(
            rows[0].image_path.as_deref(),
            Some("assets/tree_images/Brants_Oak.png")
        );
        assert_eq!(rows[2].image_path, None);

        let again = run_image_sync(&paths, &SyncOptions::default(), &mut store).expect("resync");
        assert_eq!(again.matched, 2);
        assert_eq!(again.updated, 0);
    }

    #[test]
    fn dry_run_reports_pending_without_writing() {
        let temp = tempdir().expect("tempdir");
        let paths = project(temp.path(), &["Olive.png"]);
        let mut store = store_with(&paths, &["Olive"]);

        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };
        let report = run_image_sync(&paths, &options, &mut store).expect("dry run");
        assert_eq!(report.updated, 0);
        assert_eq!(report.pending.len(), 1);
        assert_eq!(report.pending[0].path, "assets/tree_images/Olive.png");
        assert!(
            store
                .fetch_image_rows()
                .expect("fetch")
                .iter()
                .all(|row| row.image_path.is_none())
        );
    }

    #[test]
    fn override_file_takes_precedence_over_discovered_image() {
        let temp = tempdir().expect("tempdir");
        let paths = project(temp.path(), &["Olive.png"]);
        fs::create_dir_all(temp.path().join("data")).expect("data dir");
        fs::write(
            &paths.overrides_path,
            "tree_name,scientific_name,image_file\nOlive,Olea europaea,olive_custom.jpg\n",
        )
        .expect("write overrides");
        let mut store = store_with(&paths, &["Olive"]);

        let report = run_image_sync(&paths, &SyncOptions::default(), &mut store).expect("sync");
        assert_eq!(report.overrides_applied, 1);
        assert_eq!(
            report.overrides_file.as_deref(),
            Some("data/image_overrides.csv")
        );
        let rows = store.fetch_image_rows().expect("fetch");
        assert_eq!(
            rows[0].image_path.as_deref(),
            Some("assets/tree_images/olive_custom.jpg")
        );
    }

    #[test]
    fn unreachable_store_fails_before_any_write() {
        let temp = tempdir().expect("tempdir");
        let paths = project(temp.path(), &["Olive.png"]);
        let error = SqliteStore::open(StoreConfig::new(&paths.db_path)).expect_err("no database");
        assert!(error.is_connectivity());
    }
}
