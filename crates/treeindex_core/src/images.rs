use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::runtime::normalize_for_display;
use crate::slug::normalize;
use crate::tabular::read_table;

/// An image file discovered under the images root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageAsset {
    pub stem: String,
    pub extension: String,
    pub relative_path: String,
}

/// Operator-supplied mapping that wins over filename matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideEntry {
    pub tree_name: String,
    pub scientific_name: Option<String>,
    pub image_file: String,
}

/// Two sources resolved to the same key; `winner` replaced `replaced`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyCollision {
    pub key: String,
    pub replaced: String,
    pub winner: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImageIndex {
    pub entries: BTreeMap<String, String>,
    pub assets: Vec<ImageAsset>,
    pub collisions: Vec<KeyCollision>,
    pub overrides_applied: usize,
    pub skipped_files: usize,
}

impl ImageIndex {
    pub fn get(&self, key: &str) -> Option<&str> {
        if key.is_empty() {
            return None;
        }
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the key → relative path mapping for `image_root`.
///
/// Files directly under `image_root` are visited in file-name order, so when two
/// stems normalize to the same key the lexicographically last file wins. Override
/// entries are applied afterwards and replace any filename match for their key.
/// Relative paths are computed against `project_root` with `/` separators.
pub fn build_index(
    project_root: &Path,
    image_root: &Path,
    allowed_extensions: &[String],
    overrides: Option<&[OverrideEntry]>,
) -> Result<ImageIndex> {
    if !image_root.is_dir() {
        bail!("image directory not found: {}", image_root.display());
    }
    let root_rel = relative_display(project_root, image_root);
    let mut index = ImageIndex::default();

    for entry in WalkDir::new(image_root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry
            .with_context(|| format!("failed to enumerate {}", image_root.display()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        // `is_file` follows symlinks, so linked images count and dangling links do not.
        if !entry.path().is_file() {
            debug!(file = %entry.path().display(), "not a regular file; skipped");
            index.skipped_files += 1;
            continue;
        }
        if entry.file_name().to_str().is_none() {
            warn!(
                file = %entry.path().display(),
                "image file name is not valid UTF-8; skipped, rename it to match a tree"
            );
            index.skipped_files += 1;
            continue;
        }
        let Some(asset) = image_asset(&root_rel, entry.path(), allowed_extensions) else {
            index.skipped_files += 1;
            continue;
        };
        let key = normalize(&asset.stem);
        if key.is_empty() {
            debug!(file = %asset.relative_path, "image stem normalizes to an empty key; skipped");
            index.skipped_files += 1;
            continue;
        }
        if let Some(previous) = index.entries.insert(key.clone(), asset.relative_path.clone()) {
            warn!(
                key = %key,
                replaced = %previous,
                winner = %asset.relative_path,
                "image files share a key; last in file-name order wins, rename one to disambiguate"
            );
            index.collisions.push(KeyCollision {
                key,
                replaced: previous,
                winner: asset.relative_path.clone(),
            });
        }
        index.assets.push(asset);
    }

    for entry in overrides.unwrap_or_default() {
        let key = normalize(&entry.tree_name);
        if key.is_empty() {
            warn!(tree_name = %entry.tree_name, "override tree_name normalizes to an empty key; ignored");
            continue;
        }
        let path = join_relative(&root_rel, &entry.image_file);
        debug!(key = %key, path = %path, "override applied");
        index.entries.insert(key, path);
        index.overrides_applied += 1;
    }

    Ok(index)
}

/// Load the override mapping (`tree_name`, optional `scientific_name`, `image_file`).
pub fn load_overrides(path: &Path) -> Result<Vec<OverrideEntry>> {
    let table = read_table(path)?;
    table.require_columns(path, &["tree_name", "image_file"])?;

    let mut entries = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let (Some(tree_name), Some(image_file)) = (row.get("tree_name"), row.get("image_file"))
        else {
            warn!(
                file = %path.display(),
                line = row.line,
                "override row lacks tree_name or image_file; ignored"
            );
            continue;
        };
        entries.push(OverrideEntry {
            tree_name: tree_name.to_string(),
            scientific_name: row.get("scientific_name").map(str::to_string),
            image_file: image_file.replace('\\', "/"),
        });
    }
    Ok(entries)
}

fn image_asset(root_rel: &str, path: &Path, allowed_extensions: &[String]) -> Option<ImageAsset> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    if !allowed_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
    {
        return None;
    }
    let stem = path.file_stem()?.to_str()?.to_string();
    let file_name = path.file_name()?.to_str()?.to_string();
    Some(ImageAsset {
        stem,
        extension,
        relative_path: join_relative(root_rel, &file_name),
    })
}

fn relative_display(project_root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(project_root).unwrap_or(path);
    normalize_for_display(relative)
        .trim_end_matches('/')
        .to_string()
}

fn join_relative(root_rel: &str, file: &str) -> String {
    let file = file.trim_start_matches('/');
    if root_rel.is_empty() {
        file.to_string()
    } else {
        format!("{root_rel}/{file}")
    }
}
