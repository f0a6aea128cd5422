use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DATABASE: &str = ".treeindex/data/trees.db";
pub const DEFAULT_IMAGES_DIR: &str = "assets/tree_images";
pub const DEFAULT_OVERRIDES_FILE: &str = "data/image_overrides.csv";
pub const DEFAULT_SPREADSHEET: &str = "data/tree_data.xlsx";
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct TreeIndexConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub images: ImagesSection,
    #[serde(default)]
    pub import: ImportSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct StoreSection {
    pub database: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ImagesSection {
    pub dir: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub overrides: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ImportSection {
    pub spreadsheet: Option<String>,
}

impl TreeIndexConfig {
    pub fn database(&self) -> &str {
        non_empty(self.store.database.as_deref()).unwrap_or(DEFAULT_DATABASE)
    }

    pub fn images_dir(&self) -> &str {
        non_empty(self.images.dir.as_deref()).unwrap_or(DEFAULT_IMAGES_DIR)
    }

    pub fn overrides_file(&self) -> &str {
        non_empty(self.images.overrides.as_deref()).unwrap_or(DEFAULT_OVERRIDES_FILE)
    }

    pub fn spreadsheet(&self) -> &str {
        non_empty(self.import.spreadsheet.as_deref()).unwrap_or(DEFAULT_SPREADSHEET)
    }

    /// Allowed image extensions, lowercased and without the leading dot.
    pub fn image_extensions(&self) -> Vec<String> {
        match &self.images.extensions {
            Some(values) if !values.is_empty() => values
                .iter()
                .map(|value| value.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|value| !value.is_empty())
                .collect(),
            _ => DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|value| value.to_string())
                .collect(),
        }
    }
}

/// Load and parse a config from a TOML file. Returns default if the file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<TreeIndexConfig> {
    if !config_path.exists() {
        return Ok(TreeIndexConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: TreeIndexConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

pub fn render_default_config() -> String {
    let extensions = DEFAULT_IMAGE_EXTENSIONS
        .iter()
        .map(|value| format!("\"{value}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "# treeindex runtime config\n\n[store]\n# DATABASE_URL overrides this value.\ndatabase = \"{DEFAULT_DATABASE}\"\n\n[images]\ndir = \"{DEFAULT_IMAGES_DIR}\"\nextensions = [{extensions}]\noverrides = \"{DEFAULT_OVERRIDES_FILE}\"\n\n[import]\nspreadsheet = \"{DEFAULT_SPREADSHEET}\"\n"
    )
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
