use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::{TreeIndexConfig, load_config, render_default_config};
use crate::store::StoreConfig;

pub const STATE_DIR_NAME: &str = ".treeindex";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Config,
    Heuristic,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Config => "config",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub project_root: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub database: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
    pub executable_dir: Option<PathBuf>,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        let executable_dir = env::current_exe()
            .ok()
            .and_then(|path| path.parent().map(Path::to_path_buf));
        Ok(Self {
            cwd,
            executable_dir,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub project_root: PathBuf,
    pub state_dir: PathBuf,
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
    pub images_dir: PathBuf,
    pub image_extensions: Vec<String>,
    pub overrides_path: PathBuf,
    pub spreadsheet_path: PathBuf,
    pub db_path: PathBuf,
    pub root_source: ValueSource,
    pub config_source: ValueSource,
    pub database_source: ValueSource,
}

#[derive(Debug, Clone)]
pub struct RuntimeStatus {
    pub project_root_exists: bool,
    pub state_dir_exists: bool,
    pub images_dir_exists: bool,
    pub overrides_exists: bool,
    pub spreadsheet_exists: bool,
    pub config_exists: bool,
    pub db_exists: bool,
    pub db_size_bytes: Option<u64>,
    pub warnings: Vec<String>,
}

impl ResolvedPaths {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.db_path)
    }

    /// Project-relative, forward-slash form of `path`; falls back to the full path
    /// when it lives outside the project root.
    pub fn relative_to_root(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.project_root).unwrap_or(path);
        normalize_for_display(relative)
    }

    pub fn diagnostics(&self) -> String {
        format!(
            "project_root={} ({})\nstate_dir={}\nconfig_path={} ({})\ndb_path={} ({})\nimages_dir={}\nimage_extensions={}\noverrides_path={}\nspreadsheet_path={}",
            normalize_for_display(&self.project_root),
            self.root_source.as_str(),
            normalize_for_display(&self.state_dir),
            normalize_for_display(&self.config_path),
            self.config_source.as_str(),
            normalize_for_display(&self.db_path),
            self.database_source.as_str(),
            normalize_for_display(&self.images_dir),
            self.image_extensions.join(","),
            normalize_for_display(&self.overrides_path),
            normalize_for_display(&self.spreadsheet_path),
        )
    }
}

pub fn inspect_runtime(paths: &ResolvedPaths) -> Result<RuntimeStatus> {
    let db_exists = paths.db_path.exists();
    let db_size_bytes = if db_exists {
        let metadata = fs::metadata(&paths.db_path)
            .with_context(|| format!("failed to inspect {}", paths.db_path.display()))?;
        Some(metadata.len())
    } else {
        None
    };
    let images_dir_exists = paths.images_dir.is_dir();
    let state_dir_exists = paths.state_dir.exists();

    let mut warnings = Vec::new();
    if !images_dir_exists {
        warnings.push(format!(
            "{} is missing; `images sync` has nothing to index",
            paths.relative_to_root(&paths.images_dir)
        ));
    }
    if !db_exists {
        warnings.push("store database is missing; run `treeindex init` first".to_string());
    }
    if !state_dir_exists {
        warnings.push(format!("{STATE_DIR_NAME}/ is missing; run `treeindex init`"));
    }

    Ok(RuntimeStatus {
        project_root_exists: paths.project_root.exists(),
        state_dir_exists,
        images_dir_exists,
        overrides_exists: paths.overrides_path.is_file(),
        spreadsheet_exists: paths.spreadsheet_path.is_file(),
        config_exists: paths.config_path.exists(),
        db_exists,
        db_size_bytes,
        warnings,
    })
}

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub materialize_config: bool,
    pub force: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            materialize_config: true,
            force: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitReport {
    pub created_dirs: Vec<PathBuf>,
    pub wrote_config: bool,
}

pub fn resolve_paths(
    context: &ResolutionContext,
    overrides: &PathOverrides,
) -> Result<ResolvedPaths> {
    resolve_paths_with_lookup(context, overrides, |key| env::var(key).ok())
}

pub(crate) fn resolve_paths_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> Result<ResolvedPaths>
where
    F: Fn(&str) -> Option<String>,
{
    let (project_root, root_source) = resolve_project_root(context, overrides, &lookup_env)
        .context("failed to resolve project root")?;
    let state_dir = project_root.join(STATE_DIR_NAME);

    let (config_path, config_source) = if let Some(path) = overrides.config.as_deref() {
        (absolutize(path, &project_root), ValueSource::Flag)
    } else if let Some(value) = non_empty_env(&lookup_env, "TREEINDEX_CONFIG") {
        (absolutize(Path::new(&value), &project_root), ValueSource::Env)
    } else {
        (state_dir.join("config.toml"), ValueSource::Default)
    };
    let config = load_config(&config_path)?;

    let (database, database_source) = if let Some(value) = overrides.database.as_deref() {
        (value.trim().to_string(), ValueSource::Flag)
    } else if let Some(value) = non_empty_env(&lookup_env, "DATABASE_URL") {
        (value, ValueSource::Env)
    } else if config.store.database.is_some() {
        (config.database().to_string(), ValueSource::Config)
    } else {
        (config.database().to_string(), ValueSource::Default)
    };
    let db_path = absolutize(&database_path_from_url(&database)?, &project_root);

    Ok(ResolvedPaths {
        data_dir: state_dir.join("data"),
        images_dir: absolutize(Path::new(config.images_dir()), &project_root),
        image_extensions: config.image_extensions(),
        overrides_path: absolutize(Path::new(config.overrides_file()), &project_root),
        spreadsheet_path: absolutize(Path::new(config.spreadsheet()), &project_root),
        project_root,
        state_dir,
        config_path,
        db_path,
        root_source,
        config_source,
        database_source,
    })
}

/// Accepts a bare path or a `sqlite:` / `sqlite://` / `file:` URL.
pub fn database_path_from_url(value: &str) -> Result<PathBuf> {
    let trimmed = value.trim();
    let stripped = ["sqlite://", "sqlite:", "file://", "file:"]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);
    let without_query = stripped.split('?').next().unwrap_or_default();
    if without_query.is_empty() {
        bail!("database location is empty: {value:?}");
    }
    if trimmed.contains("://") && !trimmed.starts_with("sqlite://") && !trimmed.starts_with("file://")
    {
        bail!(
            "unsupported database URL {value:?}; treeindex stores the catalog in SQLite (use a file path or sqlite:// URL)"
        );
    }
    Ok(PathBuf::from(without_query))
}

pub fn init_layout(paths: &ResolvedPaths, options: &InitOptions) -> Result<InitReport> {
    let mut created_dirs = Vec::new();

    let mut required_dirs = vec![
        paths.state_dir.clone(),
        paths.data_dir.clone(),
        paths.images_dir.clone(),
    ];
    if let Some(parent) = paths.db_path.parent() {
        required_dirs.push(parent.to_path_buf());
    }

    for dir in &required_dirs {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            created_dirs.push(dir.clone());
        }
    }

    let wrote_config = if options.materialize_config {
        write_text_file(&paths.config_path, &render_default_config(), options.force)?
    } else {
        false
    };

    Ok(InitReport {
        created_dirs,
        wrote_config,
    })
}

fn resolve_project_root<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: &F,
) -> Result<(PathBuf, ValueSource)>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = overrides.project_root.as_deref() {
        return Ok((absolutize(path, &context.cwd), ValueSource::Flag));
    }
    if let Some(value) = non_empty_env(lookup_env, "TREEINDEX_PROJECT_ROOT") {
        return Ok((absolutize(Path::new(&value), &context.cwd), ValueSource::Env));
    }
    match discover_project_root(&context.cwd, context.executable_dir.as_deref()) {
        Some(root) => Ok((root, ValueSource::Heuristic)),
        None => Ok((context.cwd.clone(), ValueSource::Default)),
    }
}

fn discover_project_root(cwd: &Path, executable_dir: Option<&Path>) -> Option<PathBuf> {
    let mut seen = HashSet::new();
    for candidate in candidate_roots(cwd, executable_dir) {
        let key = normalize_for_display(&candidate);
        if !seen.insert(key) {
            continue;
        }
        if candidate.join(STATE_DIR_NAME).is_dir()
            || candidate.join("assets").join("tree_images").is_dir()
        {
            return Some(candidate);
        }
    }
    None
}

fn candidate_roots(cwd: &Path, executable_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut out = ancestors(cwd);
    if let Some(exe_dir) = executable_dir {
        out.extend(ancestors(exe_dir));
    }
    out
}

fn ancestors(path: &Path) -> Vec<PathBuf> {
    path.ancestors().map(Path::to_path_buf).collect()
}

fn non_empty_env<F>(lookup_env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup_env(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn write_text_file(path: &Path, content: &str, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }

    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create parent directory {}", parent.display()))?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
