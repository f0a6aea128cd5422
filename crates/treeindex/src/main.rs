use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;
use treeindex_core::catalog::{format_score, search_catalog, tree_detail};
use treeindex_core::import::import_spreadsheet;
use treeindex_core::logging::init_tracing;
use treeindex_core::maintenance::fix_path_separators;
use treeindex_core::runtime::{
    InitOptions, PathOverrides, ResolutionContext, ResolvedPaths, init_layout, inspect_runtime,
    resolve_paths,
};
use treeindex_core::store::{SqliteStore, StoreStats};
use treeindex_core::sync::{SyncOptions, run_image_sync};
use treeindex_core::updater::deduplicate_and_constrain;

const DEFAULT_LOG_FILTER: &str = "treeindex=info";

#[derive(Debug, Parser)]
#[command(
    name = "treeindex",
    version,
    about = "Keep the tree catalog's image paths in sync with assets/tree_images"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "PATH_OR_URL",
        help = "SQLite database path or sqlite:// URL (overrides DATABASE_URL)"
    )]
    database: Option<String>,
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[arg(short, long, global = true, help = "Debug-level logging on stderr")]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    config: Option<PathBuf>,
    database: Option<String>,
    format: OutputFormat,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            config: cli.config.clone(),
            database: cli.database.clone(),
            format: cli.format,
            diagnostics: cli.diagnostics,
        }
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Create the .treeindex layout, config file and an empty catalog")]
    Init(InitArgs),
    #[command(about = "Show resolved paths and what exists on disk")]
    Status,
    Images(ImagesArgs),
    Db(DbArgs),
    #[command(about = "Upsert trees from a CSV or XLSX spreadsheet")]
    Import(ImportArgs),
    #[command(about = "Search common and scientific names")]
    Search(SearchArgs),
    #[command(about = "List every tree ordered by name")]
    Catalog,
    #[command(about = "Show one tree with its scores")]
    Show(ShowArgs),
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing config file")]
    force: bool,
    #[arg(long, help = "Skip writing .treeindex/config.toml")]
    no_config: bool,
}

#[derive(Debug, Args)]
struct ImagesArgs {
    #[command(subcommand)]
    command: ImagesSubcommand,
}

#[derive(Debug, Subcommand)]
enum ImagesSubcommand {
    #[command(about = "Match image files to catalog rows and write changed paths")]
    Sync {
        #[arg(long, help = "Report pending updates without writing")]
        dry_run: bool,
        #[arg(long, help = "Ignore the override mapping file")]
        no_overrides: bool,
    },
}

#[derive(Debug, Args)]
struct DbArgs {
    #[command(subcommand)]
    command: DbSubcommand,
}

#[derive(Debug, Subcommand)]
enum DbSubcommand {
    #[command(about = "Remove duplicate (tree_name, scientific_name) rows and add the unique constraint")]
    Dedupe,
    #[command(name = "fix-paths", about = "Rewrite backslashes in image paths to forward slashes")]
    FixPaths,
    #[command(about = "Check that the catalog database is reachable")]
    Ping,
    Stats,
}

#[derive(Debug, Args)]
struct ImportArgs {
    #[arg(value_name = "PATH", help = "Defaults to [import].spreadsheet from config")]
    path: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SearchArgs {
    term: Option<String>,
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

#[derive(Debug, Args)]
struct ShowArgs {
    id: i64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);
    init_tracing(DEFAULT_LOG_FILTER, cli.verbose)?;

    match cli.command {
        Some(Commands::Init(args)) => run_init(&runtime, args),
        Some(Commands::Status) => run_status(&runtime),
        Some(Commands::Images(ImagesArgs { command })) => match command {
            ImagesSubcommand::Sync {
                dry_run,
                no_overrides,
            } => run_images_sync(&runtime, dry_run, !no_overrides),
        },
        Some(Commands::Db(DbArgs { command })) => match command {
            DbSubcommand::Dedupe => run_db_dedupe(&runtime),
            DbSubcommand::FixPaths => run_db_fix_paths(&runtime),
            DbSubcommand::Ping => run_db_ping(&runtime),
            DbSubcommand::Stats => run_db_stats(&runtime),
        },
        Some(Commands::Import(ImportArgs { path })) => run_import(&runtime, path),
        Some(Commands::Search(SearchArgs { term, limit })) => {
            run_search(&runtime, term.as_deref().unwrap_or_default(), limit)
        }
        Some(Commands::Catalog) => run_catalog(&runtime),
        Some(Commands::Show(ShowArgs { id })) => run_show(&runtime, id),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let report = init_layout(
        &paths,
        &InitOptions {
            materialize_config: !args.no_config,
            force: args.force,
        },
    )?;
    let db_existed = paths.db_path.exists();
    SqliteStore::create(paths.store_config())
        .with_context(|| format!("failed to create catalog at {}", normalize_path(&paths.db_path)))?;

    if runtime.json() {
        print_json(&serde_json::json!({
            "project_root": normalize_path(&paths.project_root),
            "db_path": normalize_path(&paths.db_path),
            "config_path": normalize_path(&paths.config_path),
            "created_dirs": report.created_dirs.iter().map(|dir| normalize_path(dir)).collect::<Vec<_>>(),
            "wrote_config": report.wrote_config,
            "created_db": !db_existed,
        }))?;
    } else {
        println!("Initialized treeindex runtime layout");
        println!("project_root: {}", normalize_path(&paths.project_root));
        println!("state_dir: {}", normalize_path(&paths.state_dir));
        println!("images_dir: {}", normalize_path(&paths.images_dir));
        println!("db_path: {}", normalize_path(&paths.db_path));
        println!("config_path: {}", normalize_path(&paths.config_path));
        println!("created_dirs: {}", report.created_dirs.len());
        println!("wrote_config: {}", report.wrote_config);
        println!("created_db: {}", format_flag(!db_existed));
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_status(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let status = inspect_runtime(&paths)?;

    if runtime.json() {
        print_json(&serde_json::json!({
            "project_root": normalize_path(&paths.project_root),
            "project_root_exists": status.project_root_exists,
            "state_dir_exists": status.state_dir_exists,
            "images_dir_exists": status.images_dir_exists,
            "overrides_exists": status.overrides_exists,
            "spreadsheet_exists": status.spreadsheet_exists,
            "config_exists": status.config_exists,
            "db_exists": status.db_exists,
            "db_size_bytes": status.db_size_bytes,
            "warnings": status.warnings,
        }))?;
    } else {
        println!("runtime status");
        println!("project_root: {}", normalize_path(&paths.project_root));
        println!(
            "project_root_exists: {}",
            format_flag(status.project_root_exists)
        );
        println!("state_dir_exists: {}", format_flag(status.state_dir_exists));
        println!("images_dir_exists: {}", format_flag(status.images_dir_exists));
        println!("overrides_exists: {}", format_flag(status.overrides_exists));
        println!(
            "spreadsheet_exists: {}",
            format_flag(status.spreadsheet_exists)
        );
        println!("config_exists: {}", format_flag(status.config_exists));
        println!("db_exists: {}", format_flag(status.db_exists));
        println!("db_size_bytes: {}", format_size(status.db_size_bytes));
        print_warnings(&status.warnings);
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_images_sync(runtime: &RuntimeOptions, dry_run: bool, use_overrides: bool) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let mut store = open_store(&paths)?;
    let report = run_image_sync(
        &paths,
        &SyncOptions {
            dry_run,
            use_overrides,
        },
        &mut store,
    )?;

    if runtime.json() {
        print_json(&report)?;
    } else {
        println!("images sync");
        println!("mode: {}", if report.dry_run { "dry-run" } else { "apply" });
        println!("images_dir: {}", report.images_dir);
        println!(
            "overrides_file: {}",
            report.overrides_file.as_deref().unwrap_or("<none>")
        );
        println!("images_indexed: {}", report.images_indexed);
        println!("overrides_applied: {}", report.overrides_applied);
        println!("skipped_files: {}", report.skipped_files);
        println!("collisions: {}", report.collisions.len());
        for collision in &report.collisions {
            println!(
                "collision.{}: {} (replaced {})",
                collision.key, collision.winner, collision.replaced
            );
        }
        println!("rows_scanned: {}", report.rows_scanned);
        println!("matched: {}", report.matched);
        println!("missing: {}", report.missing);
        println!("updated: {}", report.updated);
        if report.dry_run {
            println!("pending: {}", report.pending.len());
            for update in &report.pending {
                println!("pending.{}: {}", update.id, update.path);
            }
        }
        for tree_name in &report.unmatched_rows {
            println!("unmatched.tree_name: {tree_name}");
        }
        for image in &report.unused_images {
            println!("unused.image: {image}");
        }
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_db_dedupe(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let mut store = open_store(&paths)?;
    let report = deduplicate_and_constrain(&mut store)?;

    if runtime.json() {
        print_json(&report)?;
    } else {
        println!("db dedupe");
        println!("db_path: {}", normalize_path(&paths.db_path));
        println!("removed: {}", report.removed());
        for id in &report.removed_ids {
            println!("removed.id: {id}");
        }
        println!(
            "constraint: {}",
            if report.constraint_created {
                "created"
            } else {
                "already present"
            }
        );
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_db_fix_paths(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let mut store = open_store(&paths)?;
    let changed = fix_path_separators(&mut store)?;

    if runtime.json() {
        print_json(&serde_json::json!({ "rows_changed": changed }))?;
    } else {
        println!("db fix-paths");
        println!("db_path: {}", normalize_path(&paths.db_path));
        println!("rows_changed: {changed}");
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_db_ping(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let store = open_store(&paths)?;
    let version = store
        .ping()
        .with_context(|| format!("catalog at {} is unreachable", normalize_path(&paths.db_path)))?;

    if runtime.json() {
        print_json(&serde_json::json!({
            "db_path": normalize_path(&paths.db_path),
            "reachable": true,
            "sqlite_version": version,
        }))?;
    } else {
        println!("db ping");
        println!("db_path: {}", normalize_path(&paths.db_path));
        println!("reachable: yes");
        println!("sqlite_version: {version}");
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

#[derive(Debug, Serialize)]
struct DbStatsOutput {
    db_path: String,
    db_exists: bool,
    db_size_bytes: Option<u64>,
    store: Option<StoreStats>,
}

fn run_db_stats(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let status = inspect_runtime(&paths)?;
    let store = if status.db_exists {
        Some(open_store(&paths)?.stats()?)
    } else {
        None
    };

    if runtime.json() {
        print_json(&DbStatsOutput {
            db_path: normalize_path(&paths.db_path),
            db_exists: status.db_exists,
            db_size_bytes: status.db_size_bytes,
            store,
        })?;
    } else {
        println!("db stats");
        println!("db_path: {}", normalize_path(&paths.db_path));
        println!("db_exists: {}", format_flag(status.db_exists));
        println!("db_size_bytes: {}", format_size(status.db_size_bytes));
        match store {
            Some(stats) => {
                println!("tree_data.rows: {}", stats.rows);
                println!("tree_data.distinct_names: {}", stats.distinct_names);
                println!("tree_data.with_image: {}", stats.with_image);
                println!("tree_data.duplicate_groups: {}", stats.duplicate_groups);
                println!(
                    "tree_data.unique_constraint: {}",
                    format_flag(stats.constraint_present)
                );
            }
            None => println!("store: <not initialized> (run `treeindex init`)"),
        }
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_import(runtime: &RuntimeOptions, path: Option<PathBuf>) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let source = path.unwrap_or_else(|| paths.spreadsheet_path.clone());
    if !source.is_file() {
        bail!("spreadsheet not found: {}", normalize_path(&source));
    }
    let mut store = open_store(&paths)?;
    let report = import_spreadsheet(&source, &mut store)?;

    if runtime.json() {
        print_json(&report)?;
    } else {
        println!("import");
        println!("source: {}", report.source);
        println!("rows_read: {}", report.rows_read);
        println!("rows_skipped: {}", report.rows_skipped);
        println!("inserted: {}", report.inserted);
        println!("updated: {}", report.updated);
        println!(
            "constraint: {}",
            if report.constraint_created {
                "created"
            } else {
                "already present"
            }
        );
        if report.ignored_columns.is_empty() {
            println!("ignored_columns: <none>");
        } else {
            println!("ignored_columns: {}", report.ignored_columns.join(", "));
        }
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_search(runtime: &RuntimeOptions, term: &str, limit: Option<usize>) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let store = open_store(&paths)?;
    let results = search_catalog(&store, term, limit)?;

    if runtime.json() {
        print_json(&results)?;
    } else {
        println!("search");
        if results.preview {
            println!("term: <empty> (preview)");
        } else {
            println!("term: {}", results.term);
        }
        println!("results.count: {}", results.hits.len());
        if results.hits.is_empty() {
            println!("results: <none>");
        }
        for hit in &results.hits {
            println!(
                "result.{}: {}",
                hit.id,
                describe_tree(&hit.tree_name, hit.scientific_name.as_deref())
            );
        }
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_catalog(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let store = open_store(&paths)?;
    let trees = store.list_catalog()?;

    if runtime.json() {
        print_json(&trees)?;
    } else {
        println!("catalog");
        println!("trees.count: {}", trees.len());
        for tree in &trees {
            println!(
                "tree.{}: {}",
                tree.id,
                describe_tree(&tree.tree_name, tree.scientific_name.as_deref())
            );
        }
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_show(runtime: &RuntimeOptions, id: i64) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let store = open_store(&paths)?;
    let Some(detail) = tree_detail(&store, id)? else {
        bail!("no tree with id {id}");
    };

    if runtime.json() {
        print_json(&detail)?;
    } else {
        let record = &detail.record;
        println!("id: {}", record.id);
        println!("tree_name: {}", record.tree_name);
        println!(
            "scientific_name: {}",
            record.scientific_name.as_deref().unwrap_or("<none>")
        );
        println!(
            "image_path: {}",
            record.image_path.as_deref().unwrap_or("<none>")
        );
        println!("rating: {}", record.rating.as_deref().unwrap_or("<none>"));
        if detail.score_table.is_empty() {
            println!("scores: <none>");
        } else {
            println!("scores:");
            for line in &detail.score_table {
                println!("  {}: {}", line.label, format_score(line.value));
            }
        }
        for (label, value) in [
            ("information", &record.information),
            ("suitability", &record.suitability),
            ("challenges", &record.challenges),
        ] {
            if let Some(value) = value {
                println!("{label}: {value}");
            }
        }
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn open_store(paths: &ResolvedPaths) -> Result<SqliteStore> {
    debug!(
        db_path = %normalize_path(&paths.db_path),
        source = paths.database_source.as_str(),
        "opening catalog"
    );
    SqliteStore::open(paths.store_config()).with_context(|| {
        format!(
            "cannot open catalog at {} (run `treeindex init` or set --database / DATABASE_URL)",
            normalize_path(&paths.db_path)
        )
    })
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        config: runtime.config.clone(),
        database: runtime.database.clone(),
    };

    let initial = resolve_paths(&context, &overrides)?;
    let project_env = initial.project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
    }

    resolve_paths(&context, &overrides)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_diagnostics(runtime: &RuntimeOptions, paths: &ResolvedPaths) {
    if !runtime.diagnostics {
        return;
    }
    if runtime.json() {
        eprintln!("[diagnostics]\n{}", paths.diagnostics());
    } else {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
}

fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!("warnings:");
    for warning in warnings {
        println!("  - {warning}");
    }
}

fn describe_tree(tree_name: &str, scientific_name: Option<&str>) -> String {
    match scientific_name {
        Some(scientific_name) => format!("{tree_name} ({scientific_name})"),
        None => tree_name.to_string(),
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn format_size(value: Option<u64>) -> String {
    value
        .map(|size| size.to_string())
        .unwrap_or_else(|| "n/a".to_string())
}
