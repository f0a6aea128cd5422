//! Catalog store: the `TreeStore` seam used by the image pipeline and its SQLite
//! implementation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::reconcile::{ImageRow, ImageUpdate};

pub const TREE_TABLE: &str = "tree_data";
pub const UNIQUE_CONSTRAINT: &str = "tree_unique_name_scientific";
pub const UNIQUE_COLUMNS: &[&str] = &["tree_name", "scientific_name"];

pub const SCORE_COLUMNS: &[&str] = &[
    "climate_adaptation",
    "water_efficiency",
    "biodiversity_support",
    "community_acceptance",
    "aesthetic_cultural_fit",
    "shade_public_use",
    "cost_of_planting",
    "maintenance_needs",
    "lifespan_durability",
    "total_score",
];

pub const TEXT_COLUMNS: &[&str] = &["rating", "suitability", "information", "challenges"];

const TREE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tree_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tree_name TEXT NOT NULL,
    scientific_name TEXT,
    rating TEXT,
    climate_adaptation NUMERIC,
    water_efficiency NUMERIC,
    biodiversity_support NUMERIC,
    community_acceptance NUMERIC,
    aesthetic_cultural_fit NUMERIC,
    shade_public_use NUMERIC,
    cost_of_planting NUMERIC,
    maintenance_needs NUMERIC,
    lifespan_durability NUMERIC,
    total_score NUMERIC,
    suitability TEXT,
    information TEXT,
    challenges TEXT,
    image_path TEXT
);
CREATE INDEX IF NOT EXISTS idx_tree_data_tree_name ON tree_data(tree_name);
"#;

/// Explicit location of the catalog database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database: PathBuf,
}

impl StoreConfig {
    pub fn new(database: impl AsRef<Path>) -> Self {
        Self {
            database: database.as_ref().to_path_buf(),
        }
    }
}

/// Store operations the image pipeline and maintenance commands depend on.
///
/// Every write is a single transaction: callers observe all of it or none of it.
pub trait TreeStore {
    fn fetch_image_rows(&self) -> StoreResult<Vec<ImageRow>>;

    /// Set `image_path` for each `(path, id)`. Fails with [`StoreError::MissingRow`]
    /// and rolls back the whole batch if any id matches no row.
    fn write_image_paths(&mut self, updates: &[ImageUpdate]) -> StoreResult<usize>;

    /// Delete all but the smallest id of every `(tree_name, scientific_name)` group.
    /// Returns the removed ids in ascending order.
    fn remove_duplicate_rows(&mut self) -> StoreResult<Vec<i64>>;

    fn constraint_exists(&self, name: &str) -> StoreResult<bool>;

    fn add_unique_constraint(&mut self, name: &str, columns: &[&str]) -> StoreResult<()>;

    /// Rewrite `\` to `/` in every `image_path`. Returns the number of rows changed.
    fn replace_path_separators(&mut self) -> StoreResult<usize>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeRecord {
    pub id: i64,
    pub tree_name: String,
    pub scientific_name: Option<String>,
    pub image_path: Option<String>,
    pub rating: Option<String>,
    pub suitability: Option<String>,
    pub information: Option<String>,
    pub challenges: Option<String>,
    /// `(column, value)` in [`SCORE_COLUMNS`] order; absent scores are omitted.
    pub scores: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeSummary {
    pub id: i64,
    pub tree_name: String,
    pub scientific_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub rows: usize,
    pub distinct_names: usize,
    pub with_image: usize,
    pub duplicate_groups: usize,
    pub constraint_present: bool,
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    config: StoreConfig,
}

impl SqliteStore {
    /// Open an existing catalog. A missing or unreadable database is a connectivity
    /// failure; the file is never created here.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let store = Self { config };
        store.connect()?;
        Ok(store)
    }

    /// Create the database file and `tree_data` table when absent.
    pub fn create(config: StoreConfig) -> StoreResult<Self> {
        if let Some(parent) = config.database.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: display(parent),
                    source,
                })?;
            }
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = open_with_flags(&config.database, flags)?;
        connection
            .execute_batch(TREE_SCHEMA_SQL)
            .map_err(StoreError::query("initialize tree_data schema"))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Round-trip a trivial statement; returns the SQLite library version.
    pub fn ping(&self) -> StoreResult<String> {
        let connection = self.connect()?;
        connection
            .query_row("SELECT sqlite_version()", [], |row| row.get(0))
            .map_err(|source| StoreError::Connectivity {
                target: display(&self.config.database),
                source,
            })
    }

    pub fn stats(&self) -> StoreResult<StoreStats> {
        let connection = self.connect()?;
        require_columns(&connection, &["id", "tree_name", "scientific_name", "image_path"])?;
        let count = |sql: &str| -> StoreResult<usize> {
            let value: i64 = connection
                .query_row(sql, [], |row| row.get(0))
                .map_err(StoreError::query(format!("run `{sql}`")))?;
            Ok(usize::try_from(value).unwrap_or_default())
        };
        Ok(StoreStats {
            rows: count("SELECT COUNT(*) FROM tree_data")?,
            distinct_names: count("SELECT COUNT(DISTINCT tree_name) FROM tree_data")?,
            with_image: count(
                "SELECT COUNT(*) FROM tree_data WHERE image_path IS NOT NULL AND image_path <> ''",
            )?,
            duplicate_groups: count(
                "SELECT COUNT(*) FROM (
                    SELECT 1 FROM tree_data
                    GROUP BY tree_name, scientific_name
                    HAVING COUNT(*) > 1
                 )",
            )?,
            constraint_present: index_exists(&connection, UNIQUE_CONSTRAINT)?,
        })
    }

    /// Case-insensitive substring search over common and scientific names, one row
    /// per `tree_name` (lowest id), ordered by name. An empty term lists everything.
    pub fn search(&self, term: &str, limit: Option<usize>) -> StoreResult<Vec<TreeSummary>> {
        let connection = self.connect()?;
        require_columns(&connection, &["id", "tree_name", "scientific_name"])?;
        let term = term.trim();
        let pattern = format!("%{}%", escape_like(term));
        let limit = limit
            .and_then(|value| i64::try_from(value).ok())
            .unwrap_or(-1);

        let mut statement = connection
            .prepare(
                r"SELECT id, tree_name, scientific_name
                 FROM tree_data
                 WHERE id IN (
                     SELECT MIN(id) FROM tree_data
                     WHERE ?1 = ''
                        OR tree_name LIKE ?2 ESCAPE '\'
                        OR scientific_name LIKE ?2 ESCAPE '\'
                     GROUP BY tree_name
                 )
                 ORDER BY tree_name COLLATE NOCASE, id
                 LIMIT ?3",
            )
            .map_err(StoreError::query("prepare search query"))?;
        let rows = statement
            .query_map(params![term, pattern, limit], summary_from_row)
            .map_err(StoreError::query("run search query"))?;
        collect_rows(rows, "decode search row")
    }

    pub fn list_catalog(&self) -> StoreResult<Vec<TreeSummary>> {
        let connection = self.connect()?;
        require_columns(&connection, &["id", "tree_name", "scientific_name"])?;
        let mut statement = connection
            .prepare(
                "SELECT id, tree_name, scientific_name
                 FROM tree_data
                 ORDER BY tree_name COLLATE NOCASE, id",
            )
            .map_err(StoreError::query("prepare catalog query"))?;
        let rows = statement
            .query_map([], summary_from_row)
            .map_err(StoreError::query("run catalog query"))?;
        collect_rows(rows, "decode catalog row")
    }

    pub fn get_tree(&self, id: i64) -> StoreResult<Option<TreeRecord>> {
        let connection = self.connect()?;
        let mut columns = vec!["id", "tree_name", "scientific_name", "image_path"];
        columns.extend_from_slice(TEXT_COLUMNS);
        columns.extend_from_slice(SCORE_COLUMNS);
        require_columns(&connection, &columns)?;

        let sql = format!(
            "SELECT {} FROM tree_data WHERE id = ?1",
            columns.join(", ")
        );
        connection
            .query_row(&sql, [id], |row| {
                let mut scores = Vec::new();
                for (offset, column) in SCORE_COLUMNS.iter().enumerate() {
                    let value: Value = row.get(4 + TEXT_COLUMNS.len() + offset)?;
                    if let Some(score) = numeric(&value) {
                        scores.push((column.to_string(), score));
                    }
                }
                Ok(TreeRecord {
                    id: row.get(0)?,
                    tree_name: row.get(1)?,
                    scientific_name: non_empty(row.get(2)?),
                    image_path: non_empty(row.get(3)?),
                    rating: non_empty(row.get(4)?),
                    suitability: non_empty(row.get(5)?),
                    information: non_empty(row.get(6)?),
                    challenges: non_empty(row.get(7)?),
                    scores,
                })
            })
            .optional()
            .map_err(StoreError::query(format!("load tree {id}")))
    }

    /// Insert-or-update rows keyed on `(tree_name, scientific_name)` in one transaction.
    /// `columns` must be `tree_data` column names and include both key columns; the
    /// uniqueness constraint has to exist.
    pub fn upsert_trees(
        &mut self,
        columns: &[&str],
        rows: &[Vec<Value>],
    ) -> StoreResult<UpsertCounts> {
        let mut connection = self.connect()?;
        require_columns(&connection, columns)?;

        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let updates = columns
            .iter()
            .filter(|column| !UNIQUE_COLUMNS.contains(column))
            .map(|column| format!("{column} = excluded.{column}"))
            .collect::<Vec<_>>();
        let conflict_action = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };
        let sql = format!(
            "INSERT INTO tree_data ({}) VALUES ({placeholders})
             ON CONFLICT (tree_name, scientific_name) {conflict_action}",
            columns.join(", ")
        );

        let transaction = connection
            .transaction()
            .map_err(StoreError::query("start upsert transaction"))?;
        let before = row_count(&transaction)?;
        {
            let mut statement = transaction
                .prepare(&sql)
                .map_err(StoreError::query("prepare upsert"))?;
            for (index, row) in rows.iter().enumerate() {
                statement
                    .execute(params_from_iter(row.iter()))
                    .map_err(StoreError::query(format!("upsert row {}", index + 1)))?;
            }
        }
        let after = row_count(&transaction)?;
        transaction
            .commit()
            .map_err(StoreError::query("commit upsert transaction"))?;

        let inserted = after.saturating_sub(before);
        Ok(UpsertCounts {
            inserted,
            updated: rows.len().saturating_sub(inserted),
        })
    }

    pub(crate) fn connect(&self) -> StoreResult<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        open_with_flags(&self.config.database, flags)
    }
}

impl TreeStore for SqliteStore {
    fn fetch_image_rows(&self) -> StoreResult<Vec<ImageRow>> {
        let connection = self.connect()?;
        require_columns(&connection, &["id", "tree_name", "image_path"])?;
        let mut statement = connection
            .prepare("SELECT id, tree_name, image_path FROM tree_data ORDER BY id")
            .map_err(StoreError::query("prepare image row query"))?;
        let rows = statement
            .query_map([], |row| {
                Ok(ImageRow {
                    id: row.get(0)?,
                    tree_name: row.get(1)?,
                    image_path: row.get(2)?,
                })
            })
            .map_err(StoreError::query("run image row query"))?;
        collect_rows(rows, "decode image row")
    }

    fn write_image_paths(&mut self, updates: &[ImageUpdate]) -> StoreResult<usize> {
        let mut connection = self.connect()?;
        require_columns(&connection, &["id", "image_path"])?;

        let transaction = connection
            .transaction()
            .map_err(StoreError::query("start image path transaction"))?;
        let mut applied = 0usize;
        {
            let mut statement = transaction
                .prepare("UPDATE tree_data SET image_path = ?1 WHERE id = ?2")
                .map_err(StoreError::query("prepare image path update"))?;
            for update in updates {
                let changed = statement
                    .execute(params![update.path, update.id])
                    .map_err(StoreError::query(format!("update image path of {}", update.id)))?;
                if changed == 0 {
                    return Err(StoreError::MissingRow { id: update.id });
                }
                applied += changed;
            }
        }
        transaction
            .commit()
            .map_err(StoreError::query("commit image path transaction"))?;
        debug!(applied, "image paths written");
        Ok(applied)
    }

    fn remove_duplicate_rows(&mut self) -> StoreResult<Vec<i64>> {
        let mut connection = self.connect()?;
        require_columns(&connection, &["id", "tree_name", "scientific_name"])?;

        let transaction = connection
            .transaction()
            .map_err(StoreError::query("start deduplication transaction"))?;
        let removed = {
            let mut statement = transaction
                .prepare(
                    "SELECT id FROM tree_data
                     WHERE id NOT IN (
                         SELECT MIN(id) FROM tree_data GROUP BY tree_name, scientific_name
                     )
                     ORDER BY id",
                )
                .map_err(StoreError::query("prepare duplicate query"))?;
            let rows = statement
                .query_map([], |row| row.get::<_, i64>(0))
                .map_err(StoreError::query("find duplicate rows"))?;
            collect_rows(rows, "decode duplicate id")?
        };
        if !removed.is_empty() {
            transaction
                .execute(
                    "DELETE FROM tree_data
                     WHERE id NOT IN (
                         SELECT MIN(id) FROM tree_data GROUP BY tree_name, scientific_name
                     )",
                    [],
                )
                .map_err(StoreError::query("delete duplicate rows"))?;
        }
        transaction
            .commit()
            .map_err(StoreError::query("commit deduplication transaction"))?;
        Ok(removed)
    }

    fn constraint_exists(&self, name: &str) -> StoreResult<bool> {
        let connection = self.connect()?;
        index_exists(&connection, name)
    }

    fn add_unique_constraint(&mut self, name: &str, columns: &[&str]) -> StoreResult<()> {
        let connection = self.connect()?;
        require_columns(&connection, columns)?;
        let sql = format!(
            "CREATE UNIQUE INDEX {} ON tree_data ({})",
            quote_identifier(name),
            columns
                .iter()
                .map(|column| quote_identifier(column))
                .collect::<Vec<_>>()
                .join(", ")
        );
        connection
            .execute_batch(&sql)
            .map_err(StoreError::query(format!("create unique constraint {name}")))
    }

    fn replace_path_separators(&mut self) -> StoreResult<usize> {
        let connection = self.connect()?;
        require_columns(&connection, &["image_path"])?;
        connection
            .execute(
                "UPDATE tree_data
                 SET image_path = REPLACE(image_path, char(92), '/')
                 WHERE instr(image_path, char(92)) > 0",
                [],
            )
            .map_err(StoreError::query("rewrite image path separators"))
    }
}

fn open_with_flags(path: &Path, flags: OpenFlags) -> StoreResult<Connection> {
    let connectivity = |source| StoreError::Connectivity {
        target: display(path),
        source,
    };
    let connection = Connection::open_with_flags(path, flags).map_err(connectivity)?;
    connection
        .busy_timeout(Duration::from_secs(5))
        .map_err(connectivity)?;
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .map_err(connectivity)?;
    Ok(connection)
}

/// Fail with [`StoreError::Schema`] naming the first absent column.
fn require_columns(connection: &Connection, columns: &[&str]) -> StoreResult<()> {
    let mut statement = connection
        .prepare("SELECT name FROM pragma_table_info(?1)")
        .map_err(StoreError::query("prepare table_info query"))?;
    let present = statement
        .query_map([TREE_TABLE], |row| row.get::<_, String>(0))
        .map_err(StoreError::query("inspect tree_data columns"))?;
    let present = collect_rows(present, "decode table_info row")?;

    for column in columns {
        if !present.iter().any(|name| name.eq_ignore_ascii_case(column)) {
            return Err(StoreError::Schema {
                table: TREE_TABLE.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

fn index_exists(connection: &Connection, name: &str) -> StoreResult<bool> {
    let exists: i64 = connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1)",
            [name],
            |row| row.get(0),
        )
        .map_err(StoreError::query(format!("look up constraint {name}")))?;
    Ok(exists == 1)
}

fn row_count(connection: &Connection) -> StoreResult<usize> {
    let count: i64 = connection
        .query_row("SELECT COUNT(*) FROM tree_data", [], |row| row.get(0))
        .map_err(StoreError::query("count tree_data rows"))?;
    Ok(usize::try_from(count).unwrap_or_default())
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
    action: &str,
) -> StoreResult<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(StoreError::query(action))?);
    }
    Ok(out)
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<TreeSummary> {
    Ok(TreeSummary {
        id: row.get(0)?,
        tree_name: row.get(1)?,
        scientific_name: non_empty(row.get(2)?),
    })
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(value) => Some(*value as f64),
        Value::Real(value) => Some(*value),
        Value::Text(text) => text.trim().parse().ok(),
        Value::Null | Value::Blob(_) => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
pub(crate) mod tests {
    use rusqlite::Connection;
    use tempfile::{TempDir, tempdir};

    use super::*;

    pub(crate) fn seeded_store(rows: &[(&str, Option<&str>, Option<&str>)]) -> (TempDir, SqliteStore) {
        let temp = tempdir().expect("tempdir");
        let store =
            SqliteStore::create(StoreConfig::new(temp.path().join("data/trees.db"))).expect("create");
        let connection = Connection::open(&store.config().database).expect("open");
        for (tree_name, scientific_name, image_path) in rows {
            connection
                .execute(
                    "INSERT INTO tree_data (tree_name, scientific_name, image_path) VALUES (?1, ?2, ?3)",
                    params![tree_name, scientific_name, image_path],
                )
                .expect("insert row");
        }
        (temp, store)
    }

    #[test]
    fn open_refuses_to_create_missing_database() {
        let temp = tempdir().expect("tempdir");
        let error = SqliteStore::open(StoreConfig::new(temp.path().join("absent.db")))
            .expect_err("must fail");
        assert!(error.is_connectivity());
        assert!(!temp.path().join("absent.db").exists());
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("legacy.db");
        let connection = Connection::open(&path).expect("open");
        connection
            .execute_batch("CREATE TABLE tree_data (id INTEGER PRIMARY KEY, tree_name TEXT);")
            .expect("legacy schema");

        let store = SqliteStore::open(StoreConfig::new(&path)).expect("open store");
        match store.fetch_image_rows() {
            Err(StoreError::Schema { table, column }) => {
                assert_eq!(table, "tree_data");
                assert_eq!(column, "image_path");
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn write_image_paths_rolls_back_on_unknown_id() {
        let (_temp, mut store) = seeded_store(&[
            ("Olive", Some("Olea europaea"), None),
            ("Carob", Some("Ceratonia siliqua"), None),
        ]);
        let updates = vec![
            ImageUpdate {
                path: "assets/tree_images/Olive.png".to_string(),
                id: 1,
            },
            ImageUpdate {
                path: "assets/tree_images/Ghost.png".to_string(),
                id: 99,
            },
        ];

        let error = store.write_image_paths(&updates).expect_err("must fail");
        assert!(matches!(error, StoreError::MissingRow { id: 99 }));
        let rows = store.fetch_image_rows().expect("fetch");
        assert!(rows.iter().all(|row| row.image_path.is_none()));
    }

    #[test]
    fn duplicates_are_removed_keeping_lowest_id_and_constraint_is_named() {
        let (_temp, mut store) = seeded_store(&[
            ("Olive", Some("Olea europaea"), None),
            ("Olive", Some("Olea europaea"), Some("a.png")),
            ("Olive", Some("Olea oleaster"), None),
            ("Olive", Some("Olea europaea"), None),
        ]);

        assert_eq!(store.remove_duplicate_rows().expect("dedupe"), vec![2, 4]);
        assert!(!store.constraint_exists(UNIQUE_CONSTRAINT).expect("lookup"));
        store
            .add_unique_constraint(UNIQUE_CONSTRAINT, UNIQUE_COLUMNS)
            .expect("constraint");
        assert!(store.constraint_exists(UNIQUE_CONSTRAINT).expect("lookup"));

        let ids = store
            .fetch_image_rows()
            .expect("fetch")
            .iter()
            .map(|row| row.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn replace_path_separators_only_touches_backslashed_rows() {
        let (_temp, mut store) = seeded_store(&[
            ("Olive", None, Some("assets\\tree_images\\Olive.png")),
            ("Carob", None, Some("assets/tree_images/Carob.png")),
            ("Fig", None, None),
        ]);

        assert_eq!(store.replace_path_separators().expect("fix"), 1);
        assert_eq!(store.replace_path_separators().expect("second fix"), 0);
        let rows = store.fetch_image_rows().expect("fetch");
        assert_eq!(rows[0].image_path.as_deref(), Some("assets/tree_images/Olive.png"));
    }

    #[test]
    fn search_matches_either_name_case_insensitively_one_row_per_name() {
        let (_temp, store) = seeded_store(&[
            ("Olive", Some("Olea europaea"), None),
            ("Olive", Some("Olea oleaster"), None),
            ("Russian Olive", Some("Elaeagnus angustifolia"), None),
            ("Carob", Some("Ceratonia siliqua"), None),
            ("100%_Test", None, None),
        ]);

        let hits = store.search("OLEA", None).expect("search");
        assert_eq!(
            hits.iter().map(|hit| (hit.id, hit.tree_name.as_str())).collect::<Vec<_>>(),
            vec![(1, "Olive")]
        );

        let hits = store.search("olive", None).expect("search");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].tree_name, "Russian Olive");

        let hits = store.search("0%_", None).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tree_name, "100%_Test");

        let preview = store.search("", Some(2)).expect("preview");
        assert_eq!(
            preview.iter().map(|hit| hit.tree_name.as_str()).collect::<Vec<_>>(),
            vec!["100%_Test", "Carob"]
        );
    }

    #[test]
    fn get_tree_returns_scores_and_text() {
        let (_temp, store) = seeded_store(&[("Olive", Some("Olea europaea"), Some("a/Olive.png"))]);
        let connection = Connection::open(&store.config().database).expect("open");
        connection
            .execute(
                "UPDATE tree_data SET climate_adaptation = 5, total_score = 38.5, rating = 'A', information = '' WHERE id = 1",
                [],
            )
            .expect("update");

        let tree = store.get_tree(1).expect("get").expect("present");
        assert_eq!(tree.tree_name, "Olive");
        assert_eq!(tree.rating.as_deref(), Some("A"));
        assert_eq!(tree.information, None);
        assert_eq!(
            tree.scores,
            vec![
                ("climate_adaptation".to_string(), 5.0),
                ("total_score".to_string(), 38.5)
            ]
        );
        assert!(store.get_tree(42).expect("get").is_none());
    }

    #[test]
    fn stats_count_rows_images_and_duplicates() {
        let (_temp, store) = seeded_store(&[
            ("Olive", Some("Olea europaea"), Some("a.png")),
            ("Olive", Some("Olea europaea"), None),
            ("Carob", None, Some("")),
        ]);
        let stats = store.stats().expect("stats");
        assert_eq!(stats.rows, 3);
        assert_eq!(stats.distinct_names, 2);
        assert_eq!(stats.with_image, 1);
        assert_eq!(stats.duplicate_groups, 1);
        assert!(!stats.constraint_present);
        assert!(!store.ping().expect("ping").is_empty());
    }
}
