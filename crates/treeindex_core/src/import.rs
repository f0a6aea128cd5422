//! Spreadsheet import into `tree_data`, keyed on `(tree_name, scientific_name)`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::types::Value;
use serde::Serialize;
use tracing::{info, warn};

use crate::store::{SCORE_COLUMNS, SqliteStore, TEXT_COLUMNS};
use crate::tabular::{TableRow, read_table};
use crate::updater::ensure_unique_constraint;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub source: String,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub inserted: usize,
    pub updated: usize,
    pub constraint_created: bool,
    pub ignored_columns: Vec<String>,
}

/// Upsert every row of a CSV or spreadsheet file. Rows without a `tree_name` are
/// skipped; a missing `scientific_name` is stored as an empty string so repeated
/// imports update instead of duplicating.
pub fn import_spreadsheet(path: &Path, store: &mut SqliteStore) -> Result<ImportReport> {
    let table = read_table(path)?;
    table.require_columns(path, &["tree_name"])?;

    let mut columns = vec!["tree_name", "scientific_name"];
    columns.extend(
        TEXT_COLUMNS
            .iter()
            .chain(SCORE_COLUMNS)
            .copied()
            .filter(|column| table.has_column(column)),
    );
    let ignored_columns = table
        .headers
        .iter()
        .filter(|header| !header.is_empty() && !columns.contains(&header.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    for column in &ignored_columns {
        warn!(column = %column, "ignoring unknown spreadsheet column");
    }

    let mut rows = Vec::with_capacity(table.rows.len());
    let mut rows_skipped = 0usize;
    for row in &table.rows {
        match row_values(row, &columns, path)? {
            Some(values) => rows.push(values),
            None => {
                rows_skipped += 1;
                warn!(line = row.line, "skipping row without tree_name");
            }
        }
    }

    let constraint_created = ensure_unique_constraint(store).with_context(|| {
        "failed to add the (tree_name, scientific_name) uniqueness constraint; run `treeindex db dedupe` first"
    })?;
    let counts = store
        .upsert_trees(&columns, &rows)
        .with_context(|| format!("failed to import {}", path.display()))?;
    info!(
        inserted = counts.inserted,
        updated = counts.updated,
        skipped = rows_skipped,
        "spreadsheet imported"
    );

    Ok(ImportReport {
        source: path.to_string_lossy().replace('\\', "/"),
        rows_read: table.rows.len(),
        rows_skipped,
        inserted: counts.inserted,
        updated: counts.updated,
        constraint_created,
        ignored_columns,
    })
}

fn row_values(row: &TableRow, columns: &[&str], source: &Path) -> Result<Option<Vec<Value>>> {
    let Some(tree_name) = row.get("tree_name") else {
        return Ok(None);
    };

    let mut values = Vec::with_capacity(columns.len());
    values.push(Value::Text(tree_name.to_string()));
    values.push(Value::Text(
        row.get("scientific_name").unwrap_or_default().to_string(),
    ));
    for column in &columns[2..] {
        let value = match row.get(column) {
            None => Value::Null,
            Some(text) if SCORE_COLUMNS.contains(column) => match text.parse::<f64>() {
                Ok(number) if number.is_finite() => Value::Real(number),
                _ => bail!(
                    "{} line {}: `{column}` must be a number, got {text:?}",
                    source.display(),
                    row.line
                ),
            },
            Some(text) => Value::Text(text.to_string()),
        };
        values.push(value);
    }
    Ok(Some(values))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::store::tests::seeded_store;
    use crate::store::{TreeStore, UNIQUE_CONSTRAINT};

    #[test]
    fn import_upserts_and_reimport_updates_in_place() {
        let (temp, mut store) = seeded_store(&[]);
        let csv = temp.path().join("trees.csv");
        fs::write(
            &csv,
            "Tree_Name,Scientific_Name,Rating,Total_Score,Notes\n\
             Olive,Olea europaea,A,41,keep\n\
             Carob,,B,35.5,\n\
             ,Nameless,C,1,\n",
        )
        .expect("write csv");

        let report = import_spreadsheet(&csv, &mut store).expect("import");
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.updated, 0);
        assert!(report.constraint_created);
        assert_eq!(report.ignored_columns, vec!["notes".to_string()]);
        assert!(store.constraint_exists(UNIQUE_CONSTRAINT).expect("lookup"));

        fs::write(
            &csv,
            "tree_name,scientific_name,rating,total_score\nOlive,Olea europaea,A+,42\nCarob,,B,35.5\n",
        )
        .expect("rewrite csv");
        let again = import_spreadsheet(&csv, &mut store).expect("reimport");
        assert_eq!(again.inserted, 0);
        assert_eq!(again.updated, 2);
        assert!(!again.constraint_created);

        let olive = store.get_tree(1).expect("get").expect("present");
        assert_eq!(olive.rating.as_deref(), Some("A+"));
        assert_eq!(olive.scores, vec![("total_score".to_string(), 42.0)]);
        assert_eq!(store.stats().expect("stats").rows, 2);
    }

    #[test]
    fn non_numeric_score_names_the_line_and_column() {
        let (temp, mut store) = seeded_store(&[]);
        let csv = temp.path().join("trees.csv");
        fs::write(&csv, "tree_name,water_efficiency\nOlive,high\n").expect("write csv");

        let error = import_spreadsheet(&csv, &mut store).expect_err("must fail");
        let message = format!("{error:#}");
        assert!(message.contains("line 2"), "{message}");
        assert!(message.contains("water_efficiency"), "{message}");
        assert_eq!(store.stats().expect("stats").rows, 0);
    }

    #[test]
    fn missing_tree_name_column_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let csv = temp.path().join("trees.csv");
        fs::write(&csv, "name,scientific_name\nOlive,Olea europaea\n").expect("write csv");
        let (_store_dir, mut store) = seeded_store(&[]);

        let error = import_spreadsheet(&csv, &mut store).expect_err("must fail");
        assert!(format!("{error:#}").contains("missing required column `tree_name`"));
    }

    #[test]
    fn existing_duplicates_block_the_constraint() {
        let (temp, mut store) = seeded_store(&[
            ("Olive", Some("Olea europaea"), None),
            ("Olive", Some("Olea europaea"), None),
        ]);
        let csv = temp.path().join("trees.csv");
        fs::write(&csv, "tree_name,scientific_name\nFig,Ficus carica\n").expect("write csv");

        let error = import_spreadsheet(&csv, &mut store).expect_err("must fail");
        assert!(format!("{error:#}").contains("db dedupe"));
        assert_eq!(store.stats().expect("stats").rows, 2);
    }
}
