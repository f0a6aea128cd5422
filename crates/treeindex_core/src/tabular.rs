//! Header-keyed rows read from CSV or XLSX files.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use calamine::{DataType, Reader, open_workbook_auto};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Lowercased, trimmed column names in file order.
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// 1-based line/row number in the source, header included.
    pub line: usize,
    cells: BTreeMap<String, String>,
}

impl TableRow {
    /// Trimmed cell value; empty cells read as `None`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

impl Table {
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|header| header == column)
    }

    pub fn require_columns(&self, source: &Path, columns: &[&str]) -> Result<()> {
        for column in columns {
            if !self.has_column(column) {
                bail!(
                    "{} is missing required column `{column}` (found: {})",
                    source.display(),
                    self.headers.join(", ")
                );
            }
        }
        Ok(())
    }

    fn from_records(headers: Vec<String>, records: Vec<(usize, Vec<String>)>) -> Self {
        let rows = records
            .into_iter()
            .filter(|(_, values)| values.iter().any(|value| !value.is_empty()))
            .map(|(line, values)| TableRow {
                line,
                cells: headers.iter().cloned().zip(values).collect(),
            })
            .collect();
        Self { headers, rows }
    }
}

/// Read a `.csv` or spreadsheet (`.xlsx`, `.xls`, `.ods`) file. The first row is the header.
pub fn read_table(path: &Path) -> Result<Table> {
    let extension = path
        .extension()
        .map(|value| value.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => read_csv(path),
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook(path),
        _ => bail!(
            "unsupported table format for {} (expected .csv or .xlsx)",
            path.display()
        ),
    }
}

fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header row of {}", path.display()))?
        .iter()
        .map(normalize_header)
        .collect::<Vec<_>>();

    let mut records = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("failed to read {} row {}", path.display(), index + 2))?;
        records.push((index + 2, record.iter().map(str::to_string).collect()));
    }
    Ok(Table::from_records(headers, records))
}

fn read_workbook(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|err| anyhow::anyhow!("failed to open workbook {}: {err}", path.display()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("workbook {} has no sheets", path.display()))?;
    let range = match workbook.worksheet_range(&sheet) {
        Some(Ok(range)) => range,
        Some(Err(err)) => bail!("failed to read sheet `{sheet}` of {}: {err}", path.display()),
        None => bail!("sheet `{sheet}` vanished from {}", path.display()),
    };

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        bail!("sheet `{sheet}` of {} is empty", path.display());
    };
    let headers = header_row
        .iter()
        .map(|cell| normalize_header(&cell_text(cell)))
        .collect::<Vec<_>>();
    let records = rows
        .enumerate()
        .map(|(index, row)| (index + 2, row.iter().map(cell_text).collect()))
        .collect();
    Ok(Table::from_records(headers, records))
}

fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::String(value) => value.trim().to_string(),
        DataType::Int(value) => value.to_string(),
        DataType::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        DataType::Float(value) => value.to_string(),
        DataType::Bool(value) => value.to_string(),
        DataType::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

fn normalize_header(value: &str) -> String {
    value.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn csv_rows_are_keyed_by_lowercase_header() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("overrides.csv");
        fs::write(
            &path,
            "Tree_Name, Scientific_Name ,image_file\nOlive, Olea europaea ,olive_custom.jpg\n,,\nAleppo Pine,,pine.png\n",
        )
        .expect("write csv");

        let table = read_table(&path).expect("read csv");
        assert_eq!(
            table.headers,
            vec!["tree_name", "scientific_name", "image_file"]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("tree_name"), Some("Olive"));
        assert_eq!(table.rows[0].get("scientific_name"), Some("Olea europaea"));
        assert_eq!(table.rows[1].line, 4);
        assert_eq!(table.rows[1].get("scientific_name"), None);
    }

    #[test]
    fn require_columns_names_the_missing_column() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("broken.csv");
        fs::write(&path, "tree_name,file\nOlive,olive.png\n").expect("write csv");

        let table = read_table(&path).expect("read csv");
        let error = table
            .require_columns(&path, &["tree_name", "image_file"])
            .expect_err("must fail");
        assert!(error.to_string().contains("`image_file`"));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("trees.json");
        fs::write(&path, "[]").expect("write json");
        let error = read_table(&path).expect_err("must fail");
        assert!(error.to_string().contains("unsupported table format"));
    }
}
