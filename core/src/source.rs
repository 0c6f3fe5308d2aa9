//! Record sources: reading named tables into datasets using DuckDB
//!
//! A file identifier can be a directory of data files, a DuckDB database, an
//! Excel workbook, or a single data file. Absent or unreadable tables are not
//! errors: they come back as empty datasets so the comparison can report zero
//! rows for that side.

use crate::error::{Result, TabreconError};
use crate::normalize::{normalize_column_name, CellValue};
use crate::record::{Dataset, Record};
use calamine::{open_workbook, Reader, Xlsx};
use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, ValueRef};
use duckdb::Connection;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use walkdir::WalkDir;

/// File extensions readable as tables
const DATA_EXTENSIONS: &[&str] = &["csv", "tsv", "parquet", "json", "jsonl", "xlsx"];

/// File extensions treated as DuckDB databases
const DATABASE_EXTENSIONS: &[&str] = &["duckdb", "db"];

/// Days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const SOURCE_VIEW: &str = "source_view";

/// Options forwarded from configuration to the reader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableReadOptions {
    /// Lines or sheet rows to skip before the header row
    pub header_row: usize,
}

/// Something that can turn a (file, table) pair into a dataset
pub trait RecordSource {
    /// Read `table` from `file`. Absent or unreadable tables yield an empty
    /// dataset; placeholder columns and rows left empty are dropped.
    fn read_table(&self, file: &Path, table: &str, options: &TableReadOptions) -> Result<Dataset>;

    /// Names of the tables available in `file`
    fn list_tables(&self, file: &Path) -> Result<Vec<String>>;
}

/// How a file identifier is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Every supported file inside is a table named after its stem
    Directory,
    /// A DuckDB database; its tables are the tables
    Database,
    /// An Excel workbook; its sheets are the tables
    Workbook,
    /// A single data file holding one table named after its stem
    File,
}

impl SourceKind {
    pub fn detect(path: &Path) -> Self {
        if path.is_dir() {
            return SourceKind::Directory;
        }
        match extension_of(path).as_deref() {
            Some(ext) if DATABASE_EXTENSIONS.contains(&ext) => SourceKind::Database,
            Some("xlsx") => SourceKind::Workbook,
            _ => SourceKind::File,
        }
    }
}

/// Record source backed by an in-memory DuckDB connection
pub struct DuckDbRecordSource {
    connection: Connection,
}

impl DuckDbRecordSource {
    pub fn new() -> Result<Self> {
        let connection = Connection::open_in_memory()?;
        connection.execute("SET enable_progress_bar=false", [])?;
        // Row numbers in reports follow source order.
        connection.execute("SET preserve_insertion_order=true", [])?;
        Ok(Self { connection })
    }

    /// Build the SELECT that yields the raw table, or `None` if the table is absent
    fn table_query(&self, file: &Path, table: &str, options: &TableReadOptions) -> Result<Option<String>> {
        match SourceKind::detect(file) {
            SourceKind::Directory => Ok(find_table_file(file, table)
                .map(|path| file_query(&path, options))),
            SourceKind::File => {
                if table_matches(&file_stem(file), table) {
                    Ok(Some(file_query(file, options)))
                } else {
                    Ok(None)
                }
            }
            SourceKind::Workbook => {
                self.load_extension("excel")?;
                let mut query = format!(
                    "SELECT * FROM read_xlsx('{}', sheet = '{}', header = true",
                    sql_literal(&file.to_string_lossy()),
                    sql_literal(table)
                );
                if options.header_row > 0 {
                    query.push_str(&format!(", range = 'A{}:XFD1048576'", options.header_row + 1));
                }
                query.push(')');
                Ok(Some(query))
            }
            SourceKind::Database => {
                let alias = self.attach_database(file)?;
                Ok(self
                    .database_tables(&alias)?
                    .into_iter()
                    .find(|(_, name)| table_matches(name, table))
                    .map(|(schema, name)| {
                        format!(
                            "SELECT * FROM {}.{}.{}",
                            sql_identifier(&alias),
                            sql_identifier(&schema),
                            sql_identifier(&name)
                        )
                    }))
            }
        }
    }

    fn load_extension(&self, name: &str) -> Result<()> {
        self.connection
            .execute_batch(&format!("INSTALL {name}; LOAD {name};"))
            .map_err(|e| TabreconError::data_processing(format!("Failed to load DuckDB extension '{name}': {e}")))
    }

    /// Attach a database file read-only under an alias derived from its path
    fn attach_database(&self, file: &Path) -> Result<String> {
        let path = file.to_string_lossy();
        let digest = blake3::hash(path.as_bytes()).to_hex();
        let alias = format!("src_{}", &digest.as_str()[..12]);
        self.connection
            .execute_batch(&format!(
                "ATTACH IF NOT EXISTS '{}' AS {} (READ_ONLY)",
                sql_literal(&path),
                sql_identifier(&alias)
            ))
            .map_err(|e| self.convert_duckdb_error(e, file))?;
        Ok(alias)
    }

    /// (schema, table) pairs of an attached database
    fn database_tables(&self, alias: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self.connection.prepare(
            "SELECT table_schema, table_name FROM information_schema.tables \
             WHERE table_catalog = ? ORDER BY table_schema, table_name",
        )?;
        let rows = stmt.query_map([alias], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut tables = Vec::new();
        for row in rows {
            tables.push(row?);
        }
        Ok(tables)
    }

    /// Column names of the source view, in source order
    fn view_columns(&self) -> Result<Vec<String>> {
        let mut stmt = self.connection.prepare(&format!("DESCRIBE {SOURCE_VIEW}"))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut columns = Vec::new();
        for row in rows {
            columns.push(row.map_err(|e| {
                TabreconError::data_processing(format!("Failed to process column info row: {e}"))
            })?);
        }
        Ok(columns)
    }

    /// Materialize the source view into a dataset, dropping placeholder
    /// columns and rows that end up blank
    fn extract_dataset(&self) -> Result<Dataset> {
        let kept: Vec<(usize, String)> = self
            .view_columns()?
            .into_iter()
            .enumerate()
            .filter(|(index, name)| {
                let placeholder = is_placeholder_column(*index, name);
                if placeholder {
                    log::debug!("Dropping placeholder column '{name}'");
                }
                !placeholder
            })
            .collect();

        let mut stmt = self.connection.prepare(&format!("SELECT * FROM {SOURCE_VIEW}"))?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        let mut dropped = 0usize;

        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(kept.len());
            for (index, name) in &kept {
                let value = row.get_ref(*index).map_err(|e| {
                    TabreconError::data_processing(format!("Failed to read column '{name}': {e}"))
                })?;
                cells.push((name.as_str(), cell_value(value)));
            }
            let record = Record::from_cells(cells);
            if record.is_blank() {
                dropped += 1;
            } else {
                records.push(record);
            }
        }

        if dropped > 0 {
            log::debug!("Dropped {dropped} empty rows");
        }
        Ok(Dataset::new(records))
    }

    fn convert_duckdb_error(&self, error: duckdb::Error, file_path: &Path) -> TabreconError {
        let error_msg = error.to_string();

        if error_msg.contains("CSV Error")
            || error_msg.contains("Could not convert")
            || error_msg.contains("Invalid CSV")
            || error_msg.contains("Unterminated quoted field")
        {
            TabreconError::invalid_input(format!("Malformed CSV file '{}': {}", file_path.display(), error_msg))
        } else if error_msg.contains("Malformed JSON") {
            TabreconError::invalid_input(format!("Malformed JSON file '{}': {}", file_path.display(), error_msg))
        } else if error_msg.contains("No files found") || error_msg.contains("does not exist") {
            TabreconError::invalid_input(format!("File not found: {}", file_path.display()))
        } else if error_msg.contains("Permission denied") {
            TabreconError::invalid_input(format!("Permission denied accessing file: {}", file_path.display()))
        } else {
            TabreconError::DuckDb(error)
        }
    }
}

impl RecordSource for DuckDbRecordSource {
    fn read_table(&self, file: &Path, table: &str, options: &TableReadOptions) -> Result<Dataset> {
        if !file.exists() {
            log::warn!("Source '{}' not found, treating table '{table}' as empty", file.display());
            return Ok(Dataset::empty());
        }

        let query = match self.table_query(file, table, options) {
            Ok(Some(query)) => query,
            Ok(None) => {
                log::warn!("Table '{table}' not found in '{}'", file.display());
                return Ok(Dataset::empty());
            }
            Err(e) => {
                log::warn!("Cannot open '{}' for table '{table}': {e}", file.display());
                return Ok(Dataset::empty());
            }
        };

        let create_view_sql = format!("CREATE OR REPLACE VIEW {SOURCE_VIEW} AS {query}");
        if let Err(e) = self.connection.execute(&create_view_sql, []) {
            let e = self.convert_duckdb_error(e, file);
            log::warn!("Table '{table}' in '{}' is unreadable: {e}", file.display());
            return Ok(Dataset::empty());
        }

        let dataset = self.extract_dataset()?;
        log::debug!(
            "Read {} rows x {} columns from '{}' table '{table}'",
            dataset.len(),
            dataset.column_count(),
            file.display()
        );
        Ok(dataset)
    }

    fn list_tables(&self, file: &Path) -> Result<Vec<String>> {
        if !file.exists() {
            return Err(TabreconError::invalid_input(format!("File not found: {}", file.display())));
        }

        match SourceKind::detect(file) {
            SourceKind::Directory => {
                let mut tables = Vec::new();
                for entry in WalkDir::new(file).min_depth(1).max_depth(1).sort_by_file_name() {
                    let entry = entry.map_err(|e| {
                        TabreconError::invalid_input(format!("Failed to scan '{}': {e}", file.display()))
                    })?;
                    let path = entry.path();
                    if path.is_file() && is_data_file(path) {
                        tables.push(file_stem(path));
                    }
                }
                Ok(tables)
            }
            SourceKind::Database => {
                let alias = self.attach_database(file)?;
                Ok(self.database_tables(&alias)?.into_iter().map(|(_, name)| name).collect())
            }
            SourceKind::Workbook => {
                let workbook: Xlsx<_> = open_workbook(file).map_err(|e: calamine::XlsxError| {
                    TabreconError::invalid_input(format!("Failed to open workbook '{}': {e}", file.display()))
                })?;
                Ok(workbook.sheet_names())
            }
            SourceKind::File => Ok(vec![file_stem(file)]),
        }
    }
}

/// Convert a DuckDB value into a raw cell
fn cell_value(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Boolean(b) => CellValue::Boolean(b),
        ValueRef::TinyInt(i) => CellValue::Integer(i.into()),
        ValueRef::SmallInt(i) => CellValue::Integer(i.into()),
        ValueRef::Int(i) => CellValue::Integer(i.into()),
        ValueRef::BigInt(i) => CellValue::Integer(i.into()),
        ValueRef::HugeInt(i) => CellValue::Integer(i),
        ValueRef::UTinyInt(i) => CellValue::Integer(i.into()),
        ValueRef::USmallInt(i) => CellValue::Integer(i.into()),
        ValueRef::UInt(i) => CellValue::Integer(i.into()),
        ValueRef::UBigInt(i) => CellValue::Integer(i.into()),
        ValueRef::Float(f) => CellValue::Float(f.into()),
        ValueRef::Double(f) => CellValue::Float(f),
        ValueRef::Decimal(d) => CellValue::Text(d.to_string()),
        ValueRef::Text(s) => CellValue::Text(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => CellValue::Text(format!("<blob:{} bytes>", b.len())),
        ValueRef::Date32(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map(CellValue::Date)
            .unwrap_or(CellValue::Null),
        ValueRef::Timestamp(unit, ts) => DateTime::from_timestamp_micros(to_micros(unit, ts))
            .map(|dt| CellValue::Timestamp(dt.naive_utc()))
            .unwrap_or(CellValue::Null),
        ValueRef::Time64(unit, t) => {
            let total_seconds = to_micros(unit, t) / 1_000_000;
            let hours = total_seconds / 3600;
            let minutes = (total_seconds % 3600) / 60;
            let seconds = total_seconds % 60;
            CellValue::Text(format!("{hours:02}:{minutes:02}:{seconds:02}"))
        }
        other => CellValue::Text(format!("{other:?}")),
    }
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn unnamed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(unnamed(:?_?\d+)?)?$").expect("unnamed pattern is valid"))
}

fn generated_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^column(\d+)$").expect("generated pattern is valid"))
}

/// Placeholder names produced for header cells that were blank.
///
/// DuckDB names a blank header cell `column<N>` after its position, so a
/// `column<N>` header only counts as a placeholder when N is its own index.
fn is_placeholder_column(index: usize, name: &str) -> bool {
    let normalized = normalize_column_name(name);
    if unnamed_pattern().is_match(&normalized) {
        return true;
    }
    generated_pattern()
        .captures(&normalized)
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .is_some_and(|position| position == index)
}

fn file_query(path: &Path, options: &TableReadOptions) -> String {
    let literal = sql_literal(&path.to_string_lossy());
    match extension_of(path).as_deref() {
        Some("csv") | Some("tsv") if options.header_row > 0 => format!(
            "SELECT * FROM read_csv('{literal}', skip = {}, header = true)",
            options.header_row
        ),
        _ => {
            if options.header_row > 0 {
                log::debug!("Header offset ignored for '{}'", path.display());
            }
            format!("SELECT * FROM '{literal}'")
        }
    }
}

fn find_table_file(dir: &Path, table: &str) -> Option<std::path::PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .find(|path| path.is_file() && is_data_file(path) && table_matches(&file_stem(path), table))
}

fn is_data_file(path: &Path) -> bool {
    extension_of(path)
        .map(|ext| DATA_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn table_matches(candidate: &str, table: &str) -> bool {
    normalize_column_name(candidate) == normalize_column_name(table)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub(crate) fn sql_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn sql_identifier(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_date_values() {
        assert_eq!(
            cell_value(ValueRef::Date32(0)),
            CellValue::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
        );
        assert_eq!(
            cell_value(ValueRef::Date32(-1)),
            CellValue::Date(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap())
        );
        // Out of chrono's range, including day counts that overflow the epoch shift
        assert_eq!(cell_value(ValueRef::Date32(i32::MAX)), CellValue::Null);
        assert_eq!(cell_value(ValueRef::Date32(i32::MIN)), CellValue::Null);
    }

    #[test]
    fn test_placeholder_columns() {
        assert!(is_placeholder_column(0, "Unnamed: 3"));
        assert!(is_placeholder_column(4, "unnamed"));
        assert!(is_placeholder_column(1, "  "));
        assert!(is_placeholder_column(12, "column12"));
        assert!(is_placeholder_column(5, "column05"));
        assert!(!is_placeholder_column(0, "column12"));
        assert!(!is_placeholder_column(0, "name"));
        assert!(!is_placeholder_column(0, "column_total"));
    }

    #[test]
    fn test_column_named_like_a_placeholder_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let csv_path = temp_dir.path().join("survey.csv");
        fs::write(&csv_path, "id,column12,answer\n1,x,yes\n2,y,no\n").unwrap();

        let source = DuckDbRecordSource::new().unwrap();
        let dataset = source
            .read_table(&csv_path, "survey", &TableReadOptions::default())
            .unwrap();
        assert_eq!(dataset.columns(), vec!["id", "column12", "answer"]);
        assert_eq!(dataset.records()[1].get("column12"), "y");
    }

    #[test]
    fn test_source_kind_detection() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(SourceKind::detect(temp_dir.path()), SourceKind::Directory);
        assert_eq!(SourceKind::detect(Path::new("a.duckdb")), SourceKind::Database);
        assert_eq!(SourceKind::detect(Path::new("a.xlsx")), SourceKind::Workbook);
        assert_eq!(SourceKind::detect(Path::new("a.csv")), SourceKind::File);
    }

    #[test]
    fn test_csv_loading() {
        let temp_dir = TempDir::new().unwrap();
        let csv_path = temp_dir.path().join("people.csv");
        fs::write(&csv_path, "ID,Full Name,age\n007,Alice,30\n2,Bob,25.0\n").unwrap();

        let source = DuckDbRecordSource::new().unwrap();
        let dataset = source
            .read_table(&csv_path, "people", &TableReadOptions::default())
            .unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.columns(), vec!["id", "full_name", "age"]);
        let first = &dataset.records()[0];
        assert_eq!(first.get("id"), "7");
        assert_eq!(first.get("full_name"), "alice");
        assert_eq!(dataset.records()[1].get("age"), "25");
    }

    #[test]
    fn test_header_row_offset() {
        let temp_dir = TempDir::new().unwrap();
        let csv_path = temp_dir.path().join("report.csv");
        fs::write(&csv_path, "Monthly export\ngenerated today\nid,amount\n1,10\n2,20\n").unwrap();

        let source = DuckDbRecordSource::new().unwrap();
        let dataset = source
            .read_table(&csv_path, "report", &TableReadOptions { header_row: 2 })
            .unwrap();

        assert_eq!(dataset.columns(), vec!["id", "amount"]);
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_missing_sources_are_empty() {
        let temp_dir = TempDir::new().unwrap();
        let source = DuckDbRecordSource::new().unwrap();
        let options = TableReadOptions::default();

        let missing_file = temp_dir.path().join("missing.csv");
        assert!(source.read_table(&missing_file, "missing", &options).unwrap().is_empty());

        let csv_path = temp_dir.path().join("orders.csv");
        fs::write(&csv_path, "id\n1\n").unwrap();
        assert!(source.read_table(&csv_path, "customers", &options).unwrap().is_empty());
        assert!(source.read_table(temp_dir.path(), "customers", &options).unwrap().is_empty());
    }

    #[test]
    fn test_directory_tables() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("orders.csv"), "id,total\n1,5\n").unwrap();
        fs::write(temp_dir.path().join("customers.csv"), "id,name\n1,ann\n").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let source = DuckDbRecordSource::new().unwrap();
        assert_eq!(
            source.list_tables(temp_dir.path()).unwrap(),
            vec!["customers".to_string(), "orders".to_string()]
        );

        let orders = source
            .read_table(temp_dir.path(), "Orders", &TableReadOptions::default())
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders.records()[0].get("total"), "5");
    }

    #[test]
    fn test_blank_rows_are_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let csv_path = temp_dir.path().join("sparse.csv");
        fs::write(&csv_path, "id,name\n1,a\n,\n2,b\n").unwrap();

        let source = DuckDbRecordSource::new().unwrap();
        let dataset = source
            .read_table(&csv_path, "sparse", &TableReadOptions::default())
            .unwrap();
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_workbook_sheets_are_listed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        for name in ["Invoices", "payments"] {
            let sheet = workbook.add_worksheet();
            sheet.set_name(name).unwrap();
            sheet.write_string(0, 0, "id").unwrap();
            sheet.write_number(1, 0, 1).unwrap();
        }
        workbook.save(&path).unwrap();

        let source = DuckDbRecordSource::new().unwrap();
        assert_eq!(
            source.list_tables(&path).unwrap(),
            vec!["Invoices".to_string(), "payments".to_string()]
        );

        let corrupt = temp_dir.path().join("corrupt.xlsx");
        fs::write(&corrupt, "not a workbook").unwrap();
        assert!(source.list_tables(&corrupt).is_err());
    }

    #[test]
    fn test_list_tables_of_missing_file_fails() {
        let source = DuckDbRecordSource::new().unwrap();
        assert!(source.list_tables(Path::new("/definitely/not/here.csv")).is_err());
    }
}
