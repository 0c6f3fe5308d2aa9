//! Report sinks for reconciliation results
//!
//! Three writers are provided: a single pretty-printed JSON document, a single
//! Excel workbook with one worksheet per sheet, and a set of per-sheet files
//! written through DuckDB's `COPY ... TO` in CSV or Parquet format.

use crate::aggregate::{ComparisonResult, DetailRecord, DuplicateDetail, ModifiedDetail, ReportLabels};
use crate::diff::ColumnChangeCounts;
use crate::error::{Result, TabreconError};
use crate::source::sql_literal;
use duckdb::{params, Connection};
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Sheets of every tabular report, in write order
pub const REPORT_SHEETS: &[&str] = &[
    "summary",
    "new_records",
    "deleted_records",
    "modified_records",
    "column_changes",
    "duplicates",
];

/// File formats DuckDB writes one sheet per file in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Parquet,
}

impl ExportFormat {
    /// Get the DuckDB format string for COPY command
    pub fn duckdb_format(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Parquet => "PARQUET",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Parquet => "parquet",
        }
    }
}

/// Report format selectable from configuration and the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// One JSON document covering every table
    #[default]
    Json,
    Csv,
    Parquet,
    #[serde(alias = "xlsx")]
    Excel,
}

impl ReportFormat {
    /// Sheet format for the DuckDB writer; `None` for single-file reports
    pub fn sheet_format(&self) -> Option<ExportFormat> {
        match self {
            ReportFormat::Json | ReportFormat::Excel => None,
            ReportFormat::Csv => Some(ExportFormat::Csv),
            ReportFormat::Parquet => Some(ExportFormat::Parquet),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = TabreconError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            "parquet" => Ok(ReportFormat::Parquet),
            "xlsx" | "excel" => Ok(ReportFormat::Excel),
            other => Err(TabreconError::invalid_input(format!(
                "Unsupported report format: {other}. Use json, csv, parquet or xlsx"
            ))),
        }
    }
}

/// What a sink did with a set of results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The artifact was written at this path
    Written(PathBuf),
    /// No results were given; nothing was written
    NothingToReport,
}

/// Something that persists reconciliation results
pub trait ReportSink {
    fn write_report(&self, results: &[ComparisonResult], labels: &ReportLabels) -> Result<ReportOutcome>;
}

/// Pick the writer for `format`. `output` is a file for JSON and XLSX and a
/// directory otherwise.
pub fn report_writer(format: ReportFormat, output: &Path, force: bool) -> Result<Box<dyn ReportSink>> {
    match format.sheet_format() {
        Some(sheet_format) => Ok(Box::new(DuckDbReportWriter::new(output, sheet_format, force)?)),
        None if format == ReportFormat::Excel => Ok(Box::new(XlsxReportWriter::new(output, force))),
        None => Ok(Box::new(JsonReportWriter::new(output, force))),
    }
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn refuse_existing(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(TabreconError::invalid_input(format!(
            "Output file already exists: {}. Use force option to overwrite.",
            path.display()
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    labels: &'a ReportLabels,
    generated_at: String,
    tables: Vec<TableReport<'a>>,
}

#[derive(Serialize)]
struct TableReport<'a> {
    table_name: &'a str,
    key: &'a str,
    rows_old: usize,
    rows_new: usize,
    columns_old: usize,
    columns_new: usize,
    column_changes: &'a ColumnChangeCounts,
    new_records: Vec<DetailRecord>,
    deleted_records: Vec<DetailRecord>,
    modified_records: Vec<ModifiedDetail>,
    duplicates: Vec<DuplicateDetail>,
}

impl<'a> TableReport<'a> {
    fn new(result: &'a ComparisonResult, labels: &ReportLabels) -> Self {
        Self {
            table_name: &result.table_name,
            key: &result.key_display,
            rows_old: result.rows_old,
            rows_new: result.rows_new,
            columns_old: result.columns_old,
            columns_new: result.columns_new,
            column_changes: &result.column_changes,
            new_records: result.new_details(),
            deleted_records: result.deleted_details(),
            modified_records: result.modified_details(),
            duplicates: result.duplicate_details(labels),
        }
    }
}

/// Writes every table into one pretty JSON document
pub struct JsonReportWriter {
    path: PathBuf,
    force: bool,
}

impl JsonReportWriter {
    pub fn new(path: impl Into<PathBuf>, force: bool) -> Self {
        Self {
            path: path.into(),
            force,
        }
    }
}

impl ReportSink for JsonReportWriter {
    fn write_report(&self, results: &[ComparisonResult], labels: &ReportLabels) -> Result<ReportOutcome> {
        if results.is_empty() {
            return Ok(ReportOutcome::NothingToReport);
        }
        refuse_existing(&self.path, self.force)?;

        let report = JsonReport {
            labels,
            generated_at: chrono::Utc::now().to_rfc3339(),
            tables: results.iter().map(|result| TableReport::new(result, labels)).collect(),
        };

        create_parent_dir(&self.path)?;
        fs::write(&self.path, serde_json::to_string_pretty(&report)?)?;
        log::info!("Wrote JSON report for {} tables to {}", results.len(), self.path.display());
        Ok(ReportOutcome::Written(self.path.clone()))
    }
}

enum SheetCell {
    Text(String),
    Count(usize),
}

impl From<&str> for SheetCell {
    fn from(value: &str) -> Self {
        SheetCell::Text(value.to_string())
    }
}

impl From<usize> for SheetCell {
    fn from(value: usize) -> Self {
        SheetCell::Count(value)
    }
}

/// Writes every sheet into one Excel workbook
pub struct XlsxReportWriter {
    path: PathBuf,
    force: bool,
}

impl XlsxReportWriter {
    pub fn new(path: impl Into<PathBuf>, force: bool) -> Self {
        Self {
            path: path.into(),
            force,
        }
    }

    fn sheet_rows(sheet: &str, results: &[ComparisonResult], labels: &ReportLabels) -> Vec<Vec<SheetCell>> {
        let mut rows: Vec<Vec<SheetCell>> = Vec::new();
        for result in results {
            let table = result.table_name.as_str();
            match sheet {
                "summary" => rows.push(vec![
                    SheetCell::from(table),
                    result.key_display.as_str().into(),
                    result.rows_old.into(),
                    result.rows_new.into(),
                    result.columns_old.into(),
                    result.columns_new.into(),
                    result.new_records.len().into(),
                    result.deleted_records.len().into(),
                    result.modified_records.len().into(),
                    result.duplicates_old.len().into(),
                    result.duplicates_new.len().into(),
                ]),
                "new_records" | "deleted_records" => {
                    let details = if sheet == "new_records" {
                        result.new_details()
                    } else {
                        result.deleted_details()
                    };
                    rows.extend(
                        details
                            .into_iter()
                            .map(|d| vec![SheetCell::from(table), d.row_number.into(), d.details.as_str().into()]),
                    );
                }
                "modified_records" => rows.extend(result.modified_details().into_iter().map(|d| {
                    vec![
                        SheetCell::from(table),
                        d.old_row_number.into(),
                        d.new_row_number.into(),
                        d.key.as_str().into(),
                        d.details.as_str().into(),
                    ]
                })),
                "column_changes" => rows.extend(
                    result
                        .column_changes
                        .iter()
                        .map(|(column, count)| vec![SheetCell::from(table), column.as_str().into(), (*count).into()]),
                ),
                "duplicates" => rows.extend(result.duplicate_details(labels).into_iter().map(|d| {
                    vec![
                        SheetCell::from(table),
                        d.source.as_str().into(),
                        d.row_number.into(),
                        d.details.as_str().into(),
                    ]
                })),
                _ => {}
            }
        }
        rows
    }
}

/// Column headers of each report sheet
fn sheet_headers(sheet: &str) -> &'static [&'static str] {
    match sheet {
        "summary" => &[
            "table_name",
            "key",
            "rows_old",
            "rows_new",
            "columns_old",
            "columns_new",
            "new_records",
            "deleted_records",
            "modified_records",
            "duplicates_old",
            "duplicates_new",
        ],
        "new_records" | "deleted_records" => &["table_name", "row_number", "details"],
        "modified_records" => &["table_name", "old_row_number", "new_row_number", "key", "details"],
        "column_changes" => &["table_name", "column_name", "change_count"],
        "duplicates" => &["table_name", "source", "row_number", "details"],
        _ => &[],
    }
}

fn write_worksheet(
    workbook: &mut Workbook,
    name: &str,
    rows: Vec<Vec<SheetCell>>,
    header_format: &Format,
) -> Result<()> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;

    for (col, header) in sheet_headers(name).iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, header_format)?;
    }
    for (i, cells) in rows.into_iter().enumerate() {
        let row = i as u32 + 1;
        for (col, cell) in cells.into_iter().enumerate() {
            match cell {
                SheetCell::Text(text) => sheet.write_string(row, col as u16, text)?,
                SheetCell::Count(count) => sheet.write_number(row, col as u16, count as f64)?,
            };
        }
    }

    sheet.set_freeze_panes(1, 0)?;
    sheet.autofit();
    Ok(())
}

impl ReportSink for XlsxReportWriter {
    fn write_report(&self, results: &[ComparisonResult], labels: &ReportLabels) -> Result<ReportOutcome> {
        if results.is_empty() {
            return Ok(ReportOutcome::NothingToReport);
        }
        refuse_existing(&self.path, self.force)?;

        let header_format = Format::new().set_bold();
        let mut workbook = Workbook::new();
        for sheet in REPORT_SHEETS {
            write_worksheet(&mut workbook, sheet, Self::sheet_rows(sheet, results, labels), &header_format)?;
        }

        create_parent_dir(&self.path)?;
        workbook.save(&self.path)?;
        log::info!("Wrote Excel report for {} tables to {}", results.len(), self.path.display());
        Ok(ReportOutcome::Written(self.path.clone()))
    }
}

/// Writes one file per sheet into a directory using DuckDB `COPY`
pub struct DuckDbReportWriter {
    connection: Connection,
    output_dir: PathBuf,
    format: ExportFormat,
    force: bool,
}

impl DuckDbReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, format: ExportFormat, force: bool) -> Result<Self> {
        let connection = Connection::open_in_memory()?;
        connection.execute("SET enable_progress_bar=false", [])?;
        connection.execute("SET preserve_insertion_order=true", [])?;
        Ok(Self {
            connection,
            output_dir: output_dir.into(),
            format,
            force,
        })
    }

    /// Path a sheet is written to
    pub fn sheet_path(&self, sheet: &str) -> PathBuf {
        self.output_dir.join(format!("{sheet}.{}", self.format.extension()))
    }

    fn create_sheets(&self) -> Result<()> {
        self.connection.execute_batch(
            "CREATE OR REPLACE TABLE summary (
                table_name VARCHAR, key VARCHAR,
                rows_old BIGINT, rows_new BIGINT, columns_old BIGINT, columns_new BIGINT,
                new_records BIGINT, deleted_records BIGINT, modified_records BIGINT,
                duplicates_old BIGINT, duplicates_new BIGINT
            );
            CREATE OR REPLACE TABLE new_records (table_name VARCHAR, row_number BIGINT, details VARCHAR);
            CREATE OR REPLACE TABLE deleted_records (table_name VARCHAR, row_number BIGINT, details VARCHAR);
            CREATE OR REPLACE TABLE modified_records (
                table_name VARCHAR, old_row_number BIGINT, new_row_number BIGINT, key VARCHAR, details VARCHAR
            );
            CREATE OR REPLACE TABLE column_changes (table_name VARCHAR, column_name VARCHAR, change_count BIGINT);
            CREATE OR REPLACE TABLE duplicates (table_name VARCHAR, source VARCHAR, row_number BIGINT, details VARCHAR);",
        )?;
        Ok(())
    }

    fn insert_result(&self, result: &ComparisonResult, labels: &ReportLabels) -> Result<()> {
        let table = result.table_name.as_str();

        self.connection.execute(
            "INSERT INTO summary VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                table,
                result.key_display,
                result.rows_old as i64,
                result.rows_new as i64,
                result.columns_old as i64,
                result.columns_new as i64,
                result.new_records.len() as i64,
                result.deleted_records.len() as i64,
                result.modified_records.len() as i64,
                result.duplicates_old.len() as i64,
                result.duplicates_new.len() as i64,
            ],
        )?;

        for (sheet, details) in [
            ("new_records", result.new_details()),
            ("deleted_records", result.deleted_details()),
        ] {
            let mut stmt = self.connection.prepare(&format!("INSERT INTO {sheet} VALUES (?, ?, ?)"))?;
            for detail in details {
                stmt.execute(params![table, detail.row_number as i64, detail.details])?;
            }
        }

        let mut stmt = self
            .connection
            .prepare("INSERT INTO modified_records VALUES (?, ?, ?, ?, ?)")?;
        for detail in result.modified_details() {
            stmt.execute(params![
                table,
                detail.old_row_number as i64,
                detail.new_row_number as i64,
                detail.key,
                detail.details
            ])?;
        }

        let mut stmt = self.connection.prepare("INSERT INTO column_changes VALUES (?, ?, ?)")?;
        for (column, count) in &result.column_changes {
            stmt.execute(params![table, column, *count as i64])?;
        }

        let mut stmt = self.connection.prepare("INSERT INTO duplicates VALUES (?, ?, ?, ?)")?;
        for detail in result.duplicate_details(labels) {
            stmt.execute(params![table, detail.source, detail.row_number as i64, detail.details])?;
        }

        Ok(())
    }

    fn copy_command(&self, sheet: &str, path: &Path) -> String {
        let literal = sql_literal(&path.to_string_lossy());
        match self.format {
            ExportFormat::Csv => format!("COPY {sheet} TO '{literal}' (FORMAT CSV, HEADER true)"),
            ExportFormat::Parquet => format!("COPY {sheet} TO '{literal}' (FORMAT PARQUET)"),
        }
    }
}

impl ReportSink for DuckDbReportWriter {
    fn write_report(&self, results: &[ComparisonResult], labels: &ReportLabels) -> Result<ReportOutcome> {
        if results.is_empty() {
            return Ok(ReportOutcome::NothingToReport);
        }

        for sheet in REPORT_SHEETS {
            refuse_existing(&self.sheet_path(sheet), self.force)?;
        }
        fs::create_dir_all(&self.output_dir)?;

        self.create_sheets()?;
        for result in results {
            self.insert_result(result, labels)?;
        }

        for sheet in REPORT_SHEETS {
            let path = self.sheet_path(sheet);
            self.connection
                .execute(&self.copy_command(sheet, &path), [])
                .map_err(|e| TabreconError::data_processing(format!("Export of sheet '{sheet}' failed: {e}")))?;
            log::debug!("Wrote sheet '{sheet}' to {}", path.display());
        }

        log::info!(
            "Wrote {} report for {} tables to {}",
            self.format.duckdb_format(),
            results.len(),
            self.output_dir.display()
        );
        Ok(ReportOutcome::Written(self.output_dir.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffEngine;
    use crate::key::KeyStrategy;
    use crate::record::{Dataset, Record};
    use crate::aggregate::aggregate;
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use tempfile::TempDir;

    fn dataset(rows: &[&[(&str, &str)]]) -> Dataset {
        rows.iter()
            .map(|pairs| pairs.iter().copied().collect::<Record>())
            .collect()
    }

    fn people_result() -> ComparisonResult {
        let old = dataset(&[&[("id", "1"), ("name", "alice")], &[("id", "2"), ("name", "bob")]]);
        let new = dataset(&[
            &[("id", "1"), ("name", "alice")],
            &[("id", "2"), ("name", "bobby")],
            &[("id", "3"), ("name", "cara")],
        ]);
        let strategy = KeyStrategy::SingleColumn("id".into());
        let engine = DiffEngine::new(&old, &new, &strategy);
        let modified = engine.modified_records();
        aggregate(
            "people",
            &old,
            &new,
            Some(strategy.clone()),
            engine.new_records(),
            engine.deleted_records(),
            modified.records,
            modified.column_changes,
            engine.duplicates_old(),
            engine.duplicates_new(),
        )
    }

    #[test]
    fn test_report_format_parsing() {
        assert_eq!("XLSX".parse::<ReportFormat>().unwrap(), ReportFormat::Excel);
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("yaml".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::Json.sheet_format(), None);
        assert_eq!(ReportFormat::Excel.sheet_format(), None);
        assert_eq!(ReportFormat::Csv.sheet_format(), Some(ExportFormat::Csv));
        assert_eq!(ReportFormat::Parquet.sheet_format().map(|f| f.extension()), Some("parquet"));
    }

    #[test]
    fn test_nothing_to_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.json");
        let writer = JsonReportWriter::new(&path, false);
        let outcome = writer.write_report(&[], &ReportLabels::default()).unwrap();
        assert_eq!(outcome, ReportOutcome::NothingToReport);
        assert!(!path.exists());
    }

    #[test]
    fn test_json_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("report.json");
        let writer = JsonReportWriter::new(&path, false);
        let labels = ReportLabels::new("january", "february");

        let outcome = writer.write_report(&[people_result()], &labels).unwrap();
        assert_eq!(outcome, ReportOutcome::Written(path.clone()));

        let document: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["labels"]["old"], "january");
        let table = &document["tables"][0];
        assert_eq!(table["table_name"], "people");
        assert_eq!(table["key"], "id");
        assert_eq!(table["rows_new"], 3);
        assert_eq!(table["new_records"][0]["details"], "id: 3 | name: cara");
        assert_eq!(table["modified_records"][0]["details"], "name: bob -> bobby");
        assert_eq!(table["column_changes"]["name"], 1);

        // A second write without force is refused
        assert!(writer.write_report(&[people_result()], &labels).is_err());
        let forced = JsonReportWriter::new(&path, true);
        assert!(forced.write_report(&[people_result()], &labels).is_ok());
    }

    #[test]
    fn test_csv_sheets() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("report");
        let writer = DuckDbReportWriter::new(&output, ExportFormat::Csv, false).unwrap();

        let outcome = writer
            .write_report(&[people_result()], &ReportLabels::default())
            .unwrap();
        assert_eq!(outcome, ReportOutcome::Written(output.clone()));

        for sheet in REPORT_SHEETS {
            assert!(writer.sheet_path(sheet).exists(), "missing sheet {sheet}");
        }

        let summary = fs::read_to_string(writer.sheet_path("summary")).unwrap();
        let mut lines = summary.lines();
        assert!(lines.next().unwrap().starts_with("table_name,key,rows_old"));
        assert_eq!(lines.next().unwrap(), "people,id,2,3,2,2,1,0,1,0,0");

        let new_records = fs::read_to_string(writer.sheet_path("new_records")).unwrap();
        assert!(new_records.contains("people,3,id: 3 | name: cara"));

        let changes = fs::read_to_string(writer.sheet_path("column_changes")).unwrap();
        assert!(changes.contains("people,name,1"));

        assert!(writer
            .write_report(&[people_result()], &ReportLabels::default())
            .is_err());
    }

    #[test]
    fn test_xlsx_report_is_one_workbook() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reports").join("reconciliation.xlsx");
        let writer = report_writer(ReportFormat::Excel, &path, false).unwrap();
        let labels = ReportLabels::new("january", "february");

        let outcome = writer.write_report(&[people_result()], &labels).unwrap();
        assert_eq!(outcome, ReportOutcome::Written(path.clone()));
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(workbook.sheet_names(), REPORT_SHEETS.to_vec());

        let summary = workbook.worksheet_range("summary").unwrap();
        let rows: Vec<_> = summary.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Data::String("table_name".into()));
        assert_eq!(rows[1][0], Data::String("people".into()));
        assert_eq!(rows[1][3], Data::Float(3.0));

        let modified = workbook.worksheet_range("modified_records").unwrap();
        let row: Vec<_> = modified.rows().nth(1).unwrap().to_vec();
        assert_eq!(row[3], Data::String("id: 2".into()));
        assert_eq!(row[4], Data::String("name: bob -> bobby".into()));

        assert!(writer.write_report(&[people_result()], &labels).is_err());
        assert!(report_writer(ReportFormat::Excel, &path, true)
            .unwrap()
            .write_report(&[people_result()], &labels)
            .is_ok());
    }
}
