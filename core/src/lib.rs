//! # tabrecon-core
//!
//! Core library for tabrecon - a reconciliation tool that compares two versions of a
//! tabular dataset table by table and reports new, deleted, modified and duplicate
//! records.
//!
//! Values are normalized before any comparison, a row-key strategy is inferred per table
//! (or taken from configuration), and the classified records are folded into one
//! [`ComparisonResult`] per table. Reading sources and writing tabular reports go through DuckDB.

pub mod aggregate;
pub mod config;
pub mod diff;
pub mod error;
pub mod hash;
pub mod key;
pub mod normalize;
pub mod reconcile;
pub mod record;
pub mod report;
pub mod source;

// Re-export the most commonly used types for convenience
pub use aggregate::{aggregate, ComparisonResult, ReportLabels};
pub use config::Config;
pub use diff::{find_deleted, find_duplicates, find_modified, find_new, DiffEngine};
pub use error::{Result, TabreconError};
pub use hash::row_key;
pub use key::{KeySelector, KeySelectorConfig, KeyStrategy};
pub use normalize::{normalize_column_name, normalize_value, CellValue};
pub use reconcile::{ReconciliationRun, Reconciler, SkippedTable};
pub use record::{Dataset, Record};
pub use report::{DuckDbReportWriter, JsonReportWriter, ReportFormat, ReportOutcome, ReportSink, XlsxReportWriter};
pub use source::{DuckDbRecordSource, RecordSource, TableReadOptions};
