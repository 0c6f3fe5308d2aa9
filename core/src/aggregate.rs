//! Per-table comparison results and their report detail records

use crate::diff::{ClassifiedRecord, ColumnChangeCounts, ModifiedRecord};
use crate::key::KeyStrategy;
use crate::record::Dataset;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of comparing one table between two dataset versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub table_name: String,
    pub rows_old: usize,
    pub rows_new: usize,
    pub columns_old: usize,
    pub columns_new: usize,
    pub key_strategy: Option<KeyStrategy>,
    /// Display form of the key strategy, empty when none was resolved
    pub key_display: String,
    pub new_records: Vec<ClassifiedRecord>,
    pub deleted_records: Vec<ClassifiedRecord>,
    pub modified_records: Vec<ModifiedRecord>,
    pub column_changes: ColumnChangeCounts,
    pub duplicates_old: Vec<ClassifiedRecord>,
    pub duplicates_new: Vec<ClassifiedRecord>,
}

/// Assemble a [`ComparisonResult`] from already-computed parts.
/// Nothing is recomputed here.
#[allow(clippy::too_many_arguments)]
pub fn aggregate(
    table_name: &str,
    dataset_old: &Dataset,
    dataset_new: &Dataset,
    key_strategy: Option<KeyStrategy>,
    new_records: Vec<ClassifiedRecord>,
    deleted_records: Vec<ClassifiedRecord>,
    modified_records: Vec<ModifiedRecord>,
    column_changes: ColumnChangeCounts,
    duplicates_old: Vec<ClassifiedRecord>,
    duplicates_new: Vec<ClassifiedRecord>,
) -> ComparisonResult {
    ComparisonResult {
        table_name: table_name.to_string(),
        rows_old: dataset_old.len(),
        rows_new: dataset_new.len(),
        columns_old: dataset_old.column_count(),
        columns_new: dataset_new.column_count(),
        key_display: key_strategy
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        key_strategy,
        new_records,
        deleted_records,
        modified_records,
        column_changes,
        duplicates_old,
        duplicates_new,
    }
}

/// Which dataset version a duplicate was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Old,
    New,
}

/// Display labels for the two dataset versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLabels {
    pub old: String,
    pub new: String,
}

impl ReportLabels {
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }

    pub fn for_side(&self, side: Side) -> &str {
        match side {
            Side::Old => &self.old,
            Side::New => &self.new,
        }
    }
}

impl Default for ReportLabels {
    fn default() -> Self {
        Self::new("old", "new")
    }
}

/// Flat report row: a row number and its non-empty fields as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub row_number: usize,
    pub details: String,
}

impl DetailRecord {
    fn from_classified(record: &ClassifiedRecord) -> Self {
        Self {
            row_number: record.row_number,
            details: record.record.describe(),
        }
    }
}

impl fmt::Display for DetailRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row_number, self.details)
    }
}

/// Flat report row for a modified record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedDetail {
    pub old_row_number: usize,
    pub new_row_number: usize,
    pub key: String,
    pub details: String,
}

/// Flat report row for a duplicate, tagged with its source label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateDetail {
    pub source: String,
    pub row_number: usize,
    pub details: String,
}

impl ComparisonResult {
    pub fn duplicate_count(&self) -> usize {
        self.duplicates_old.len() + self.duplicates_new.len()
    }

    pub fn total_changes(&self) -> usize {
        self.new_records.len() + self.deleted_records.len() + self.modified_records.len()
    }

    pub fn has_changes(&self) -> bool {
        self.total_changes() > 0 || self.duplicate_count() > 0
    }

    pub fn new_details(&self) -> Vec<DetailRecord> {
        self.new_records.iter().map(DetailRecord::from_classified).collect()
    }

    pub fn deleted_details(&self) -> Vec<DetailRecord> {
        self.deleted_records
            .iter()
            .map(DetailRecord::from_classified)
            .collect()
    }

    /// One row per modified record: `"col: old -> new | ..."`
    pub fn modified_details(&self) -> Vec<ModifiedDetail> {
        self.modified_records
            .iter()
            .map(|modified| ModifiedDetail {
                old_row_number: modified.old_row_number,
                new_row_number: modified.new_row_number,
                key: modified
                    .key_values
                    .iter()
                    .map(|(column, value)| format!("{column}: {value}"))
                    .collect::<Vec<_>>()
                    .join(" | "),
                details: modified
                    .changes
                    .iter()
                    .map(|(column, change)| format!("{column}: {} -> {}", change.old, change.new))
                    .collect::<Vec<_>>()
                    .join(" | "),
            })
            .collect()
    }

    /// Duplicates of both sides, old first, tagged with the side's label
    pub fn duplicate_details(&self, labels: &ReportLabels) -> Vec<DuplicateDetail> {
        [(Side::Old, &self.duplicates_old), (Side::New, &self.duplicates_new)]
            .into_iter()
            .flat_map(|(side, records)| {
                records.iter().map(move |record| DuplicateDetail {
                    source: labels.for_side(side).to_string(),
                    row_number: record.row_number,
                    details: record.record.describe(),
                })
            })
            .collect()
    }
}
