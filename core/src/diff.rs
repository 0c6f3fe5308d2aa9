//! Record classification between two dataset versions
//!
//! Given an old and a new [`Dataset`] and a shared [`KeyStrategy`], the engine
//! classifies records as new, deleted, modified or duplicated. Row keys are
//! computed once per dataset and reused by all four operations.

use crate::hash::RowKeyIndex;
use crate::key::KeyStrategy;
use crate::record::{Dataset, Record};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Per-column count of modified rows in which that column changed
pub type ColumnChangeCounts = IndexMap<String, usize>;

/// A record together with its 1-based position in its dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub row_number: usize,
    pub record: Record,
}

/// Old and new normalized values of one changed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnChange {
    pub old: String,
    pub new: String,
}

/// A matched row pair with at least one changed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedRecord {
    pub old_row_number: usize,
    pub new_row_number: usize,
    /// Key column values identifying the row
    pub key_values: IndexMap<String, String>,
    pub changes: IndexMap<String, ColumnChange>,
}

impl ModifiedRecord {
    /// Key columns followed by `<column>_old` / `<column>_new` pairs
    pub fn flatten(&self) -> Record {
        let mut flat = Record::new();
        for (column, value) in &self.key_values {
            flat.insert(column.clone(), value.clone());
        }
        for (column, change) in &self.changes {
            flat.insert(format!("{column}_old"), change.old.clone());
            flat.insert(format!("{column}_new"), change.new.clone());
        }
        flat
    }
}

/// Output of the modified-record pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedRecords {
    pub records: Vec<ModifiedRecord>,
    pub column_changes: ColumnChangeCounts,
}

/// Diff engine over one old/new dataset pair
pub struct DiffEngine<'a> {
    old: &'a Dataset,
    new: &'a Dataset,
    strategy: &'a KeyStrategy,
    old_index: RowKeyIndex,
    new_index: RowKeyIndex,
}

impl<'a> DiffEngine<'a> {
    pub fn new(old: &'a Dataset, new: &'a Dataset, strategy: &'a KeyStrategy) -> Self {
        Self {
            old,
            new,
            strategy,
            old_index: RowKeyIndex::build(old, strategy),
            new_index: RowKeyIndex::build(new, strategy),
        }
    }

    /// Records of the new dataset whose key is absent from the old one
    pub fn new_records(&self) -> Vec<ClassifiedRecord> {
        unmatched(self.new, &self.new_index, &self.old_index)
    }

    /// Records of the old dataset whose key is absent from the new one
    pub fn deleted_records(&self) -> Vec<ClassifiedRecord> {
        unmatched(self.old, &self.old_index, &self.new_index)
    }

    /// Column-level changes between rows that share a key.
    ///
    /// Only the first occurrence of a key on each side is compared. A column
    /// counts as changed when its values differ and at least one is non-empty.
    pub fn modified_records(&self) -> ModifiedRecords {
        let mut result = ModifiedRecords::default();
        let mut seen_keys = IndexSet::new();

        for old_row in 0..self.old_index.row_count() {
            let Some(key) = self.old_index.key_of(old_row) else {
                continue;
            };
            if !seen_keys.insert(key) {
                continue;
            }
            let Some(new_row) = self.new_index.first_row(key) else {
                continue;
            };
            let (Some(old_record), Some(new_record)) = (self.old.get(old_row), self.new.get(new_row))
            else {
                continue;
            };

            let changes = compare_records(old_record, new_record);
            if changes.is_empty() {
                continue;
            }

            for column in changes.keys() {
                *result.column_changes.entry(column.clone()).or_insert(0) += 1;
            }

            result.records.push(ModifiedRecord {
                old_row_number: old_row + 1,
                new_row_number: new_row + 1,
                key_values: self.key_values(old_record, new_record),
                changes,
            });
        }

        result
    }

    /// Every member of each repeated key group in the old dataset
    pub fn duplicates_old(&self) -> Vec<ClassifiedRecord> {
        duplicates(self.old, &self.old_index)
    }

    /// Every member of each repeated key group in the new dataset
    pub fn duplicates_new(&self) -> Vec<ClassifiedRecord> {
        duplicates(self.new, &self.new_index)
    }

    fn key_values(&self, old_record: &Record, new_record: &Record) -> IndexMap<String, String> {
        self.strategy
            .key_columns()
            .iter()
            .map(|column| {
                let value = match new_record.get(column) {
                    "" => old_record.get(column),
                    value => value,
                };
                (column.clone(), value.to_string())
            })
            .collect()
    }
}

/// Records of `dataset2` whose row key does not occur in `dataset1`
pub fn find_new(dataset1: &Dataset, dataset2: &Dataset, strategy: &KeyStrategy) -> Vec<ClassifiedRecord> {
    DiffEngine::new(dataset1, dataset2, strategy).new_records()
}

/// Records of `dataset1` whose row key does not occur in `dataset2`
pub fn find_deleted(
    dataset1: &Dataset,
    dataset2: &Dataset,
    strategy: &KeyStrategy,
) -> Vec<ClassifiedRecord> {
    DiffEngine::new(dataset1, dataset2, strategy).deleted_records()
}

/// Matched rows with column-level changes, plus per-column change counts
pub fn find_modified(dataset1: &Dataset, dataset2: &Dataset, strategy: &KeyStrategy) -> ModifiedRecords {
    DiffEngine::new(dataset1, dataset2, strategy).modified_records()
}

/// All members of repeated row-key groups within one dataset, in row order
pub fn find_duplicates(dataset: &Dataset, strategy: &KeyStrategy) -> Vec<ClassifiedRecord> {
    duplicates(dataset, &RowKeyIndex::build(dataset, strategy))
}

/// Compare two records over the union of their columns
pub fn compare_records(old: &Record, new: &Record) -> IndexMap<String, ColumnChange> {
    let mut columns: IndexSet<&str> = old.columns().collect();
    columns.extend(new.columns());

    columns
        .into_iter()
        .filter_map(|column| {
            let (before, after) = (old.get(column), new.get(column));
            if before == after {
                return None;
            }
            Some((
                column.to_string(),
                ColumnChange {
                    old: before.to_string(),
                    new: after.to_string(),
                },
            ))
        })
        .collect()
}

fn unmatched(dataset: &Dataset, own: &RowKeyIndex, other: &RowKeyIndex) -> Vec<ClassifiedRecord> {
    if dataset.is_empty() {
        return Vec::new();
    }

    dataset
        .records()
        .iter()
        .enumerate()
        .filter(|(row, _)| own.key_of(*row).is_some_and(|key| !other.contains_key(key)))
        .map(|(row, record)| classified(row, record))
        .collect()
}

fn duplicates(dataset: &Dataset, index: &RowKeyIndex) -> Vec<ClassifiedRecord> {
    let mut rows: Vec<usize> = index
        .groups()
        .filter(|(_, rows)| rows.len() > 1)
        .flat_map(|(_, rows)| rows.iter().copied())
        .collect();
    rows.sort_unstable();

    rows.into_iter()
        .filter_map(|row| dataset.get(row).map(|record| classified(row, record)))
        .collect()
}

fn classified(row: usize, record: &Record) -> ClassifiedRecord {
    ClassifiedRecord {
        row_number: row + 1,
        record: record.clone(),
    }
}
