//! Records and datasets
//!
//! A [`Record`] maps column names to already-normalized values, keeping the
//! column order of the source for display. Lookups of absent columns yield the
//! empty string, so datasets with ragged column sets compare without errors.

use crate::normalize::{normalize_column_name, normalize_value, CellValue};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// One row: column name -> normalized value, in source column order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from raw cells, normalizing names and values.
    /// A column repeated after name normalization keeps its first occurrence.
    pub fn from_cells<N, V, I>(cells: I) -> Self
    where
        N: AsRef<str>,
        V: Into<CellValue>,
        I: IntoIterator<Item = (N, V)>,
    {
        let mut record = Self::new();
        for (name, value) in cells {
            let column = normalize_column_name(name.as_ref());
            if record.fields.contains_key(&column) {
                log::debug!("Ignoring repeated column '{column}'");
                continue;
            }
            record.fields.insert(column, normalize_value(&value.into()));
        }
        record
    }

    /// Insert an already-normalized value
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    /// Value of `column`, or `""` when the column is absent
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.values().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn column_count(&self) -> usize {
        self.fields.len()
    }

    /// True when every value is empty (or there are no columns)
    pub fn is_blank(&self) -> bool {
        self.fields.values().all(String::is_empty)
    }

    /// `"col: value | col: value"` over non-empty fields
    pub fn describe(&self) -> String {
        self.iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(column, value)| format!("{column}: {value}"))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// An ordered, read-only sequence of records for one table version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Union of record columns, in first-appearance order
    pub fn columns(&self) -> Vec<String> {
        let mut seen = IndexSet::new();
        for record in &self.records {
            for column in record.columns() {
                if !seen.contains(column) {
                    seen.insert(column.to_string());
                }
            }
        }
        seen.into_iter().collect()
    }

    /// Column count of the first record, which stands in for the whole dataset
    pub fn column_count(&self) -> usize {
        self.records.first().map(Record::column_count).unwrap_or(0)
    }
}

impl From<Vec<Record>> for Dataset {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<Record> for Dataset {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_column_reads_as_empty() {
        let record: Record = [("id", "1")].into_iter().collect();
        assert_eq!(record.get("id"), "1");
        assert_eq!(record.get("missing"), "");
        assert_eq!(record.columns().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_from_cells_normalizes_names_and_values() {
        let record = Record::from_cells([
            ("Order ID", CellValue::from("007")),
            ("Customer  Name", CellValue::from("  Alice ")),
            ("order id", CellValue::from("8")),
            ("Notes", CellValue::Null),
        ]);
        assert_eq!(
            record.columns().collect::<Vec<_>>(),
            vec!["order_id", "customer_name", "notes"]
        );
        assert_eq!(record.get("order_id"), "7");
        assert_eq!(record.get("customer_name"), "alice");
        assert_eq!(record.describe(), "order_id: 7 | customer_name: alice");
    }

    #[test]
    fn test_dataset_columns_are_union_in_order() {
        let dataset: Dataset = vec![
            [("id", "1"), ("name", "a")].into_iter().collect::<Record>(),
            [("id", "2"), ("city", "x")].into_iter().collect::<Record>(),
        ]
        .into();
        assert_eq!(dataset.columns(), vec!["id", "name", "city"]);
        assert_eq!(dataset.column_count(), 2);
        assert_eq!(Dataset::empty().column_count(), 0);
    }

    #[test]
    fn test_blank_record() {
        let record: Record = [("a", ""), ("b", "")].into_iter().collect();
        assert!(record.is_blank());
        assert!(Record::new().is_blank());
    }
}
