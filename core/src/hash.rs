//! Row key derivation

use crate::key::KeyStrategy;
use crate::record::{Dataset, Record};
use indexmap::IndexMap;

/// Joins key parts. The ASCII unit separator does not occur in ordinary cell text.
pub const KEY_SEPARATOR: &str = "\u{1f}";

/// Derive the row key of `record` under `strategy`.
///
/// Under `FullRowHash` the values are taken in the record's own column order,
/// so the same values in a different column order produce a different key.
pub fn row_key(record: &Record, strategy: &KeyStrategy) -> String {
    match strategy {
        KeyStrategy::SingleColumn(column) => record.get(column).to_string(),
        KeyStrategy::CompositeColumns(columns) => columns
            .iter()
            .map(|column| record.get(column))
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR),
        KeyStrategy::FullRowHash => {
            let row_content = record.values().collect::<Vec<_>>().join(KEY_SEPARATOR);
            blake3::hash(row_content.as_bytes()).to_hex().to_string()
        }
    }
}

/// Row keys of one dataset, computed once and shared by every diff operation
#[derive(Debug, Clone, Default)]
pub struct RowKeyIndex {
    keys: Vec<String>,
    rows_by_key: IndexMap<String, Vec<usize>>,
}

impl RowKeyIndex {
    pub fn build(dataset: &Dataset, strategy: &KeyStrategy) -> Self {
        let mut index = Self::default();
        for (row_index, record) in dataset.records().iter().enumerate() {
            index.add_row(row_index, row_key(record, strategy));
        }
        index
    }

    fn add_row(&mut self, row_index: usize, key: String) {
        self.rows_by_key
            .entry(key.clone())
            .or_default()
            .push(row_index);
        self.keys.push(key);
    }

    /// Key of the row at `row_index`
    pub fn key_of(&self, row_index: usize) -> Option<&str> {
        self.keys.get(row_index).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.rows_by_key.contains_key(key)
    }

    /// All row positions sharing `key`, in row order
    pub fn rows_for(&self, key: &str) -> Option<&[usize]> {
        self.rows_by_key.get(key).map(Vec::as_slice)
    }

    pub fn first_row(&self, key: &str) -> Option<usize> {
        self.rows_for(key).and_then(|rows| rows.first().copied())
    }

    /// Keys with their rows, in first-appearance order
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.rows_by_key
            .iter()
            .map(|(key, rows)| (key.as_str(), rows.as_slice()))
    }

    pub fn row_count(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_single_column_key() {
        let r = record(&[("id", "7"), ("name", "bob")]);
        assert_eq!(row_key(&r, &KeyStrategy::SingleColumn("id".into())), "7");
        assert_eq!(row_key(&r, &KeyStrategy::SingleColumn("missing".into())), "");
    }

    #[test]
    fn test_composite_key_keeps_declared_order() {
        let r = record(&[("a", "1"), ("b", "2")]);
        let ab = KeyStrategy::CompositeColumns(vec!["a".into(), "b".into()]);
        let ba = KeyStrategy::CompositeColumns(vec!["b".into(), "a".into()]);
        assert_eq!(row_key(&r, &ab), "1\u{1f}2");
        assert_eq!(row_key(&r, &ba), "2\u{1f}1");
    }

    #[test]
    fn test_composite_separator_prevents_collisions() {
        let strategy = KeyStrategy::CompositeColumns(vec!["a".into(), "b".into()]);
        let left = record(&[("a", "1"), ("b", "23")]);
        let right = record(&[("a", "12"), ("b", "3")]);
        assert_ne!(row_key(&left, &strategy), row_key(&right, &strategy));
    }

    #[test]
    fn test_full_row_key_is_column_order_sensitive() {
        let left = record(&[("a", "1"), ("b", "2")]);
        let same = record(&[("a", "1"), ("b", "2")]);
        let reordered = record(&[("b", "2"), ("a", "1")]);
        let strategy = KeyStrategy::FullRowHash;
        assert_eq!(row_key(&left, &strategy), row_key(&same, &strategy));
        assert_ne!(row_key(&left, &strategy), row_key(&reordered, &strategy));
    }

    #[test]
    fn test_index_groups_rows_by_key() {
        let dataset: Dataset = vec![
            record(&[("id", "1")]),
            record(&[("id", "2")]),
            record(&[("id", "1")]),
        ]
        .into();
        let index = RowKeyIndex::build(&dataset, &KeyStrategy::SingleColumn("id".into()));
        assert_eq!(index.row_count(), 3);
        assert_eq!(index.groups().count(), 2);
        assert_eq!(index.rows_for("1"), Some(&[0, 2][..]));
        assert_eq!(index.first_row("2"), Some(1));
        assert_eq!(index.key_of(2), Some("1"));
        assert!(!index.contains_key("3"));
        assert_eq!(
            index.groups().map(|(k, _)| k).collect::<Vec<_>>(),
            vec!["1", "2"]
        );
    }
}
