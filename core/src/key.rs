//! Key strategies and key-column inference
//!
//! A [`KeyStrategy`] decides which columns identify a logical row. The
//! [`KeySelector`] either takes an explicit override or infers a strategy
//! from how unique each candidate column is in one dataset.

use crate::hash::KEY_SEPARATOR;
use crate::normalize::normalize_column_name;
use crate::record::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Default share of distinct values a key candidate must exceed
pub const DEFAULT_UNIQUENESS_THRESHOLD: f64 = 0.95;

/// Default composite widths tried after single columns fail
pub const DEFAULT_COMPOSITE_WIDTHS: [usize; 2] = [2, 3];

/// Rule used to derive row keys for one table comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "columns", rename_all = "snake_case")]
pub enum KeyStrategy {
    SingleColumn(String),
    CompositeColumns(Vec<String>),
    FullRowHash,
}

impl KeyStrategy {
    /// Build a strategy from an explicit column list. Names are normalized;
    /// an empty list yields `None`.
    pub fn from_columns<S: AsRef<str>>(columns: &[S]) -> Option<Self> {
        let mut names: Vec<String> = columns
            .iter()
            .map(|c| normalize_column_name(c.as_ref()))
            .filter(|c| !c.is_empty())
            .collect();
        match names.len() {
            0 => None,
            1 => names.pop().map(KeyStrategy::SingleColumn),
            _ => Some(KeyStrategy::CompositeColumns(names)),
        }
    }

    /// Columns named by the strategy; empty for `FullRowHash`
    pub fn key_columns(&self) -> &[String] {
        match self {
            KeyStrategy::SingleColumn(column) => std::slice::from_ref(column),
            KeyStrategy::CompositeColumns(columns) => columns,
            KeyStrategy::FullRowHash => &[],
        }
    }
}

impl fmt::Display for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStrategy::SingleColumn(column) => write!(f, "{column}"),
            KeyStrategy::CompositeColumns(columns) => write!(f, "{}", columns.join(" + ")),
            KeyStrategy::FullRowHash => write!(f, "full row"),
        }
    }
}

/// Tunables for key inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySelectorConfig {
    /// A candidate qualifies when distinct/non-empty strictly exceeds this
    pub uniqueness_threshold: f64,
    /// Leading-column composite widths, tried in order
    pub composite_widths: Vec<usize>,
}

impl Default for KeySelectorConfig {
    fn default() -> Self {
        Self {
            uniqueness_threshold: DEFAULT_UNIQUENESS_THRESHOLD,
            composite_widths: DEFAULT_COMPOSITE_WIDTHS.to_vec(),
        }
    }
}

/// Chooses a key strategy for a dataset
#[derive(Debug, Clone, Default)]
pub struct KeySelector {
    config: KeySelectorConfig,
}

impl KeySelector {
    pub fn new(config: KeySelectorConfig) -> Self {
        Self { config }
    }

    /// Select a key strategy for `dataset`.
    ///
    /// An explicit `key_override` wins unconditionally and is not checked for
    /// uniqueness. Otherwise the first column whose uniqueness ratio exceeds
    /// the threshold is chosen, then the configured leading-column composites,
    /// then `FullRowHash`. An empty dataset yields `None`.
    pub fn select_key(
        &self,
        dataset: &Dataset,
        table_name: &str,
        key_override: Option<&[String]>,
    ) -> Option<KeyStrategy> {
        let explicit = key_override.and_then(|columns| KeyStrategy::from_columns(columns));
        if let Some(strategy) = explicit {
            log::info!("Using configured key '{strategy}' for table '{table_name}'");
            return Some(strategy);
        }

        if dataset.is_empty() {
            return None;
        }

        let columns = dataset.columns();
        let threshold = self.config.uniqueness_threshold;

        for column in &columns {
            let ratio = uniqueness_ratio(dataset, std::slice::from_ref(column));
            log::debug!("Table '{table_name}': column '{column}' uniqueness {ratio:.3}");
            if ratio > threshold {
                return Some(KeyStrategy::SingleColumn(column.clone()));
            }
        }

        for &width in &self.config.composite_widths {
            if width < 2 || width > columns.len() {
                continue;
            }
            let candidate = &columns[..width];
            let ratio = uniqueness_ratio(dataset, candidate);
            log::debug!(
                "Table '{table_name}': composite [{}] uniqueness {ratio:.3}",
                candidate.join(", ")
            );
            if ratio > threshold {
                return Some(KeyStrategy::CompositeColumns(candidate.to_vec()));
            }
        }

        log::debug!("Table '{table_name}': no unique key found, comparing full rows");
        Some(KeyStrategy::FullRowHash)
    }

    /// Select on `old`, falling back to `new` when `old` is empty.
    /// `None` only when both datasets are empty and no override is given.
    pub fn resolve_key(
        &self,
        old: &Dataset,
        new: &Dataset,
        table_name: &str,
        key_override: Option<&[String]>,
    ) -> Option<KeyStrategy> {
        self.select_key(old, table_name, key_override)
            .or_else(|| self.select_key(new, table_name, key_override))
    }
}

/// Distinct joined values over rows where at least one part is non-empty,
/// divided by the number of such rows. Zero when no row qualifies.
pub fn uniqueness_ratio(dataset: &Dataset, columns: &[String]) -> f64 {
    let mut distinct = HashSet::new();
    let mut total = 0usize;

    for record in dataset.records() {
        let parts: Vec<&str> = columns.iter().map(|c| record.get(c)).collect();
        if parts.iter().all(|p| p.is_empty()) {
            continue;
        }
        total += 1;
        distinct.insert(parts.join(KEY_SEPARATOR));
    }

    if total == 0 {
        0.0
    } else {
        distinct.len() as f64 / total as f64
    }
}
