//! Per-table reconciliation of two versions of a tabular source

use crate::aggregate::{aggregate, ComparisonResult};
use crate::config::{Config, TableSelection};
use crate::diff::DiffEngine;
use crate::error::{Result, TabreconError};
use crate::key::{KeySelector, KeyStrategy};
use crate::record::Dataset;
use crate::source::RecordSource;
use indexmap::IndexSet;
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Progress callback: tables done, total tables, table just finished
pub type ProgressCallback = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

/// A table that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTable {
    pub table: String,
    pub reason: String,
}

/// Everything a reconciliation produced, in table order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationRun {
    pub results: Vec<ComparisonResult>,
    pub skipped: Vec<SkippedTable>,
}

impl ReconciliationRun {
    pub fn has_changes(&self) -> bool {
        self.results.iter().any(ComparisonResult::has_changes)
    }

    pub fn total_changes(&self) -> usize {
        self.results.iter().map(ComparisonResult::total_changes).sum()
    }
}

/// Drives table resolution, loading and comparison for a pair of files
pub struct Reconciler<S: RecordSource> {
    source: S,
    config: Config,
    selector: KeySelector,
    progress: Option<ProgressCallback>,
}

impl<S: RecordSource> Reconciler<S> {
    pub fn new(source: S, config: Config) -> Self {
        let selector = KeySelector::new(config.comparison.key_selector_config());
        Self {
            source,
            config,
            selector,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: impl Fn(usize, usize, &str) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Tables to compare: the configured names, or for `*` the union of
    /// both files' tables in first-seen order
    pub fn table_names(&self, old_file: &Path, new_file: &Path) -> Result<Vec<String>> {
        match self.config.tables.selection() {
            TableSelection::Named(names) => Ok(names),
            TableSelection::All => {
                let mut names = IndexSet::new();
                let mut failures = Vec::new();
                for file in [old_file, new_file] {
                    match self.source.list_tables(file) {
                        Ok(tables) => names.extend(tables),
                        Err(e) => {
                            log::warn!("Could not list tables of {}: {e}", file.display());
                            failures.push(e);
                        }
                    }
                }
                if failures.len() == 2 {
                    return Err(failures.remove(0));
                }
                Ok(names.into_iter().collect())
            }
        }
    }

    /// Compare every selected table of `old_file` against `new_file`.
    ///
    /// A table that fails to load is logged and recorded in
    /// [`ReconciliationRun::skipped`]; the remaining tables still run.
    pub fn reconcile(&self, old_file: &Path, new_file: &Path) -> Result<ReconciliationRun> {
        let tables = self.table_names(old_file, new_file)?;
        if tables.is_empty() {
            return Err(TabreconError::invalid_input(format!(
                "No tables found in {} or {}",
                old_file.display(),
                new_file.display()
            )));
        }

        let total = tables.len();
        let mut run = ReconciliationRun::default();

        if self.config.comparison.parallel {
            // The source is only touched from this thread; comparisons fan out.
            let mut loaded = Vec::with_capacity(total);
            for table in &tables {
                match self.load_pair(old_file, new_file, table) {
                    Ok((old, new)) => loaded.push((table.as_str(), old, new)),
                    Err(e) => run.skipped.push(self.skip(table, e)),
                }
            }

            let done = AtomicUsize::new(run.skipped.len());
            let selector = &self.selector;
            let tables_config = &self.config.tables;
            let progress = self.progress.as_deref();
            run.results = loaded
                .par_iter()
                .map(|(table, old, new)| {
                    let table: &str = table;
                    let result = compare_table(selector, table, old, new, tables_config.key_override(table));
                    if let Some(callback) = progress {
                        callback(done.fetch_add(1, Ordering::SeqCst) + 1, total, table);
                    }
                    result
                })
                .collect();
        } else {
            for (index, table) in tables.iter().enumerate() {
                match self.load_pair(old_file, new_file, table) {
                    Ok((old, new)) => {
                        let result = self.compare_datasets(table, &old, &new, self.config.tables.key_override(table));
                        run.results.push(result);
                    }
                    Err(e) => run.skipped.push(self.skip(table, e)),
                }
                self.report_progress(index + 1, total, table);
            }
        }

        log::info!(
            "Compared {} tables ({} skipped), {} changed records",
            run.results.len(),
            run.skipped.len(),
            run.total_changes()
        );
        Ok(run)
    }

    /// Compare two in-memory datasets as table `table_name`
    pub fn compare_datasets(
        &self,
        table_name: &str,
        old: &Dataset,
        new: &Dataset,
        key_override: Option<&[String]>,
    ) -> ComparisonResult {
        compare_table(&self.selector, table_name, old, new, key_override)
    }

    fn load_pair(&self, old_file: &Path, new_file: &Path, table: &str) -> Result<(Dataset, Dataset)> {
        let options = self.config.tables.read_options(table);
        let old = self.source.read_table(old_file, table, &options)?;
        let new = self.source.read_table(new_file, table, &options)?;
        Ok((old, new))
    }

    fn skip(&self, table: &str, error: TabreconError) -> SkippedTable {
        log::error!("Skipping table '{table}': {error}");
        SkippedTable {
            table: table.to_string(),
            reason: error.to_string(),
        }
    }

    fn report_progress(&self, done: usize, total: usize, table: &str) {
        if let Some(callback) = &self.progress {
            callback(done, total, table);
        }
    }
}

fn compare_table(
    selector: &KeySelector,
    table_name: &str,
    old: &Dataset,
    new: &Dataset,
    key_override: Option<&[String]>,
) -> ComparisonResult {
    let key_strategy = selector.resolve_key(old, new, table_name, key_override);
    // Both sides empty: every output is empty whatever the key.
    let effective = key_strategy.clone().unwrap_or(KeyStrategy::FullRowHash);

    let engine = DiffEngine::new(old, new, &effective);
    let modified = engine.modified_records();
    let result = aggregate(
        table_name,
        old,
        new,
        key_strategy,
        engine.new_records(),
        engine.deleted_records(),
        modified.records,
        modified.column_changes,
        engine.duplicates_old(),
        engine.duplicates_new(),
    );

    log::debug!(
        "Table '{}': {} new, {} deleted, {} modified, {} duplicates",
        table_name,
        result.new_records.len(),
        result.deleted_records.len(),
        result.modified_records.len(),
        result.duplicate_count()
    );
    result
}
