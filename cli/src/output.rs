//! Output formatting utilities

use std::path::Path;
use tabrecon_core::config::ConfigResolutionInfo;
use tabrecon_core::reconcile::ReconciliationRun;
use tabrecon_core::{ComparisonResult, KeyStrategy, ReportLabels, ReportOutcome};

/// Detail rows shown per category before eliding the rest
const SAMPLE_ROWS: usize = 3;

/// Pretty printer for tabrecon output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print one tree per compared table, then skipped tables
    pub fn print_run(run: &ReconciliationRun, labels: &ReportLabels) {
        println!("🔍 Reconciliation: {} → {}", labels.old, labels.new);

        for (i, result) in run.results.iter().enumerate() {
            let last = i == run.results.len() - 1 && run.skipped.is_empty();
            Self::print_result(result, labels, last);
        }

        if !run.skipped.is_empty() {
            println!("└─ ⚠️  Skipped tables: {}", run.skipped.len());
            for (i, skipped) in run.skipped.iter().enumerate() {
                let prefix = tree_prefix(i, run.skipped.len());
                println!("   {prefix} {}: {}", skipped.table, skipped.reason);
            }
        }
    }

    fn print_result(result: &ComparisonResult, labels: &ReportLabels, last: bool) {
        let (branch, indent) = if last { ("└─", "   ") } else { ("├─", "│  ") };
        let status = if result.has_changes() { "❌" } else { "✅" };
        println!("{branch} {status} {}", result.table_name);

        let key = if result.key_display.is_empty() {
            "none"
        } else {
            result.key_display.as_str()
        };
        println!("{indent}├─ Key: {key}");
        println!(
            "{indent}├─ Rows: {} → {} (columns {} → {})",
            result.rows_old, result.rows_new, result.columns_old, result.columns_new
        );

        let new_details: Vec<String> = result.new_details().iter().map(ToString::to_string).collect();
        let deleted_details: Vec<String> = result.deleted_details().iter().map(ToString::to_string).collect();
        let modified_details: Vec<String> = result
            .modified_details()
            .iter()
            .map(|d| format!("{}: {}", d.key, d.details))
            .collect();
        let duplicate_details: Vec<String> = result
            .duplicate_details(labels)
            .iter()
            .map(|d| format!("{} row {}: {}", d.source, d.row_number, d.details))
            .collect();

        Self::print_category(indent, "New", &new_details, false);
        Self::print_category(indent, "Deleted", &deleted_details, false);
        Self::print_category(indent, "Modified", &modified_details, false);
        Self::print_category(indent, "Duplicates", &duplicate_details, result.column_changes.is_empty());

        if !result.column_changes.is_empty() {
            let changes: Vec<String> = result
                .column_changes
                .iter()
                .map(|(column, count)| format!("{column} ({count})"))
                .collect();
            println!("{indent}└─ Changed columns: {}", changes.join(", "));
        }
    }

    fn print_category(indent: &str, label: &str, rows: &[String], last: bool) {
        let (branch, child) = if last { ("└─", "   ") } else { ("├─", "│  ") };
        println!("{indent}{branch} {label}: {}", rows.len());

        let shown = rows.len().min(SAMPLE_ROWS);
        for (i, row) in rows.iter().take(shown).enumerate() {
            let more = rows.len() > shown;
            let prefix = if i == shown - 1 && !more { "└─" } else { "├─" };
            println!("{indent}{child}{prefix} {row}");
        }
        if rows.len() > shown {
            println!("{indent}{child}└─ ... and {} more", rows.len() - shown);
        }
    }

    pub fn print_table_list(file: &Path, tables: &[String]) {
        if tables.is_empty() {
            println!("No tables found in {}.", file.display());
            return;
        }

        println!("📋 Tables in {}:", file.display());
        for (i, table) in tables.iter().enumerate() {
            println!("{} {table}", tree_prefix(i, tables.len()));
        }
    }

    /// Print the chosen key and the per-column uniqueness it was chosen from
    pub fn print_key(table: &str, strategy: Option<&KeyStrategy>, ratios: &[(String, f64)]) {
        match strategy {
            Some(strategy) => println!("🔑 Key for {table}: {strategy}"),
            None => println!("🔑 Key for {table}: none (table is empty)"),
        }
        for (i, (column, ratio)) in ratios.iter().enumerate() {
            println!("{} {column}: {:.1}% unique", tree_prefix(i, ratios.len()), ratio * 100.0);
        }
    }

    pub fn print_config(info: &ConfigResolutionInfo, rendered: &str) {
        println!("⚙️  Configuration source: {}", info.config_source);
        if let Some(path) = &info.config_path {
            println!("├─ Path: {path}");
        }
        println!("└─ Resolution order:");
        for (i, step) in info.resolution_order.iter().enumerate() {
            println!("   {} {step}", tree_prefix(i, info.resolution_order.len()));
        }
        println!();
        print!("{rendered}");
    }

    pub fn print_report_outcome(outcome: &ReportOutcome) {
        match outcome {
            ReportOutcome::Written(path) => println!("📄 Report written to {}", path.display()),
            ReportOutcome::NothingToReport => println!("No results to report."),
        }
    }
}

fn tree_prefix(index: usize, len: usize) -> &'static str {
    if index + 1 == len {
        "└─"
    } else {
        "├─"
    }
}
