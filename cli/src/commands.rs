//! Command implementations for tabrecon CLI

use crate::cli::{Commands, CompareArgs, ConfigCommand};
use crate::output::PrettyPrinter;
use crate::progress::ProgressReporter;
use anyhow::{bail, Context, Result};
use std::path::Path;
use tabrecon_core::config::{self, Config, CONFIG_FILE_NAME};
use tabrecon_core::key::uniqueness_ratio;
use tabrecon_core::report::report_writer;
use tabrecon_core::{DuckDbRecordSource, KeySelector, Reconciler, RecordSource, ReportFormat, ReportLabels};

/// Execute a command
pub fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Compare(args) => compare_command(&args),
        Commands::Tables { file, json } => tables_command(&file, json),
        Commands::Key { file, table } => key_command(&file, &table),
        Commands::Config { command } => config_command(&command),
    }
}

/// Fold command-line options into the loaded configuration
fn apply_compare_args(config: &mut Config, args: &CompareArgs) -> Result<()> {
    if !args.tables.is_empty() {
        config.tables.names = args.tables.clone();
    }
    for (table, columns) in &args.keys {
        config.tables.override_mut(table).key = Some(columns.clone());
    }
    for (table, header_row) in &args.header_rows {
        config.tables.override_mut(table).header_row = *header_row;
    }
    if let Some(threshold) = args.threshold {
        config.comparison.uniqueness_threshold = threshold;
    }
    if args.parallel {
        config.comparison.parallel = true;
    }
    if let Some(format) = &args.format {
        config.report.format = format.parse::<ReportFormat>()?;
    }
    if let Some(label) = &args.old_label {
        config.report.old_label = label.clone();
    }
    if let Some(label) = &args.new_label {
        config.report.new_label = label.clone();
    }
    if args.force {
        config.report.force = true;
    }
    config.validate()
}

fn compare_command(args: &CompareArgs) -> Result<()> {
    let mut config = config::get_config()?;
    apply_compare_args(&mut config, args)?;

    for path in [&args.old, &args.new] {
        if !path.exists() {
            log::warn!("{} does not exist; its tables compare as empty", path.display());
        }
    }

    let labels = ReportLabels::new(config.report.old_label.clone(), config.report.new_label.clone());
    let report_format = config.report.format;
    let force = config.report.force;

    let mut progress = if args.json {
        ProgressReporter::hidden()
    } else {
        ProgressReporter::new("Comparing tables...")
    };
    let reconciler = Reconciler::new(DuckDbRecordSource::new()?, config).with_progress(progress.table_callback());
    let run = reconciler
        .reconcile(&args.old, &args.new)
        .with_context(|| format!("Failed to compare {} with {}", args.old.display(), args.new.display()))?;
    progress.finish(&format!("Compared {} tables", run.results.len()));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        PrettyPrinter::print_run(&run, &labels);
    }

    if let Some(output) = &args.output {
        let writer = report_writer(report_format, output, force)?;
        let outcome = writer.write_report(&run.results, &labels)?;
        if !args.json {
            PrettyPrinter::print_report_outcome(&outcome);
        }
    }

    Ok(())
}

fn tables_command(file: &Path, json: bool) -> Result<()> {
    let source = DuckDbRecordSource::new()?;
    let tables = source.list_tables(file)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tables)?);
    } else {
        PrettyPrinter::print_table_list(file, &tables);
    }
    Ok(())
}

fn key_command(file: &Path, table: &str) -> Result<()> {
    let config = config::get_config()?;
    let source = DuckDbRecordSource::new()?;
    let dataset = source.read_table(file, table, &config.tables.read_options(table))?;

    let selector = KeySelector::new(config.comparison.key_selector_config());
    let strategy = selector.select_key(&dataset, table, config.tables.key_override(table));

    let ratios: Vec<(String, f64)> = dataset
        .columns()
        .into_iter()
        .map(|column| {
            let ratio = uniqueness_ratio(&dataset, std::slice::from_ref(&column));
            (column, ratio)
        })
        .collect();

    PrettyPrinter::print_key(table, strategy.as_ref(), &ratios);
    Ok(())
}

fn config_command(command: &ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = config::get_config()?;
            let info = config::get_config_resolution_info()?;
            PrettyPrinter::print_config(&info, &toml::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigCommand::Init { global, force } => {
            let path = if *global {
                config::global_config_path()
            } else {
                std::env::current_dir()?.join(CONFIG_FILE_NAME)
            };
            init_config(&path, *force)
        }
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists. Use --force to overwrite.", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Config::default().save(path)?;
    println!("✅ Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_apply_compare_args() {
        let mut config = Config::default();
        let args = CompareArgs {
            tables: vec!["orders".into()],
            keys: vec![("orders".into(), vec!["order_id".into()])],
            header_rows: vec![("orders".into(), 2)],
            threshold: Some(0.9),
            format: Some("xlsx".into()),
            old_label: Some("january".into()),
            parallel: true,
            ..CompareArgs::default()
        };

        apply_compare_args(&mut config, &args).unwrap();
        assert_eq!(config.tables.names, vec!["orders"]);
        assert_eq!(config.tables.key_override("orders"), Some(&["order_id".to_string()][..]));
        assert_eq!(config.tables.read_options("orders").header_row, 2);
        assert_eq!(config.comparison.uniqueness_threshold, 0.9);
        assert!(config.comparison.parallel);
        assert_eq!(config.report.format, ReportFormat::Excel);
        assert_eq!(config.report.old_label, "january");
        assert_eq!(config.report.new_label, "new");
    }

    #[test]
    fn test_apply_compare_args_rejects_bad_values() {
        let args = CompareArgs {
            format: Some("yaml".into()),
            ..CompareArgs::default()
        };
        assert!(apply_compare_args(&mut Config::default(), &args).is_err());

        let args = CompareArgs {
            threshold: Some(0.0),
            ..CompareArgs::default()
        };
        assert!(apply_compare_args(&mut Config::default(), &args).is_err());
    }

    #[test]
    fn test_init_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        init_config(&path, false).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), Config::default());

        assert!(init_config(&path, false).is_err());
        assert!(init_config(&path, true).is_ok());
    }

    #[test]
    fn test_tables_command() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("orders.csv"), "id\n1\n").unwrap();
        assert!(tables_command(temp_dir.path(), true).is_ok());
        assert!(tables_command(&temp_dir.path().join("missing.csv"), false).is_err());
    }
}
