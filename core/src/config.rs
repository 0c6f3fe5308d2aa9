use crate::key::{KeySelectorConfig, DEFAULT_COMPOSITE_WIDTHS, DEFAULT_UNIQUENESS_THRESHOLD};
use crate::normalize::normalize_column_name;
use crate::report::ReportFormat;
use crate::source::TableReadOptions;
use anyhow::{bail, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the project-local configuration file
pub const CONFIG_FILE_NAME: &str = "tabrecon.toml";

/// Table list entry meaning "every table found in either file"
pub const ALL_TABLES: &str = "*";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub comparison: ComparisonConfig,
    #[serde(default)]
    pub tables: TablesConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Share of distinct values a key candidate must exceed
    pub uniqueness_threshold: f64,
    /// Leading-column composite key widths, tried in order
    pub composite_widths: Vec<usize>,
    /// Compare loaded tables on the rayon thread pool
    pub parallel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TablesConfig {
    /// Tables to compare; `["*"]` compares every table found
    pub names: Vec<String>,
    /// Per-table settings keyed by table name
    pub overrides: IndexMap<String, TableConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TableConfig {
    /// Explicit key column(s); skips key inference for this table
    pub key: Option<Vec<String>>,
    /// Rows to skip before the header row
    pub header_row: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub format: ReportFormat,
    pub old_label: String,
    pub new_label: String,
    /// Overwrite existing report files
    pub force: bool,
}

/// Which tables a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSelection {
    All,
    Named(Vec<String>),
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            uniqueness_threshold: DEFAULT_UNIQUENESS_THRESHOLD,
            composite_widths: DEFAULT_COMPOSITE_WIDTHS.to_vec(),
            parallel: false,
        }
    }
}

impl ComparisonConfig {
    pub fn key_selector_config(&self) -> KeySelectorConfig {
        KeySelectorConfig {
            uniqueness_threshold: self.uniqueness_threshold,
            composite_widths: self.composite_widths.clone(),
        }
    }
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            names: vec![ALL_TABLES.to_string()],
            overrides: IndexMap::new(),
        }
    }
}

impl TablesConfig {
    pub fn selection(&self) -> TableSelection {
        if self.names.is_empty() || self.names.iter().any(|name| name.trim() == ALL_TABLES) {
            TableSelection::All
        } else {
            TableSelection::Named(self.names.clone())
        }
    }

    /// Settings for `table`, matched on normalized names
    pub fn table(&self, table: &str) -> Option<&TableConfig> {
        let wanted = normalize_column_name(table);
        self.overrides
            .iter()
            .find(|(name, _)| normalize_column_name(name) == wanted)
            .map(|(_, config)| config)
    }

    pub fn key_override(&self, table: &str) -> Option<&[String]> {
        self.table(table)
            .and_then(|config| config.key.as_deref())
            .filter(|key| !key.is_empty())
    }

    pub fn read_options(&self, table: &str) -> TableReadOptions {
        TableReadOptions {
            header_row: self.table(table).map(|config| config.header_row).unwrap_or(0),
        }
    }

    pub fn override_mut(&mut self, table: &str) -> &mut TableConfig {
        self.overrides.entry(table.to_string()).or_default()
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::default(),
            old_label: "old".to_string(),
            new_label: "new".to_string(),
            force: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let threshold = self.comparison.uniqueness_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            bail!("uniqueness_threshold must be in (0, 1], got {threshold}");
        }
        if let Some(width) = self.comparison.composite_widths.iter().find(|w| **w < 2) {
            bail!("composite_widths entries must be at least 2, got {width}");
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Location of the global configuration file
pub fn global_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tabrecon")
        .join("global.toml")
}

pub fn get_config() -> Result<Config> {
    // Priority order (highest to lowest):
    // 1. Explicit config file via TABRECON_CONFIG env var
    // 2. Local config file (tabrecon.toml)
    // 3. Saved global config file (~/.tabrecon/global.toml)
    // 4. Default configuration
    let mut config = Config::default();

    let env_path = env::var("TABRECON_CONFIG").ok().map(PathBuf::from);
    if let Some(missing) = env_path.as_ref().filter(|p| !p.exists()) {
        log::warn!("TABRECON_CONFIG points to {}, which does not exist; ignoring it", missing.display());
    }

    if let Some(explicit) = env_path.filter(|p| p.exists()) {
        config = Config::from_file(&explicit)?;
    } else if let Some(local) = local_config_path().filter(|p| p.exists()) {
        config = Config::from_file(&local)?;
    } else {
        let global = global_config_path();
        if global.exists() {
            config = Config::from_file(&global)?;
        }
    }

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

fn local_config_path() -> Option<PathBuf> {
    env::current_dir().ok().map(|dir| dir.join(CONFIG_FILE_NAME))
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(threshold) = env::var("TABRECON_UNIQUENESS_THRESHOLD") {
        config.comparison.uniqueness_threshold = threshold
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid TABRECON_UNIQUENESS_THRESHOLD '{threshold}': {e}"))?;
    }
    if let Ok(parallel) = env::var("TABRECON_PARALLEL") {
        config.comparison.parallel = matches!(parallel.trim().to_lowercase().as_str(), "1" | "true" | "yes");
    }
    Ok(())
}

/// Where the effective configuration came from
#[derive(Debug, Clone, Serialize)]
pub struct ConfigResolutionInfo {
    pub config_source: String,
    pub config_path: Option<String>,
    pub resolution_order: Vec<String>,
}

pub fn get_config_resolution_info() -> Result<ConfigResolutionInfo> {
    let mut resolution_order = Vec::new();
    let mut config_source = "default".to_string();
    let mut config_path = None;

    if let Ok(env_config) = env::var("TABRECON_CONFIG") {
        resolution_order.push(format!("Environment variable TABRECON_CONFIG: {env_config}"));
        if Path::new(&env_config).exists() {
            config_source = "environment_variable".to_string();
            config_path = Some(env_config);
        }
    }

    let current_dir_toml = env::current_dir()?.join(CONFIG_FILE_NAME);
    resolution_order.push(format!("Current directory config: {}", current_dir_toml.display()));
    if config_source == "default" && current_dir_toml.exists() {
        config_source = "current_directory".to_string();
        config_path = Some(current_dir_toml.to_string_lossy().to_string());
    }

    let global_toml_path = global_config_path();
    resolution_order.push(format!("Global config: {}", global_toml_path.display()));
    if config_source == "default" && global_toml_path.exists() {
        config_source = "global".to_string();
        config_path = Some(global_toml_path.to_string_lossy().to_string());
    }

    resolution_order.push("Built-in defaults".to_string());

    Ok(ConfigResolutionInfo {
        config_source,
        config_path,
        resolution_order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.comparison.uniqueness_threshold, 0.95);
        assert_eq!(config.comparison.composite_widths, vec![2, 3]);
        assert!(!config.comparison.parallel);
        assert_eq!(config.tables.selection(), TableSelection::All);
        assert_eq!(config.report.format, ReportFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [comparison]
            uniqueness_threshold = 0.9

            [tables]
            names = ["Orders", "customers"]

            [tables.overrides.orders]
            key = ["order_id"]
            header_row = 2

            [tables.overrides.customers]
            key = ["region", "customer_no"]

            [report]
            format = "csv"
            old_label = "january"
            "#,
        )
        .unwrap();

        assert_eq!(config.comparison.uniqueness_threshold, 0.9);
        assert_eq!(config.comparison.composite_widths, vec![2, 3]);
        assert_eq!(
            config.tables.selection(),
            TableSelection::Named(vec!["Orders".to_string(), "customers".to_string()])
        );
        assert_eq!(
            config.tables.key_override("ORDERS"),
            Some(&["order_id".to_string()][..])
        );
        assert_eq!(config.tables.read_options("orders").header_row, 2);
        assert_eq!(config.tables.read_options("unknown").header_row, 0);
        assert_eq!(config.tables.key_override("customers").map(|k| k.len()), Some(2));
        assert_eq!(config.report.format, ReportFormat::Csv);
        assert_eq!(config.report.old_label, "january");
        assert_eq!(config.report.new_label, "new");
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.comparison.uniqueness_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.comparison.composite_widths = vec![1];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        let mut config = Config::default();
        config.tables.names = vec!["orders".to_string()];
        config.tables.override_mut("orders").key = Some(vec!["id".to_string()]);
        config.save(&path).unwrap();

        assert_eq!(Config::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_star_selects_all_tables() {
        let tables = TablesConfig {
            names: vec!["orders".to_string(), "*".to_string()],
            overrides: IndexMap::new(),
        };
        assert_eq!(tables.selection(), TableSelection::All);
    }
}
