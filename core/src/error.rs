//! Error types for tabrecon

use thiserror::Error;

/// Result type used throughout tabrecon-core
pub type Result<T> = std::result::Result<T, TabreconError>;

/// Errors raised by the record source, report sinks and configuration layer.
///
/// The comparison engine itself never fails; these errors only surface at the
/// I/O boundaries and are isolated per table by the reconciler.
#[derive(Error, Debug)]
pub enum TabreconError {
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Excel error: {0}")]
    Excel(#[from] rust_xlsxwriter::XlsxError),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Data processing error: {message}")]
    DataProcessing { message: String },
}

impl TabreconError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn data_processing(message: impl Into<String>) -> Self {
        Self::DataProcessing {
            message: message.into(),
        }
    }
}
