use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type covering the different failure cases that can occur while the
/// pipeline loads the definition table, reconciles the catalog, or fetches
/// observations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Wrapper for IO failures such as reading the definition workbook.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when the definition sheet does not follow the expected layout.
    #[error("invalid definition sheet: {0}")]
    InvalidSheet(String),

    /// Raised when the user provides a workbook path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Errors bubbled up from the SQLite catalog.
    #[error("catalog error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Raised when the remote series provider fails on transport, status, or
    /// response decoding.
    #[error("provider error for series {code}: {message}")]
    Provider { code: String, message: String },

    /// Raised when a date argument cannot be parsed.
    #[error("invalid date: {0}")]
    InvalidDate(#[from] chrono::ParseError),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl SyncError {
    /// Builds a provider error for the given series code.
    pub fn provider(code: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Provider {
            code: code.into(),
            message: message.to_string(),
        }
    }
}
