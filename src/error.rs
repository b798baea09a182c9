//! Error types for the reconciliation engine.
//!
//! Only structural problems are errors. Data-quality anomalies (null totals,
//! negative prices, unmatched keys) are counted, never raised.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that halt a reconciliation run.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to open, read or write a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration file could not be decoded
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A required column is absent from an input header
    #[error("Missing required column '{column}' in {table}")]
    MissingColumn { table: &'static str, column: &'static str },

    /// A timestamp did not match the configured format
    #[error("Unparseable timestamp '{value}' in {table} at row {row}")]
    InvalidTimestamp {
        table: &'static str,
        row: usize,
        value: String,
    },

    /// Delimiter in the configuration is not a single byte
    #[error("Delimiter must be a single byte, got '{0}'")]
    InvalidDelimiter(String),

    /// Missing input file arguments
    #[error("Missing input file argument. Usage: order-recon <orders.csv> <lineitems.csv> [config.toml]")]
    MissingArgument,
}
