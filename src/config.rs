//! Run configuration loaded from an optional TOML file.

use crate::amount::Amount;
use crate::error::{EngineError, Result};
use crate::model::OrderState;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Settings for one reconciliation run. Every key is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    /// Field separator shared by the order and line item files
    pub delimiter: String,

    /// Field separator of the transactions and categories files
    pub reference_delimiter: String,

    /// `chrono` format string for `created_date` and `date` columns
    pub timestamp_format: String,

    /// Discrepancies with `|price_diff|` above this are left out of the filtered subset
    pub diff_threshold: Amount,

    /// Only orders in this state are reconciled; empty means every state
    pub state: String,

    /// Optional transactions file to align against reconciled orders
    pub transactions: Option<PathBuf>,

    /// Optional product-code to category file
    pub categories: Option<PathBuf>,

    /// Directory for output tables; the reconciled table goes to stdout when unset
    pub output_dir: Option<PathBuf>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        ReconConfig {
            delimiter: ";".to_string(),
            reference_delimiter: ",".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            diff_threshold: Amount::from(30),
            state: "Completed".to_string(),
            transactions: None,
            categories: None,
            output_dir: None,
        }
    }
}

impl ReconConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// The delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Result<u8> {
        single_byte(&self.delimiter)
    }

    /// The reference-table delimiter as a single byte.
    pub fn reference_delimiter_byte(&self) -> Result<u8> {
        single_byte(&self.reference_delimiter)
    }

    /// The state filter, or `None` when every state is reconciled.
    pub fn state_filter(&self) -> Option<OrderState> {
        if self.state.trim().is_empty() {
            None
        } else {
            Some(OrderState::from_label(&self.state))
        }
    }
}

fn single_byte(delimiter: &str) -> Result<u8> {
    match delimiter.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(EngineError::InvalidDelimiter(delimiter.to_string())),
    }
}

impl FromStr for ReconConfig {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}
