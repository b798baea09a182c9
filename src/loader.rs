//! Ingestion and normalization of the input tables.
//!
//! Structural problems (missing column, unparseable timestamp) abort the
//! load. Row-level value problems are logged and the value becomes `None`.
//! Rows whose key cannot be read at all are skipped and counted.

use crate::error::{EngineError, Result};
use crate::model::{
    parse_amount, parse_int, LineItem, LineItemRecord, Order, OrderRecord, OrderState, Transaction,
};
use chrono::NaiveDateTime;
use csv::{Reader, ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use std::io::Read;

/// Reader settings shared by all input tables.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub timestamp_format: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            delimiter: b';',
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

/// A loaded table plus the number of rows that could not be used.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Loaded {
            rows: Vec::new(),
            skipped: 0,
        }
    }
}

pub(crate) fn build_reader<R: Read>(reader: R, delimiter: u8, has_headers: bool) -> Reader<R> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader)
}

fn require_columns(
    headers: &StringRecord,
    table: &'static str,
    columns: &[&'static str],
) -> Result<()> {
    for &column in columns {
        if !headers.iter().any(|h| h == column) {
            return Err(EngineError::MissingColumn { table, column });
        }
    }
    Ok(())
}

fn parse_timestamp(
    value: Option<&str>,
    format: &str,
    table: &'static str,
    row: usize,
) -> Result<NaiveDateTime> {
    let raw = value.unwrap_or("").trim();
    NaiveDateTime::parse_from_str(raw, format).map_err(|_| EngineError::InvalidTimestamp {
        table,
        row,
        value: raw.to_string(),
    })
}

fn parse_id(field: Option<&str>) -> Option<u64> {
    parse_int(field).and_then(|id| u64::try_from(id).ok())
}

/// Loads the orders table.
pub fn load_orders<R: Read>(reader: R, options: &LoadOptions) -> Result<Loaded<Order>> {
    let mut csv_reader = build_reader(reader, options.delimiter, true);
    require_columns(csv_reader.headers()?, "orders", &OrderRecord::COLUMNS)?;

    let mut loaded = Loaded::default();
    for (row_idx, result) in csv_reader.deserialize::<OrderRecord>().enumerate() {
        let row_num = row_idx + 2; // 1-indexed, accounting for header row

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("orders row {}: CSV parse error: {}", row_num, e);
                loaded.skipped += 1;
                continue;
            }
        };

        let Some(id_order) = parse_id(record.id_order.as_deref()) else {
            warn!("orders row {}: unreadable id_order, skipping", row_num);
            loaded.skipped += 1;
            continue;
        };

        let created_date = parse_timestamp(
            record.created_date.as_deref(),
            &options.timestamp_format,
            "orders",
            row_num,
        )?;

        let total_paid = parse_amount(record.total_paid.as_deref());
        if total_paid.is_none() && record.total_paid.as_deref().is_some_and(|s| !s.is_empty()) {
            warn!(
                "orders row {}: unparseable total_paid {:?}, treating as missing",
                row_num, record.total_paid
            );
        }

        loaded.rows.push(Order {
            id_order,
            created_date,
            state: OrderState::from_label(record.state.as_deref().unwrap_or("")),
            total_paid,
        });
    }

    info!(
        "Loaded {} orders ({} skipped)",
        loaded.rows.len(),
        loaded.skipped
    );
    Ok(loaded)
}

/// Loads the line items table and derives `total_item_price`.
pub fn load_line_items<R: Read>(reader: R, options: &LoadOptions) -> Result<Loaded<LineItem>> {
    let mut csv_reader = build_reader(reader, options.delimiter, true);
    require_columns(csv_reader.headers()?, "line items", &LineItemRecord::COLUMNS)?;

    let mut loaded = Loaded::default();
    for (row_idx, result) in csv_reader.deserialize::<LineItemRecord>().enumerate() {
        let row_num = row_idx + 2;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("line items row {}: CSV parse error: {}", row_num, e);
                loaded.skipped += 1;
                continue;
            }
        };

        let (Some(id), Some(id_order)) = (
            parse_id(record.id.as_deref()),
            parse_id(record.id_order.as_deref()),
        ) else {
            warn!("line items row {}: unreadable id or id_order, skipping", row_num);
            loaded.skipped += 1;
            continue;
        };

        let date = parse_timestamp(
            record.date.as_deref(),
            &options.timestamp_format,
            "line items",
            row_num,
        )?;

        let unit_price = parse_amount(record.unit_price.as_deref());
        let product_quantity = parse_int(record.product_quantity.as_deref());
        if unit_price.is_none() || product_quantity.is_none() {
            debug!(
                "line items row {}: missing price or quantity, total_item_price is absent",
                row_num
            );
        }

        let total_item_price = match (unit_price, product_quantity) {
            (Some(price), Some(qty)) => {
                let total = price.checked_mul(qty);
                if total.is_none() {
                    warn!(
                        "line items row {}: {} x {} overflows, total_item_price is absent",
                        row_num, price, qty
                    );
                }
                total
            }
            _ => None,
        };

        loaded.rows.push(LineItem {
            id,
            id_order,
            sku: record.sku.unwrap_or_default(),
            unit_price,
            product_quantity,
            date,
            total_item_price,
        });
    }

    info!(
        "Loaded {} line items ({} skipped)",
        loaded.rows.len(),
        loaded.skipped
    );
    Ok(loaded)
}

/// Loads the transactions table.
///
/// The first line is a header and is ignored. Each following line holds a
/// variable number of product codes; empty trailing slots are dropped.
pub fn load_transactions<R: Read>(reader: R, delimiter: u8) -> Result<Vec<Transaction>> {
    let mut csv_reader = build_reader(reader, delimiter, false);

    let mut transactions = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        if row_idx == 0 {
            continue;
        }
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("transactions row {}: CSV parse error: {}", row_idx + 1, e);
                continue;
            }
        };
        let products = record
            .iter()
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .collect();
        transactions.push(Transaction { products });
    }

    info!("Loaded {} transactions", transactions.len());
    Ok(transactions)
}
