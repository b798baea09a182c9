//! Record models for CSV parsing and the in-memory order tables.

use crate::amount::Amount;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Raw order row as read from CSV.
///
/// Every field is kept as text so that a malformed value in one column does
/// not discard the whole row.
#[derive(Debug, Deserialize)]
pub struct OrderRecord {
    pub id_order: Option<String>,
    pub created_date: Option<String>,
    pub total_paid: Option<String>,
    pub state: Option<String>,
}

impl OrderRecord {
    /// Header columns an orders file must carry.
    pub const COLUMNS: [&'static str; 4] = ["id_order", "created_date", "total_paid", "state"];
}

/// Raw line item row as read from CSV.
#[derive(Debug, Deserialize)]
pub struct LineItemRecord {
    pub id: Option<String>,
    pub id_order: Option<String>,
    pub product_quantity: Option<String>,
    pub sku: Option<String>,
    pub unit_price: Option<String>,
    pub date: Option<String>,
}

impl LineItemRecord {
    /// Header columns a line items file must carry.
    pub const COLUMNS: [&'static str; 6] = [
        "id",
        "id_order",
        "product_quantity",
        "sku",
        "unit_price",
        "date",
    ];
}

/// Parses an optional text field into an `Amount`.
///
/// Empty and unparseable values both become `None`.
pub fn parse_amount(field: Option<&str>) -> Option<Amount> {
    let trimmed = field?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Amount::from_str(trimmed).ok()
}

/// Parses an optional text field into an integer, accepting a trailing `.0`.
pub fn parse_int(field: Option<&str>) -> Option<i64> {
    let trimmed = field?.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.strip_suffix(".0").and_then(|s| s.parse().ok()))
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderState {
    ShoppingBasket,
    PlaceOrder,
    Pending,
    Completed,
    Cancelled,
    /// Any state label not in the list above, kept verbatim.
    Other(String),
}

impl OrderState {
    /// Maps a state label to a variant. Never fails.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Shopping Basket" => OrderState::ShoppingBasket,
            "Place Order" => OrderState::PlaceOrder,
            "Pending" => OrderState::Pending,
            "Completed" => OrderState::Completed,
            "Cancelled" => OrderState::Cancelled,
            other => OrderState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderState::ShoppingBasket => "Shopping Basket",
            OrderState::PlaceOrder => "Place Order",
            OrderState::Pending => "Pending",
            OrderState::Completed => "Completed",
            OrderState::Cancelled => "Cancelled",
            OrderState::Other(label) => label,
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OrderState {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// A customer order.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Order identifier, expected unique across the order set
    pub id_order: u64,

    /// Creation timestamp
    pub created_date: NaiveDateTime,

    /// Lifecycle state
    pub state: OrderState,

    /// Amount paid; absent for pending orders
    pub total_paid: Option<Amount>,
}

impl Order {
    /// Creation timestamp truncated to the day.
    pub fn created_day(&self) -> NaiveDate {
        self.created_date.date()
    }
}

/// One product entry within an order.
///
/// The owning order is not guaranteed to exist.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub id: u64,
    pub id_order: u64,
    pub sku: String,

    /// May be negative in the source data
    pub unit_price: Option<Amount>,

    pub product_quantity: Option<i64>,
    pub date: NaiveDateTime,

    /// `unit_price * product_quantity`, absent if either is absent
    pub total_item_price: Option<Amount>,
}

impl LineItem {
    /// Timestamp truncated to the day.
    pub fn day(&self) -> NaiveDate {
        self.date.date()
    }
}

/// A completed multi-product order as listed in the transactions file.
///
/// Holds product codes only; the owning order is derived by position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub products: Vec<String>,
}

impl Transaction {
    /// Number of distinct product codes in this transaction.
    pub fn distinct_products(&self) -> usize {
        let mut codes: Vec<&str> = self.products.iter().map(String::as_str).collect();
        codes.sort_unstable();
        codes.dedup();
        codes.len()
    }
}
