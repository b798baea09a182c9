//! Product category reference table and per-category sales.

use crate::amount::{checked_sum, Amount};
use crate::error::Result;
use crate::loader::build_reader;
use crate::model::{LineItem, Order, OrderState};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;

/// Label for product codes missing from the reference table.
pub const UNKNOWN: &str = "Unknown";

/// Category left out of sales shares.
pub const EXTENDED_WARRANTY: &str = "ExtendedWarranty";

/// Maps a raw category label to its canonical spelling.
///
/// Labels outside the known set are returned trimmed but otherwise untouched.
pub fn normalize_label(label: &str) -> String {
    let trimmed = label.trim();
    let canonical = match trimmed.to_lowercase().as_str() {
        "accessories" => "Accessories",
        "smartphone" => "Smartphone",
        "tablet" => "Tablet",
        "display" => "Display",
        "laptop" => "Laptop",
        "other" => "Other",
        "extended warranty" => EXTENDED_WARRANTY,
        "pc" => "PC",
        "smartwatch" | "smartwhatch" => "Smartwatch",
        "service" => "Service",
        "camera" => "Camera",
        "software" => "Software",
        "printer" => "Printer",
        _ => return trimmed.to_string(),
    };
    canonical.to_string()
}

/// Product code to category label, many-to-one.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    by_sku: HashMap<String, String>,
}

impl CategoryMap {
    /// Builds a map from `(sku, label)` pairs. The first label for a code wins.
    pub fn from_pairs<I, S, L>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, L)>,
        S: AsRef<str>,
        L: AsRef<str>,
    {
        let mut by_sku = HashMap::new();
        for (sku, label) in pairs {
            let sku = sku.as_ref().trim();
            if sku.is_empty() {
                continue;
            }
            if by_sku.contains_key(sku) {
                debug!("Category for {} listed twice, keeping first", sku);
                continue;
            }
            by_sku.insert(sku.to_string(), normalize_label(label.as_ref()));
        }
        CategoryMap { by_sku }
    }

    /// Loads the reference table: a header line, then product code and
    /// category label in the first two columns.
    pub fn load<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut csv_reader = build_reader(reader, delimiter, true);

        let mut pairs = Vec::new();
        for (row_idx, result) in csv_reader.records().enumerate() {
            let row_num = row_idx + 2;
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("categories row {}: CSV parse error: {}", row_num, e);
                    continue;
                }
            };
            match (record.get(0), record.get(1)) {
                (Some(sku), Some(label)) => pairs.push((sku.to_string(), label.to_string())),
                _ => warn!("categories row {}: expected two columns, skipping", row_num),
            }
        }

        let map = Self::from_pairs(pairs);
        info!("Loaded {} product categories", map.len());
        Ok(map)
    }

    /// Category of a product code, or [`UNKNOWN`].
    pub fn category_of(&self, sku: &str) -> &str {
        self.by_sku
            .get(sku.trim())
            .map(String::as_str)
            .unwrap_or(UNKNOWN)
    }

    pub fn len(&self) -> usize {
        self.by_sku.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_sku.is_empty()
    }
}

/// Sales volume of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySales {
    pub category: String,

    /// `None` when the category's sum overflows
    pub quantity: Option<i64>,
    pub revenue: Option<Amount>,

    /// Percent of all quantity sold, two decimals
    pub quantity_share: Option<f64>,

    /// Percent of all revenue, two decimals
    pub revenue_share: Option<f64>,
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sums quantity and revenue per category over the line items of orders in
/// `state`, leaving out extended warranties.
///
/// Items are inner-joined to orders: items without an order in `state` are
/// ignored. Codes missing from `categories` count as [`UNKNOWN`]. Sums that
/// overflow are reported as absent, and shares are then left out.
pub fn category_sales(
    orders: &[Order],
    items: &[LineItem],
    categories: &CategoryMap,
    state: &OrderState,
) -> Vec<CategorySales> {
    let selected: HashSet<u64> = orders
        .iter()
        .filter(|o| &o.state == state)
        .map(|o| o.id_order)
        .collect();

    let mut by_category: BTreeMap<&str, (Option<i64>, Option<Amount>)> = BTreeMap::new();
    for item in items.iter().filter(|i| selected.contains(&i.id_order)) {
        let category = categories.category_of(&item.sku);
        if category == EXTENDED_WARRANTY {
            continue;
        }
        let entry = by_category
            .entry(category)
            .or_insert((Some(0), Some(Amount::ZERO)));
        let complete = entry.0.is_some() && entry.1.is_some();
        let quantity = item.product_quantity.unwrap_or(0);
        entry.0 = entry.0.and_then(|q| q.checked_add(quantity));
        if let Some(price) = item.total_item_price {
            entry.1 = entry.1.and_then(|r| r.checked_add(price));
        }
        if complete && (entry.0.is_none() || entry.1.is_none()) {
            warn!("Sales of category {} overflow, reporting them as absent", category);
        }
    }

    let total_quantity = by_category
        .values()
        .try_fold(0i64, |acc, (q, _)| acc.checked_add((*q)?));
    let total_revenue = by_category
        .values()
        .map(|(_, r)| *r)
        .collect::<Option<Vec<Amount>>>()
        .and_then(checked_sum);

    by_category
        .into_iter()
        .map(|(category, (quantity, revenue))| CategorySales {
            category: category.to_string(),
            quantity,
            revenue,
            quantity_share: match (quantity, total_quantity) {
                (Some(q), Some(total)) if total != 0 => {
                    Some(round_2dp(q as f64 * 100.0 / total as f64))
                }
                _ => None,
            },
            revenue_share: match (revenue, total_revenue) {
                (Some(r), Some(total)) => r.percent_of(total).map(round_2dp),
                _ => None,
            },
        })
        .collect()
}
