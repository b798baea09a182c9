//! Data-quality observations over the loaded tables.
//!
//! Everything here is a count. Nothing is rejected.

use crate::amount::Amount;
use crate::loader::Loaded;
use crate::model::{LineItem, Order, OrderState, Transaction};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Counted anomalies and ranges for one run's inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityReport {
    pub order_rows: usize,
    pub item_rows: usize,
    pub transaction_rows: usize,
    pub skipped_order_rows: usize,
    pub skipped_item_rows: usize,

    pub null_total_paid_by_state: BTreeMap<OrderState, usize>,
    pub zero_total_paid_by_state: BTreeMap<OrderState, usize>,
    pub negative_total_paid: usize,
    pub total_paid_range: Option<(Amount, Amount)>,

    pub null_unit_price: usize,
    pub null_quantity: usize,
    pub negative_unit_price: usize,

    /// Items with a price and quantity whose product overflows
    pub overflowed_item_price: usize,
    pub unit_price_range: Option<(Amount, Amount)>,
    pub quantity_range: Option<(i64, i64)>,

    /// Ids that occur on more than one row
    pub repeated_order_ids: usize,
    pub repeated_item_ids: usize,

    pub order_time_range: Option<(NaiveDateTime, NaiveDateTime)>,
    pub item_time_range: Option<(NaiveDateTime, NaiveDateTime)>,

    /// Transactions listing fewer than two distinct products
    pub short_transactions: usize,
}

fn range<T: Ord + Copy>(values: impl Iterator<Item = T>) -> Option<(T, T)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn repeated<K: Eq + Hash>(keys: impl Iterator<Item = K>) -> usize {
    let mut counts: HashMap<K, usize> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts.values().filter(|&&n| n > 1).count()
}

impl QualityReport {
    /// Inspects the loaded tables.
    pub fn assess(
        orders: &Loaded<Order>,
        items: &Loaded<LineItem>,
        transactions: &[Transaction],
    ) -> Self {
        let mut report = QualityReport {
            order_rows: orders.rows.len(),
            item_rows: items.rows.len(),
            transaction_rows: transactions.len(),
            skipped_order_rows: orders.skipped,
            skipped_item_rows: items.skipped,
            ..QualityReport::default()
        };

        for order in &orders.rows {
            match order.total_paid {
                None => {
                    *report
                        .null_total_paid_by_state
                        .entry(order.state.clone())
                        .or_insert(0) += 1
                }
                Some(paid) if paid.is_zero() => {
                    *report
                        .zero_total_paid_by_state
                        .entry(order.state.clone())
                        .or_insert(0) += 1
                }
                Some(paid) if paid.is_negative() => report.negative_total_paid += 1,
                Some(_) => {}
            }
        }
        report.total_paid_range = range(orders.rows.iter().filter_map(|o| o.total_paid));
        report.repeated_order_ids = repeated(orders.rows.iter().map(|o| o.id_order));
        report.order_time_range = range(orders.rows.iter().map(|o| o.created_date));

        for item in &items.rows {
            match item.unit_price {
                None => report.null_unit_price += 1,
                Some(price) if price.is_negative() => report.negative_unit_price += 1,
                Some(_) => {}
            }
            if item.product_quantity.is_none() {
                report.null_quantity += 1;
            }
            if item.unit_price.is_some()
                && item.product_quantity.is_some()
                && item.total_item_price.is_none()
            {
                report.overflowed_item_price += 1;
            }
        }
        report.unit_price_range = range(items.rows.iter().filter_map(|i| i.unit_price));
        report.quantity_range = range(items.rows.iter().filter_map(|i| i.product_quantity));
        report.repeated_item_ids = repeated(items.rows.iter().map(|i| i.id));
        report.item_time_range = range(items.rows.iter().map(|i| i.date));

        report.short_transactions = transactions
            .iter()
            .filter(|t| t.distinct_products() < 2)
            .count();

        report
    }

    /// Flattens the report into `(metric, value)` rows for output.
    pub fn observations(&self) -> Vec<(String, String)> {
        fn pair<T: ToString>(range: &Option<(T, T)>) -> (String, String) {
            match range {
                Some((lo, hi)) => (lo.to_string(), hi.to_string()),
                None => (String::new(), String::new()),
            }
        }

        let mut rows = vec![
            ("order_rows".to_string(), self.order_rows.to_string()),
            ("item_rows".to_string(), self.item_rows.to_string()),
            ("transaction_rows".to_string(), self.transaction_rows.to_string()),
            ("skipped_order_rows".to_string(), self.skipped_order_rows.to_string()),
            ("skipped_item_rows".to_string(), self.skipped_item_rows.to_string()),
            ("negative_total_paid".to_string(), self.negative_total_paid.to_string()),
            ("null_unit_price".to_string(), self.null_unit_price.to_string()),
            ("null_quantity".to_string(), self.null_quantity.to_string()),
            ("negative_unit_price".to_string(), self.negative_unit_price.to_string()),
            ("overflowed_item_price".to_string(), self.overflowed_item_price.to_string()),
            ("repeated_order_ids".to_string(), self.repeated_order_ids.to_string()),
            ("repeated_item_ids".to_string(), self.repeated_item_ids.to_string()),
            ("short_transactions".to_string(), self.short_transactions.to_string()),
        ];

        for (state, count) in &self.null_total_paid_by_state {
            rows.push((format!("null_total_paid[{}]", state), count.to_string()));
        }
        for (state, count) in &self.zero_total_paid_by_state {
            rows.push((format!("zero_total_paid[{}]", state), count.to_string()));
        }

        for (name, range) in [
            ("total_paid", pair(&self.total_paid_range)),
            ("unit_price", pair(&self.unit_price_range)),
            ("product_quantity", pair(&self.quantity_range)),
            ("created_date", pair(&self.order_time_range)),
            ("item_date", pair(&self.item_time_range)),
        ] {
            rows.push((format!("{}_min", name), range.0));
            rows.push((format!("{}_max", name), range.1));
        }

        rows
    }
}
