//! Positional alignment of the transactions table with order aggregates.
//!
//! The transactions file has no order id. It lists, in order, the product
//! codes of completed orders that have at least two line items, so its rows
//! pair up with those orders taken in input order.

use crate::amount::Amount;
use crate::model::{OrderState, Transaction};
use crate::reconcile::OrderAggregate;
use chrono::NaiveDateTime;
use log::{info, warn};
use serde::Serialize;

/// A transaction row joined to the order it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedTransaction {
    /// Zero-based row position in the transactions file
    pub position: usize,
    pub products: String,
    pub id_order: u64,
    pub created_date: NaiveDateTime,
    pub total_paid: Option<Amount>,
    pub computed_total: Option<Amount>,
    pub total_items_quantity: Option<i64>,
    pub n_unique_products: usize,

    /// Whether the number of listed products equals the order's item count
    pub product_count_matches: bool,
}

/// Outcome of pairing transactions with orders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alignment {
    pub rows: Vec<EnrichedTransaction>,
    pub count_mismatches: usize,
    pub unpaired_transactions: usize,
    pub unpaired_orders: usize,
}

impl Alignment {
    /// True when both sides paired off completely with agreeing product counts.
    pub fn is_consistent(&self) -> bool {
        self.count_mismatches == 0 && self.unpaired_transactions == 0 && self.unpaired_orders == 0
    }
}

/// Pairs each transaction with the next completed multi-item order.
///
/// A length difference between the two sides is reported, not fatal.
pub fn align(transactions: &[Transaction], aggregates: &[OrderAggregate]) -> Alignment {
    let candidates: Vec<&OrderAggregate> = aggregates
        .iter()
        .filter(|agg| agg.state == OrderState::Completed && agg.n_unique_products >= 2)
        .collect();

    let mut alignment = Alignment {
        unpaired_transactions: transactions.len().saturating_sub(candidates.len()),
        unpaired_orders: candidates.len().saturating_sub(transactions.len()),
        ..Alignment::default()
    };
    if alignment.unpaired_transactions > 0 || alignment.unpaired_orders > 0 {
        warn!(
            "{} transactions but {} completed multi-item orders",
            transactions.len(),
            candidates.len()
        );
    }

    for (position, (tx, agg)) in transactions.iter().zip(candidates).enumerate() {
        let product_count_matches = tx.products.len() == agg.n_unique_products;
        if !product_count_matches {
            alignment.count_mismatches += 1;
        }
        alignment.rows.push(EnrichedTransaction {
            position,
            products: tx.products.join("|"),
            id_order: agg.id_order,
            created_date: agg.created_date,
            total_paid: agg.total_paid,
            computed_total: agg.computed_total,
            total_items_quantity: agg.total_items_quantity,
            n_unique_products: agg.n_unique_products,
            product_count_matches,
        });
    }

    info!(
        "Aligned {} transactions ({} product count mismatches)",
        alignment.rows.len(),
        alignment.count_mismatches
    );
    alignment
}
