//! Order to line item reconciliation.
//!
//! Orders are outer-joined to their line items on `id_order`, item totals are
//! summed per order, and each order in the selected state gets an exact
//! `total_paid == computed_total` match flag.

use crate::amount::Amount;
use crate::model::{LineItem, Order, OrderState};
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Item totals for one order, over every state.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAggregate {
    pub id_order: u64,
    pub created_date: NaiveDateTime,
    pub state: OrderState,
    pub total_paid: Option<Amount>,

    /// Sum of `total_item_price`; `None` when the order has no line items
    /// or the sum overflows
    pub computed_total: Option<Amount>,

    /// Sum of `product_quantity` over the order's items; `None` on overflow
    pub total_items_quantity: Option<i64>,

    /// Number of line items matched to the order
    pub n_unique_products: usize,
}

impl OrderAggregate {
    pub fn created_day(&self) -> NaiveDate {
        self.created_date.date()
    }
}

/// One reconciled order: in the selected state with at least one line item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledOrder {
    pub id_order: u64,
    pub created_date: NaiveDateTime,
    pub state: OrderState,
    pub total_paid: Option<Amount>,
    pub computed_total: Amount,
    pub n_unique_products: usize,
    pub total_items_quantity: Option<i64>,

    /// Exact equality of `total_paid` and `computed_total`; false when nothing was paid
    pub match_flag: bool,
}

impl ReconciledOrder {
    pub fn created_day(&self) -> NaiveDate {
        self.created_date.date()
    }

    /// `total_paid - computed_total`, when a paid amount exists.
    pub fn price_diff(&self) -> Option<Amount> {
        self.total_paid
            .and_then(|paid| paid.checked_sub(self.computed_total))
    }
}

/// Join observations. None of these are errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinStats {
    /// Distinct orders after collapsing repeated ids
    pub orders: usize,
    pub items: usize,
    pub orders_without_items: usize,
    pub orders_without_items_by_state: BTreeMap<OrderState, usize>,
    pub items_without_order: usize,

    /// Order rows dropped because their id was already seen
    pub duplicate_order_rows: usize,

    /// Orders whose item total or quantity sum overflowed
    pub overflowed_orders: usize,
}

impl JoinStats {
    /// Share of orders with no line items, in percent to one decimal.
    pub fn orders_without_items_percent(&self) -> Option<f64> {
        percent_1dp(self.orders_without_items, self.orders)
    }

    /// Share of line items with no order, in percent to one decimal.
    pub fn items_without_order_percent(&self) -> Option<f64> {
        percent_1dp(self.items_without_order, self.items)
    }
}

fn percent_1dp(part: usize, whole: usize) -> Option<f64> {
    if whole == 0 {
        return None;
    }
    Some((part as f64 * 1000.0 / whole as f64).round() / 10.0)
}

/// Result of reconciling one order set against its line items.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Reconciled orders sorted by `id_order`
    pub orders: Vec<ReconciledOrder>,
    pub stats: JoinStats,
}

impl Reconciliation {
    /// Orders with a paid amount, which are the only ones a match rate counts.
    pub fn eligible(&self) -> impl Iterator<Item = &ReconciledOrder> {
        self.orders.iter().filter(|o| o.total_paid.is_some())
    }

    pub fn matching_count(&self) -> usize {
        self.eligible().filter(|o| o.match_flag).count()
    }

    pub fn eligible_count(&self) -> usize {
        self.eligible().count()
    }
}

struct ItemTotals {
    total: Option<Amount>,
    quantity: Option<i64>,
    count: usize,
}

impl Default for ItemTotals {
    fn default() -> Self {
        ItemTotals {
            total: Some(Amount::ZERO),
            quantity: Some(0),
            count: 0,
        }
    }
}

impl ItemTotals {
    fn overflowed(&self) -> bool {
        self.total.is_none() || self.quantity.is_none()
    }
}

/// Outer-joins orders to line items and aggregates per order.
///
/// Orders come back in input order, one per distinct id (first row wins).
/// Items whose order does not exist are counted in the returned stats.
pub fn aggregate_items(orders: &[Order], items: &[LineItem]) -> (Vec<OrderAggregate>, JoinStats) {
    let mut totals: HashMap<u64, ItemTotals> = HashMap::new();
    for item in items {
        let entry = totals.entry(item.id_order).or_default();
        if let Some(price) = item.total_item_price {
            entry.total = entry.total.and_then(|total| total.checked_add(price));
        }
        let quantity = item.product_quantity.unwrap_or(0);
        entry.quantity = entry.quantity.and_then(|q| q.checked_add(quantity));
        entry.count += 1;
    }

    let mut stats = JoinStats {
        items: items.len(),
        ..JoinStats::default()
    };

    let mut seen = HashSet::with_capacity(orders.len());
    let mut aggregates = Vec::with_capacity(orders.len());
    for order in orders {
        if !seen.insert(order.id_order) {
            debug!("Order {} appears more than once, keeping first row", order.id_order);
            stats.duplicate_order_rows += 1;
            continue;
        }

        let item_totals = totals.get(&order.id_order);
        match item_totals {
            None => {
                stats.orders_without_items += 1;
                *stats
                    .orders_without_items_by_state
                    .entry(order.state.clone())
                    .or_insert(0) += 1;
            }
            Some(t) if t.overflowed() => {
                warn!(
                    "Order {}: item sums overflow, leaving the overflowed sum absent",
                    order.id_order
                );
                stats.overflowed_orders += 1;
            }
            Some(_) => {}
        }

        aggregates.push(OrderAggregate {
            id_order: order.id_order,
            created_date: order.created_date,
            state: order.state.clone(),
            total_paid: order.total_paid,
            computed_total: item_totals.and_then(|t| t.total),
            total_items_quantity: item_totals.map_or(Some(0), |t| t.quantity),
            n_unique_products: item_totals.map_or(0, |t| t.count),
        });
    }

    stats.orders = aggregates.len();
    stats.items_without_order = items
        .iter()
        .filter(|item| !seen.contains(&item.id_order))
        .count();

    (aggregates, stats)
}

/// Builds reconciled orders from per-order aggregates.
///
/// Keeps orders in `state` (every state when `None`) that have at least one
/// line item.
pub fn reconcile_aggregates(
    aggregates: &[OrderAggregate],
    state: Option<&OrderState>,
) -> Vec<ReconciledOrder> {
    let mut reconciled: Vec<ReconciledOrder> = aggregates
        .iter()
        .filter(|agg| state.map_or(true, |s| &agg.state == s))
        .filter_map(|agg| {
            let computed_total = agg.computed_total?;
            let match_flag = agg.total_paid == Some(computed_total);
            Some(ReconciledOrder {
                id_order: agg.id_order,
                created_date: agg.created_date,
                state: agg.state.clone(),
                total_paid: agg.total_paid,
                computed_total,
                n_unique_products: agg.n_unique_products,
                total_items_quantity: agg.total_items_quantity,
                match_flag,
            })
        })
        .collect();

    reconciled.sort_by_key(|o| o.id_order);
    reconciled
}

/// Reconciles orders against line items.
///
/// This is a pure function of its inputs: identical inputs give identical
/// match flags.
pub fn reconcile(orders: &[Order], items: &[LineItem], state: Option<&OrderState>) -> Reconciliation {
    let (aggregates, stats) = aggregate_items(orders, items);
    let orders = reconcile_aggregates(&aggregates, state);

    let reconciliation = Reconciliation { orders, stats };
    info!(
        "Reconciled {} orders: {} of {} with a paid amount match exactly",
        reconciliation.orders.len(),
        reconciliation.matching_count(),
        reconciliation.eligible_count()
    );
    reconciliation
}
