//! Daily rollups of reconciled orders and raw totals.

use crate::amount::Amount;
use crate::model::{LineItem, Order, OrderState};
use crate::reconcile::ReconciledOrder;
use chrono::NaiveDate;
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;

/// Match rate for one day and state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyMatchRate {
    pub date: NaiveDate,
    pub state: OrderState,
    pub matching_count: usize,
    pub total_count: usize,
    pub percent_matching: u32,
}

/// `part * 100 / whole` rounded to the nearest integer, ties to even.
///
/// Returns `None` for a zero `whole`.
pub fn round_percent(part: usize, whole: usize) -> Option<u32> {
    if whole == 0 {
        return None;
    }
    let scaled = part as u64 * 100;
    let whole = whole as u64;
    let (quotient, remainder) = (scaled / whole, scaled % whole);
    let rounded = match (remainder * 2).cmp(&whole) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + quotient % 2,
    };
    u32::try_from(rounded).ok()
}

/// Groups reconciled orders by created day and state.
///
/// Orders without a paid amount are left out of both counts. Groups with no
/// eligible order are omitted.
pub fn daily_match_rates(orders: &[ReconciledOrder]) -> Vec<DailyMatchRate> {
    let mut groups: BTreeMap<(NaiveDate, OrderState), (usize, usize)> = BTreeMap::new();
    for order in orders.iter().filter(|o| o.total_paid.is_some()) {
        let counts = groups
            .entry((order.created_day(), order.state.clone()))
            .or_insert((0, 0));
        if order.match_flag {
            counts.0 += 1;
        }
        counts.1 += 1;
    }

    groups
        .into_iter()
        .filter_map(|((date, state), (matching_count, total_count))| {
            Some(DailyMatchRate {
                date,
                state,
                matching_count,
                total_count,
                percent_matching: round_percent(matching_count, total_count)?,
            })
        })
        .collect()
}

/// Order and item money recorded on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotals {
    pub date: NaiveDate,

    /// Orders created that day with a paid amount
    pub order_count: usize,

    /// `None` when the day's sum overflows
    pub order_total_paid: Option<Amount>,

    /// Line items dated that day with a computable price
    pub item_count: usize,
    pub item_total_price: Option<Amount>,
}

fn day_entry(days: &mut BTreeMap<NaiveDate, DailyTotals>, date: NaiveDate) -> &mut DailyTotals {
    days.entry(date).or_insert_with(|| DailyTotals {
        date,
        order_count: 0,
        order_total_paid: Some(Amount::ZERO),
        item_count: 0,
        item_total_price: Some(Amount::ZERO),
    })
}

fn add_or_clear(sum: &mut Option<Amount>, value: Amount, column: &str, date: NaiveDate) {
    if let Some(current) = *sum {
        *sum = current.checked_add(value);
        if sum.is_none() {
            warn!("{} for {} overflows, reporting it as absent", column, date);
        }
    }
}

/// Per-day comparison of paid order totals against line item totals.
///
/// Orders are grouped by creation day and items by their own day,
/// regardless of order state or join result. A sum that overflows is
/// reported as absent and logged.
pub fn daily_totals(orders: &[Order], items: &[LineItem]) -> Vec<DailyTotals> {
    let mut days: BTreeMap<NaiveDate, DailyTotals> = BTreeMap::new();

    for order in orders {
        if let Some(paid) = order.total_paid {
            let totals = day_entry(&mut days, order.created_day());
            totals.order_count += 1;
            add_or_clear(&mut totals.order_total_paid, paid, "order_total_paid", totals.date);
        }
    }
    for item in items {
        if let Some(price) = item.total_item_price {
            let totals = day_entry(&mut days, item.day());
            totals.item_count += 1;
            add_or_clear(&mut totals.item_total_price, price, "item_total_price", totals.date);
        }
    }

    days.into_values().collect()
}
