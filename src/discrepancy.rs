//! Classification of orders whose paid amount differs from their items.

use crate::amount::{checked_sum, median, Amount};
use crate::model::OrderState;
use crate::reconcile::ReconciledOrder;
use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::Serialize;

/// Direction of a price difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffSign {
    /// Paid more than the items add up to
    Over,
    /// Paid less than the items add up to
    Under,
}

/// A non-matching order with a paid amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discrepancy {
    pub id_order: u64,
    pub created_date: NaiveDateTime,
    pub state: OrderState,
    pub total_paid: Amount,
    pub computed_total: Amount,

    /// `total_paid - computed_total`
    pub price_diff: Amount,
    pub sign: DiffSign,
}

/// Distribution of `price_diff` over all discrepancies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffStats {
    pub min: Amount,
    pub max: Amount,
    pub mean: Amount,
    pub median: Amount,
}

impl DiffStats {
    /// Returns `None` for an empty set, or when the sum overflows.
    pub fn from_diffs(diffs: &[Amount]) -> Option<Self> {
        let min = *diffs.iter().min()?;
        let max = *diffs.iter().max()?;
        let total = checked_sum(diffs.iter().copied())?;
        Some(DiffStats {
            min,
            max,
            mean: total.div_count(diffs.len())?,
            median: median(diffs)?,
        })
    }
}

/// Discrepancy summary for one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscrepancySummary {
    pub threshold: Amount,
    pub count: usize,
    pub over: usize,
    pub under: usize,

    /// `None` when every eligible order matched
    pub stats: Option<DiffStats>,

    /// Discrepancies with `|price_diff| <= threshold`, by `id_order`
    pub within_threshold: Vec<Discrepancy>,
    pub beyond_threshold: usize,
}

/// Computes `price_diff` for every non-matching order with a paid amount and
/// buckets it by sign and by magnitude against `threshold`.
pub fn classify(orders: &[ReconciledOrder], threshold: Amount) -> DiscrepancySummary {
    let discrepancies: Vec<Discrepancy> = orders
        .iter()
        .filter(|o| !o.match_flag)
        .filter_map(|o| {
            let total_paid = o.total_paid?;
            let Some(price_diff) = total_paid.checked_sub(o.computed_total) else {
                warn!("Order {}: price_diff overflows, skipping", o.id_order);
                return None;
            };
            let sign = if price_diff.is_negative() {
                DiffSign::Under
            } else {
                DiffSign::Over
            };
            Some(Discrepancy {
                id_order: o.id_order,
                created_date: o.created_date,
                state: o.state.clone(),
                total_paid,
                computed_total: o.computed_total,
                price_diff,
                sign,
            })
        })
        .collect();

    let diffs: Vec<Amount> = discrepancies.iter().map(|d| d.price_diff).collect();
    let over = discrepancies
        .iter()
        .filter(|d| d.sign == DiffSign::Over)
        .count();
    let count = discrepancies.len();

    let (within_threshold, beyond): (Vec<Discrepancy>, Vec<Discrepancy>) = discrepancies
        .into_iter()
        .partition(|d| d.price_diff.abs() <= threshold);
    debug!(
        "{} discrepancies within +/-{}, {} beyond",
        within_threshold.len(),
        threshold,
        beyond.len()
    );

    DiscrepancySummary {
        threshold,
        count,
        over,
        under: count - over,
        stats: DiffStats::from_diffs(&diffs),
        within_threshold,
        beyond_threshold: beyond.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn amt(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    fn reconciled(id: u64, paid: Option<&str>, computed: &str) -> ReconciledOrder {
        let total_paid = paid.map(amt);
        let computed_total = amt(computed);
        ReconciledOrder {
            id_order: id,
            created_date: NaiveDateTime::parse_from_str("2017-05-05 12:00:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
            state: OrderState::Completed,
            total_paid,
            computed_total,
            n_unique_products: 1,
            total_items_quantity: Some(1),
            match_flag: total_paid == Some(computed_total),
        }
    }

    #[test]
    fn test_classify_signs_and_band() {
        let orders = vec![
            reconciled(1, Some("90"), "100"),
            reconciled(2, Some("104.99"), "100"),
            reconciled(3, Some("1000"), "100"),
            reconciled(4, Some("50"), "50"),
            reconciled(5, None, "50"),
        ];

        let summary = classify(&orders, amt("30"));
        assert_eq!(summary.count, 3);
        assert_eq!(summary.over, 2);
        assert_eq!(summary.under, 1);
        assert_eq!(summary.beyond_threshold, 1);

        let ids: Vec<u64> = summary.within_threshold.iter().map(|d| d.id_order).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(summary.within_threshold[0].price_diff, amt("-10"));
        assert_eq!(summary.within_threshold[0].sign, DiffSign::Under);
    }

    #[test]
    fn test_stats() {
        let orders = vec![
            reconciled(1, Some("90"), "100"),
            reconciled(2, Some("105"), "100"),
            reconciled(3, Some("130"), "100"),
        ];

        let stats = classify(&orders, amt("30")).stats.unwrap();
        assert_eq!(stats.min, amt("-10"));
        assert_eq!(stats.max, amt("30"));
        assert_eq!(stats.mean.to_string(), "8.3333");
        assert_eq!(stats.median, amt("5"));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let orders = vec![reconciled(1, Some("70"), "100")];
        let summary = classify(&orders, amt("30"));
        assert_eq!(summary.within_threshold.len(), 1);
        assert_eq!(summary.beyond_threshold, 0);
    }

    #[test]
    fn test_no_discrepancies() {
        let orders = vec![reconciled(1, Some("10"), "10")];
        let summary = classify(&orders, amt("30"));
        assert_eq!(summary.count, 0);
        assert_eq!(summary.stats, None);
        assert!(summary.within_threshold.is_empty());
    }

    #[test]
    fn test_overflowing_diff_is_skipped() {
        let mut extreme = reconciled(1, Some("0"), "-1");
        extreme.total_paid = Some(Amount::new(rust_decimal::Decimal::MAX));
        let orders = vec![extreme, reconciled(2, Some("90"), "100")];

        let summary = classify(&orders, amt("30"));
        assert_eq!(summary.count, 1);
        assert_eq!(summary.within_threshold[0].id_order, 2);
    }
}
