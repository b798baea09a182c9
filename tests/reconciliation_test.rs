//! Reconciliation properties checked through the public library API.

use order_recon::loader::{load_line_items, load_orders};
use order_recon::{reconcile, Amount, LoadOptions, OrderState, ReconConfig, ReconciliationEngine};
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::str::FromStr;

fn run_csv(orders: &str, items: &str) -> order_recon::Report {
    let mut engine = ReconciliationEngine::new(ReconConfig::default());
    engine.load_orders(Cursor::new(orders)).unwrap();
    engine.load_line_items(Cursor::new(items)).unwrap();
    engine.run()
}

fn amt(s: &str) -> Amount {
    Amount::from_str(s).unwrap()
}

const ORDER_HEADER: &str = "id_order;created_date;total_paid;state\n";
const ITEM_HEADER: &str = "id;id_order;product_quantity;sku;unit_price;date\n";

// ==================== SCENARIOS ====================

#[test]
fn test_exact_match_scenario() {
    let orders = format!("{}1;2017-01-01 10:00:00;100;Completed\n", ORDER_HEADER);
    let items = format!(
        "{}1;1;1;APP1;60;2017-01-01 10:00:00\n2;1;1;APP2;40;2017-01-01 10:00:00\n",
        ITEM_HEADER
    );

    let report = run_csv(&orders, &items);
    let rec = &report.reconciliation.orders[0];
    assert_eq!(rec.computed_total, amt("100"));
    assert!(rec.match_flag);

    let rate = &report.daily_match_rates[0];
    assert_eq!(rate.state, OrderState::Completed);
    assert_eq!(rate.percent_matching, 100);
}

#[test]
fn test_mismatch_scenario() {
    let orders = format!("{}2;2017-01-01 10:00:00;90;Completed\n", ORDER_HEADER);
    let items = format!("{}3;2;2;APP1;50;2017-01-01 10:00:00\n", ITEM_HEADER);

    let report = run_csv(&orders, &items);
    let rec = &report.reconciliation.orders[0];
    assert_eq!(rec.computed_total, amt("100"));
    assert!(!rec.match_flag);
    assert_eq!(report.discrepancies.within_threshold[0].price_diff, amt("-10"));
}

#[test]
fn test_pending_without_items_scenario() {
    let orders = format!("{}3;2017-01-01 10:00:00;;Pending\n", ORDER_HEADER);

    let report = run_csv(&orders, ITEM_HEADER);
    assert!(report.reconciliation.orders.is_empty());
    assert!(report.daily_match_rates.is_empty());
    assert_eq!(report.match_percent(), None);
    assert_eq!(report.aggregates[0].computed_total, None);
}

// ==================== PROPERTIES ====================

#[test]
fn test_null_paid_leaves_every_denominator() {
    let orders = format!(
        "{}1;2017-01-01 10:00:00;10;Completed\n2;2017-01-01 11:00:00;;Completed\n",
        ORDER_HEADER
    );
    let items = format!(
        "{}1;1;1;A;10;2017-01-01 10:00:00\n2;2;1;B;10;2017-01-01 11:00:00\n",
        ITEM_HEADER
    );

    let report = run_csv(&orders, &items);
    assert_eq!(report.reconciliation.orders.len(), 2);
    assert_eq!(report.daily_match_rates[0].total_count, 1);
    assert_eq!(report.daily_match_rates[0].matching_count, 1);
    assert_eq!(report.discrepancies.count, 0);
}

#[test]
fn test_zero_paid_boundary() {
    let orders = format!(
        "{}1;2017-01-01 10:00:00;0;Completed\n2;2017-01-01 11:00:00;0,00;Completed\n",
        ORDER_HEADER
    );
    let items = format!("{}1;2;1;FREEBIE;0;2017-01-01 11:00:00\n", ITEM_HEADER);

    let report = run_csv(&orders, &items);
    let ids: Vec<u64> = report.reconciliation.orders.iter().map(|o| o.id_order).collect();
    assert_eq!(ids, vec![2]);
    assert!(report.reconciliation.orders[0].match_flag);
}

#[test]
fn test_no_tolerance_on_near_misses() {
    let orders = format!("{}1;2017-01-01 10:00:00;100,01;Completed\n", ORDER_HEADER);
    let items = format!("{}1;1;1;A;100;2017-01-01 10:00:00\n", ITEM_HEADER);

    let first = run_csv(&orders, &items);
    let second = run_csv(&orders, &items);
    assert!(!first.reconciliation.orders[0].match_flag);
    assert_eq!(first.reconciliation.orders, second.reconciliation.orders);
    assert_eq!(first.discrepancies.within_threshold[0].price_diff, amt("0.01"));
}

#[test]
fn test_daily_computed_totals_equal_item_totals() {
    let orders_csv = format!(
        "{}1;2017-01-01 10:00:00;10;Completed
2;2017-01-01 23:59:59;0;Shopping Basket
3;2017-01-02 00:00:00;;Pending
4;2017-01-02 08:00:00;7;Completed
",
        ORDER_HEADER
    );
    // item dates differ from their orders' days on purpose
    let items_csv = format!(
        "{}1;1;2;SKU1;4,5;2017-01-05 00:00:00
2;2;1;SKU2;19,99;2017-01-05 00:00:00
3;3;1;SKU3;-1;2017-01-05 00:00:00
4;4;2;SKU4;3,5;2017-01-05 00:00:00
5;4;3;SKU5;0,01;2017-01-05 00:00:00
6;77;1;SKU6;1000;2017-01-05 00:00:00
",
        ITEM_HEADER
    );

    let options = LoadOptions::default();
    let orders = load_orders(Cursor::new(&orders_csv), &options).unwrap();
    let items = load_line_items(Cursor::new(&items_csv), &options).unwrap();

    let order_day: HashMap<u64, _> = orders
        .rows
        .iter()
        .map(|o| (o.id_order, o.created_day()))
        .collect();
    let mut items_by_day: BTreeMap<_, Amount> = BTreeMap::new();
    for item in &items.rows {
        if let Some(day) = order_day.get(&item.id_order) {
            let sum = items_by_day.entry(*day).or_insert(Amount::ZERO);
            *sum = sum.checked_add(item.total_item_price.unwrap()).unwrap();
        }
    }

    let report = run_csv(&orders_csv, &items_csv);
    let by_day = report.computed_total_by_day();
    let expected: Vec<_> = items_by_day
        .into_iter()
        .map(|(day, total)| (day, Some(total)))
        .collect();
    assert_eq!(by_day, expected);
    assert_eq!(by_day[0].1, Some(amt("28.99")));
    assert_eq!(by_day[1].1, Some(amt("6.03")));
}

#[test]
fn test_sub_cent_difference_is_not_a_match() {
    let orders = format!("{}1;2017-01-01 10:00:00;100,00004;Completed\n", ORDER_HEADER);
    let items = format!("{}1;1;1;A;100;2017-01-01 10:00:00\n", ITEM_HEADER);

    let report = run_csv(&orders, &items);
    assert!(!report.reconciliation.orders[0].match_flag);
    assert_eq!(report.match_percent(), Some(0));
    assert_eq!(report.discrepancies.within_threshold[0].price_diff, amt("0.00004"));
}

#[test]
fn test_quantity_outliers_are_tolerated() {
    let orders = format!(
        "{}1;2017-01-01 10:00:00;10;Completed\n2;2017-01-01 11:00:00;10;Completed\n",
        ORDER_HEADER
    );
    let items = format!(
        "{}1;1;9223372036854775807;A;1;2017-01-01 10:00:00
2;1;1;B;1;2017-01-01 10:00:00
3;2;9223372036854775807;C;100000000000;2017-01-01 11:00:00
4;2;1;D;10;2017-01-01 11:00:00
",
        ITEM_HEADER
    );

    let report = run_csv(&orders, &items);
    let first = &report.reconciliation.orders[0];
    assert_eq!(first.total_items_quantity, None);
    assert!(!first.match_flag);

    let second = &report.reconciliation.orders[1];
    assert_eq!(second.computed_total, amt("10"));
    assert!(second.match_flag);

    assert_eq!(report.reconciliation.stats.overflowed_orders, 2);
    assert_eq!(report.quality.overflowed_item_price, 1);
    assert_eq!(report.daily_totals[0].item_count, 3);
}

#[test]
fn test_unmatched_keys_are_counted_not_dropped() {
    let orders = format!(
        "{}1;2017-01-01 10:00:00;10;Completed\n2;2017-01-01 10:00:00;0;Place Order\n",
        ORDER_HEADER
    );
    let items = format!(
        "{}1;1;1;A;10;2017-01-01 10:00:00\n2;404;1;B;3;2017-01-01 10:00:00\n",
        ITEM_HEADER
    );

    let report = run_csv(&orders, &items);
    let stats = &report.reconciliation.stats;
    assert_eq!(stats.items_without_order, 1);
    assert_eq!(stats.orders_without_items, 1);
    assert_eq!(
        stats.orders_without_items_by_state.get(&OrderState::PlaceOrder),
        Some(&1)
    );
    assert_eq!(report.aggregates.len(), 2);
    assert_eq!(report.daily_totals[0].item_count, 2);
}

#[test]
fn test_engine_agrees_with_pure_reconcile() {
    let orders_csv = format!(
        "{}1;2017-01-01 10:00:00;10;Completed\n2;2017-01-02 10:00:00;5;Completed\n",
        ORDER_HEADER
    );
    let items_csv = format!(
        "{}1;1;1;A;10;2017-01-01 10:00:00\n2;2;3;B;2;2017-01-02 10:00:00\n",
        ITEM_HEADER
    );

    let options = LoadOptions::default();
    let orders = load_orders(Cursor::new(&orders_csv), &options).unwrap();
    let items = load_line_items(Cursor::new(&items_csv), &options).unwrap();
    let direct = reconcile(&orders.rows, &items.rows, Some(&OrderState::Completed));

    let report = run_csv(&orders_csv, &items_csv);
    assert_eq!(report.reconciliation.orders, direct.orders);
    assert_eq!(report.reconciliation.stats, direct.stats);
    assert_eq!(report.match_percent(), Some(50));
}
