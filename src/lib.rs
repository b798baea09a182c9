//! # Order Reconciliation
//!
//! Batch reconciliation of e-commerce orders against their line items.
//!
//! Orders are outer-joined to line items, item totals are summed per order,
//! and every reconciled order is flagged by whether its recorded paid amount
//! equals the item total exactly. Non-matching orders are classified by the
//! sign and size of the difference, and match rates are rolled up per day
//! and order state.
//!
//! ## Design Principles
//!
//! - **Exact arithmetic**: money is `rust_decimal` at the precision it was
//!   read with, so the match flag is exact equality with no tolerance band.
//!   Overflowing products and sums are reported as absent, never wrapped
//! - **Tolerant of data quality**: nulls, negative prices and unmatched keys
//!   are counted, never rejected
//! - **Strict on structure**: a missing column or an unparseable timestamp
//!   halts the run before any output is written
//! - **Deterministic output**: tables are sorted by order id or by date and state
//!
//! ## Example
//!
//! ```no_run
//! use order_recon::{ReconConfig, ReconciliationEngine};
//! use std::io::Cursor;
//!
//! let orders = "id_order;created_date;total_paid;state\n1;2017-01-01 10:00:00;100;Completed\n";
//! let items = "id;id_order;product_quantity;sku;unit_price;date\n1;1;1;APP1;100;2017-01-01 10:00:00\n";
//!
//! let mut engine = ReconciliationEngine::new(ReconConfig::default());
//! engine.load_orders(Cursor::new(orders)).unwrap();
//! engine.load_line_items(Cursor::new(items)).unwrap();
//! let report = engine.run();
//! report.write_reconciled(std::io::stdout()).unwrap();
//! ```

pub mod amount;
pub mod categories;
pub mod config;
pub mod discrepancy;
pub mod engine;
pub mod error;
pub mod loader;
pub mod model;
pub mod quality;
pub mod reconcile;
pub mod timeseries;
pub mod transactions;

pub use amount::Amount;
pub use categories::{CategoryMap, CategorySales};
pub use config::ReconConfig;
pub use discrepancy::{DiffSign, DiffStats, Discrepancy, DiscrepancySummary};
pub use engine::{ReconciliationEngine, Report};
pub use error::{EngineError, Result};
pub use loader::{LoadOptions, Loaded};
pub use model::{LineItem, Order, OrderState, Transaction};
pub use quality::QualityReport;
pub use reconcile::{aggregate_items, reconcile, JoinStats, OrderAggregate, ReconciledOrder, Reconciliation};
pub use timeseries::{DailyMatchRate, DailyTotals};
pub use transactions::{Alignment, EnrichedTransaction};
