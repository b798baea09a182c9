//! Batch reconciliation run.
//!
//! Loads the order, line item and optional reference tables fully into
//! memory, then runs each stage over the complete output of the previous one:
//! join and aggregate, match, classify discrepancies, roll up by day. Output
//! tables are written only after every stage has succeeded.

use crate::amount::Amount;
use crate::categories::{category_sales, CategoryMap, CategorySales};
use crate::config::ReconConfig;
use crate::discrepancy::{classify, DiscrepancySummary};
use crate::error::Result;
use crate::loader::{self, LoadOptions, Loaded};
use crate::model::{LineItem, Order, OrderState, Transaction};
use crate::quality::QualityReport;
use crate::reconcile::{aggregate_items, reconcile_aggregates, OrderAggregate, Reconciliation};
use crate::timeseries::{daily_match_rates, daily_totals, round_percent, DailyMatchRate, DailyTotals};
use crate::transactions::{align, Alignment};
use chrono::NaiveDate;
use csv::WriterBuilder;
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// The reconciliation engine.
///
/// Holds the run configuration and the loaded tables. [`run`](Self::run)
/// is a pure function of that state.
pub struct ReconciliationEngine {
    config: ReconConfig,
    orders: Loaded<Order>,
    items: Loaded<LineItem>,
    transactions: Option<Vec<Transaction>>,
    categories: Option<CategoryMap>,
}

impl ReconciliationEngine {
    /// Creates an engine with no tables loaded.
    pub fn new(config: ReconConfig) -> Self {
        ReconciliationEngine {
            config,
            orders: Loaded::default(),
            items: Loaded::default(),
            transactions: None,
            categories: None,
        }
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    fn load_options(&self) -> Result<LoadOptions> {
        Ok(LoadOptions {
            delimiter: self.config.delimiter_byte()?,
            timestamp_format: self.config.timestamp_format.clone(),
        })
    }

    pub fn load_orders<R: Read>(&mut self, reader: R) -> Result<()> {
        self.orders = loader::load_orders(reader, &self.load_options()?)?;
        Ok(())
    }

    pub fn load_line_items<R: Read>(&mut self, reader: R) -> Result<()> {
        self.items = loader::load_line_items(reader, &self.load_options()?)?;
        Ok(())
    }

    pub fn load_transactions<R: Read>(&mut self, reader: R) -> Result<()> {
        let delimiter = self.config.reference_delimiter_byte()?;
        self.transactions = Some(loader::load_transactions(reader, delimiter)?);
        Ok(())
    }

    pub fn load_categories<R: Read>(&mut self, reader: R) -> Result<()> {
        let delimiter = self.config.reference_delimiter_byte()?;
        self.categories = Some(CategoryMap::load(reader, delimiter)?);
        Ok(())
    }

    /// Loads the order and line item files, plus whichever reference files
    /// the configuration names.
    pub fn load_files(&mut self, orders: &Path, items: &Path) -> Result<()> {
        self.load_orders(BufReader::new(File::open(orders)?))?;
        self.load_line_items(BufReader::new(File::open(items)?))?;

        if let Some(path) = self.config.transactions.clone() {
            self.load_transactions(BufReader::new(File::open(path)?))?;
        }
        if let Some(path) = self.config.categories.clone() {
            self.load_categories(BufReader::new(File::open(path)?))?;
        }
        Ok(())
    }

    /// Runs every stage over the loaded tables.
    pub fn run(&self) -> Report {
        let state = self.config.state_filter();
        let (aggregates, stats) = aggregate_items(&self.orders.rows, &self.items.rows);
        let reconciliation = Reconciliation {
            orders: reconcile_aggregates(&aggregates, state.as_ref()),
            stats,
        };

        let discrepancies = classify(&reconciliation.orders, self.config.diff_threshold);
        let daily_match_rates = daily_match_rates(&reconciliation.orders);
        let daily_totals = daily_totals(&self.orders.rows, &self.items.rows);

        let quality = QualityReport::assess(
            &self.orders,
            &self.items,
            self.transactions.as_deref().unwrap_or_default(),
        );
        let category_sales = self.categories.as_ref().map(|categories| {
            category_sales(
                &self.orders.rows,
                &self.items.rows,
                categories,
                &OrderState::Completed,
            )
        });
        let alignment = self
            .transactions
            .as_ref()
            .map(|transactions| align(transactions, &aggregates));

        Report {
            aggregates,
            reconciliation,
            discrepancies,
            daily_match_rates,
            daily_totals,
            quality,
            category_sales,
            alignment,
        }
    }
}

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct Report {
    /// Per-order aggregates over every state, in input order
    pub aggregates: Vec<OrderAggregate>,
    pub reconciliation: Reconciliation,
    pub discrepancies: DiscrepancySummary,
    pub daily_match_rates: Vec<DailyMatchRate>,
    pub daily_totals: Vec<DailyTotals>,
    pub quality: QualityReport,
    pub category_sales: Option<Vec<CategorySales>>,
    pub alignment: Option<Alignment>,
}

/// Writes a header row and then one serialized row per record.
///
/// The header is written explicitly so that empty tables still carry one.
fn write_rows<W: Write, T: Serialize>(writer: W, header: &[&str], rows: &[T]) -> Result<()> {
    let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    csv_writer.write_record(header)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

impl Report {
    /// Overall share of eligible reconciled orders that match exactly.
    pub fn match_percent(&self) -> Option<u32> {
        round_percent(
            self.reconciliation.matching_count(),
            self.reconciliation.eligible_count(),
        )
    }

    /// Writes the reconciled orders, sorted by order id.
    pub fn write_reconciled<W: Write>(&self, writer: W) -> Result<()> {
        write_rows(
            writer,
            &[
                "id_order",
                "created_date",
                "state",
                "total_paid",
                "computed_total",
                "n_unique_products",
                "total_items_quantity",
                "match_flag",
            ],
            &self.reconciliation.orders,
        )
    }

    pub fn write_daily_match_rates<W: Write>(&self, writer: W) -> Result<()> {
        write_rows(
            writer,
            &["date", "state", "matching_count", "total_count", "percent_matching"],
            &self.daily_match_rates,
        )
    }

    /// Writes the discrepancies inside the threshold band.
    pub fn write_discrepancies<W: Write>(&self, writer: W) -> Result<()> {
        write_rows(
            writer,
            &[
                "id_order",
                "created_date",
                "state",
                "total_paid",
                "computed_total",
                "price_diff",
                "sign",
            ],
            &self.discrepancies.within_threshold,
        )
    }

    pub fn write_daily_totals<W: Write>(&self, writer: W) -> Result<()> {
        write_rows(
            writer,
            &[
                "date",
                "order_count",
                "order_total_paid",
                "item_count",
                "item_total_price",
            ],
            &self.daily_totals,
        )
    }

    pub fn write_quality<W: Write>(&self, writer: W) -> Result<()> {
        write_rows(writer, &["metric", "value"], &self.quality.observations())
    }

    pub fn write_category_sales<W: Write>(&self, writer: W, sales: &[CategorySales]) -> Result<()> {
        write_rows(
            writer,
            &["category", "quantity", "revenue", "quantity_share", "revenue_share"],
            sales,
        )
    }

    pub fn write_transactions<W: Write>(&self, writer: W, alignment: &Alignment) -> Result<()> {
        write_rows(
            writer,
            &[
                "position",
                "products",
                "id_order",
                "created_date",
                "total_paid",
                "computed_total",
                "total_items_quantity",
                "n_unique_products",
                "product_count_matches",
            ],
            &alignment.rows,
        )
    }

    /// Writes every output table into `dir`, creating it if needed.
    pub fn write_to_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let create = |name: &str| -> Result<BufWriter<File>> {
            Ok(BufWriter::new(File::create(dir.join(name))?))
        };

        self.write_reconciled(create("reconciled_orders.csv")?)?;
        self.write_daily_match_rates(create("daily_match_rates.csv")?)?;
        self.write_discrepancies(create("discrepancies.csv")?)?;
        self.write_daily_totals(create("daily_totals.csv")?)?;
        self.write_quality(create("quality.csv")?)?;
        if let Some(sales) = &self.category_sales {
            self.write_category_sales(create("category_sales.csv")?, sales)?;
        }
        if let Some(alignment) = &self.alignment {
            self.write_transactions(create("transactions_enriched.csv")?, alignment)?;
        }

        info!("Wrote output tables to {}", dir.display());
        Ok(())
    }

    /// Logs the headline numbers at info level.
    pub fn log_summary(&self) {
        let stats = &self.reconciliation.stats;
        info!(
            "{} orders, {} line items; {} orders without items ({:?}%), {} items without order ({:?}%)",
            stats.orders,
            stats.items,
            stats.orders_without_items,
            stats.orders_without_items_percent(),
            stats.items_without_order,
            stats.items_without_order_percent()
        );
        for (state, count) in &stats.orders_without_items_by_state {
            info!("  orders without items in state {}: {}", state, count);
        }
        if stats.overflowed_orders > 0 {
            warn!("{} orders with overflowing item sums", stats.overflowed_orders);
        }

        match self.match_percent() {
            Some(percent) => info!(
                "{} of {} eligible orders match exactly ({}%)",
                self.reconciliation.matching_count(),
                self.reconciliation.eligible_count(),
                percent
            ),
            None => info!("No eligible orders to compute a match rate"),
        }

        let d = &self.discrepancies;
        info!(
            "{} discrepancies: {} over, {} under, {} beyond +/-{}",
            d.count, d.over, d.under, d.beyond_threshold, d.threshold
        );
        if let Some(stats) = d.stats {
            info!(
                "price_diff min {} max {} mean {} median {}",
                stats.min, stats.max, stats.mean, stats.median
            );
        }

        if let Some(alignment) = &self.alignment {
            info!(
                "Transactions aligned: {} rows, consistent: {}",
                alignment.rows.len(),
                alignment.is_consistent()
            );
        }
    }

    /// Sum of `computed_total` over aggregates created on each day.
    ///
    /// A day whose sum overflows carries `None`.
    pub fn computed_total_by_day(&self) -> Vec<(NaiveDate, Option<Amount>)> {
        let mut by_day: BTreeMap<NaiveDate, Option<Amount>> = BTreeMap::new();
        for agg in &self.aggregates {
            if let Some(total) = agg.computed_total {
                let sum = by_day.entry(agg.created_day()).or_insert(Some(Amount::ZERO));
                *sum = sum.and_then(|s| s.checked_add(total));
            }
        }
        by_day.into_iter().collect()
    }
}
