//! Order reconciliation CLI
//!
//! Reads the orders and line items tables, reconciles them and writes the
//! output tables.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- orders.csv lineitems.csv [recon.toml] > reconciled.csv
//! ```
//!
//! Without an `output_dir` in the config file, the reconciled orders table
//! is written to stdout. With one, every output table is written there.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `info` for the run summary, `debug` or `warn` for row detail

use order_recon::{EngineError, ReconConfig, ReconciliationEngine, Result};
use std::env;
use std::io;
use std::path::Path;
use std::process;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        return Err(EngineError::MissingArgument);
    }

    let config = match args.get(3) {
        Some(path) => ReconConfig::from_file(path)?,
        None => ReconConfig::default(),
    };

    let mut engine = ReconciliationEngine::new(config);
    engine.load_files(Path::new(&args[1]), Path::new(&args[2]))?;

    let report = engine.run();
    report.log_summary();

    match &engine.config().output_dir {
        Some(dir) => report.write_to_dir(dir)?,
        None => {
            let stdout = io::stdout();
            let handle = stdout.lock();
            report.write_reconciled(handle)?;
        }
    }

    Ok(())
}
