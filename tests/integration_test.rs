//! Integration tests for the order-recon CLI.
//!
//! These tests run the actual binary and verify output against expected CSV files.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get path to test data file
fn test_data_path(filename: &str) -> String {
    format!("tests/data/{}", filename)
}

/// Run the binary on the fixture tables and return stdout
fn run_recon(extra_args: &[&str]) -> String {
    let mut cmd = Command::cargo_bin("order-recon").unwrap();
    let assert = cmd
        .arg(test_data_path("orders.csv"))
        .arg(test_data_path("lineitems.csv"))
        .args(extra_args)
        .assert()
        .success();
    String::from_utf8(assert.get_output().stdout.clone()).unwrap()
}

/// Normalize CSV for comparison (trim whitespace, drop blank lines)
fn normalize_csv(csv: &str) -> Vec<String> {
    csv.lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Write a config file into `dir` that sends outputs to `dir/out`
fn write_config(dir: &Path, extra: &str) -> String {
    let out = dir.join("out");
    let config = format!("output_dir = {:?}\n{}", out.to_str().unwrap(), extra);
    let path = dir.join("recon.toml");
    fs::write(&path, config).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_reconciled_table_on_stdout() {
    let output = run_recon(&[]);
    let expected = fs::read_to_string(test_data_path("expected_reconciled.csv")).unwrap();

    assert_eq!(normalize_csv(&output), normalize_csv(&expected));
}

#[test]
fn test_output_dir_tables() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    let output = run_recon(&[&config]);
    assert!(output.is_empty());

    let out = dir.path().join("out");
    let reconciled = fs::read_to_string(out.join("reconciled_orders.csv")).unwrap();
    let expected = fs::read_to_string(test_data_path("expected_reconciled.csv")).unwrap();
    assert_eq!(normalize_csv(&reconciled), normalize_csv(&expected));

    let rates = fs::read_to_string(out.join("daily_match_rates.csv")).unwrap();
    let expected = fs::read_to_string(test_data_path("expected_daily_match_rates.csv")).unwrap();
    assert_eq!(normalize_csv(&rates), normalize_csv(&expected));

    let discrepancies = fs::read_to_string(out.join("discrepancies.csv")).unwrap();
    let lines = normalize_csv(&discrepancies);
    assert_eq!(lines.len(), 2, "only the 6.99 difference is within +/-30");
    assert!(lines[1].starts_with("241423,"));
    assert!(lines[1].ends_with(",6.9900,over"));

    let quality = fs::read_to_string(out.join("quality.csv")).unwrap();
    assert!(quality.contains("negative_unit_price,1"));
    assert!(quality.contains("null_total_paid[Pending],1"));
    assert!(quality.contains("zero_total_paid[Shopping Basket],1"));

    assert!(out.join("daily_totals.csv").exists());
    assert!(!out.join("category_sales.csv").exists());
    assert!(!out.join("transactions_enriched.csv").exists());
}

#[test]
fn test_wider_threshold_keeps_more_discrepancies() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "diff_threshold = \"50\"\n");
    run_recon(&[&config]);

    let discrepancies =
        fs::read_to_string(dir.path().join("out").join("discrepancies.csv")).unwrap();
    assert_eq!(normalize_csv(&discrepancies).len(), 3);
}

#[test]
fn test_reference_tables() {
    let dir = TempDir::new().unwrap();
    let extra = format!(
        "transactions = {:?}\ncategories = {:?}\n",
        test_data_path("trans.csv"),
        test_data_path("product_categories.csv")
    );
    let config = write_config(dir.path(), &extra);
    run_recon(&[&config]);

    let out = dir.path().join("out");
    let enriched = fs::read_to_string(out.join("transactions_enriched.csv")).unwrap();
    let lines = normalize_csv(&enriched);
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("0,APP2|APP3,242832,"));
    assert!(lines[1].ends_with(",true"));
    assert!(lines[2].starts_with("1,APP5|APP6,245275,"));

    let sales = fs::read_to_string(out.join("category_sales.csv")).unwrap();
    assert!(sales.contains("Accessories,"));
    assert!(sales.contains("Smartwatch,"));
    assert!(sales.contains("Laptop,"));
    assert!(!sales.contains("ExtendedWarranty"));
}

#[test]
fn test_all_states() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "state = \"\"\n");
    run_recon(&[&config]);

    let rates = fs::read_to_string(dir.path().join("out").join("daily_match_rates.csv")).unwrap();
    assert!(rates.contains("2017-01-02,Cancelled,1,1,100"));
}

#[test]
fn test_missing_file_error() {
    let mut cmd = Command::cargo_bin("order-recon").unwrap();
    cmd.arg("nonexistent.csv")
        .arg(test_data_path("lineitems.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("error").or(predicate::str::contains("Error")));
}

#[test]
fn test_missing_argument_error() {
    let mut cmd = Command::cargo_bin("order-recon").unwrap();
    cmd.arg(test_data_path("orders.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing input file"));
}

#[test]
fn test_bad_timestamp_halts_without_output() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    let mut cmd = Command::cargo_bin("order-recon").unwrap();
    cmd.arg(test_data_path("orders_bad_timestamp.csv"))
        .arg(test_data_path("lineitems.csv"))
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Unparseable timestamp '06/11/2017'"));

    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_missing_column_error() {
    let mut cmd = Command::cargo_bin("order-recon").unwrap();
    cmd.arg(test_data_path("orders_missing_column.csv"))
        .arg(test_data_path("lineitems.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required column 'total_paid'"));
}

#[test]
fn test_line_items_bad_timestamp_halts_without_output() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    let mut cmd = Command::cargo_bin("order-recon").unwrap();
    cmd.arg(test_data_path("orders.csv"))
        .arg(test_data_path("lineitems_bad_timestamp.csv"))
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(
            "Unparseable timestamp '31.12.2017' in line items at row 3",
        ));

    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_line_items_missing_column_error() {
    let mut cmd = Command::cargo_bin("order-recon").unwrap();
    cmd.arg(test_data_path("orders.csv"))
        .arg(test_data_path("lineitems_missing_column.csv"))
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(
            "Missing required column 'date' in line items",
        ));
}

#[test]
fn test_invalid_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("recon.toml");
    fs::write(&path, "diff_threshold = [").unwrap();

    let mut cmd = Command::cargo_bin("order-recon").unwrap();
    cmd.arg(test_data_path("orders.csv"))
        .arg(test_data_path("lineitems.csv"))
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}
