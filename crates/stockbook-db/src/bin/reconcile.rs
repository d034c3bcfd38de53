//! # Ledger Reconciliation
//!
//! Runs the consistency audit and prints what it found.
//!
//! ## Usage
//! ```bash
//! # Human-readable report for the configured database
//! cargo run -p stockbook-db --bin reconcile
//!
//! # Machine-readable report
//! cargo run -p stockbook-db --bin reconcile -- --json
//!
//! # Reset every drifted product to its ledger total
//! cargo run -p stockbook-db --bin reconcile -- --db ./data/stock.db --fix
//! ```
//!
//! Exits with status 1 when issues remain, so it can gate backups or CI.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use stockbook_core::audit::{ConsistencyIssue, ConsistencyReport};
use stockbook_core::validation::validate_uuid;
use stockbook_core::DEFAULT_OWNER_ID;
use stockbook_db::{init_tracing, Database, StockbookConfig};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut owner_id = DEFAULT_OWNER_ID.to_string();
    let mut json = false;
    let mut fix = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--owner" => {
                if i + 1 < args.len() {
                    owner_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--json" => json = true,
            "--fix" => fix = true,
            "--help" | "-h" => {
                println!("Stockbook Ledger Reconciliation");
                println!();
                println!("Usage: reconcile [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: from config)");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("      --owner <ID>     Owner to audit (default: the single-owner id)");
                println!("      --json           Print the report as JSON");
                println!("      --fix            Repair quantity drift, then audit again");
                println!("  -h, --help           Show this help message");
                return Ok(ExitCode::SUCCESS);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                return Ok(ExitCode::from(2));
            }
        }
        i += 1;
    }

    if let Err(e) = validate_uuid("owner", &owner_id) {
        eprintln!("{}", e);
        return Ok(ExitCode::from(2));
    }

    let mut config = StockbookConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    init_tracing(&config.logging.filter);

    let db = Database::new(config.to_db_config()).await?;
    let ledger = db.ledger(owner_id);

    let mut report = ledger.audit().await?;

    if fix {
        let drifted: Vec<String> = report
            .issues
            .iter()
            .filter_map(ConsistencyIssue::drifted_product)
            .map(str::to_string)
            .collect();

        for product_id in &drifted {
            let change = ledger.repair_drift(product_id).await?;
            if !json {
                println!(
                    "fixed  {}: {} → {} pieces",
                    product_id, change.before, change.after
                );
            }
        }

        if !drifted.is_empty() {
            report = ledger.audit().await?;
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&config.database.path, &report);
    }

    db.close().await;

    Ok(if report.is_consistent() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(path: &std::path::Path, report: &ConsistencyReport) {
    println!("Stockbook Ledger Audit");
    println!("======================");
    println!("Database: {}", path.display());
    println!(
        "Checked:  {} products, {} entries, {} challans",
        report.products_checked, report.entries_checked, report.challans_checked
    );
    println!();

    if report.is_consistent() {
        println!("✓ Ledger is consistent");
        return;
    }

    for issue in &report.issues {
        match issue {
            ConsistencyIssue::QuantityDrift {
                product_id,
                product_name,
                stored,
                expected,
            } => println!(
                "drift     {} ({}): stored {}, ledger says {}",
                product_name, product_id, stored, expected
            ),
            ConsistencyIssue::OrphanedEntry {
                entry_id,
                product_id,
            } => println!("orphan    entry {} → missing product {}", entry_id, product_id),
            ConsistencyIssue::ChallanItemMismatch {
                challan_id,
                item_id,
                reason,
                ..
            } => println!("item      challan {} item {}: {}", challan_id, item_id, reason),
            ConsistencyIssue::ChallanTotalMismatch {
                challan_id,
                stored,
                expected,
            } => println!(
                "total     challan {}: stored {}, lines add up to {}",
                challan_id, stored, expected
            ),
        }
    }

    println!();
    println!("⚠ {} issue(s) found", report.issues.len());
}
