//! # Seed Data Generator
//!
//! Populates a database with demo products, customers, entries and challans.
//! Every write goes through the ledger service, so the seeded database is
//! consistent by construction (`reconcile` should report no issues).
//!
//! ## Usage
//! ```bash
//! # Seed the configured database with 40 challans (default)
//! cargo run -p stockbook-db --bin seed
//!
//! # Custom amount and database path
//! cargo run -p stockbook-db --bin seed -- --challans 200 --db ./data/stock.db
//! ```
//!
//! ## Generated Data
//! - One product per (item, size) pair, each with its own packaging ratios
//! - A handful of customers
//! - One production entry per product per simulated day
//! - Challans of 1-4 lines spread across the customers

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use stockbook_core::{
    ChallanHeader, ChallanItemInput, ConversionRatios, EntryKind, NewEntry, NewProduct, Product,
    Unit, DEFAULT_OWNER_ID,
};
use stockbook_db::{init_tracing, Database, DbError, StockbookConfig};

/// Item names with (packets per linear, pieces per packet).
const ITEMS: &[(&str, f64, f64)] = &[
    ("PVC Pipe", 4.0, 10.0),
    ("Elbow", 0.0, 25.0),
    ("Tee Joint", 0.0, 20.0),
    ("Coupler", 0.0, 50.0),
    ("Conduit", 5.0, 12.0),
    ("End Cap", 0.0, 100.0),
];

const SIZES: &[&str] = &["20mm", "25mm", "32mm"];

const CUSTOMERS: &[&str] = &[
    "Sharma Traders",
    "Gupta Hardware",
    "Patel Sanitary Store",
    "New India Pipes",
    "Kumar Builders",
];

const TRANSPORTS: &[&str] = &["Tempo", "Self pickup", "Courier", "Truck"];

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut challans: usize = 40;
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--challans" | "-n" => {
                if i + 1 < args.len() {
                    match parse_challan_count(&args[i + 1]) {
                        Ok(n) => challans = n,
                        Err(e) => {
                            eprintln!("{}", e);
                            return Ok(ExitCode::from(2));
                        }
                    }
                    i += 1;
                }
            }
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
            "--help" | "-h" => {
                println!("Stockbook Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --challans <N>   Number of challans to issue (default: 40)");
                println!("  -d, --db <PATH>      Database file path (default: from config)");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
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

    let mut config = StockbookConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    init_tracing(&config.logging.filter);

    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    println!("🌱 Stockbook Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database.path.display());
    println!("Challans: {}", challans);
    println!();

    let db = Database::new(config.to_db_config()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count(DEFAULT_OWNER_ID).await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(ExitCode::SUCCESS);
    }

    let ledger = db.ledger(DEFAULT_OWNER_ID);
    let start = std::time::Instant::now();

    // Products
    let mut products: Vec<Product> = Vec::new();
    for (item_idx, (name, packets_per_linear, pieces_per_packet)) in ITEMS.iter().enumerate() {
        for (size_idx, size) in SIZES.iter().enumerate() {
            let seed = item_idx * SIZES.len() + size_idx;
            let product = ledger
                .create_product(NewProduct {
                    name: name.to_string(),
                    size: Some(size.to_string()),
                    ratios: ConversionRatios::new(*packets_per_linear, *pieces_per_packet),
                    initial_stock: (seed * 7 % 20) as f64,
                    initial_unit: Unit::Packet,
                })
                .await?;
            products.push(product);
        }
    }
    println!("✓ Created {} products", products.len());

    // Customers
    let mut customers = Vec::new();
    for name in CUSTOMERS {
        customers.push(ledger.create_party(name).await?);
    }
    println!("✓ Created {} customers", customers.len());

    // Production
    let mut produced = 0;
    for (seed, product) in products.iter().enumerate() {
        let (quantity, unit) = if product.ratios().is_complete() {
            ((seed % 5 + 2) as f64, Unit::Linear)
        } else {
            ((seed % 8 + 4) as f64, Unit::Packet)
        };
        ledger
            .create_entry(NewEntry {
                product_id: product.id.clone(),
                kind: EntryKind::Produce,
                quantity,
                unit,
                date: None,
                note: Some("Opening production run".to_string()),
            })
            .await?;
        produced += 1;
    }
    println!("✓ Recorded {} production entries", produced);

    // Challans
    let mut issued = 0;
    let mut skipped = 0;
    for seed in 0..challans {
        let customer = &customers[seed % customers.len()];
        let lines = seed % 4 + 1;
        let items: Vec<ChallanItemInput> = (0..lines)
            .map(|line| {
                let product = &products[(seed * 5 + line * 3) % products.len()];
                ChallanItemInput {
                    product_id: product.id.clone(),
                    quantity: ((seed + line) % 9 + 1) as f64,
                    unit: Unit::Piece,
                }
            })
            .collect();

        let header = ChallanHeader {
            transport: Some(TRANSPORTS[seed % TRANSPORTS.len()].to_string()),
            ..Default::default()
        };

        match ledger.save_challan(&customer.id, header, &items).await {
            Ok(doc) => {
                issued += 1;
                if issued % 10 == 0 {
                    println!("  Issued challan {}...", doc.challan.challan_number);
                }
            }
            // Demo stock runs out eventually; that is expected.
            Err(DbError::Domain(e)) => {
                skipped += 1;
                tracing::debug!(error = %e, "Challan skipped");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Issued {} challans ({} skipped for stock) in {:?}", issued, skipped, elapsed);

    let report = ledger.audit().await?;
    println!(
        "✓ Audit: {} products, {} entries, {} challans, {} issues",
        report.products_checked,
        report.entries_checked,
        report.challans_checked,
        report.issues.len()
    );

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(ExitCode::SUCCESS)
}

fn parse_challan_count(value: &str) -> Result<usize, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid --challans value '{}': expected a whole number", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challan_count_rejects_garbage() {
        assert_eq!(parse_challan_count("200"), Ok(200));
        assert_eq!(parse_challan_count(" 0 "), Ok(0));
        assert!(parse_challan_count("abc").is_err());
        assert!(parse_challan_count("-3").is_err());
        assert!(parse_challan_count("").is_err());
    }
}
