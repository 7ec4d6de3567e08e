//! # Demo Seed
//!
//! Fills an empty database with a small catalogue and two parties for the
//! register binary to sell against.
//!
//! ## Usage
//! ```bash
//! cargo run -p till-db --bin seed
//! cargo run -p till-db --bin seed -- --db ./data/till.db
//! ```
//!
//! Every GST slab (0, 5, 12, 18, 28%) has at least one item, and two loose
//! goods carry fractional stock. Re-running on a populated file is a no-op.

use chrono::Utc;
use std::env;
use till_core::{Product, Quantity};
use till_db::repository::product::generate_product_id;
use till_db::{Database, DbConfig};

/// `(sku, name, price_cents, tax_rate_bps, stock_milli)`
const CATALOGUE: &[(&str, &str, i64, u32, i64)] = &[
    ("RICE-5KG", "Basmati Rice 5kg", 62500, 0, 40_000),
    ("ATTA-10KG", "Wheat Flour 10kg", 48000, 500, 25_000),
    ("GHEE-1L", "Cow Ghee 1L", 64000, 1200, 18_000),
    ("SOAP-100", "Bath Soap 100g", 4500, 1800, 120_000),
    ("SHMP-200", "Shampoo 200ml", 19900, 1800, 60_000),
    ("COLA-2L", "Cola 2L", 9500, 2800, 48_000),
    ("DAL-LOOSE", "Toor Dal (per kg)", 16000, 500, 32_750),
    ("SUGAR-LOOSE", "Sugar (per kg)", 4800, 500, 54_500),
];

const USAGE: &str = "\
Usage: seed [--db <PATH>]

  -d, --db <PATH>    SQLite file to populate (default: ./till_dev.db)
  -h, --help         Print this text";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut db_path = String::from("./till_dev.db");
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" | "-d" => match args.next() {
                Some(path) => db_path = path,
                None => return Err("--db needs a path".into()),
            },
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(());
            }
            other => eprintln!("ignoring unknown argument {other}"),
        }
    }

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("Seeding {db_path}");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("{existing} products already present, nothing to do");
        db.close().await;
        return Ok(());
    }

    let inserted = seed_catalogue(&db).await;
    let customer = db.parties().insert_customer("Walk-in Credit", Some("9800000001")).await?;
    let supplier = db.parties().insert_supplier("Metro Wholesale", Some("9800000002")).await?;

    println!("{inserted}/{} products", CATALOGUE.len());
    println!("customer {} = {}", customer.name, customer.id);
    println!("supplier {} = {}", supplier.name, supplier.id);

    db.close().await;
    Ok(())
}

/// Inserts the catalogue, skipping rows that fail. Returns how many landed.
async fn seed_catalogue(db: &Database) -> usize {
    let mut inserted = 0;
    for &(sku, name, price_cents, tax_rate_bps, stock_milli) in CATALOGUE {
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            sku: sku.to_string(),
            name: name.to_string(),
            price_cents,
            tax_rate_bps,
            stock: Quantity::from_milli(stock_milli),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        match db.products().insert(&product).await {
            Ok(_) => {
                inserted += 1;
                println!("  {sku:<12} {:>9} @ {} ({tax_rate_bps} bps)", product.stock, product.price());
            }
            Err(e) => eprintln!("  {sku:<12} skipped: {e}"),
        }
    }
    inserted
}
