//! # Seed Data Generator
//!
//! Populates a database with an online shop, a few physical shops, a
//! catalog and stock for development.
//!
//! ## Usage
//! ```bash
//! # 40 items (default)
//! cargo run -p emporium-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p emporium-db --bin seed -- --count 200 --db ./data/emporium.db
//! ```
//!
//! ## Generated Data
//! - One online shop stocked with every item (the warehouse)
//! - Three physical shops, each stocking a slice of the catalog
//! - Buy prices $0.50 - $20.49, sell prices 130-170% of buy

use chrono::{NaiveDate, Utc};
use emporium_core::{Inventory, Item, LocationKind, Shop};
use emporium_db::{Database, DbConfig};
use std::env;
use uuid::Uuid;

const PHYSICAL_SHOPS: &[(&str, &str)] = &[
    ("Harbour Street", "12 Harbour St"),
    ("Market Hall", "1 Market Sq"),
    ("Station Kiosk", "Platform 2, Central Station"),
];

const PRODUCTS: &[(&str, &str)] = &[
    ("Ceramic Mug", "kitchen"),
    ("Tea Towel", "kitchen"),
    ("Espresso Beans", "grocery"),
    ("Loose Leaf Tea", "grocery"),
    ("Dark Chocolate", "grocery"),
    ("Notebook", "stationery"),
    ("Fountain Pen", "stationery"),
    ("Tote Bag", "accessories"),
    ("Wool Scarf", "accessories"),
    ("Scented Candle", "home"),
];

const VARIANTS: &[&str] = &["Classic", "Deluxe", "Mini", "Limited"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 40;
    let mut db_path = String::from("./emporium_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(40);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Emporium Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of items to generate (default: 40)");
                println!("  -d, --db <PATH>    Database file path (default: ./emporium_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Emporium Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!("Items:    {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if db.shops().online_shop().await?.is_some() {
        println!("⚠ Database already has an online shop");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let online = shop("Emporium Online", LocationKind::Online, None);
    db.shops().insert(&online).await?;
    println!("✓ Created online shop {}", online.id);

    let mut physical = Vec::new();
    for (name, address) in PHYSICAL_SHOPS {
        let shop = shop(name, LocationKind::Physical, Some(address));
        db.shops().insert(&shop).await?;
        physical.push(shop);
    }
    println!("✓ Created {} physical shops", physical.len());

    println!();
    println!("Generating items...");

    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for (product_idx, (product, category)) in PRODUCTS.iter().enumerate() {
        for (variant_idx, variant) in VARIANTS.iter().enumerate() {
            if generated >= count {
                break 'outer;
            }
            let seed = product_idx * VARIANTS.len() + variant_idx;
            let item = generate_item(product, variant, category, seed);

            if let Err(e) = db.items().insert(&item).await {
                eprintln!("Failed to insert {}: {}", item.name, e);
                continue;
            }

            let sell_price = item.buy_price_cents * (130 + (seed % 5) as i64 * 10) / 100;

            // the online shop carries everything
            db.inventory()
                .insert(&stock(&online, &item, 20 + (seed % 80) as i64, sell_price))
                .await?;

            // each physical shop carries every third item, offset by shop
            for (shop_idx, shop) in physical.iter().enumerate() {
                if seed % 3 == shop_idx {
                    db.inventory()
                        .insert(&stock(shop, &item, (seed % 12) as i64, sell_price))
                        .await?;
                }
            }

            generated += 1;
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} items in {:?}", generated, elapsed);

    let online_rows = db.inventory().list_for_shop(&online.id).await?;
    println!("  Online inventory rows: {}", online_rows.len());
    for shop in &physical {
        let rows = db.inventory().list_for_shop(&shop.id).await?;
        println!("  {} inventory rows: {}", shop.name, rows.len());
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn shop(name: &str, kind: LocationKind, address: Option<&str>) -> Shop {
    let now = Utc::now();
    Shop {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        contact_number: "+1 555 0100".to_string(),
        location_kind: kind,
        address: address.map(str::to_string),
        owner_id: None,
        created_at: now,
        updated_at: now,
    }
}

/// Generates a single item with deterministic, realistic data.
fn generate_item(product: &str, variant: &str, category: &str, seed: usize) -> Item {
    Item {
        id: Uuid::new_v4().to_string(),
        name: format!("{} {}", product, variant),
        // $0.50 - $20.49
        buy_price_cents: 50 + ((seed * 137) % 2000) as i64,
        production_date: NaiveDate::from_ymd_opt(2026, 1 + (seed % 12) as u32, 1 + (seed % 28) as u32),
        description: None,
        categories: vec![category.to_string()],
        created_at: Utc::now(),
    }
}

fn stock(shop: &Shop, item: &Item, quantity: i64, sell_price_cents: i64) -> Inventory {
    let now = Utc::now();
    Inventory {
        id: Uuid::new_v4().to_string(),
        shop_id: shop.id.clone(),
        item_id: item.id.clone(),
        quantity,
        sell_price_cents,
        created_at: now,
        updated_at: now,
    }
}
