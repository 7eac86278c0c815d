//! # Seed Data Generator
//!
//! Fills a development database with one client, a weekly schedule and a
//! day of ledger activity so the scheduler has something to open, close and
//! reconcile.
//!
//! ## Usage
//! ```bash
//! cargo run -p caja-db --bin seed -- --db ./caja_dev.db --client demo
//! ```

use std::env;

use chrono::{Duration, Utc};
use uuid::Uuid;

use caja_core::ledger::{
    CashMovement, Customer, DebtPayment, Expense, MovementKind, Order, OrderStatus, Payment,
    Product, Vendor,
};
use caja_core::{ClientConfigDefaults, Currency, NewSchedulePeriod};
use caja_db::{Database, DbConfig};

/// (name, commission bps)
const VENDORS: &[(&str, u32)] = &[("Lucía", 1500), ("Martín", 1000), ("Sofía", 500)];

const PRODUCTS: &[&str] = &["Yerba 1kg", "Café molido", "Alfajores x12", "Dulce de leche"];

const CUSTOMERS: &[&str] = &["Kiosco Norte", "Almacén Ramos", "Cliente mostrador"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./caja_dev.db");
    let mut client_id = String::from("demo");
    let mut orders: usize = 40;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--client" | "-c" => {
                if i + 1 < args.len() {
                    client_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--orders" | "-o" => {
                if i + 1 < args.len() {
                    orders = args[i + 1].parse().unwrap_or(40);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Caja Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./caja_dev.db)");
                println!("  -c, --client <ID>    Client id to create (default: demo)");
                println!("  -o, --orders <N>     Orders to generate for today (default: 40)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Caja Seed Data Generator");
    println!("========================");
    println!("Database: {}", db_path);
    println!("Client:   {}", client_id);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if db.clients().get(&client_id).await?.is_some() {
        println!("⚠ Client {} already exists", client_id);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    db.clients().insert(&client_id, "Demo Shop").await?;
    let config = db
        .schedules()
        .get_client_config(&client_id, &ClientConfigDefaults::default())
        .await?;
    println!("✓ Client config created ({})", config.timezone);

    // Weekdays 09:00-18:00, Saturday mornings 10:00-14:00
    let weekdays = db
        .schedules()
        .create_schedule_periods(&NewSchedulePeriod {
            client_id: client_id.clone(),
            days: "1,2,3,4,5".to_string(),
            label: "Horario comercial".to_string(),
            open_hour: 9,
            open_minute: 0,
            close_hour: 18,
            close_minute: 0,
            auto_open_enabled: true,
            auto_close_enabled: true,
            priority: 0,
        })
        .await?;
    let saturday = db
        .schedules()
        .create_schedule_periods(&NewSchedulePeriod {
            client_id: client_id.clone(),
            days: "6".to_string(),
            label: "Sábado".to_string(),
            open_hour: 10,
            open_minute: 0,
            close_hour: 14,
            close_minute: 0,
            auto_open_enabled: true,
            auto_close_enabled: true,
            priority: 0,
        })
        .await?;
    println!("✓ Created {} schedule periods", weekdays.len() + saturday.len());

    let ledger = db.ledger();
    let now = Utc::now();

    let mut vendor_ids = Vec::new();
    for (name, bps) in VENDORS {
        let vendor = Vendor {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.clone(),
            name: name.to_string(),
            commission_rate_bps: *bps,
            is_active: true,
        };
        ledger.insert_vendor(&vendor).await?;
        vendor_ids.push(vendor.id);
    }

    let mut product_ids = Vec::new();
    for name in PRODUCTS {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.clone(),
            name: name.to_string(),
            is_active: true,
        };
        ledger.insert_product(&product).await?;
        product_ids.push(product.id);
    }

    let mut customer_ids = Vec::new();
    for name in CUSTOMERS {
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.clone(),
            name: name.to_string(),
        };
        ledger.insert_customer(&customer).await?;
        customer_ids.push(customer.id);
    }
    println!(
        "✓ Created {} vendors, {} products, {} customers",
        vendor_ids.len(),
        product_ids.len(),
        customer_ids.len()
    );

    let start = std::time::Instant::now();
    for n in 0..orders {
        let created_at = now - Duration::minutes((n * 7) as i64 % 480);
        let status = match n % 10 {
            0 => OrderStatus::Cancelled,
            1 => OrderStatus::Pending,
            _ => OrderStatus::Completed,
        };
        let total_cents = 1_500 + ((n * 379) % 9_000) as i64;

        let order = Order {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.clone(),
            vendor_id: Some(vendor_ids[n % vendor_ids.len()].clone()),
            customer_id: Some(customer_ids[n % customer_ids.len()].clone()),
            product_id: Some(product_ids[n % product_ids.len()].clone()),
            total_cents,
            currency: Currency::Usd,
            status,
            created_at,
        };
        ledger.insert_order(&order).await?;

        if status == OrderStatus::Completed {
            ledger
                .insert_payment(&Payment {
                    id: Uuid::new_v4().to_string(),
                    client_id: client_id.clone(),
                    order_id: Some(order.id.clone()),
                    amount_cents: total_cents,
                    currency: Currency::Usd,
                    method: if n % 3 == 0 { "card" } else { "cash" }.to_string(),
                    created_at,
                })
                .await?;
        }
    }

    ledger
        .insert_expense(&Expense {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.clone(),
            description: "Limpieza".to_string(),
            amount_cents: 2_500,
            currency: Currency::Usd,
            created_at: now,
        })
        .await?;
    ledger
        .insert_debt_payment(&DebtPayment {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.clone(),
            customer_id: Some(customer_ids[0].clone()),
            amount_cents: 4_000,
            currency: Currency::Usd,
            created_at: now,
        })
        .await?;
    ledger
        .insert_cash_movement(&CashMovement {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.clone(),
            cash_register_id: None,
            kind: MovementKind::Income,
            amount_cents: 10_000,
            currency: Currency::Usd,
            description: "Fondo de caja".to_string(),
            created_at: now,
        })
        .await?;

    println!();
    println!("✓ Generated {} orders in {:?}", orders, start.elapsed());
    println!();
    println!("✓ Seed complete!");

    Ok(())
}
