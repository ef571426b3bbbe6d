use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

mod config;
mod domain;
mod metrics;
mod store;
mod utils;

use config::AppConfig;
use domain::actor::Actor;
use domain::catalog::{Product, Vendor};
use domain::order::{CreateOrder, OrderLine, OrderManager, OrderStatus, PageRequest};
use domain::payment::{PaymentMethod, SimulatedGateway};
use domain::reporting::{AnalyticsPeriod, ReportService};
use store::{Catalog, InMemoryStore, OrderStore, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,marketplace_orders=debug"))
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "No .env file loaded");
    }
    let config = AppConfig::from_env()?;

    tracing::info!(
        currency = %config.orders.currency,
        tax_rate = %config.orders.tax_rate,
        "Starting marketplace order core"
    );

    // === 1. Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 2. Storage and catalog ===
    let vendor = Vendor::new("Al-Noor Crafts", Decimal::new(10, 2));
    let lantern = Product::new(vendor.id, "Brass lantern", Decimal::new(5000, 2), 25);
    let rug = Product::new(vendor.id, "Wool rug", Decimal::new(32000, 2), 4);

    let (orders, catalog, backend): (Arc<dyn OrderStore>, Arc<dyn Catalog>, &'static str) = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to Postgres...");
            let pg = PgStore::connect(url, config.database_max_connections).await?;
            pg.migrate().await?;
            pg.seed_catalog(&[vendor.clone()], &[lantern.clone(), rug.clone()]).await?;
            let pg = Arc::new(pg);
            (pg.clone() as Arc<dyn OrderStore>, pg as Arc<dyn Catalog>, "postgres")
        }
        None => {
            tracing::info!("DATABASE_URL not set, using the in-memory store");
            let memory = Arc::new(InMemoryStore::new());
            memory.add_vendor(vendor.clone()).await;
            memory.add_product(lantern.clone()).await;
            memory.add_product(rug.clone()).await;
            (memory.clone() as Arc<dyn OrderStore>, memory as Arc<dyn Catalog>, "memory")
        }
    };

    // Metrics HTTP server runs on its own runtime
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    let info = metrics::ServiceInfo::new(backend);
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Failed to start metrics runtime: {}", e);
                return;
            }
        };
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(metrics_registry, info, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    let manager = OrderManager::new(orders.clone(), catalog.clone(), metrics.clone(), config.orders.clone());
    let payments = manager.payments();
    let reports = ReportService::new(orders, catalog, metrics.clone(), config.orders.currency.clone());

    // === 3. Demonstrate the order lifecycle ===
    let customer_id = Uuid::new_v4();
    let customer = Actor::Customer(customer_id);
    let seller = Actor::Vendor(vendor.id);

    let order = manager
        .create_order(
            customer,
            CreateOrder::new(customer_id, vec![OrderLine::new(lantern.id, 2), OrderLine::new(rug.id, 1)])
                .with_shipping_cost(Decimal::new(2500, 2))
                .with_shipping_address(serde_json::json!({
                    "street": "King Fahd Rd",
                    "city": "Riyadh",
                    "country": "SA"
                }))
                .with_billing_address(serde_json::json!({
                    "street": "Olaya St",
                    "city": "Riyadh",
                    "country": "SA"
                }))
                .with_notes("Leave at reception"),
        )
        .await?;
    tracing::info!(
        order_number = %order.order_number,
        subtotal = %order.subtotal,
        tax = %order.tax_amount,
        total = %order.total_amount,
        "Order placed"
    );

    let receipt = payments
        .process_payment(customer, order.id, PaymentMethod::CreditCard, &SimulatedGateway)
        .await?;
    tracing::info!(reference = ?receipt.payment.reference_id, "Order paid");

    for status in [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered] {
        let updated = manager.update_order_status(seller, order.id, status).await?;
        tracing::info!(order_number = %updated.order_number, status = %updated.status, "Order advanced");
    }

    // A second order the customer changes their mind about
    let second = manager
        .create_order(customer, CreateOrder::new(customer_id, vec![OrderLine::new(lantern.id, 1)]))
        .await?;
    let cancelled = manager
        .cancel_order(customer, second.id, Some("Ordered by mistake".to_string()))
        .await?;
    tracing::info!(order_number = %cancelled.order_number, status = %cancelled.status, "Order cancelled");

    if let Err(e) = manager.cancel_order(customer, order.id, None).await {
        tracing::info!(error = %e, kind = ?e.kind(), "Delivered order stays delivered");
    }

    let history = manager.user_orders(customer, customer_id, None, PageRequest::default()).await?;
    tracing::info!(orders = history.total, pages = history.last_page(), "Customer history");

    let tracking = manager.track_order(customer, order.id).await?;
    tracing::info!(tracking = %serde_json::to_string(&tracking)?, "Tracking");

    // === 4. Reports ===
    let vendor_report = reports.vendor_report(seller, vendor.id, None).await?;
    tracing::info!(report = %serde_json::to_string(&vendor_report)?, "Vendor report");

    let analytics = reports.vendor_analytics(seller, vendor.id, AnalyticsPeriod::Monthly).await?;
    tracing::info!(analytics = %serde_json::to_string(&analytics)?, "Vendor analytics");

    let now = chrono::Utc::now();
    let sales = reports.sales_report(Actor::Admin, now - Duration::days(30), now).await?;
    tracing::info!(report = %serde_json::to_string(&sales)?, "Sales report");

    tracing::info!("Demo complete");

    Ok(())
}
