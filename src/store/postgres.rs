use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::catalog::{Product, Vendor};
use crate::domain::order::{DateRange, Order, OrderItem, OrderStatus, Page, PageRequest, PaymentStatus};
use crate::domain::payment::Payment;

use super::{Catalog, OrderStore, StoreError};

// ============================================================================
// Postgres Store - orders, items, payments and the catalog tables
// ============================================================================
//
// Responsibilities:
// 1. Insert orders with their items and stock reservation in one transaction
// 2. Compare-and-set status updates (WHERE status = expected)
// 3. Cancel + restock in one transaction
// 4. Map rows to domain types explicitly, rejecting unknown enum labels
//
// ============================================================================

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, payment_status, subtotal, tax_amount, \
     shipping_cost, discount_amount, total_amount, currency, shipping_address, billing_address, notes, \
     cancellation_reason, cancelled_at, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, vendor_id, quantity, unit_price, total_price, status, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Loads catalog rows for local runs; existing ids are left untouched.
    pub async fn seed_catalog(&self, vendors: &[Vendor], products: &[Product]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for vendor in vendors {
            sqlx::query(
                "INSERT INTO vendors (id, business_name, commission_rate, is_active) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(vendor.id)
            .bind(&vendor.business_name)
            .bind(vendor.commission_rate)
            .bind(vendor.is_active)
            .execute(&mut *tx)
            .await?;
        }

        for product in products {
            sqlx::query(
                "INSERT INTO products (id, vendor_id, name, price, stock, status) VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(product.id)
            .bind(product.vendor_id)
            .bind(&product.name)
            .bind(product.price)
            .bind(product.stock)
            .bind(product.status.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>, StoreError> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY created_at, id"
        ))
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let item = OrderItem::try_from(row)?;
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }

    async fn hydrate(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.load_items(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect()
    }

    async fn hydrate_one(&self, row: Option<OrderRow>) -> Result<Option<Order>, StoreError> {
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

/// Takes `quantity` units of a product, failing when the stock would go
/// negative. The guard in the WHERE clause makes concurrent reservations safe.
async fn reserve_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), StoreError> {
    let reserved: Option<(i32,)> =
        sqlx::query_as("UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2 RETURNING stock")
            .bind(product_id)
            .bind(quantity)
            .fetch_optional(&mut **tx)
            .await?;

    if reserved.is_some() {
        return Ok(());
    }

    let available: Option<(i32,)> = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await?;

    Err(StoreError::InsufficientStock {
        product_id,
        requested: quantity,
        available: available.map(|(stock,)| stock).unwrap_or(0),
    })
}

fn map_insert_error(error: sqlx::Error, order_number: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &error {
        if db_err.is_unique_violation() && db_err.constraint() == Some("orders_order_number_key") {
            return StoreError::DuplicateOrderNumber(order_number.to_string());
        }
    }
    StoreError::Database(error)
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, order_number, user_id, status, payment_status, subtotal, tax_amount, \
             shipping_cost, discount_amount, total_amount, currency, shipping_address, billing_address, notes, \
             cancellation_reason, cancelled_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.subtotal)
        .bind(order.tax_amount)
        .bind(order.shipping_cost)
        .bind(order.discount_amount)
        .bind(order.total_amount)
        .bind(&order.currency)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(&order.notes)
        .bind(&order.cancellation_reason)
        .bind(order.cancelled_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, &order.order_number))?;

        // Fixed lock order across concurrent checkouts.
        let mut reserved: BTreeMap<Uuid, i32> = BTreeMap::new();
        for item in &order.items {
            *reserved.entry(item.product_id).or_insert(0) += item.quantity;
        }
        for (product_id, quantity) in reserved {
            reserve_stock(&mut tx, product_id, quantity).await?;
        }

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, vendor_id, quantity, unit_price, total_price, \
                 status, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(item.vendor_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total_price)
            .bind(item.status.as_str())
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        self.hydrate_one(row).await
    }

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"))
                .bind(order_number)
                .fetch_optional(&self.pool)
                .await?;
        self.hydrate_one(row).await
    }

    async fn update_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE orders SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2")
            .bind(order_id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_payment_status(
        &self,
        order_id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET payment_status = $3, updated_at = $4 WHERE id = $1 AND payment_status = $2",
        )
        .bind(order_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let cancelled = sqlx::query(
            "UPDATE orders SET status = 'cancelled', cancellation_reason = $2, cancelled_at = $3, updated_at = $3 \
             WHERE id = $1 AND status NOT IN ('cancelled', 'delivered')",
        )
        .bind(order_id)
        .bind(reason)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        if cancelled.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE order_items SET status = 'cancelled' WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE products p SET stock = p.stock + r.quantity \
             FROM (SELECT product_id, SUM(quantity)::INT AS quantity FROM order_items \
                   WHERE order_id = $1 GROUP BY product_id) r \
             WHERE p.id = r.product_id",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn record_payment(
        &self,
        payment: &Payment,
        expected: PaymentStatus,
        status: PaymentStatus,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let moved = sqlx::query(
            "UPDATE orders SET payment_status = $3, updated_at = $4 WHERE id = $1 AND payment_status = $2",
        )
        .bind(payment.order_id)
        .bind(expected.as_str())
        .bind(status.as_str())
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        if moved.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO payments (id, order_id, amount, currency, method, reference_id, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.method.as_str())
        .bind(&payment.reference_id)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            "SELECT id, order_id, amount, currency, method, reference_id, status, created_at \
             FROM payments WHERE order_id = $1 ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn list_user_orders(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, StoreError> {
        let status = status.map(|s| s.as_str());

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(status)
        .bind(i64::from(page.per_page))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items: self.hydrate(rows).await?,
            page: page.page,
            per_page: page.per_page,
            total: total as u64,
        })
    }

    async fn list_vendor_items(&self, vendor_id: Uuid, page: PageRequest) -> Result<Page<OrderItem>, StoreError> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM order_items WHERE vendor_id = $1")
            .bind(vendor_id)
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE vendor_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(vendor_id)
        .bind(i64::from(page.per_page))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items: rows.into_iter().map(OrderItem::try_from).collect::<Result<_, _>>()?,
            page: page.page,
            per_page: page.per_page,
            total: total as u64,
        })
    }

    async fn orders_created_between(&self, range: DateRange) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE created_at BETWEEN $1 AND $2"
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn vendor_orders(&self, vendor_id: Uuid, range: Option<DateRange>) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE EXISTS \
             (SELECT 1 FROM order_items i WHERE i.order_id = o.id AND i.vendor_id = $1) \
             AND ($2::TIMESTAMPTZ IS NULL OR o.created_at >= $2) \
             AND ($3::TIMESTAMPTZ IS NULL OR o.created_at <= $3)"
        ))
        .bind(vendor_id)
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.end))
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> =
            sqlx::query_as("SELECT id, vendor_id, name, price, stock, status FROM products WHERE id = $1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Product::try_from).transpose()
    }

    async fn find_vendor(&self, vendor_id: Uuid) -> Result<Option<Vendor>, StoreError> {
        let row: Option<VendorRow> =
            sqlx::query_as("SELECT id, business_name, commission_rate, is_active FROM vendors WHERE id = $1")
                .bind(vendor_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Vendor::from))
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    status: String,
    payment_status: String,
    subtotal: Decimal,
    tax_amount: Decimal,
    shipping_cost: Decimal,
    discount_amount: Decimal,
    total_amount: Decimal,
    currency: String,
    shipping_address: Option<serde_json::Value>,
    billing_address: Option<serde_json::Value>,
    notes: Option<String>,
    cancellation_reason: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        Ok(Order {
            status: parse_label(&self.status)?,
            payment_status: parse_label(&self.payment_status)?,
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
            shipping_cost: self.shipping_cost,
            discount_amount: self.discount_amount,
            total_amount: self.total_amount,
            currency: self.currency,
            shipping_address: self.shipping_address,
            billing_address: self.billing_address,
            notes: self.notes,
            cancellation_reason: self.cancellation_reason,
            cancelled_at: self.cancelled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    vendor_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    total_price: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(OrderItem {
            status: parse_label(&row.status)?,
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            vendor_id: row.vendor_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            total_price: row.total_price,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    amount: Decimal,
    currency: String,
    method: String,
    reference_id: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            method: parse_label(&row.method)?,
            status: parse_label(&row.status)?,
            id: row.id,
            order_id: row.order_id,
            amount: row.amount,
            currency: row.currency,
            reference_id: row.reference_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    vendor_id: Uuid,
    name: String,
    price: Decimal,
    stock: i32,
    status: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            status: parse_label(&row.status)?,
            id: row.id,
            vendor_id: row.vendor_id,
            name: row.name,
            price: row.price,
            stock: row.stock,
        })
    }
}

#[derive(Debug, FromRow)]
struct VendorRow {
    id: Uuid,
    business_name: String,
    commission_rate: Decimal,
    is_active: bool,
}

impl From<VendorRow> for Vendor {
    fn from(row: VendorRow) -> Self {
        Vendor {
            id: row.id,
            business_name: row.business_name,
            commission_rate: row.commission_rate,
            is_active: row.is_active,
        }
    }
}

/// Stored labels outside the closed sets mean the row was written by
/// something else; surface them instead of guessing.
fn parse_label<T>(raw: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| StoreError::CorruptRow(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::ProductStatus;
    use crate::domain::order::PaymentStatus;
    use crate::domain::payment::PaymentMethod;

    #[test]
    fn test_parse_label_accepts_known_values() {
        let status: OrderStatus = parse_label("confirmed").unwrap();
        assert_eq!(status, OrderStatus::Processing);
        let payment: PaymentStatus = parse_label("refunded").unwrap();
        assert_eq!(payment, PaymentStatus::Refunded);
        let method: PaymentMethod = parse_label("paypal").unwrap();
        assert_eq!(method, PaymentMethod::Paypal);
    }

    #[test]
    fn test_unknown_label_is_a_corrupt_row() {
        let result: Result<ProductStatus, _> = parse_label("archived");
        assert!(matches!(result, Err(StoreError::CorruptRow(_))));
    }

    #[test]
    fn test_item_row_conversion() {
        let row = OrderItemRow {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            quantity: 3,
            unit_price: Decimal::new(1999, 2),
            total_price: Decimal::new(5997, 2),
            status: "shipped".to_string(),
            created_at: Utc::now(),
        };

        let item = OrderItem::try_from(row).unwrap();
        assert_eq!(item.status, OrderStatus::Shipped);
        assert_eq!(item.total_price, Decimal::new(5997, 2));
    }
}
