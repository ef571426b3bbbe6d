// ============================================================================
// Store - transactional persistence for orders, items and payments
// ============================================================================
//
// The order core talks to storage only through these traits. Every write that
// spans more than one row (order + items + stock, cancellation, payment +
// payment status) is a single transaction inside the implementation.
//
// ============================================================================

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::catalog::{Product, Vendor};
use crate::domain::order::{DateRange, Order, OrderItem, OrderStatus, Page, PageRequest, PaymentStatus};
use crate::domain::payment::Payment;
use crate::utils::IsTransient;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Duplicate order number: {0}")]
    DuplicateOrderNumber(String),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Stored row is not readable: {0}")]
    CorruptRow(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl IsTransient for StoreError {
    /// A duplicate order number goes away with a freshly generated one.
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::DuplicateOrderNumber(_))
    }
}

/// Order aggregate persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts the order and all of its items and reserves stock for every
    /// item, all in one transaction.
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError>;

    /// Compare-and-set on the order status. Returns false when the stored
    /// status is no longer `from`.
    async fn update_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Compare-and-set on the payment status.
    async fn update_payment_status(
        &self,
        order_id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Cancels the order and every item, records the reason and returns the
    /// reserved stock. Returns false, writing nothing, when the order is
    /// already cancelled or delivered.
    async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Inserts a payment and moves the order's payment status from
    /// `expected` to `status` in one transaction. Returns false, writing
    /// nothing, when the payment status no longer matches `expected`.
    async fn record_payment(
        &self,
        payment: &Payment,
        expected: PaymentStatus,
        status: PaymentStatus,
    ) -> Result<bool, StoreError>;

    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>, StoreError>;

    /// Newest first.
    async fn list_user_orders(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, StoreError>;

    /// Items attributed to the vendor, newest first.
    async fn list_vendor_items(&self, vendor_id: Uuid, page: PageRequest) -> Result<Page<OrderItem>, StoreError>;

    /// Orders with `created_at` inside the inclusive range.
    async fn orders_created_between(&self, range: DateRange) -> Result<Vec<Order>, StoreError>;

    /// Distinct orders holding at least one item of the vendor.
    async fn vendor_orders(&self, vendor_id: Uuid, range: Option<DateRange>) -> Result<Vec<Order>, StoreError>;
}

/// Product catalog and vendor directory, read-only to the order core.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn find_vendor(&self, vendor_id: Uuid) -> Result<Option<Vendor>, StoreError>;
}
