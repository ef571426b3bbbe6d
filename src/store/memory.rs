use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::catalog::{Product, Vendor};
use crate::domain::order::{DateRange, Order, OrderItem, OrderStatus, Page, PageRequest, PaymentStatus};
use crate::domain::payment::Payment;

use super::{Catalog, OrderStore, StoreError};

// ============================================================================
// In-Memory Store - single-lock implementation of both store traits
// ============================================================================
//
// Every operation takes the one lock for its whole duration, which makes each
// multi-row write atomic exactly like a database transaction would.
//
// ============================================================================

#[derive(Default)]
struct State {
    orders: HashMap<Uuid, Order>,
    order_numbers: HashMap<String, Uuid>,
    products: HashMap<Uuid, Product>,
    vendors: HashMap<Uuid, Vendor>,
    payments: Vec<Payment>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn add_vendor(&self, vendor: Vendor) {
        self.state.lock().await.vendors.insert(vendor.id, vendor);
    }

    pub async fn product_stock(&self, product_id: Uuid) -> Option<i32> {
        self.state.lock().await.products.get(&product_id).map(|p| p.stock)
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

fn paginate<T: Clone>(mut rows: Vec<T>, page: PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let start = (page.offset() as usize).min(rows.len());
    let end = start.saturating_add(page.per_page as usize).min(rows.len());
    Page {
        items: rows.drain(start..end).collect(),
        page: page.page,
        per_page: page.per_page,
        total,
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        if state.order_numbers.contains_key(&order.order_number) {
            return Err(StoreError::DuplicateOrderNumber(order.order_number.clone()));
        }

        let mut reserved: HashMap<Uuid, i32> = HashMap::new();
        for item in &order.items {
            *reserved.entry(item.product_id).or_insert(0) += item.quantity;
        }

        // Check everything before touching anything.
        for (product_id, requested) in &reserved {
            let available = state.products.get(product_id).map(|p| p.stock).unwrap_or(0);
            if available < *requested {
                return Err(StoreError::InsufficientStock {
                    product_id: *product_id,
                    requested: *requested,
                    available,
                });
            }
        }

        for (product_id, requested) in reserved {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.stock -= requested;
            }
        }

        state.order_numbers.insert(order.order_number.clone(), order.id);
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.state.lock().await.orders.get(&order_id).cloned())
    }

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .order_numbers
            .get(order_number)
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn update_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.orders.get_mut(&order_id) {
            Some(order) if order.status == from => {
                order.apply_status(to, at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_payment_status(
        &self,
        order_id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.orders.get_mut(&order_id) {
            Some(order) if order.payment_status == from => {
                order.apply_payment_status(to, at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;

        let Some(order) = state.orders.get_mut(&order_id) else {
            return Ok(false);
        };
        if !order.status.can_be_cancelled() {
            return Ok(false);
        }

        order.apply_cancellation(reason.map(str::to_string), at);
        let restock: Vec<(Uuid, i32)> = order.items.iter().map(|i| (i.product_id, i.quantity)).collect();

        for (product_id, quantity) in restock {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.stock += quantity;
            }
        }

        Ok(true)
    }

    async fn record_payment(
        &self,
        payment: &Payment,
        expected: PaymentStatus,
        status: PaymentStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;

        match state.orders.get_mut(&payment.order_id) {
            Some(order) if order.payment_status == expected => {
                if expected != status {
                    order.apply_payment_status(status, payment.created_at);
                }
            }
            _ => return Ok(false),
        }

        state.payments.push(payment.clone());
        Ok(true)
    }

    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_user_orders(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, StoreError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(paginate(orders, page))
    }

    async fn list_vendor_items(&self, vendor_id: Uuid, page: PageRequest) -> Result<Page<OrderItem>, StoreError> {
        let state = self.state.lock().await;
        let mut items: Vec<OrderItem> = state
            .orders
            .values()
            .flat_map(|o| o.items.iter())
            .filter(|i| i.vendor_id == vendor_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(paginate(items, page))
    }

    async fn orders_created_between(&self, range: DateRange) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .filter(|o| range.contains(o.created_at))
            .cloned()
            .collect())
    }

    async fn vendor_orders(&self, vendor_id: Uuid, range: Option<DateRange>) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.contains_vendor(vendor_id))
            .filter(|o| range.map_or(true, |r| r.contains(o.created_at)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Catalog for InMemoryStore {
    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&product_id).cloned())
    }

    async fn find_vendor(&self, vendor_id: Uuid) -> Result<Option<Vendor>, StoreError> {
        Ok(self.state.lock().await.vendors.get(&vendor_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::tests::sample_order;
    use rust_decimal::Decimal;

    async fn store_with_stock(order: &Order, stock: i32) -> InMemoryStore {
        let store = InMemoryStore::new();
        for item in &order.items {
            let mut product = Product::new(item.vendor_id, "Item", item.unit_price, stock);
            product.id = item.product_id;
            store.add_product(product).await;
        }
        store
    }

    #[tokio::test]
    async fn test_duplicate_order_number_is_rejected() {
        let order = sample_order(OrderStatus::Pending);
        let store = store_with_stock(&order, 10).await;
        store.insert_order(&order).await.unwrap();

        let mut second = sample_order(OrderStatus::Pending);
        second.order_number = order.order_number.clone();
        second.items = order.items.clone();
        let err = store.insert_order(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateOrderNumber(_)));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_insert_reserves_and_cancel_restocks() {
        let order = sample_order(OrderStatus::Pending);
        let product_id = order.items[0].product_id;
        let store = store_with_stock(&order, 5).await;

        store.insert_order(&order).await.unwrap();
        assert_eq!(store.product_stock(product_id).await, Some(3));

        assert!(store.cancel_order(order.id, Some("duplicate"), Utc::now()).await.unwrap());
        assert_eq!(store.product_stock(product_id).await, Some(5));

        // Second cancellation writes nothing.
        assert!(!store.cancel_order(order.id, None, Utc::now()).await.unwrap());
        assert_eq!(store.product_stock(product_id).await, Some(5));
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_nothing_behind() {
        let order = sample_order(OrderStatus::Pending);
        let product_id = order.items[0].product_id;
        let store = store_with_stock(&order, 1).await;

        let err = store.insert_order(&order).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { requested: 2, available: 1, .. }));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.product_stock(product_id).await, Some(1));
    }

    #[tokio::test]
    async fn test_status_compare_and_set() {
        let order = sample_order(OrderStatus::Pending);
        let store = store_with_stock(&order, 10).await;
        store.insert_order(&order).await.unwrap();

        assert!(store.update_status(order.id, OrderStatus::Pending, OrderStatus::Shipped, Utc::now()).await.unwrap());
        assert!(!store.update_status(order.id, OrderStatus::Pending, OrderStatus::Delivered, Utc::now()).await.unwrap());

        let stored = store.find_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_user_orders_are_paginated_newest_first() {
        let user_id = Uuid::new_v4();
        let store = InMemoryStore::new();
        let base = Utc::now();

        for i in 0..20 {
            let mut order = sample_order(OrderStatus::Pending);
            order.user_id = user_id;
            order.order_number = format!("ORD{i:04}");
            order.created_at = base + chrono::Duration::seconds(i);
            order.items.clear();
            store.insert_order(&order).await.unwrap();
        }

        let first = store.list_user_orders(user_id, None, PageRequest::default()).await.unwrap();
        assert_eq!(first.total, 20);
        assert_eq!(first.items.len(), 15);
        assert_eq!(first.items[0].order_number, "ORD0019");
        assert_eq!(first.last_page(), 2);

        let second = store.list_user_orders(user_id, None, PageRequest::new(2, 15)).await.unwrap();
        assert_eq!(second.items.len(), 5);

        let shipped = store
            .list_user_orders(user_id, Some(OrderStatus::Shipped), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(shipped.total, 0);
    }

    #[tokio::test]
    async fn test_catalog_lookup() {
        let store = InMemoryStore::new();
        let vendor = Vendor::new("Oasis Crafts", Decimal::new(12, 2));
        store.add_vendor(vendor.clone()).await;

        assert_eq!(store.find_vendor(vendor.id).await.unwrap(), Some(vendor));
        assert_eq!(store.find_product(Uuid::new_v4()).await.unwrap(), None);
    }
}
