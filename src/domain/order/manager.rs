use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::OrderSettings;
use crate::domain::actor::Actor;
use crate::domain::catalog::Product;
use crate::domain::payment::PaymentTracker;
use crate::metrics::Metrics;
use crate::store::{Catalog, OrderStore, StoreError};
use crate::utils::{retry_on_transient, Clock, SystemClock};

use super::aggregate::{Order, OrderTracking, StatusChange};
use super::commands::CreateOrder;
use super::errors::OrderError;
use super::events::{OrderCancelled, OrderCreated, OrderEvent, OrderEventPublisher, OrderStatusChanged, TracingPublisher};
use super::money::{line_total, OrderSummary, PricedLine};
use super::order_number::OrderNumberGenerator;
use super::value_objects::{OrderItem, OrderStatus, Page, PageRequest, PaymentStatus};

// ============================================================================
// Order Manager
// ============================================================================
//
// Orchestrates: Checkout → Catalog pricing → Summary → Store transaction
//               Vendor/Admin action → Rule check → Store compare-and-set
//
// Events are handed to the publisher only after the store has committed.
//
// ============================================================================

pub struct OrderManager {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn Catalog>,
    clock: Arc<dyn Clock>,
    publisher: Arc<dyn OrderEventPublisher>,
    metrics: Arc<Metrics>,
    settings: OrderSettings,
    numbers: OrderNumberGenerator,
}

impl OrderManager {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn Catalog>,
        metrics: Arc<Metrics>,
        settings: OrderSettings,
    ) -> Self {
        let numbers = OrderNumberGenerator::new(settings.order_number_prefix.clone());
        Self {
            store,
            catalog,
            clock: Arc::new(SystemClock),
            publisher: Arc::new(TracingPublisher),
            metrics,
            settings,
            numbers,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn OrderEventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Payment-status tracker sharing this manager's store, clock and sinks.
    pub fn payments(&self) -> PaymentTracker {
        PaymentTracker::new(
            self.store.clone(),
            self.clock.clone(),
            self.publisher.clone(),
            self.metrics.clone(),
        )
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    /// Prices the lines from the catalog, computes the summary and persists
    /// the order with its items in one transaction.
    pub async fn create_order(&self, actor: Actor, command: CreateOrder) -> Result<Order, OrderError> {
        let started = Instant::now();

        match self.try_create_order(actor, command).await {
            Ok(order) => {
                self.metrics.record_order_created(started.elapsed().as_secs_f64());
                tracing::info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    user_id = %order.user_id,
                    item_count = order.items.len(),
                    total = %order.total_amount,
                    "Order created"
                );
                self.publish(OrderEvent::Created(OrderCreated {
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                    user_id: order.user_id,
                    vendor_ids: vendor_ids(&order),
                    total_amount: order.total_amount,
                    currency: order.currency.clone(),
                    created_at: order.created_at,
                }))
                .await;
                Ok(order)
            }
            Err(error) => {
                self.metrics.record_order_create_failure(kind_label(&error));
                tracing::warn!(error = %error, "Order creation rejected");
                Err(error)
            }
        }
    }

    async fn try_create_order(&self, actor: Actor, command: CreateOrder) -> Result<Order, OrderError> {
        match actor {
            Actor::Customer(user_id) if user_id == command.user_id => {}
            Actor::Admin | Actor::System => {}
            _ => {
                return Err(OrderError::Forbidden(format!(
                    "{} cannot place orders for user {}",
                    actor.role(),
                    command.user_id
                )))
            }
        }

        if command.lines.is_empty() {
            return Err(OrderError::EmptyItems);
        }
        for line in &command.lines {
            if line.quantity <= 0 {
                return Err(OrderError::InvalidQuantity(line.quantity));
            }
        }

        let currency = command
            .currency
            .clone()
            .unwrap_or_else(|| self.settings.currency.clone());
        validate_currency(&currency)?;

        if command.shipping_cost.is_sign_negative() {
            return Err(OrderError::InvalidAmount {
                field: "shipping_cost",
                value: command.shipping_cost,
            });
        }

        let products = self.resolve_products(&command).await?;

        let priced: Vec<PricedLine> = command
            .lines
            .iter()
            .map(|line| PricedLine::new(line.quantity, products[&line.product_id].price))
            .collect();
        let summary = OrderSummary::calculate(&priced, command.shipping_cost, self.settings.tax_rate)?
            .with_discount(command.discount_amount)?;

        let draft = self.build_order(&command, &products, summary, currency);

        let store = self.store.clone();
        let numbers = self.numbers.clone();
        let metrics = self.metrics.clone();
        let now = draft.created_at;

        retry_on_transient(self.settings.order_number_retry.clone(), move |attempt| {
            let store = store.clone();
            let mut order = draft.clone();
            order.order_number = numbers.generate(now);
            if attempt > 1 {
                metrics.record_order_number_retry();
            }
            async move {
                store.insert_order(&order).await?;
                Ok::<Order, StoreError>(order)
            }
        })
        .await
        .into_result()
        .map_err(|error| match error {
            StoreError::InsufficientStock { product_id, requested, available } => {
                OrderError::InsufficientStock { product_id, requested, available }
            }
            other => OrderError::Persistence(other),
        })
    }

    /// Looks every product up once and checks availability against the total
    /// quantity requested per product.
    async fn resolve_products(&self, command: &CreateOrder) -> Result<HashMap<Uuid, Product>, OrderError> {
        let mut requested: HashMap<Uuid, i32> = HashMap::new();
        for line in &command.lines {
            let total = requested.entry(line.product_id).or_insert(0);
            *total = total.saturating_add(line.quantity);
        }

        let mut products = HashMap::with_capacity(requested.len());
        for (product_id, quantity) in requested {
            let product = self
                .catalog
                .find_product(product_id)
                .await?
                .ok_or(OrderError::UnknownProduct(product_id))?;

            if !product.is_purchasable() {
                return Err(OrderError::ProductUnavailable(product_id));
            }
            if product.stock < quantity {
                return Err(OrderError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available: product.stock,
                });
            }

            products.insert(product_id, product);
        }

        Ok(products)
    }

    fn build_order(
        &self,
        command: &CreateOrder,
        products: &HashMap<Uuid, Product>,
        summary: OrderSummary,
        currency: String,
    ) -> Order {
        let now = self.clock.now();
        let order_id = Uuid::new_v4();

        let items = command
            .lines
            .iter()
            .map(|line| {
                let product = &products[&line.product_id];
                OrderItem {
                    id: Uuid::new_v4(),
                    order_id,
                    product_id: product.id,
                    vendor_id: product.vendor_id,
                    quantity: line.quantity,
                    unit_price: product.price,
                    total_price: line_total(line.quantity, product.price),
                    status: OrderStatus::Pending,
                    created_at: now,
                }
            })
            .collect();

        Order {
            id: order_id,
            order_number: String::new(),
            user_id: command.user_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            subtotal: summary.subtotal,
            tax_amount: summary.tax_amount,
            shipping_cost: summary.shipping_cost,
            discount_amount: summary.discount_amount,
            total_amount: summary.total_amount,
            currency,
            shipping_address: command.shipping_address.clone(),
            billing_address: command.billing_address.clone(),
            notes: command.notes.clone(),
            cancellation_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            items,
        }
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    pub async fn update_order_status(
        &self,
        actor: Actor,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, OrderError> {
        let mut order = self.load(order_id).await?;
        authorize_status_update(actor, &order)?;

        let change = order
            .plan_status_change(status)
            .inspect_err(|error| self.reject("update_status", order_id, error))?;

        match change {
            StatusChange::Unchanged => Ok(order),
            StatusChange::Cancel { .. } => self.cancel_loaded(order, None).await,
            StatusChange::Move { from, to } => {
                let now = self.clock.now();
                if !self.store.update_status(order_id, from, to, now).await? {
                    let current = self.load(order_id).await?;
                    let error = OrderError::InvalidStatusTransition { from: current.status, to };
                    self.reject("update_status", order_id, &error);
                    return Err(error);
                }

                order.apply_status(to, now);
                self.metrics.record_status_transition(from.as_str(), to.as_str());
                tracing::info!(order_id = %order_id, from = %from, to = %to, actor = actor.role(), "Order status updated");

                self.publish(OrderEvent::StatusChanged(OrderStatusChanged {
                    order_id,
                    from,
                    to,
                    changed_at: now,
                }))
                .await;
                Ok(order)
            }
        }
    }

    /// Payment status is delegated to the tracker; kept here so callers of
    /// the manager see one lifecycle API.
    pub async fn update_payment_status(
        &self,
        actor: Actor,
        order_id: Uuid,
        status: PaymentStatus,
    ) -> Result<Order, OrderError> {
        self.payments().update_payment_status(actor, order_id, status).await
    }

    /// Cancels the order and all of its items. A second cancellation fails
    /// with [`OrderError::AlreadyCancelled`] and changes nothing.
    pub async fn cancel_order(
        &self,
        actor: Actor,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<Order, OrderError> {
        let order = self.load(order_id).await?;
        authorize_cancel(actor, &order).inspect_err(|error| self.reject("cancel", order_id, error))?;
        self.cancel_loaded(order, reason).await
    }

    async fn cancel_loaded(&self, mut order: Order, reason: Option<String>) -> Result<Order, OrderError> {
        let order_id = order.id;
        order
            .ensure_cancellable()
            .inspect_err(|error| self.reject("cancel", order_id, error))?;

        let from = order.status;
        let now = self.clock.now();

        if !self.store.cancel_order(order_id, reason.as_deref(), now).await? {
            // Lost a race with another transition; report what it left behind.
            let current = self.load(order_id).await?;
            let error = current
                .ensure_cancellable()
                .err()
                .unwrap_or(OrderError::InvalidStatusTransition { from: current.status, to: OrderStatus::Cancelled });
            self.reject("cancel", order_id, &error);
            return Err(error);
        }

        order.apply_cancellation(reason.clone(), now);
        self.metrics.record_cancellation(from.as_str());
        tracing::info!(order_id = %order_id, from = %from, reason = ?reason, "Order cancelled");

        self.publish(OrderEvent::Cancelled(OrderCancelled {
            order_id,
            reason,
            cancelled_at: now,
        }))
        .await;
        Ok(order)
    }

    /// Summary with the deployment tax rate.
    pub fn calculate_order_summary(&self, lines: &[PricedLine], shipping_cost: Decimal) -> Result<OrderSummary, OrderError> {
        OrderSummary::calculate(lines, shipping_cost, self.settings.tax_rate)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn get_order(&self, actor: Actor, order_id: Uuid) -> Result<Order, OrderError> {
        let order = self.load(order_id).await?;
        authorize_read(actor, &order)?;
        Ok(order)
    }

    pub async fn get_order_by_number(&self, actor: Actor, order_number: &str) -> Result<Order, OrderError> {
        let order = self
            .store
            .find_order_by_number(order_number)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_number.to_string()))?;
        authorize_read(actor, &order)?;
        Ok(order)
    }

    pub async fn track_order(&self, actor: Actor, order_id: Uuid) -> Result<OrderTracking, OrderError> {
        Ok(self.get_order(actor, order_id).await?.tracking())
    }

    pub async fn user_orders(
        &self,
        actor: Actor,
        user_id: Uuid,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, OrderError> {
        match actor {
            Actor::Customer(id) if id == user_id => {}
            Actor::Admin | Actor::System => {}
            _ => return Err(OrderError::Forbidden(format!("{} cannot list orders of user {user_id}", actor.role()))),
        }

        Ok(self.store.list_user_orders(user_id, status, page).await?)
    }

    pub async fn vendor_order_items(
        &self,
        actor: Actor,
        vendor_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<OrderItem>, OrderError> {
        match actor {
            Actor::Vendor(id) if id == vendor_id => {}
            Actor::Admin | Actor::System => {}
            _ => return Err(OrderError::Forbidden(format!("{} cannot list items of vendor {vendor_id}", actor.role()))),
        }

        Ok(self.store.list_vendor_items(vendor_id, page).await?)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    async fn load(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.store
            .find_order(order_id)
            .await?
            .ok_or_else(|| OrderError::order_not_found(order_id))
    }

    fn reject(&self, operation: &str, order_id: Uuid, error: &OrderError) {
        self.metrics.record_rejected_transition(operation);
        tracing::warn!(order_id = %order_id, operation = operation, error = %error, "Order operation rejected");
    }

    async fn publish(&self, event: OrderEvent) {
        let event_type = event.event_type();
        let order_id = event.order_id();
        if let Err(e) = self.publisher.publish(event).await {
            tracing::warn!(order_id = %order_id, event_type = event_type, error = %e, "Failed to publish order event");
        }
    }
}

// ============================================================================
// Access Rules
// ============================================================================

pub(crate) fn authorize_read(actor: Actor, order: &Order) -> Result<(), OrderError> {
    let allowed = match actor {
        Actor::Customer(user_id) => user_id == order.user_id,
        Actor::Vendor(vendor_id) => order.contains_vendor(vendor_id),
        Actor::Admin | Actor::System => true,
    };

    if allowed {
        Ok(())
    } else {
        Err(OrderError::Forbidden(format!("{} cannot access order {}", actor.role(), order.id)))
    }
}

fn authorize_status_update(actor: Actor, order: &Order) -> Result<(), OrderError> {
    match actor {
        Actor::Admin | Actor::System => Ok(()),
        Actor::Vendor(vendor_id) if order.contains_vendor(vendor_id) => Ok(()),
        _ => Err(OrderError::Forbidden(format!("{} cannot change the status of order {}", actor.role(), order.id))),
    }
}

/// Customers may withdraw their own orders before shipment; staff may cancel
/// anything not yet delivered.
fn authorize_cancel(actor: Actor, order: &Order) -> Result<(), OrderError> {
    match actor {
        Actor::Admin | Actor::System => Ok(()),
        Actor::Customer(user_id) if user_id == order.user_id => match order.status {
            OrderStatus::Pending | OrderStatus::Processing => Ok(()),
            OrderStatus::Cancelled => Err(OrderError::AlreadyCancelled),
            other => Err(OrderError::NotCancellable(other)),
        },
        _ => Err(OrderError::Forbidden(format!("{} cannot cancel order {}", actor.role(), order.id))),
    }
}

fn validate_currency(currency: &str) -> Result<(), OrderError> {
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(OrderError::InvalidCurrency(currency.to_string()))
    }
}

fn vendor_ids(order: &Order) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = order.items.iter().map(|item| item.vendor_id).collect();
    ids.sort();
    ids.dedup();
    ids
}

fn kind_label(error: &OrderError) -> &'static str {
    use super::errors::ErrorKind;
    match error.kind() {
        ErrorKind::Validation => "validation",
        ErrorKind::NotFound => "not_found",
        ErrorKind::Forbidden => "forbidden",
        ErrorKind::InvalidTransition => "invalid_transition",
        ErrorKind::Persistence => "persistence",
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
