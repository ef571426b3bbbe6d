use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::money::OrderSummary;
use super::value_objects::{OrderItem, OrderStatus, PaymentStatus};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,

    // Lifecycle
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,

    // Money
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: String,

    // Opaque blobs supplied by checkout
    pub shipping_address: Option<serde_json::Value>,
    pub billing_address: Option<serde_json::Value>,
    pub notes: Option<String>,

    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub items: Vec<OrderItem>,
}

/// What a requested status change amounts to once the rules are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Unchanged,
    Move { from: OrderStatus, to: OrderStatus },
    Cancel { from: OrderStatus },
}

/// Read-only snapshot returned by order tracking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTracking {
    pub order_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: Decimal,
    pub currency: String,
    pub items_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
            shipping_cost: self.shipping_cost,
            discount_amount: self.discount_amount,
            total_amount: self.total_amount,
        }
    }

    pub fn contains_vendor(&self, vendor_id: Uuid) -> bool {
        self.items.iter().any(|item| item.vendor_id == vendor_id)
    }

    /// Forward progression is expected but not enforced; the only hard rules
    /// are that a cancelled order stays cancelled and a delivered order
    /// cannot be cancelled. Cancelling twice is an error, not a no-op.
    pub fn plan_status_change(&self, to: OrderStatus) -> Result<StatusChange, OrderError> {
        let from = self.status;

        if to == OrderStatus::Cancelled {
            self.ensure_cancellable()?;
            return Ok(StatusChange::Cancel { from });
        }

        if from == to {
            return Ok(StatusChange::Unchanged);
        }

        if from.is_terminal() {
            return Err(OrderError::InvalidStatusTransition { from, to });
        }

        Ok(StatusChange::Move { from, to })
    }

    pub fn ensure_cancellable(&self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Cancelled => Err(OrderError::AlreadyCancelled),
            status if !status.can_be_cancelled() => Err(OrderError::NotCancellable(status)),
            _ => Ok(()),
        }
    }

    /// Mirrors the cancellation that the store commits atomically.
    pub fn apply_cancellation(&mut self, reason: Option<String>, at: DateTime<Utc>) {
        for item in &mut self.items {
            item.status = OrderStatus::Cancelled;
        }
        self.status = OrderStatus::Cancelled;
        self.cancellation_reason = reason;
        self.cancelled_at = Some(at);
        self.updated_at = at;
    }

    pub fn apply_status(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }

    /// Payment status moves freely between its values except that a refund
    /// needs a settled payment. Returns false when nothing would change.
    pub fn check_payment_transition(&self, to: PaymentStatus) -> Result<bool, OrderError> {
        let from = self.payment_status;

        if from == to {
            return Ok(false);
        }

        if to == PaymentStatus::Refunded && from != PaymentStatus::Paid {
            return Err(OrderError::InvalidPaymentTransition { from, to });
        }

        Ok(true)
    }

    pub fn apply_payment_status(&mut self, status: PaymentStatus, at: DateTime<Utc>) {
        self.payment_status = status;
        self.updated_at = at;
    }

    pub fn tracking(&self) -> OrderTracking {
        OrderTracking {
            order_id: self.id,
            order_number: self.order_number.clone(),
            status: self.status,
            payment_status: self.payment_status,
            total_amount: self.total_amount,
            currency: self.currency.clone(),
            items_count: self.items.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_order(status: OrderStatus) -> Order {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        Order {
            id: order_id,
            order_number: "ORD20250101120000000001".to_string(),
            user_id: Uuid::new_v4(),
            status,
            payment_status: PaymentStatus::Unpaid,
            subtotal: Decimal::new(10000, 2),
            tax_amount: Decimal::new(1500, 2),
            shipping_cost: Decimal::new(1000, 2),
            discount_amount: Decimal::ZERO,
            total_amount: Decimal::new(12500, 2),
            currency: "SAR".to_string(),
            shipping_address: None,
            billing_address: None,
            notes: None,
            cancellation_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            items: vec![OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: Uuid::new_v4(),
                vendor_id: Uuid::new_v4(),
                quantity: 2,
                unit_price: Decimal::new(5000, 2),
                total_price: Decimal::new(10000, 2),
                status,
                created_at: now,
            }],
        }
    }

    #[test]
    fn test_out_of_order_moves_are_allowed() {
        let order = sample_order(OrderStatus::Pending);
        assert_eq!(
            order.plan_status_change(OrderStatus::Delivered).unwrap(),
            StatusChange::Move { from: OrderStatus::Pending, to: OrderStatus::Delivered }
        );

        let shipped = sample_order(OrderStatus::Shipped);
        assert!(shipped.plan_status_change(OrderStatus::Processing).is_ok());
    }

    #[test]
    fn test_delivered_orders_cannot_be_cancelled() {
        let order = sample_order(OrderStatus::Delivered);
        assert!(matches!(
            order.plan_status_change(OrderStatus::Cancelled),
            Err(OrderError::NotCancellable(OrderStatus::Delivered))
        ));
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let order = sample_order(OrderStatus::Cancelled);
        assert!(matches!(
            order.plan_status_change(OrderStatus::Pending),
            Err(OrderError::InvalidStatusTransition { .. })
        ));
        assert!(matches!(order.ensure_cancellable(), Err(OrderError::AlreadyCancelled)));
        assert!(matches!(
            order.plan_status_change(OrderStatus::Cancelled),
            Err(OrderError::AlreadyCancelled)
        ));
    }

    #[test]
    fn test_cancellation_marks_every_item() {
        let mut order = sample_order(OrderStatus::Processing);
        let at = Utc::now();
        order.apply_cancellation(Some("changed my mind".into()), at);

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.items.iter().all(|i| i.status == OrderStatus::Cancelled));
        assert_eq!(order.cancelled_at, Some(at));
        assert_eq!(order.cancellation_reason.as_deref(), Some("changed my mind"));
    }

    #[test]
    fn test_refund_requires_paid() {
        let mut order = sample_order(OrderStatus::Pending);
        assert!(order.check_payment_transition(PaymentStatus::Refunded).is_err());

        order.payment_status = PaymentStatus::Paid;
        assert!(order.check_payment_transition(PaymentStatus::Refunded).unwrap());
        assert!(!order.check_payment_transition(PaymentStatus::Paid).unwrap());
    }

    #[test]
    fn test_tracking_snapshot() {
        let order = sample_order(OrderStatus::Shipped);
        let tracking = order.tracking();
        assert_eq!(tracking.items_count, 1);
        assert_eq!(tracking.status, OrderStatus::Shipped);
        assert!(order.summary().is_consistent());
    }
}
