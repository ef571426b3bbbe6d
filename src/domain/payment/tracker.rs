use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::actor::Actor;
use crate::domain::order::{
    Order, OrderError, OrderEvent, OrderEventPublisher, OrderPaymentStatusChanged, OrderStatus, PaymentStatus,
};
use crate::metrics::Metrics;
use crate::store::OrderStore;
use crate::utils::Clock;

use super::gateway::{ChargeRequest, GatewayOutcome, PaymentGateway};
use super::value_objects::{Payment, PaymentMethod, TransactionStatus};

/// Result of a successful charge: the stored payment and the order as it
/// stands afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub order: Order,
}

/// Tracks the order-level payment status, independent of the fulfillment
/// status.
pub struct PaymentTracker {
    store: Arc<dyn OrderStore>,
    clock: Arc<dyn Clock>,
    publisher: Arc<dyn OrderEventPublisher>,
    metrics: Arc<Metrics>,
}

impl PaymentTracker {
    pub fn new(
        store: Arc<dyn OrderStore>,
        clock: Arc<dyn Clock>,
        publisher: Arc<dyn OrderEventPublisher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { store, clock, publisher, metrics }
    }

    /// Sets the payment status directly. Used by administrators and by
    /// gateway callbacks acting as [`Actor::System`].
    pub async fn update_payment_status(
        &self,
        actor: Actor,
        order_id: Uuid,
        status: PaymentStatus,
    ) -> Result<Order, OrderError> {
        if !actor.is_privileged() {
            return Err(OrderError::Forbidden(format!(
                "{} cannot change the payment status of order {order_id}",
                actor.role()
            )));
        }

        let mut order = self.load(order_id).await?;
        let from = order.payment_status;

        if !order
            .check_payment_transition(status)
            .inspect_err(|error| self.reject(order_id, error))?
        {
            return Ok(order);
        }

        let now = self.clock.now();
        if !self.store.update_payment_status(order_id, from, status, now).await? {
            let current = self.load(order_id).await?;
            let error = OrderError::InvalidPaymentTransition { from: current.payment_status, to: status };
            self.reject(order_id, &error);
            return Err(error);
        }

        order.apply_payment_status(status, now);
        self.metrics.record_payment_status(status.as_str());
        tracing::info!(order_id = %order_id, from = %from, to = %status, actor = actor.role(), "Payment status updated");

        self.publish_change(order_id, from, status, now).await;
        Ok(order)
    }

    /// Charges the order total through the gateway and records the attempt.
    /// A declined charge is still recorded and leaves the order `failed`.
    pub async fn process_payment(
        &self,
        actor: Actor,
        order_id: Uuid,
        method: PaymentMethod,
        gateway: &dyn PaymentGateway,
    ) -> Result<PaymentReceipt, OrderError> {
        let mut order = self.load(order_id).await?;

        match actor {
            Actor::Customer(user_id) if user_id == order.user_id => {}
            Actor::Admin | Actor::System => {}
            _ => {
                return Err(OrderError::Forbidden(format!("{} cannot pay for order {order_id}", actor.role())))
            }
        }

        if order.status == OrderStatus::Cancelled {
            return Err(OrderError::NotPayable(order.status));
        }
        match order.payment_status {
            PaymentStatus::Paid => return Err(OrderError::AlreadyPaid),
            PaymentStatus::Refunded => {
                return Err(OrderError::InvalidPaymentTransition {
                    from: PaymentStatus::Refunded,
                    to: PaymentStatus::Paid,
                })
            }
            PaymentStatus::Unpaid | PaymentStatus::Pending | PaymentStatus::Failed => {}
        }

        let request = ChargeRequest {
            order_id,
            order_number: order.order_number.clone(),
            amount: order.total_amount,
            currency: order.currency.clone(),
            method,
        };

        let outcome = gateway.charge(&request).await.unwrap_or_else(|e| {
            tracing::warn!(order_id = %order_id, error = %e, "Payment gateway error");
            GatewayOutcome::Declined { reason: e.to_string() }
        });

        let (transaction_status, reference_id, declined) = match outcome {
            GatewayOutcome::Approved { reference } => (TransactionStatus::Completed, Some(reference), None),
            GatewayOutcome::Pending { reference } => (TransactionStatus::Pending, Some(reference), None),
            GatewayOutcome::Declined { reason } => (TransactionStatus::Failed, None, Some(reason)),
        };

        let now = self.clock.now();
        let payment = Payment {
            id: Uuid::new_v4(),
            order_id,
            amount: order.total_amount,
            currency: order.currency.clone(),
            method,
            reference_id,
            status: transaction_status,
            created_at: now,
        };

        let from = order.payment_status;
        let to = transaction_status.order_payment_status();

        if !self.store.record_payment(&payment, from, to).await? {
            let current = self.load(order_id).await?;
            let error = OrderError::InvalidPaymentTransition { from: current.payment_status, to };
            self.reject(order_id, &error);
            return Err(error);
        }

        self.metrics.record_payment(method.as_str(), transaction_status.as_str());
        if from != to {
            order.apply_payment_status(to, now);
            self.metrics.record_payment_status(to.as_str());
            self.publish_change(order_id, from, to, now).await;
        }

        if let Some(reason) = declined {
            tracing::warn!(order_id = %order_id, method = %method, reason = %reason, "Payment declined");
            return Err(OrderError::PaymentDeclined(reason));
        }

        tracing::info!(
            order_id = %order_id,
            payment_id = %payment.id,
            method = %method,
            status = transaction_status.as_str(),
            "Payment recorded"
        );

        Ok(PaymentReceipt { payment, order })
    }

    pub async fn payments_for_order(&self, actor: Actor, order_id: Uuid) -> Result<Vec<Payment>, OrderError> {
        let order = self.load(order_id).await?;
        crate::domain::order::manager::authorize_read(actor, &order)?;
        Ok(self.store.payments_for_order(order_id).await?)
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.store
            .find_order(order_id)
            .await?
            .ok_or_else(|| OrderError::order_not_found(order_id))
    }

    fn reject(&self, order_id: Uuid, error: &OrderError) {
        self.metrics.record_rejected_transition("update_payment_status");
        tracing::warn!(order_id = %order_id, error = %error, "Payment status change rejected");
    }

    async fn publish_change(&self, order_id: Uuid, from: PaymentStatus, to: PaymentStatus, at: DateTime<Utc>) {
        let event = OrderEvent::PaymentStatusChanged(OrderPaymentStatusChanged {
            order_id,
            from,
            to,
            changed_at: at,
        });
        if let Err(e) = self.publisher.publish(event).await {
            tracing::warn!(order_id = %order_id, error = %e, "Failed to publish payment event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{Product, Vendor};
    use crate::domain::order::{CreateOrder, OrderLine, OrderManager};
    use crate::domain::payment::SimulatedGateway;
    use crate::config::OrderSettings;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    struct FailingGateway;

    #[async_trait]
    impl PaymentGateway for FailingGateway {
        async fn charge(&self, _request: &ChargeRequest) -> anyhow::Result<GatewayOutcome> {
            anyhow::bail!("connection reset")
        }
    }

    async fn setup() -> (OrderManager, Order, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let vendor = Vendor::new("Desert Goods", Decimal::new(10, 2));
        let product = Product::new(vendor.id, "Lantern", Decimal::new(5000, 2), 10);
        store.add_vendor(vendor).await;
        store.add_product(product.clone()).await;

        let metrics = Arc::new(Metrics::new().unwrap());
        let manager = OrderManager::new(store.clone(), store, metrics, OrderSettings::default());

        let customer = Uuid::new_v4();
        let order = manager
            .create_order(
                Actor::Customer(customer),
                CreateOrder::new(customer, vec![OrderLine::new(product.id, 2)]),
            )
            .await
            .unwrap();
        (manager, order, customer)
    }

    #[tokio::test]
    async fn test_card_payment_marks_order_paid() {
        let (manager, order, customer) = setup().await;
        let tracker = manager.payments();

        let receipt = tracker
            .process_payment(Actor::Customer(customer), order.id, PaymentMethod::CreditCard, &SimulatedGateway)
            .await
            .unwrap();

        assert_eq!(receipt.order.payment_status, PaymentStatus::Paid);
        assert_eq!(receipt.payment.amount, order.total_amount);
        assert_eq!(receipt.payment.status, TransactionStatus::Completed);
        // Fulfillment status is independent of payment.
        assert_eq!(receipt.order.status, OrderStatus::Pending);

        let again = tracker
            .process_payment(Actor::Customer(customer), order.id, PaymentMethod::CreditCard, &SimulatedGateway)
            .await;
        assert!(matches!(again, Err(OrderError::AlreadyPaid)));
    }

    #[tokio::test]
    async fn test_bank_transfer_leaves_payment_pending() {
        let (manager, order, customer) = setup().await;
        let receipt = manager
            .payments()
            .process_payment(Actor::Customer(customer), order.id, PaymentMethod::BankTransfer, &SimulatedGateway)
            .await
            .unwrap();

        assert_eq!(receipt.order.payment_status, PaymentStatus::Pending);
        assert!(receipt.payment.reference_id.unwrap().starts_with("BANK_"));
    }

    #[tokio::test]
    async fn test_gateway_error_is_recorded_as_failed() {
        let (manager, order, customer) = setup().await;
        let tracker = manager.payments();

        let result = tracker
            .process_payment(Actor::Customer(customer), order.id, PaymentMethod::Paypal, &FailingGateway)
            .await;
        assert!(matches!(result, Err(OrderError::PaymentDeclined(_))));

        let stored = manager.get_order(Actor::Admin, order.id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Failed);

        let payments = tracker.payments_for_order(Actor::Admin, order.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_cancelled_order_cannot_be_paid() {
        let (manager, order, customer) = setup().await;
        manager.cancel_order(Actor::Customer(customer), order.id, None).await.unwrap();

        let result = manager
            .payments()
            .process_payment(Actor::Customer(customer), order.id, PaymentMethod::CreditCard, &SimulatedGateway)
            .await;
        assert!(matches!(result, Err(OrderError::NotPayable(OrderStatus::Cancelled))));
    }

    #[tokio::test]
    async fn test_only_staff_set_payment_status() {
        let (manager, order, customer) = setup().await;
        let tracker = manager.payments();

        let denied = tracker.update_payment_status(Actor::Customer(customer), order.id, PaymentStatus::Paid).await;
        assert!(matches!(denied, Err(OrderError::Forbidden(_))));

        let updated = tracker.update_payment_status(Actor::System, order.id, PaymentStatus::Paid).await.unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Paid);
        assert_eq!(updated.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_refund_requires_settled_payment() {
        let (manager, order, _) = setup().await;
        let tracker = manager.payments();

        let early = tracker.update_payment_status(Actor::Admin, order.id, PaymentStatus::Refunded).await;
        assert!(matches!(early, Err(OrderError::InvalidPaymentTransition { .. })));

        tracker.update_payment_status(Actor::Admin, order.id, PaymentStatus::Paid).await.unwrap();
        let refunded = tracker.update_payment_status(Actor::Admin, order.id, PaymentStatus::Refunded).await.unwrap();
        assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_payment_status_on_missing_order() {
        let (manager, _, _) = setup().await;
        let result = manager.payments().update_payment_status(Actor::Admin, Uuid::new_v4(), PaymentStatus::Paid).await;
        assert!(matches!(result, Err(OrderError::NotFound(_))));
    }
}
