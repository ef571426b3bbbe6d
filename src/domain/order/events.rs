use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{OrderStatus, PaymentStatus};

// ============================================================================
// Order Events - facts published after a successful commit
// ============================================================================

/// Notification delivery (mail, SMS, push) subscribes to these; the order
/// core only hands them over once the transaction is durable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Created(OrderCreated),
    StatusChanged(OrderStatusChanged),
    PaymentStatusChanged(OrderPaymentStatusChanged),
    Cancelled(OrderCancelled),
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "OrderCreated",
            OrderEvent::StatusChanged(_) => "OrderStatusChanged",
            OrderEvent::PaymentStatusChanged(_) => "OrderPaymentStatusChanged",
            OrderEvent::Cancelled(_) => "OrderCancelled",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::Created(e) => e.order_id,
            OrderEvent::StatusChanged(e) => e.order_id,
            OrderEvent::PaymentStatusChanged(e) => e.order_id,
            OrderEvent::Cancelled(e) => e.order_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub vendor_ids: Vec<Uuid>,
    pub total_amount: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: Uuid,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaymentStatusChanged {
    pub order_id: Uuid,
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: Uuid,
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

// ============================================================================
// Publishing
// ============================================================================

/// Fire-and-forget sink for committed order events.
#[async_trait]
pub trait OrderEventPublisher: Send + Sync {
    async fn publish(&self, event: OrderEvent) -> anyhow::Result<()>;
}

/// Default publisher: records each event in the structured log.
#[derive(Debug, Default, Clone)]
pub struct TracingPublisher;

#[async_trait]
impl OrderEventPublisher for TracingPublisher {
    async fn publish(&self, event: OrderEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&event)?;
        tracing::info!(
            order_id = %event.order_id(),
            event_type = event.event_type(),
            payload = %payload,
            "Order event published"
        );
        Ok(())
    }
}
