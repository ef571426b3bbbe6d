use rust_decimal::Decimal;
use uuid::Uuid;

use super::value_objects::OrderLine;

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

/// Checkout request. Carries no prices: the manager resolves them.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub user_id: Uuid,
    pub lines: Vec<OrderLine>,
    pub shipping_address: Option<serde_json::Value>,
    pub billing_address: Option<serde_json::Value>,
    pub notes: Option<String>,
    /// Falls back to the deployment currency.
    pub currency: Option<String>,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
}

impl CreateOrder {
    pub fn new(user_id: Uuid, lines: Vec<OrderLine>) -> Self {
        Self {
            user_id,
            lines,
            shipping_address: None,
            billing_address: None,
            notes: None,
            currency: None,
            shipping_cost: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
        }
    }

    pub fn with_shipping_address(mut self, address: serde_json::Value) -> Self {
        self.shipping_address = Some(address);
        self
    }

    pub fn with_billing_address(mut self, address: serde_json::Value) -> Self {
        self.billing_address = Some(address);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_shipping_cost(mut self, shipping_cost: Decimal) -> Self {
        self.shipping_cost = shipping_cost;
        self
    }

    pub fn with_discount(mut self, discount: Decimal) -> Self {
        self.discount_amount = discount;
        self
    }
}
