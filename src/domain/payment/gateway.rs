use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::value_objects::PaymentMethod;

/// What the order core hands to a payment processor.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// Funds captured.
    Approved { reference: String },
    /// Accepted, settlement arrives later through a callback.
    Pending { reference: String },
    Declined { reason: String },
}

/// Opaque payment processor. Protocol details (signatures, tokenization)
/// live behind this trait.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> anyhow::Result<GatewayOutcome>;
}

/// Offline processor: cards and PayPal settle at once, bank transfers wait
/// for confirmation.
#[derive(Debug, Default, Clone)]
pub struct SimulatedGateway;

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: &ChargeRequest) -> anyhow::Result<GatewayOutcome> {
        let token = Uuid::new_v4().simple().to_string();
        let outcome = match request.method {
            PaymentMethod::CreditCard => GatewayOutcome::Approved { reference: format!("TXN_{token}") },
            PaymentMethod::Paypal => GatewayOutcome::Approved { reference: format!("PP_{token}") },
            PaymentMethod::BankTransfer => GatewayOutcome::Pending { reference: format!("BANK_{token}") },
        };

        tracing::debug!(
            order_id = %request.order_id,
            method = %request.method,
            outcome = ?outcome,
            "Simulated charge"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: PaymentMethod) -> ChargeRequest {
        ChargeRequest {
            order_id: Uuid::new_v4(),
            order_number: "ORD1".into(),
            amount: Decimal::new(12500, 2),
            currency: "SAR".into(),
            method,
        }
    }

    #[tokio::test]
    async fn test_simulated_gateway_outcomes() {
        let gateway = SimulatedGateway;

        match gateway.charge(&request(PaymentMethod::CreditCard)).await.unwrap() {
            GatewayOutcome::Approved { reference } => assert!(reference.starts_with("TXN_")),
            other => panic!("unexpected outcome: {other:?}"),
        }

        match gateway.charge(&request(PaymentMethod::BankTransfer)).await.unwrap() {
            GatewayOutcome::Pending { reference } => assert!(reference.starts_with("BANK_")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
