// ============================================================================
// Payment Domain - order-level payment status and payment records
// ============================================================================

pub mod value_objects;
pub mod gateway;
pub mod tracker;

pub use value_objects::*;
pub use gateway::{ChargeRequest, GatewayOutcome, PaymentGateway, SimulatedGateway};
pub use tracker::{PaymentReceipt, PaymentTracker};
