// ============================================================================
// Order Domain - Lifecycle of marketplace orders
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderStatus, PaymentStatus, OrderItem, paging)
// - Money (rounding, OrderSummary)
// - Events (OrderCreated, OrderStatusChanged, etc.)
// - Commands (CreateOrder)
// - Errors (OrderError enum)
// - Aggregate (Order with its transition rules)
// - Manager (OrderManager orchestrating catalog, store and publisher)
//
// ============================================================================

pub mod value_objects;
pub mod money;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod order_number;
pub mod manager;

// Re-export for convenience
pub use value_objects::*;
pub use money::{OrderSummary, PricedLine};
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use order_number::OrderNumberGenerator;
pub use manager::OrderManager;
