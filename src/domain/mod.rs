// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each area owns its types, rules and orchestration:
// - order: lifecycle manager, money, order numbers, events
// - payment: payment-status tracker and gateway seam
// - reporting: vendor revenue, commission and sales figures
// - catalog / actor: read-only inputs the core consumes
//
// Persistence lives behind the traits in `crate::store`.
//
// ============================================================================

pub mod actor;
pub mod catalog;
pub mod order;
pub mod payment;
pub mod reporting;
