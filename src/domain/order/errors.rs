use rust_decimal::Decimal;
use uuid::Uuid;

use crate::store::StoreError;
use super::value_objects::{OrderStatus, PaymentStatus};

// ============================================================================
// Order Business Rule Errors
// ============================================================================

/// Coarse classification callers map onto their own transport codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    InvalidTransition,
    Persistence,
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order items cannot be empty")]
    EmptyItems,

    #[error("Invalid item quantity: {0}")]
    InvalidQuantity(i32),

    #[error("Product does not exist: {0}")]
    UnknownProduct(Uuid),

    #[error("Product is not available for sale: {0}")]
    ProductUnavailable(Uuid),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Invalid monetary amount for {field}: {value}")]
    InvalidAmount { field: &'static str, value: Decimal },

    #[error("Amount for {field} exceeds the storable maximum")]
    AmountOutOfRange { field: &'static str },

    #[error("Discount {discount} exceeds order total {total}")]
    DiscountTooLarge { discount: Decimal, total: Decimal },

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    #[error("Unknown order status: {0}")]
    UnknownOrderStatus(String),

    #[error("Unknown payment status: {0}")]
    UnknownPaymentStatus(String),

    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Vendor not found: {0}")]
    VendorNotFound(Uuid),

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Order is already cancelled")]
    AlreadyCancelled,

    #[error("Order cannot be cancelled in status: {0}")]
    NotCancellable(OrderStatus),

    #[error("Cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Cannot move payment from {from} to {to}")]
    InvalidPaymentTransition { from: PaymentStatus, to: PaymentStatus },

    #[error("Order cannot be paid in status: {0}")]
    NotPayable(OrderStatus),

    #[error("Order is already paid")]
    AlreadyPaid,

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::EmptyItems
            | OrderError::InvalidQuantity(_)
            | OrderError::UnknownProduct(_)
            | OrderError::ProductUnavailable(_)
            | OrderError::InsufficientStock { .. }
            | OrderError::InvalidCurrency(_)
            | OrderError::InvalidAmount { .. }
            | OrderError::AmountOutOfRange { .. }
            | OrderError::DiscountTooLarge { .. }
            | OrderError::InvalidDateRange { .. }
            | OrderError::UnknownOrderStatus(_)
            | OrderError::UnknownPaymentStatus(_)
            | OrderError::UnknownPaymentMethod(_) => ErrorKind::Validation,
            OrderError::NotFound(_) | OrderError::VendorNotFound(_) => ErrorKind::NotFound,
            OrderError::Forbidden(_) => ErrorKind::Forbidden,
            OrderError::AlreadyCancelled
            | OrderError::NotCancellable(_)
            | OrderError::InvalidStatusTransition { .. }
            | OrderError::InvalidPaymentTransition { .. }
            | OrderError::NotPayable(_)
            | OrderError::AlreadyPaid
            | OrderError::PaymentDeclined(_) => ErrorKind::InvalidTransition,
            OrderError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    pub(crate) fn order_not_found(order_id: Uuid) -> Self {
        OrderError::NotFound(order_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(OrderError::EmptyItems.kind(), ErrorKind::Validation);
        assert_eq!(OrderError::UnknownOrderStatus("bogus".into()).kind(), ErrorKind::Validation);
        assert_eq!(OrderError::AmountOutOfRange { field: "shipping_cost" }.kind(), ErrorKind::Validation);
        assert_eq!(OrderError::order_not_found(Uuid::nil()).kind(), ErrorKind::NotFound);
        assert_eq!(OrderError::AlreadyCancelled.kind(), ErrorKind::InvalidTransition);
        assert_eq!(
            OrderError::NotCancellable(OrderStatus::Delivered).kind(),
            ErrorKind::InvalidTransition
        );
        assert_eq!(
            OrderError::Persistence(StoreError::DuplicateOrderNumber("ORD1".into())).kind(),
            ErrorKind::Persistence
        );
    }

    #[test]
    fn test_messages_are_human_readable() {
        let err = OrderError::InvalidStatusTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        };
        assert_eq!(err.to_string(), "Cannot move order from delivered to pending");
    }
}
