//! Monetary arithmetic for orders.
//!
//! Every amount that reaches storage or a comparison goes through
//! [`round_money`]: two decimal places, half-up (midpoint away from zero).

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use super::errors::OrderError;

const DECIMAL_PLACES: u32 = 2;

/// Tax rate applied when the deployment does not configure one.
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 2);

/// Largest amount a `NUMERIC(12,2)` column holds: 9999999999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds `value` and rejects it when it overflowed or cannot be stored.
fn bounded(field: &'static str, value: Option<Decimal>) -> Result<Decimal, OrderError> {
    match value.map(round_money) {
        Some(amount) if amount <= MAX_AMOUNT => Ok(amount),
        _ => Err(OrderError::AmountOutOfRange { field }),
    }
}

/// Line total: quantity × unit price.
pub fn line_total(quantity: i32, unit_price: Decimal) -> Decimal {
    round_money(unit_price * Decimal::from(quantity))
}

/// Priced line fed to [`OrderSummary::calculate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricedLine {
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PricedLine {
    pub fn new(quantity: i32, unit_price: Decimal) -> Self {
        Self { quantity, unit_price }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

impl OrderSummary {
    /// subtotal = Σ quantity × unit price, tax = subtotal × rate,
    /// total = subtotal + tax + shipping. Each component is rounded before
    /// the total is summed, so the total is exactly the sum of its parts.
    /// Every component must fit in [`MAX_AMOUNT`].
    pub fn calculate(lines: &[PricedLine], shipping_cost: Decimal, tax_rate: Decimal) -> Result<Self, OrderError> {
        let raw_subtotal = lines.iter().try_fold(Decimal::ZERO, |acc, line| {
            line.unit_price
                .checked_mul(Decimal::from(line.quantity))
                .and_then(|total| acc.checked_add(total))
        });

        let subtotal = bounded("subtotal", raw_subtotal)?;
        let tax_amount = bounded("tax_amount", subtotal.checked_mul(tax_rate))?;
        let shipping_cost = bounded("shipping_cost", Some(shipping_cost))?;
        let total_amount = bounded("total_amount", Some(subtotal + tax_amount + shipping_cost))?;

        Ok(Self {
            subtotal,
            tax_amount,
            shipping_cost,
            discount_amount: Decimal::ZERO,
            total_amount,
        })
    }

    /// Applies a discount; it may not push the total below zero.
    pub fn with_discount(mut self, discount: Decimal) -> Result<Self, OrderError> {
        let discount = bounded("discount_amount", Some(discount))?;
        if discount.is_sign_negative() {
            return Err(OrderError::InvalidAmount { field: "discount_amount", value: discount });
        }

        let gross = self.subtotal + self.tax_amount + self.shipping_cost;
        if discount > gross {
            return Err(OrderError::DiscountTooLarge { discount, total: gross });
        }

        self.discount_amount = discount;
        self.total_amount = gross - discount;
        Ok(self)
    }

    /// True when the stored total still equals its components.
    pub fn is_consistent(&self) -> bool {
        self.total_amount
            == self.subtotal + self.tax_amount + self.shipping_cost - self.discount_amount
    }
}
