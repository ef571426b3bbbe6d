//! Vendor revenue and commission figures derived from stored orders.
//!
//! An order counts towards a vendor when at least one of its items belongs to
//! the vendor; its full `total_amount` is attributed once. Cancelled orders
//! contribute nothing.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::catalog::Vendor;
use crate::domain::order::money::round_money;
use crate::domain::order::{DateRange, Order, OrderStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorReport {
    pub vendor_id: Uuid,
    pub range: Option<DateRange>,
    pub total_orders: u64,
    pub total_revenue: Decimal,
    pub commission_rate: Decimal,
    pub commission_earned: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorDashboard {
    pub vendor_id: Uuid,
    pub total_orders: u64,
    pub pending_orders: u64,
    pub delivered_revenue: Decimal,
    pub commission_rate: Decimal,
}

/// Commission owed to the platform on `revenue`.
pub fn commission(revenue: Decimal, rate: Decimal) -> Decimal {
    round_money(revenue * rate)
}

/// `orders` must be distinct; anything outside the vendor or range is skipped.
pub fn summarize_vendor(vendor: &Vendor, range: Option<DateRange>, orders: &[Order]) -> VendorReport {
    let counted: Vec<&Order> = orders
        .iter()
        .filter(|o| o.status != OrderStatus::Cancelled)
        .filter(|o| o.contains_vendor(vendor.id))
        .filter(|o| range.map_or(true, |r| r.contains(o.created_at)))
        .collect();

    let total_revenue = round_money(counted.iter().map(|o| o.total_amount).sum());

    VendorReport {
        vendor_id: vendor.id,
        range,
        total_orders: counted.len() as u64,
        total_revenue,
        commission_rate: vendor.commission_rate,
        commission_earned: commission(total_revenue, vendor.commission_rate),
    }
}

pub fn dashboard(vendor: &Vendor, orders: &[Order]) -> VendorDashboard {
    let mine = || orders.iter().filter(|o| o.contains_vendor(vendor.id));

    VendorDashboard {
        vendor_id: vendor.id,
        total_orders: mine().count() as u64,
        pending_orders: mine().filter(|o| o.status == OrderStatus::Pending).count() as u64,
        delivered_revenue: round_money(
            mine()
                .filter(|o| o.status == OrderStatus::Delivered)
                .map(|o| o.total_amount)
                .sum(),
        ),
        commission_rate: vendor.commission_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::tests::sample_order;
    use chrono::Duration;

    fn vendor_order(vendor: &Vendor, status: OrderStatus, total: i64) -> Order {
        let mut order = sample_order(status);
        order.items[0].vendor_id = vendor.id;
        order.total_amount = Decimal::new(total, 2);
        order
    }

    #[test]
    fn test_revenue_excludes_cancelled_orders() {
        let vendor = Vendor::new("Souk Textiles", Decimal::new(10, 2));
        let orders = vec![
            vendor_order(&vendor, OrderStatus::Delivered, 12500),
            vendor_order(&vendor, OrderStatus::Cancelled, 99900),
            vendor_order(&vendor, OrderStatus::Pending, 7500),
        ];

        let report = summarize_vendor(&vendor, None, &orders);
        assert_eq!(report.total_orders, 2);
        assert_eq!(report.total_revenue, Decimal::new(20000, 2));
        assert_eq!(report.commission_earned, Decimal::new(2000, 2));
    }

    #[test]
    fn test_only_cancelled_orders_yield_zero() {
        let vendor = Vendor::new("Souk Textiles", Decimal::new(10, 2));
        let orders = vec![vendor_order(&vendor, OrderStatus::Cancelled, 5000)];

        let report = summarize_vendor(&vendor, None, &orders);
        assert_eq!(report.total_revenue, Decimal::ZERO);
        assert_eq!(report.commission_earned, Decimal::ZERO);
    }

    #[test]
    fn test_range_is_inclusive() {
        let vendor = Vendor::new("Souk Textiles", Decimal::new(5, 2));
        let order = vendor_order(&vendor, OrderStatus::Shipped, 10000);
        let at = order.created_at;

        let exact = DateRange::new(at, at).unwrap();
        assert_eq!(summarize_vendor(&vendor, Some(exact), &[order.clone()]).total_orders, 1);

        let before = DateRange::new(at - Duration::days(2), at - Duration::days(1)).unwrap();
        assert_eq!(summarize_vendor(&vendor, Some(before), &[order]).total_orders, 0);
    }

    #[test]
    fn test_commission_rounds_half_up() {
        assert_eq!(commission(Decimal::new(1005, 2), Decimal::new(5, 1)), Decimal::new(503, 2));
    }

    #[test]
    fn test_dashboard_counts() {
        let vendor = Vendor::new("Oud House", Decimal::new(8, 2));
        let other = Vendor::new("Elsewhere", Decimal::ZERO);
        let orders = vec![
            vendor_order(&vendor, OrderStatus::Pending, 1000),
            vendor_order(&vendor, OrderStatus::Delivered, 4000),
            vendor_order(&other, OrderStatus::Delivered, 9000),
        ];

        let board = dashboard(&vendor, &orders);
        assert_eq!(board.total_orders, 2);
        assert_eq!(board.pending_orders, 1);
        assert_eq!(board.delivered_revenue, Decimal::new(4000, 2));
    }
}
