use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::money::round_money;
use crate::domain::order::{DateRange, Order, OrderStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesReport {
    pub range: DateRange,
    pub total_sales: Decimal,
    pub total_orders: u64,
    pub average_order: Decimal,
    /// Every status appears, with zero when no order has it.
    pub orders_by_status: BTreeMap<String, u64>,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsPeriod {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl AnalyticsPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsPeriod::Daily => "daily",
            AnalyticsPeriod::Weekly => "weekly",
            AnalyticsPeriod::Monthly => "monthly",
            AnalyticsPeriod::Yearly => "yearly",
        }
    }

    /// Midnight UTC opening the period that contains `now`; weeks start on
    /// Monday.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let first_day = match self {
            AnalyticsPeriod::Daily => today,
            AnalyticsPeriod::Weekly => today - Duration::days(i64::from(today.weekday().num_days_from_monday())),
            AnalyticsPeriod::Monthly => today.with_day(1).unwrap_or(today),
            AnalyticsPeriod::Yearly => today.with_ordinal(1).unwrap_or(today),
        };
        Utc.from_utc_datetime(&first_day.and_time(NaiveTime::MIN))
    }
}

impl fmt::Display for AnalyticsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyticsPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(AnalyticsPeriod::Daily),
            "weekly" => Ok(AnalyticsPeriod::Weekly),
            "monthly" => Ok(AnalyticsPeriod::Monthly),
            "yearly" => Ok(AnalyticsPeriod::Yearly),
            other => Err(format!("unknown analytics period: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorAnalytics {
    pub period: AnalyticsPeriod,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_sales: Decimal,
    pub orders_count: u64,
    pub average_order_value: Decimal,
}

fn average(total: Decimal, count: u64) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        round_money(total / Decimal::from(count))
    }
}

/// All orders created inside `range`, cancelled ones included.
pub fn summarize_sales(range: DateRange, orders: &[Order], currency: &str) -> SalesReport {
    let mut orders_by_status: BTreeMap<String, u64> =
        OrderStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();

    let mut total_sales = Decimal::ZERO;
    let mut total_orders = 0u64;

    for order in orders.iter().filter(|o| range.contains(o.created_at)) {
        total_sales += order.total_amount;
        total_orders += 1;
        *orders_by_status.entry(order.status.as_str().to_string()).or_insert(0) += 1;
    }

    let total_sales = round_money(total_sales);
    SalesReport {
        range,
        total_sales,
        total_orders,
        average_order: average(total_sales, total_orders),
        orders_by_status,
        currency: currency.to_string(),
    }
}

/// Non-cancelled orders from the start of the period up to `now`.
pub fn summarize_period(period: AnalyticsPeriod, now: DateTime<Utc>, orders: &[Order]) -> VendorAnalytics {
    let start = period.start(now);

    let (total, count) = orders
        .iter()
        .filter(|o| o.status != OrderStatus::Cancelled)
        .filter(|o| o.created_at >= start && o.created_at <= now)
        .fold((Decimal::ZERO, 0u64), |(total, count), o| (total + o.total_amount, count + 1));

    let total_sales = round_money(total);
    VendorAnalytics {
        period,
        start,
        end: now,
        total_sales,
        orders_count: count,
        average_order_value: average(total_sales, count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::tests::sample_order;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn order_at(status: OrderStatus, created_at: DateTime<Utc>, total: i64) -> Order {
        let mut order = sample_order(status);
        order.created_at = created_at;
        order.total_amount = Decimal::new(total, 2);
        order
    }

    #[test]
    fn test_empty_range_has_zero_average() {
        let range = DateRange::new(at(2025, 1, 1, 0), at(2025, 1, 31, 23)).unwrap();
        let report = summarize_sales(range, &[], "SAR");

        assert_eq!(report.total_orders, 0);
        assert_eq!(report.total_sales, Decimal::ZERO);
        assert_eq!(report.average_order, Decimal::ZERO);
        assert_eq!(report.orders_by_status.len(), OrderStatus::ALL.len());
    }

    #[test]
    fn test_sales_report_totals_and_buckets() {
        let range = DateRange::new(at(2025, 1, 1, 0), at(2025, 1, 31, 0)).unwrap();
        let orders = vec![
            order_at(OrderStatus::Delivered, at(2025, 1, 1, 0), 10000),
            order_at(OrderStatus::Pending, at(2025, 1, 31, 0), 5000),
            order_at(OrderStatus::Cancelled, at(2025, 1, 15, 9), 2500),
            order_at(OrderStatus::Delivered, at(2025, 2, 1, 0), 99900),
        ];

        let report = summarize_sales(range, &orders, "SAR");
        assert_eq!(report.total_orders, 3);
        assert_eq!(report.total_sales, Decimal::new(17500, 2));
        assert_eq!(report.average_order, Decimal::new(5833, 2));
        assert_eq!(report.orders_by_status["delivered"], 1);
        assert_eq!(report.orders_by_status["cancelled"], 1);
        assert_eq!(report.orders_by_status["shipped"], 0);
    }

    #[test]
    fn test_period_starts() {
        // Thursday
        let now = at(2025, 3, 13, 15);
        assert_eq!(AnalyticsPeriod::Daily.start(now), at(2025, 3, 13, 0));
        assert_eq!(AnalyticsPeriod::Weekly.start(now), at(2025, 3, 10, 0));
        assert_eq!(AnalyticsPeriod::Monthly.start(now), at(2025, 3, 1, 0));
        assert_eq!(AnalyticsPeriod::Yearly.start(now), at(2025, 1, 1, 0));
        assert_eq!(AnalyticsPeriod::default(), AnalyticsPeriod::Monthly);
        assert_eq!("weekly".parse::<AnalyticsPeriod>().unwrap(), AnalyticsPeriod::Weekly);
    }

    #[test]
    fn test_period_summary_skips_cancelled_and_older_orders() {
        let now = at(2025, 3, 13, 15);
        let orders = vec![
            order_at(OrderStatus::Delivered, at(2025, 3, 2, 8), 4000),
            order_at(OrderStatus::Shipped, at(2025, 3, 12, 8), 2000),
            order_at(OrderStatus::Cancelled, at(2025, 3, 12, 9), 7000),
            order_at(OrderStatus::Delivered, at(2025, 2, 27, 8), 9000),
        ];

        let monthly = summarize_period(AnalyticsPeriod::Monthly, now, &orders);
        assert_eq!(monthly.orders_count, 2);
        assert_eq!(monthly.total_sales, Decimal::new(6000, 2));
        assert_eq!(monthly.average_order_value, Decimal::new(3000, 2));

        let weekly = summarize_period(AnalyticsPeriod::Weekly, now, &orders);
        assert_eq!(weekly.orders_count, 1);
    }
}
