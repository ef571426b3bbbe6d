// ============================================================================
// Reporting - read-only revenue, commission and sales figures
// ============================================================================
//
// Orchestrates: Actor check → Store read → pure summarizing functions
//
// Nothing here writes; every figure is recomputed from stored orders.
//
// ============================================================================

pub mod commission;
pub mod sales;

pub use commission::{VendorDashboard, VendorReport};
pub use sales::{AnalyticsPeriod, SalesReport, VendorAnalytics};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::actor::Actor;
use crate::domain::catalog::Vendor;
use crate::domain::order::{DateRange, OrderError};
use crate::metrics::Metrics;
use crate::store::{Catalog, OrderStore};
use crate::utils::{Clock, SystemClock};

pub struct ReportService {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn Catalog>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
    currency: String,
}

impl ReportService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn Catalog>,
        metrics: Arc<Metrics>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            catalog,
            clock: Arc::new(SystemClock),
            metrics,
            currency: currency.into(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn vendor_report(
        &self,
        actor: Actor,
        vendor_id: Uuid,
        range: Option<DateRange>,
    ) -> Result<VendorReport, OrderError> {
        let started = Instant::now();
        let vendor = self.vendor_for(actor, vendor_id).await?;
        let orders = self.store.vendor_orders(vendor_id, range).await?;

        let report = commission::summarize_vendor(&vendor, range, &orders);
        self.metrics.record_report("vendor", started.elapsed().as_secs_f64());
        tracing::debug!(
            vendor_id = %vendor_id,
            total_orders = report.total_orders,
            revenue = %report.total_revenue,
            "Vendor report computed"
        );
        Ok(report)
    }

    pub async fn vendor_dashboard(&self, actor: Actor, vendor_id: Uuid) -> Result<VendorDashboard, OrderError> {
        let started = Instant::now();
        let vendor = self.vendor_for(actor, vendor_id).await?;
        let orders = self.store.vendor_orders(vendor_id, None).await?;

        let dashboard = commission::dashboard(&vendor, &orders);
        self.metrics.record_report("dashboard", started.elapsed().as_secs_f64());
        Ok(dashboard)
    }

    pub async fn vendor_analytics(
        &self,
        actor: Actor,
        vendor_id: Uuid,
        period: AnalyticsPeriod,
    ) -> Result<VendorAnalytics, OrderError> {
        let started = Instant::now();
        self.vendor_for(actor, vendor_id).await?;

        let now = self.clock.now();
        let range = DateRange::new(period.start(now), now)?;
        let orders = self.store.vendor_orders(vendor_id, Some(range)).await?;

        let analytics = sales::summarize_period(period, now, &orders);
        self.metrics.record_report("analytics", started.elapsed().as_secs_f64());
        tracing::debug!(vendor_id = %vendor_id, period = %period, orders = analytics.orders_count, "Vendor analytics computed");
        Ok(analytics)
    }

    /// Platform-wide sales over an inclusive window. Staff only.
    pub async fn sales_report(
        &self,
        actor: Actor,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SalesReport, OrderError> {
        if !actor.is_privileged() {
            return Err(OrderError::Forbidden(format!("{} cannot read sales reports", actor.role())));
        }

        let started = Instant::now();
        let range = DateRange::new(start, end)?;
        let orders = self.store.orders_created_between(range).await?;

        let report = sales::summarize_sales(range, &orders, &self.currency);
        self.metrics.record_report("sales", started.elapsed().as_secs_f64());
        tracing::debug!(
            start = %start,
            end = %end,
            total_orders = report.total_orders,
            total_sales = %report.total_sales,
            "Sales report computed"
        );
        Ok(report)
    }

    /// Vendors see their own figures; staff see everyone's.
    async fn vendor_for(&self, actor: Actor, vendor_id: Uuid) -> Result<Vendor, OrderError> {
        match actor {
            Actor::Vendor(id) if id == vendor_id => {}
            Actor::Admin | Actor::System => {}
            _ => {
                return Err(OrderError::Forbidden(format!(
                    "{} cannot read reports of vendor {vendor_id}",
                    actor.role()
                )))
            }
        }

        self.catalog
            .find_vendor(vendor_id)
            .await?
            .ok_or(OrderError::VendorNotFound(vendor_id))
    }
}
