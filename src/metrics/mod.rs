// Private module declaration
mod server;

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};

// Re-export for public API
pub use server::{start_metrics_server, ServiceInfo};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order creation (throughput, latency, failures)
// - Status and payment-status transitions
// - Cancellations and rejected transitions
// - Order-number conflict retries
// - Report generation latency
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the order core
pub struct Metrics {
    registry: Registry,

    // Creation Metrics
    pub orders_created: IntCounter,
    pub order_create_failures: IntCounterVec,
    pub order_create_duration: Histogram,
    pub order_number_retries: IntCounter,

    // Lifecycle Metrics
    pub status_transitions: IntCounterVec,
    pub orders_cancelled: IntCounter,
    pub rejected_transitions: IntCounterVec,

    // Payment Metrics
    pub payment_status_updates: IntCounterVec,
    pub payments_processed: IntCounterVec,

    // Reporting Metrics
    pub report_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Creation Metrics
        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_create_failures = IntCounterVec::new(
            Opts::new("order_create_failures_total", "Order creations that failed"),
            &["kind"],
        )?;
        registry.register(Box::new(order_create_failures.clone()))?;

        let order_create_duration = Histogram::with_opts(
            HistogramOpts::new("order_create_duration_seconds", "Order creation duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(order_create_duration.clone()))?;

        let order_number_retries = IntCounter::new(
            "order_number_retries_total",
            "Order creations retried after an order-number conflict",
        )?;
        registry.register(Box::new(order_number_retries.clone()))?;

        // Lifecycle Metrics
        let status_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Order status transitions"),
            &["from_status", "to_status"],
        )?;
        registry.register(Box::new(status_transitions.clone()))?;

        let orders_cancelled = IntCounter::new("orders_cancelled_total", "Total orders cancelled")?;
        registry.register(Box::new(orders_cancelled.clone()))?;

        let rejected_transitions = IntCounterVec::new(
            Opts::new("order_transitions_rejected_total", "Lifecycle operations rejected by business rules"),
            &["operation"],
        )?;
        registry.register(Box::new(rejected_transitions.clone()))?;

        // Payment Metrics
        let payment_status_updates = IntCounterVec::new(
            Opts::new("order_payment_status_updates_total", "Payment status changes"),
            &["to_status"],
        )?;
        registry.register(Box::new(payment_status_updates.clone()))?;

        let payments_processed = IntCounterVec::new(
            Opts::new("payments_processed_total", "Payment attempts by method and outcome"),
            &["method", "outcome"],
        )?;
        registry.register(Box::new(payments_processed.clone()))?;

        // Reporting Metrics
        let report_duration = HistogramVec::new(
            HistogramOpts::new("report_generation_duration_seconds", "Report generation duration")
                .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0]),
            &["report"],
        )?;
        registry.register(Box::new(report_duration.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_create_failures,
            order_create_duration,
            order_number_retries,
            status_transitions,
            orders_cancelled,
            rejected_transitions,
            payment_status_updates,
            payments_processed,
            report_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record an order creation attempt
    pub fn record_order_created(&self, duration_secs: f64) {
        self.orders_created.inc();
        self.order_create_duration.observe(duration_secs);
    }

    pub fn record_order_create_failure(&self, kind: &str) {
        self.order_create_failures.with_label_values(&[kind]).inc();
    }

    pub fn record_order_number_retry(&self) {
        self.order_number_retries.inc();
    }

    /// Helper to record a status transition
    pub fn record_status_transition(&self, from_status: &str, to_status: &str) {
        self.status_transitions.with_label_values(&[from_status, to_status]).inc();
    }

    pub fn record_cancellation(&self, from_status: &str) {
        self.orders_cancelled.inc();
        self.record_status_transition(from_status, "cancelled");
    }

    pub fn record_rejected_transition(&self, operation: &str) {
        self.rejected_transitions.with_label_values(&[operation]).inc();
    }

    pub fn record_payment_status(&self, to_status: &str) {
        self.payment_status_updates.with_label_values(&[to_status]).inc();
    }

    pub fn record_payment(&self, method: &str, outcome: &str) {
        self.payments_processed.with_label_values(&[method, outcome]).inc();
    }

    pub fn record_report(&self, report: &str, duration_secs: f64) {
        self.report_duration.with_label_values(&[report]).observe(duration_secs);
    }
}
