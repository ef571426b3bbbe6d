use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Serialize;

/// Static facts reported by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    /// `postgres` or `memory`.
    pub store: &'static str,
}

impl ServiceInfo {
    pub fn new(store: &'static str) -> Self {
        Self {
            service: "marketplace-orders",
            version: env!("CARGO_PKG_VERSION"),
            store,
        }
    }
}

/// Serves `/metrics` (Prometheus text format) and `/health`.
/// Runs on its own runtime, started from a dedicated thread.
pub async fn start_metrics_server(registry: Arc<Registry>, info: ServiceInfo, port: u16) -> std::io::Result<()> {
    tracing::info!(port = port, store = info.store, "Starting metrics server on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::new(info.clone()))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

async fn metrics_handler(registry: web::Data<Arc<Registry>>) -> impl Responder {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler(info: web::Data<ServiceInfo>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": info.service,
        "version": info.version,
        "store": info.store,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use actix_web::test;

    #[actix_web::test]
    async fn test_metrics_endpoint_exposes_order_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_order_created(0.01);
        let registry = Arc::new(metrics.registry().clone());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(registry))
                .route("/metrics", web::get().to(metrics_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("orders_created_total 1"));
    }

    #[actix_web::test]
    async fn test_health_reports_store() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(ServiceInfo::new("memory")))
                .route("/health", web::get().to(health_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"], "memory");
    }
}
