//! HTTP routes

use crate::config::{MetricsConfig, ServerConfig};
use crate::metrics::ServiceMetrics;
use crate::service::PredictionService;
use crate::types::{ErrorResponse, HealthResponse, MessageResponse, ValidationErrorResponse};
use crate::validation::validate_body;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, warn};

/// Shared state handed to every handler
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub metrics: Arc<ServiceMetrics>,
    banner: String,
    internal_error_status: StatusCode,
    metrics_enabled: bool,
}

impl AppState {
    pub fn new(
        service: Arc<PredictionService>,
        metrics: Arc<ServiceMetrics>,
        server: &ServerConfig,
        metrics_config: &MetricsConfig,
    ) -> Self {
        let internal_error_status = if server.legacy_error_status {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        Self {
            service,
            metrics,
            banner: server.banner.clone(),
            internal_error_status,
            metrics_enabled: metrics_config.enabled,
        }
    }
}

/// Register all routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root))
        .route("/health", web::get().to(health))
        .route("/predict", web::post().to(predict))
        .route("/metrics", web::get().to(metrics));
}

async fn root(state: web::Data<AppState>) -> impl Responder {
    state.metrics.record_request("/");
    HttpResponse::Ok().json(MessageResponse {
        message: state.banner.clone(),
    })
}

async fn health(state: web::Data<AppState>) -> impl Responder {
    state.metrics.record_request("/health");
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        model: state.service.classifier_name().to_string(),
    })
}

async fn predict(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    state.metrics.record_request("/predict");

    let review = match validate_body(&body) {
        Ok(review) => review,
        Err(issues) => {
            warn!(issues = issues.len(), "Rejected invalid review record");
            state.metrics.record_validation_failure();
            return HttpResponse::UnprocessableEntity().json(ValidationErrorResponse { detail: issues });
        }
    };

    let start = Instant::now();
    let service = state.service.clone();
    let result = web::block(move || service.predict(&review)).await;
    let latency = start.elapsed();

    match result {
        Ok(Ok(prediction)) => {
            state
                .metrics
                .record_prediction(latency, prediction.prediction, prediction.probability);
            HttpResponse::Ok().json(prediction)
        }
        Ok(Err(e)) => internal_error(&state, latency, e.to_string()),
        Err(e) => internal_error(&state, latency, e.to_string()),
    }
}

fn internal_error(state: &AppState, latency: Duration, details: String) -> HttpResponse {
    error!(error = %details, "Prediction failed");
    state.metrics.record_inference_failure(latency);
    HttpResponse::build(state.internal_error_status).json(ErrorResponse::internal(details))
}

async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    if !state.metrics_enabled {
        return HttpResponse::NotFound().finish();
    }

    state.metrics.record_request("/metrics");
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(state.metrics.to_prometheus())
}
