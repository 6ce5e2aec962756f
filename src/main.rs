//! Review Sentiment Service - Main Entry Point
//!
//! Loads the exported pipeline once and serves predictions over HTTP.

use anyhow::{Context, Result};
use actix_web::{web, App, HttpServer};
use review_sentiment_service::{
    api::{self, AppState},
    config::{AppConfig, LogFormat, LoggingConfig},
    metrics::{MetricsReporter, ServiceMetrics},
    models::OnnxPipeline,
    service::PredictionService,
    FeatureExtractor,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("info")
            .add_directive(format!("review_sentiment_service={}", logging.level).parse()?),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
    Ok(())
}

#[actix_web::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    info!("Starting Review Sentiment Service");
    info!(
        model_path = %config.model.path,
        legacy_error_status = config.server.legacy_error_status,
        "Configuration loaded successfully"
    );

    info!(
        "Feature extractor initialized ({} features)",
        FeatureExtractor::new().feature_count()
    );

    // Load the pipeline once; it is shared read-only by every worker
    let classifier = Arc::new(OnnxPipeline::load(&config.model).context("Failed to load pipeline")?);
    let service = Arc::new(PredictionService::new(classifier));
    info!(model = %service.classifier_name(), "Prediction service initialized");

    let metrics = Arc::new(ServiceMetrics::new());
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let state = web::Data::new(AppState::new(
        service,
        metrics.clone(),
        &config.server,
        &config.metrics,
    ));

    let (host, port) = config.bind_address();
    info!(host = %host, port = port, workers = config.server.workers, "Listening");

    HttpServer::new(move || App::new().app_data(state.clone()).configure(api::configure))
        .workers(config.server.workers)
        .bind((host.as_str(), port))
        .with_context(|| format!("Failed to bind {}:{}", host, port))?
        .run()
        .await?;

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}
