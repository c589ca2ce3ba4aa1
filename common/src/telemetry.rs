// Telemetry module for structured logging, metrics, and tracing

use anyhow::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::models::{ScreeningBucket, UsageMetric};

/// Initialize structured logging with JSON formatting and trace context
///
/// `RUST_LOG` wins over `log_level` when set. When `tracing_endpoint` is
/// given, spans are also exported over OTLP.
#[tracing::instrument(skip_all)]
pub fn init_logging(log_level: &str, tracing_endpoint: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(json_layer);

    if let Some(endpoint) = tracing_endpoint {
        let tracer = init_tracer(endpoint)?;
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        registry
            .with(telemetry_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(
        log_level = log_level,
        tracing_endpoint = tracing_endpoint,
        "Structured logging initialized"
    );

    Ok(())
}

fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_sdk::runtime::Tokio;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build span exporter: {}", e))?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", "tenantry"),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    global::set_tracer_provider(tracer_provider.clone());
    let tracer = tracer_provider.tracer("tenantry");

    tracing::info!(endpoint = endpoint, "OpenTelemetry tracer initialized");

    Ok(tracer)
}

/// Flush remaining spans on shutdown
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Install the Prometheus exporter with its own HTTP listener (worker)
#[tracing::instrument(skip_all)]
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_metrics();
    tracing::info!(metrics_port = metrics_port, "Prometheus metrics exporter initialized");

    Ok(())
}

/// Install the Prometheus recorder and hand back a handle for a `/metrics` route (api)
#[tracing::instrument(skip_all)]
pub fn init_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_metrics();
    tracing::info!("Prometheus metrics recorder initialized");

    Ok(handle)
}

fn describe_metrics() {
    describe_counter!("emails_synced_total", "Messages inserted by mailbox syncs");
    describe_counter!("email_sync_failures_total", "Mailbox syncs that failed");
    describe_histogram!(
        "email_sync_duration_seconds",
        "Duration of mailbox syncs in seconds"
    );
    describe_counter!(
        "screening_decisions_total",
        "Screening decisions recorded, by bucket"
    );
    describe_counter!("reminders_sent_total", "Reminders delivered");
    describe_counter!("reminders_failed_total", "Reminders that failed to deliver");
    describe_counter!("llm_requests_total", "LLM completions, by outcome");
    describe_counter!("usage_recorded_total", "Usage increments, by metric");
}

#[inline]
pub fn record_emails_synced(count: u64) {
    counter!("emails_synced_total").increment(count);
}

#[inline]
pub fn record_sync_failure(reason: &str) {
    counter!("email_sync_failures_total", "reason" => reason.to_string()).increment(1);
}

#[inline]
pub fn record_sync_duration(duration_seconds: f64) {
    histogram!("email_sync_duration_seconds").record(duration_seconds);
}

#[inline]
pub fn record_screening_decision(bucket: ScreeningBucket) {
    counter!("screening_decisions_total", "bucket" => bucket.as_str()).increment(1);
}

#[inline]
pub fn record_reminder_sent() {
    counter!("reminders_sent_total").increment(1);
}

#[inline]
pub fn record_reminder_failed() {
    counter!("reminders_failed_total").increment(1);
}

#[inline]
pub fn record_llm_request(success: bool) {
    let outcome = if success { "success" } else { "error" };
    counter!("llm_requests_total", "outcome" => outcome).increment(1);
}

#[inline]
pub fn record_usage(metric: UsageMetric, quantity: u64) {
    counter!("usage_recorded_total", "metric" => metric.as_str()).increment(quantity);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent_safe() {
        // A second init in the same process returns Err instead of panicking
        let first = init_logging("info", None);
        let second = init_logging("debug", None);
        assert!(first.is_ok() || second.is_err());
    }

    #[test]
    fn test_metrics_recording_without_exporter() {
        record_emails_synced(3);
        record_sync_failure("provider");
        record_sync_duration(0.25);
        record_screening_decision(ScreeningBucket::Feed);
        record_reminder_sent();
        record_reminder_failed();
        record_llm_request(true);
        record_usage(UsageMetric::AiRequests, 1);
    }
}
