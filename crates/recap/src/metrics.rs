use anyhow::Result;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Instant;

pub fn describe() {
    describe_counter!(
        "recap_api_requests_total",
        "Number of provider API requests made."
    );
    describe_histogram!(
        "recap_api_latency_ms",
        "Provider API request latency in milliseconds."
    );
    describe_counter!(
        "recap_provider_fallbacks_total",
        "Number of times the EVM primary tier failed and the fallback tier was used."
    );
    describe_counter!(
        "recap_recaps_built_total",
        "Number of wallet recaps computed, by outcome."
    );
    describe_counter!(
        "recap_transactions_normalized_total",
        "Number of canonical transactions produced, by chain."
    );
}

pub fn install_prometheus(port: u16) -> Result<PrometheusHandle> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    Ok(PrometheusBuilder::new()
        .with_http_listener(addr)
        .install_recorder()?)
}

/// Record latency and outcome for one provider call.
pub fn record_api_call<T>(
    provider: &'static str,
    endpoint: &'static str,
    start: Instant,
    res: &Result<T>,
) {
    let ms = start.elapsed().as_secs_f64() * 1000.0;
    metrics::histogram!("recap_api_latency_ms", "provider" => provider, "endpoint" => endpoint)
        .record(ms);
    let status = if res.is_ok() { "ok" } else { "error" };
    metrics::counter!(
        "recap_api_requests_total",
        "provider" => provider,
        "endpoint" => endpoint,
        "status" => status
    )
    .increment(1);
}
