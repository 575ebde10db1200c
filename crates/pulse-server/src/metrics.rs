use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// 初始化 Prometheus metrics exporter
pub fn init_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_metrics();

    tracing::info!("Metrics exporter started on http://{}/metrics", addr);
    Ok(())
}

/// 描述所有指标
fn describe_metrics() {
    describe_counter!(
        "pulse_samples_ingested_total",
        "Samples parsed and buffered for the current window"
    );
    describe_counter!(
        "pulse_parse_failures_total",
        "Inbound payloads dropped as non-numeric"
    );
    describe_counter!(
        "pulse_windows_emitted_total",
        "Window summaries published"
    );
    describe_counter!(
        "pulse_messages_relayed_total",
        "Messages forwarded in relay mode"
    );
}
