use anyhow::Result;
use metrics::{counter, gauge, Counter, Gauge};
use std::net::SocketAddr;
use tracing::{debug, info};

/// 回收单调度相关指标
pub struct MetricsCollector {
    dispatch_errors_total: Counter,
    transit_failed_hosts_total: Counter,
    queue_depth: Gauge,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            dispatch_errors_total: counter!("recycle_dispatch_errors_total"),
            transit_failed_hosts_total: counter!("recycle_transit_failed_hosts_total"),
            queue_depth: gauge!("recycle_queue_depth"),
        }
    }

    /// 记录一次成功落库的状态流转
    pub fn record_transition(&self, from: &'static str, to: &'static str) {
        counter!("recycle_transitions_total", "from" => from, "to" => to).increment(1);
        debug!(from = from, to = to, "recycle transition recorded");
    }

    pub fn record_dispatch_error(&self) {
        self.dispatch_errors_total.increment(1);
    }

    pub fn record_transit_failed_hosts(&self, count: usize) {
        self.transit_failed_hosts_total.increment(count as u64);
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as f64);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// 安装 Prometheus 导出器，需在 tokio 运行时内调用
pub fn init_metrics(bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics address {}: {}", bind_address, e))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    info!("Prometheus metrics exporter listening on {}", addr);
    Ok(())
}
