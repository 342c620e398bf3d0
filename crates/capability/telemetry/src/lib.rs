//! 追踪初始化、attempt ID 生成与进程内计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub commission_attempts: u64,
    pub commission_success: u64,
    pub commission_failure: u64,
    pub transport_failures: u64,
    pub network_restore_failures: u64,
    pub node_ids_issued: u64,
    pub mapping_persist_failures: u64,
    pub control_success: u64,
    pub control_failure: u64,
    pub hub_forward_success: u64,
    pub hub_forward_failure: u64,
    pub commission_latency_ms_total: u64,
    pub commission_latency_ms_count: u64,
}

/// 进程内计数器。
pub struct TelemetryMetrics {
    commission_attempts: AtomicU64,
    commission_success: AtomicU64,
    commission_failure: AtomicU64,
    transport_failures: AtomicU64,
    network_restore_failures: AtomicU64,
    node_ids_issued: AtomicU64,
    mapping_persist_failures: AtomicU64,
    control_success: AtomicU64,
    control_failure: AtomicU64,
    hub_forward_success: AtomicU64,
    hub_forward_failure: AtomicU64,
    commission_latency_ms_total: AtomicU64,
    commission_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            commission_attempts: AtomicU64::new(0),
            commission_success: AtomicU64::new(0),
            commission_failure: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
            network_restore_failures: AtomicU64::new(0),
            node_ids_issued: AtomicU64::new(0),
            mapping_persist_failures: AtomicU64::new(0),
            control_success: AtomicU64::new(0),
            control_failure: AtomicU64::new(0),
            hub_forward_success: AtomicU64::new(0),
            hub_forward_failure: AtomicU64::new(0),
            commission_latency_ms_total: AtomicU64::new(0),
            commission_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commission_attempts: self.commission_attempts.load(Ordering::Relaxed),
            commission_success: self.commission_success.load(Ordering::Relaxed),
            commission_failure: self.commission_failure.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            network_restore_failures: self.network_restore_failures.load(Ordering::Relaxed),
            node_ids_issued: self.node_ids_issued.load(Ordering::Relaxed),
            mapping_persist_failures: self.mapping_persist_failures.load(Ordering::Relaxed),
            control_success: self.control_success.load(Ordering::Relaxed),
            control_failure: self.control_failure.load(Ordering::Relaxed),
            hub_forward_success: self.hub_forward_success.load(Ordering::Relaxed),
            hub_forward_failure: self.hub_forward_failure.load(Ordering::Relaxed),
            commission_latency_ms_total: self
                .commission_latency_ms_total
                .load(Ordering::Relaxed),
            commission_latency_ms_count: self
                .commission_latency_ms_count
                .load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，可用 RUST_LOG 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 为一次配网尝试生成关联 ID（贯穿该次尝试的所有日志）。
pub fn new_attempt_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录配网请求次数。
pub fn record_commission_attempt() {
    metrics().commission_attempts.fetch_add(1, Ordering::Relaxed);
}

/// 记录配网成功次数。
pub fn record_commission_success() {
    metrics().commission_success.fetch_add(1, Ordering::Relaxed);
}

/// 记录配网失败次数（所有链路均失败）。
pub fn record_commission_failure() {
    metrics().commission_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录单条链路失败次数。
pub fn record_transport_failure() {
    metrics().transport_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录网络模式恢复失败次数。
pub fn record_network_restore_failure() {
    metrics()
        .network_restore_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录新分配的节点 ID 数。
pub fn record_node_id_issued() {
    metrics().node_ids_issued.fetch_add(1, Ordering::Relaxed);
}

/// 记录映射表落盘失败次数。
pub fn record_mapping_persist_failure() {
    metrics()
        .mapping_persist_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录控制/读取成功次数。
pub fn record_control_success() {
    metrics().control_success.fetch_add(1, Ordering::Relaxed);
}

/// 记录控制/读取失败次数。
pub fn record_control_failure() {
    metrics().control_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录 Hub 转发成功次数。
pub fn record_hub_forward_success() {
    metrics().hub_forward_success.fetch_add(1, Ordering::Relaxed);
}

/// 记录 Hub 转发失败次数。
pub fn record_hub_forward_failure() {
    metrics().hub_forward_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次配网的耗时（毫秒，含所有链路与网络模式切换）。
pub fn record_commission_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .commission_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .commission_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}
