use msh_telemetry::{
    TelemetryMetrics, init_tracing, metrics, new_attempt_id, record_commission_attempt,
    record_commission_latency_ms,
};

#[test]
fn attempt_ids_are_unique() {
    let first = new_attempt_id();
    let second = new_attempt_id();
    assert!(!first.is_empty());
    assert_ne!(first, second);
}

#[test]
fn fresh_metrics_start_at_zero() {
    let snapshot = TelemetryMetrics::new().snapshot();
    assert_eq!(snapshot.commission_attempts, 0);
    assert_eq!(snapshot.hub_forward_failure, 0);
}

#[test]
fn counters_are_monotonic() {
    let before = metrics().snapshot();
    record_commission_attempt();
    record_commission_latency_ms(250);
    let after = metrics().snapshot();
    assert!(after.commission_attempts >= before.commission_attempts + 1);
    assert!(after.commission_latency_ms_total >= before.commission_latency_ms_total + 250);
    assert!(after.commission_latency_ms_count >= before.commission_latency_ms_count + 1);
}

#[test]
fn init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!(target: "msh.commissioning", "tracing_ready");
}
