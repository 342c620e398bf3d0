//! 配网会话协调器。

use crate::attempt::{AttemptOutcome, CommissionRequest, CommissioningAttempt};
use crate::error::CommissionError;
use crate::locks::KeyedLocks;
use domain::{
    CommissioningMethod, DeviceRecord, NodeId, TRANSPORT_PRIORITY, Transport, now_epoch_ms,
};
use msh_engine::{
    CommissioningEngine, EngineCommissionRequest, EngineError, EngineKind, NetworkModeSwitch,
};
use msh_storage::{DeviceStore, NodeIdentityRegistry};
use msh_telemetry::{
    new_attempt_id, record_commission_attempt, record_commission_failure,
    record_commission_latency_ms, record_commission_success, record_network_restore_failure,
    record_transport_failure,
};
use msh_transfer::CredentialTransferCoordinator;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 未指定时的设备类型。
pub const DEFAULT_DEVICE_TYPE: &str = "smart-plug";

/// 协调器层面的等待上限。
#[derive(Debug, Clone, Copy)]
pub struct CommissionTimeouts {
    pub ble: Duration,
    pub wifi_ap: Duration,
    pub network_switch: Duration,
}

impl CommissionTimeouts {
    fn for_transport(&self, transport: Transport) -> Duration {
        match transport {
            Transport::Ble => self.ble,
            Transport::WifiAp => self.wifi_ap,
        }
    }
}

impl Default for CommissionTimeouts {
    fn default() -> Self {
        Self {
            ble: Duration::from_secs(300),
            wifi_ap: Duration::from_secs(120),
            network_switch: Duration::from_secs(30),
        }
    }
}

/// 配网会话协调器。
#[derive(Clone)]
pub struct CommissioningCoordinator {
    node_registry: Arc<NodeIdentityRegistry>,
    devices: Arc<dyn DeviceStore>,
    engine: Arc<dyn CommissioningEngine>,
    secondary: Option<Arc<dyn CommissioningEngine>>,
    network: Arc<dyn NetworkModeSwitch>,
    transfer: CredentialTransferCoordinator,
    locks: KeyedLocks,
    timeouts: CommissionTimeouts,
}

impl CommissioningCoordinator {
    pub fn new(
        node_registry: Arc<NodeIdentityRegistry>,
        devices: Arc<dyn DeviceStore>,
        engine: Arc<dyn CommissioningEngine>,
        network: Arc<dyn NetworkModeSwitch>,
        transfer: CredentialTransferCoordinator,
    ) -> Self {
        Self {
            node_registry,
            devices,
            engine,
            secondary: None,
            network,
            transfer,
            locks: KeyedLocks::new(),
            timeouts: CommissionTimeouts::default(),
        }
    }

    /// 主引擎不可用时使用的备用引擎。
    pub fn with_secondary_engine(mut self, engine: Arc<dyn CommissioningEngine>) -> Self {
        self.secondary = Some(engine);
        self
    }

    pub fn with_timeouts(mut self, timeouts: CommissionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// 执行一次配网。
    ///
    /// 尝试在独立任务中运行：调用方提前放弃等待不会中断尝试本身，
    /// 也不会跳过网络模式恢复。所有链路都失败时返回 `outcome = Failure`，
    /// 需要错误形式时使用 [`CommissioningAttempt::into_result`]。
    pub async fn commission(
        &self,
        request: CommissionRequest,
    ) -> Result<CommissioningAttempt, CommissionError> {
        if request.device_key.trim().is_empty() {
            return Err(CommissionError::InvalidRequest(
                "deviceKey must not be empty".to_string(),
            ));
        }
        let this = self.clone();
        tokio::spawn(async move { this.run_attempt(request).await })
            .await
            .map_err(|err| CommissionError::Aborted(err.to_string()))?
    }

    async fn run_attempt(
        &self,
        request: CommissionRequest,
    ) -> Result<CommissioningAttempt, CommissionError> {
        let _key_guard = self.locks.acquire(&request.device_key).await;
        record_commission_attempt();
        let started_at = Instant::now();
        let attempt_id = new_attempt_id();

        let payload = msh_payload::parse_or_fallback(&request.raw_code);
        let node_id = match self.node_registry.get_or_create(&request.device_key) {
            Ok(node_id) => node_id,
            Err(err) => {
                record_commission_failure();
                warn!(
                    target: "msh.commissioning",
                    attempt_id = %attempt_id,
                    device_key = %request.device_key,
                    error = %err,
                    "commission_aborted_persistence"
                );
                return Err(CommissionError::Persistence(err.to_string()));
            }
        };
        info!(
            target: "msh.commissioning",
            attempt_id = %attempt_id,
            device_key = %request.device_key,
            node_id = %node_id,
            payload_format = %payload.format.as_str(),
            vendor_id = payload.vendor_id,
            product_id = payload.product_id,
            "commission_started"
        );

        let mut attempt = CommissioningAttempt::started(
            attempt_id,
            request.device_key.clone(),
            payload,
            request.credentials.clone(),
            node_id,
        );

        for transport in TRANSPORT_PRIORITY {
            attempt.transports_attempted.push(transport);
            let engine_request = EngineCommissionRequest {
                payload: attempt.payload.clone(),
                transport,
                node_id,
                ssid: attempt.credentials.ssid.clone(),
                password: attempt.credentials.password.clone(),
            };
            match self.try_transport(&engine_request).await {
                Ok(method) => {
                    attempt.method = Some(method);
                    attempt.outcome = AttemptOutcome::Success;
                    info!(
                        target: "msh.commissioning",
                        attempt_id = %attempt.attempt_id,
                        node_id = %node_id,
                        transport = %transport.as_str(),
                        method = %method.as_str(),
                        "commission_transport_succeeded"
                    );
                    break;
                }
                Err(err) => {
                    record_transport_failure();
                    warn!(
                        target: "msh.commissioning",
                        attempt_id = %attempt.attempt_id,
                        node_id = %node_id,
                        transport = %transport.as_str(),
                        error = %err,
                        "commission_transport_failed"
                    );
                    attempt.errors_by_transport.insert(transport, err.to_string());
                }
            }
        }

        let latency_ms = started_at.elapsed().as_millis() as u64;
        record_commission_latency_ms(latency_ms);

        let Some(method) = attempt.method else {
            record_commission_failure();
            warn!(
                target: "msh.commissioning",
                attempt_id = %attempt.attempt_id,
                device_key = %attempt.device_key,
                error = %attempt.error().unwrap_or_default(),
                latency_ms,
                "commission_failed"
            );
            return Ok(attempt);
        };

        let record = self.commissioned_record(&request, node_id, method).await;
        let record = match self.devices.upsert(record).await {
            Ok(record) => record,
            Err(err) => {
                record_commission_failure();
                return Err(CommissionError::Persistence(err.to_string()));
            }
        };
        record_commission_success();
        info!(
            target: "msh.commissioning",
            attempt_id = %attempt.attempt_id,
            device_id = %record.device_id,
            node_id = %node_id,
            method = %method.as_str(),
            latency_ms,
            "commission_succeeded"
        );

        attempt.device = Some(record.clone());
        let commissioning = attempt.commissioning_data();
        attempt.hub_notified = self
            .transfer
            .forward(&record, commissioning.as_ref())
            .await
            .success;
        Ok(attempt)
    }

    /// 重新配网时沿用已有名称与类型（请求中未给出时）。
    async fn commissioned_record(
        &self,
        request: &CommissionRequest,
        node_id: NodeId,
        method: CommissioningMethod,
    ) -> DeviceRecord {
        let existing = self
            .devices
            .get(&DeviceRecord::device_id_for(node_id))
            .await
            .ok()
            .flatten();
        let name = request
            .name
            .clone()
            .or_else(|| existing.as_ref().map(|record| record.name.clone()))
            .unwrap_or_else(|| request.device_key.clone());
        let device_type = request
            .device_type
            .clone()
            .or_else(|| existing.as_ref().map(|record| record.device_type.clone()))
            .unwrap_or_else(|| DEFAULT_DEVICE_TYPE.to_string());
        DeviceRecord::commissioned(node_id, name, device_type, method, now_epoch_ms())
    }

    /// 单条链路；WiFi-AP 在任何结果下都会恢复网络模式。
    async fn try_transport(
        &self,
        request: &EngineCommissionRequest,
    ) -> Result<CommissioningMethod, EngineError> {
        if !request.transport.requires_network_switch() {
            return self.call_engines(request).await;
        }

        let entered = bounded(
            self.timeouts.network_switch,
            "enter commissioning mode",
            self.network.enter_commissioning_mode(),
        )
        .await;
        let result = match entered {
            Ok(()) => self.call_engines(request).await,
            Err(err) => Err(err),
        };
        self.restore_network(request.node_id).await;
        result
    }

    async fn restore_network(&self, node_id: NodeId) {
        let restored = bounded(
            self.timeouts.network_switch,
            "restore normal mode",
            self.network.restore_normal_mode(),
        )
        .await;
        if let Err(err) = restored {
            record_network_restore_failure();
            warn!(
                target: "msh.commissioning",
                node_id = %node_id,
                error = %err,
                "network_restore_failed"
            );
        }
    }

    /// 主引擎报告不可用时才会转向备用引擎。
    async fn call_engines(
        &self,
        request: &EngineCommissionRequest,
    ) -> Result<CommissioningMethod, EngineError> {
        let limit = self.timeouts.for_transport(request.transport);
        match bounded(limit, "commission", self.engine.attempt_commission(request)).await {
            Ok(_) => Ok(method_for(self.engine.kind(), request.transport, false)),
            Err(err) if err.is_unavailable() => {
                let Some(secondary) = &self.secondary else {
                    return Err(err);
                };
                info!(
                    target: "msh.commissioning",
                    node_id = %request.node_id,
                    transport = %request.transport.as_str(),
                    primary = %self.engine.name(),
                    secondary = %secondary.name(),
                    reason = %err,
                    "commission_engine_fallback"
                );
                bounded(limit, "commission", secondary.attempt_commission(request)).await?;
                Ok(method_for(secondary.kind(), request.transport, true))
            }
            Err(err) => Err(err),
        }
    }
}

fn method_for(kind: EngineKind, transport: Transport, via_secondary: bool) -> CommissioningMethod {
    match (kind, via_secondary) {
        (EngineKind::Simulated, _) => CommissioningMethod::Mock,
        (EngineKind::Native, true) => CommissioningMethod::EngineFallback,
        (EngineKind::Native, false) => CommissioningMethod::from(transport),
    }
}

async fn bounded<T, F>(limit: Duration, operation: &str, future: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    tokio::time::timeout(limit, future).await.unwrap_or_else(|_| {
        Err(EngineError::Timeout(format!(
            "{} exceeded {}ms",
            operation,
            limit.as_millis()
        )))
    })
}
