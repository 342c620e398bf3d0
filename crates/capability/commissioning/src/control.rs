//! 已配网设备的控制与状态读取。

use crate::error::ControlError;
use domain::{CommissioningMethod, DeviceRecord, NodeId, now_epoch_ms};
use msh_engine::{CommissioningEngine, DeviceCommand, EngineError};
use msh_storage::DeviceStore;
use msh_telemetry::{record_control_failure, record_control_success};
use msh_transfer::{CredentialTransferCoordinator, ForwardOutcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 引擎超出自身电参量预算时的额外等待。
const METRICS_GRACE: Duration = Duration::from_secs(1);

/// 外部已完成配网、按节点 ID 登记的设备。
#[derive(Debug, Clone)]
pub struct ManualRegistration {
    pub node_id: NodeId,
    pub name: String,
    pub device_type: String,
}

/// 设备控制服务。
#[derive(Clone)]
pub struct DeviceControlService {
    devices: Arc<dyn DeviceStore>,
    engine: Arc<dyn CommissioningEngine>,
    secondary: Option<Arc<dyn CommissioningEngine>>,
    transfer: CredentialTransferCoordinator,
    control_timeout: Duration,
}

impl DeviceControlService {
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        engine: Arc<dyn CommissioningEngine>,
        transfer: CredentialTransferCoordinator,
        control_timeout: Duration,
    ) -> Self {
        Self {
            devices,
            engine,
            secondary: None,
            transfer,
            control_timeout,
        }
    }

    /// 经备用引擎配网的设备（Mock / EngineFallback）继续由备用引擎控制。
    pub fn with_secondary_engine(mut self, engine: Arc<dyn CommissioningEngine>) -> Self {
        self.secondary = Some(engine);
        self
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>, ControlError> {
        Ok(self.devices.list().await?)
    }

    pub async fn get_device(&self, device_id: &str) -> Result<DeviceRecord, ControlError> {
        self.devices
            .get(device_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(device_id.to_string()))
    }

    pub async fn delete_device(&self, device_id: &str) -> Result<(), ControlError> {
        if self.devices.delete(device_id).await? {
            info!(target: "msh.commissioning", device_id = %device_id, "device_deleted");
            Ok(())
        } else {
            Err(ControlError::NotFound(device_id.to_string()))
        }
    }

    pub async fn set_power(
        &self,
        device_id: &str,
        power_on: bool,
    ) -> Result<DeviceRecord, ControlError> {
        let record = self.get_device(device_id).await?;
        self.apply_power(&record, power_on).await
    }

    /// 按注册表中的当前状态取反，下发显式的 on/off。
    pub async fn toggle_power(&self, device_id: &str) -> Result<DeviceRecord, ControlError> {
        let record = self.get_device(device_id).await?;
        self.apply_power(&record, !record.power_state).await
    }

    /// 读取开关状态与电参量并写回注册表。
    ///
    /// 只有开关状态读取失败才算链路失败；电参量在 `control_timeout` 预算内尽力读取，
    /// 读不到的字段保留旧值。
    pub async fn refresh_state(&self, device_id: &str) -> Result<DeviceRecord, ControlError> {
        let record = self.get_device(device_id).await?;
        let engine = self.engine_for(&record);
        let read = tokio::time::timeout(self.control_timeout, engine.read_state(record.node_id));
        let report = match read.await {
            Ok(Ok(report)) => report,
            Ok(Err(err)) => return Err(self.fail(&record, "read_state", err).await),
            Err(_) => {
                return Err(self.fail(&record, "read_state", self.timeout_error()).await);
            }
        };
        record_control_success();

        let mut metrics = report.metrics;
        let budget = self.control_timeout;
        let extra = engine.read_metrics(record.node_id, budget);
        match tokio::time::timeout(budget + METRICS_GRACE, extra).await {
            Ok(extra) => metrics.merge(extra),
            Err(_) => warn!(
                target: "msh.commissioning",
                device_id = %record.device_id,
                budget_ms = budget.as_millis() as u64,
                "metric_read_overran"
            ),
        }

        let now = now_epoch_ms();
        let power_on = report.power_on.unwrap_or(record.power_state);
        let mut updated = self.devices.set_power_state(device_id, power_on, now).await?;
        if !metrics.is_empty() {
            updated = self.devices.record_metrics(device_id, metrics, now).await?;
        }
        Ok(updated)
    }

    /// 登记外部已配网的设备并通知 Hub。
    pub async fn register_manual(
        &self,
        registration: ManualRegistration,
    ) -> Result<(DeviceRecord, ForwardOutcome), ControlError> {
        let record = DeviceRecord::commissioned(
            registration.node_id,
            registration.name,
            registration.device_type,
            CommissioningMethod::Manual,
            now_epoch_ms(),
        );
        let record = self.devices.upsert(record).await?;
        info!(
            target: "msh.commissioning",
            device_id = %record.device_id,
            node_id = %record.node_id,
            "device_registered_manually"
        );
        let outcome = self.transfer.forward(&record, None).await;
        Ok((record, outcome))
    }

    async fn apply_power(
        &self,
        record: &DeviceRecord,
        power_on: bool,
    ) -> Result<DeviceRecord, ControlError> {
        let engine = self.engine_for(record);
        let command = DeviceCommand::on_off(power_on);
        let send = engine.send_command(record.node_id, &command);
        match tokio::time::timeout(self.control_timeout, send).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(self.fail(record, "send_command", err).await),
            Err(_) => return Err(self.fail(record, "send_command", self.timeout_error()).await),
        }
        record_control_success();
        info!(
            target: "msh.commissioning",
            device_id = %record.device_id,
            node_id = %record.node_id,
            power_on,
            "device_power_set"
        );
        Ok(self
            .devices
            .set_power_state(&record.device_id, power_on, now_epoch_ms())
            .await?)
    }

    fn engine_for(&self, record: &DeviceRecord) -> &Arc<dyn CommissioningEngine> {
        match (record.commissioning_method, &self.secondary) {
            (CommissioningMethod::Mock | CommissioningMethod::EngineFallback, Some(secondary)) => {
                secondary
            }
            _ => &self.engine,
        }
    }

    fn timeout_error(&self) -> EngineError {
        EngineError::Timeout(format!(
            "control exceeded {}ms",
            self.control_timeout.as_millis()
        ))
    }

    async fn fail(
        &self,
        record: &DeviceRecord,
        operation: &'static str,
        err: EngineError,
    ) -> ControlError {
        record_control_failure();
        warn!(
            target: "msh.commissioning",
            device_id = %record.device_id,
            node_id = %record.node_id,
            operation,
            error = %err,
            "device_control_failed"
        );
        if let Err(store_err) = self.devices.mark_control_failed(&record.device_id).await {
            return ControlError::from(store_err);
        }
        ControlError::Transport(err.to_string())
    }
}
