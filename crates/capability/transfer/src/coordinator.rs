//! 转发协调器。

use crate::error::TransferError;
use crate::log::{TransferLog, TransferRecord, TransferStatus};
use crate::notifier::HubNotifier;
use api_contract::{CommissioningData, DeviceData, DevicePowerData, DeviceUpdateNotification};
use domain::{DeviceRecord, now_epoch_ms};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 转发结果；失败不会以错误形式抛出。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardOutcome {
    pub success: bool,
}

/// 由设备记录与配网结果构造 Hub 通知（不含任何配网凭据）。
pub fn notification_for(
    device: &DeviceRecord,
    commissioning: Option<&CommissioningData>,
) -> DeviceUpdateNotification {
    DeviceUpdateNotification {
        device_id: device.device_id.clone(),
        device_data: DeviceData {
            name: device.name.clone(),
            device_type: device.device_type.clone(),
            node_id: device.node_id.to_hex(),
            state: DevicePowerData {
                power: device.power_state,
                power_consumption: device.metrics.power_watts.unwrap_or_default(),
                energy: device.metrics.energy_wh.unwrap_or_default(),
            },
            commissioned: device.state.is_controllable(),
            mock: device.is_mock,
            method: device.commissioning_method.as_str().to_string(),
            last_seen_ms: device.last_seen_ms,
        },
        commissioning_data: commissioning.cloned(),
    }
}

/// 配网结果转发协调器。
#[derive(Clone)]
pub struct CredentialTransferCoordinator {
    notifier: Arc<dyn HubNotifier>,
    log: Arc<dyn TransferLog>,
    timeout: Duration,
}

impl CredentialTransferCoordinator {
    pub fn new(
        notifier: Arc<dyn HubNotifier>,
        log: Arc<dyn TransferLog>,
        timeout: Duration,
    ) -> Self {
        Self {
            notifier,
            log,
            timeout,
        }
    }

    /// 通知一次 Hub 并记录结果。
    ///
    /// `commissioning` 为本次配网的打包结果，随通知发送并写入转发记录；
    /// 手动登记的设备传 None。
    pub async fn forward(
        &self,
        device: &DeviceRecord,
        commissioning: Option<&CommissioningData>,
    ) -> ForwardOutcome {
        let target = self.notifier.target();
        let entry = Entry {
            device,
            target: &target,
            commissioning,
        };
        if !self.notifier.is_enabled() {
            self.append(entry, TransferStatus::Skipped, None);
            return ForwardOutcome { success: false };
        }

        let notification = notification_for(device, commissioning);
        let send = self.notifier.notify(&notification);
        let result = match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(TransferError::Unreachable(format!(
                "no response within {}ms",
                self.timeout.as_millis()
            ))),
        };

        match result {
            Ok(()) => {
                msh_telemetry::record_hub_forward_success();
                info!(
                    target: "msh.transfer",
                    device_id = %device.device_id,
                    hub = %target,
                    "hub_forward_delivered"
                );
                self.append(entry, TransferStatus::Delivered, None);
                ForwardOutcome { success: true }
            }
            Err(err) => {
                msh_telemetry::record_hub_forward_failure();
                warn!(
                    target: "msh.transfer",
                    device_id = %device.device_id,
                    hub = %target,
                    error = %err,
                    "hub_forward_failed"
                );
                self.append(entry, TransferStatus::Failed, Some(err.to_string()));
                ForwardOutcome { success: false }
            }
        }
    }

    /// 转发历史（新的在前）。
    pub fn transfer_history(
        &self,
        device_id: Option<&str>,
    ) -> Result<Vec<TransferRecord>, TransferError> {
        self.log.history(device_id)
    }

    fn append(&self, entry: Entry<'_>, status: TransferStatus, message: Option<String>) {
        let record = TransferRecord {
            device_id: entry.device.device_id.clone(),
            target: entry.target.to_string(),
            status,
            message,
            timestamp_ms: now_epoch_ms(),
            commissioning_data: entry.commissioning.cloned(),
        };
        if let Err(err) = self.log.append(&record) {
            warn!(
                target: "msh.transfer",
                device_id = %entry.device.device_id,
                error = %err,
                "transfer_log_append_failed"
            );
        }
    }
}

#[derive(Clone, Copy)]
struct Entry<'a> {
    device: &'a DeviceRecord,
    target: &'a str,
    commissioning: Option<&'a CommissioningData>,
}
