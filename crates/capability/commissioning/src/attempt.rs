//! 配网请求、单次配网尝试与面向调用方的结果。

use api_contract::{CommissionRequestDto, CommissionResponse, CommissioningData, DeviceDto};
use domain::{CommissioningMethod, DeviceRecord, NodeId, SetupPayload, Transport};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CommissionError;

/// 交给设备的 WiFi 凭据。
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkCredentials {
    pub ssid: String,
    pub password: String,
}

impl fmt::Debug for NetworkCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// 配网请求。
#[derive(Debug, Clone)]
pub struct CommissionRequest {
    /// 调用方选定的稳定设备标识。
    pub device_key: String,
    pub raw_code: String,
    pub credentials: NetworkCredentials,
    pub name: Option<String>,
    pub device_type: Option<String>,
}

impl CommissionRequest {
    pub fn new(
        device_key: impl Into<String>,
        raw_code: impl Into<String>,
        ssid: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            device_key: device_key.into(),
            raw_code: raw_code.into(),
            credentials: NetworkCredentials {
                ssid: ssid.into(),
                password: password.into(),
            },
            name: None,
            device_type: None,
        }
    }
}

impl From<CommissionRequestDto> for CommissionRequest {
    fn from(dto: CommissionRequestDto) -> Self {
        Self {
            device_key: dto.device_key,
            raw_code: dto.setup_code,
            credentials: NetworkCredentials {
                ssid: dto.ssid,
                password: dto.password,
            },
            name: dto.name,
            device_type: dto.device_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// 一次配网尝试（不落库）。
#[derive(Debug, Clone)]
pub struct CommissioningAttempt {
    pub attempt_id: String,
    pub device_key: String,
    pub payload: SetupPayload,
    pub credentials: NetworkCredentials,
    pub node_id: NodeId,
    /// 按尝试顺序。
    pub transports_attempted: Vec<Transport>,
    pub outcome: AttemptOutcome,
    pub errors_by_transport: BTreeMap<Transport, String>,
    pub method: Option<CommissioningMethod>,
    pub device: Option<DeviceRecord>,
    pub hub_notified: bool,
}

impl CommissioningAttempt {
    pub(crate) fn started(
        attempt_id: String,
        device_key: String,
        payload: SetupPayload,
        credentials: NetworkCredentials,
        node_id: NodeId,
    ) -> Self {
        Self {
            attempt_id,
            device_key,
            payload,
            credentials,
            node_id,
            transports_attempted: Vec::new(),
            outcome: AttemptOutcome::Failure,
            errors_by_transport: BTreeMap::new(),
            method: None,
            device: None,
            hub_notified: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }

    /// 失败时按尝试顺序拼接各链路错误，如 `BLE failed: ..., WiFi-AP failed: ...`。
    pub fn error(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        let parts: Vec<String> = self
            .transports_attempted
            .iter()
            .filter_map(|transport| {
                self.errors_by_transport
                    .get(transport)
                    .map(|message| format!("{} failed: {}", transport.label(), message))
            })
            .collect();
        if parts.is_empty() {
            Some("no transport attempted".to_string())
        } else {
            Some(parts.join(", "))
        }
    }

    /// 成功返回设备记录，失败返回聚合错误。
    pub fn into_result(self) -> Result<DeviceRecord, CommissionError> {
        let error = self.error();
        match (self.outcome, self.device) {
            (AttemptOutcome::Success, Some(device)) => Ok(device),
            _ => Err(CommissionError::AllTransportsFailed(
                error.unwrap_or_else(|| "device record missing".to_string()),
            )),
        }
    }

    /// 成功时打包转发给 Hub 的配网结果；不含 passcode、原始码与 WiFi 密码。
    pub fn commissioning_data(&self) -> Option<CommissioningData> {
        let (device, method) = match (self.outcome, &self.device, self.method) {
            (AttemptOutcome::Success, Some(device), Some(method)) => (device, method),
            _ => return None,
        };
        Some(CommissioningData {
            attempt_id: self.attempt_id.clone(),
            vendor_id: format!("0x{:04X}", self.payload.vendor_id),
            product_id: format!("0x{:04X}", self.payload.product_id),
            discriminator: self.payload.discriminator,
            payload_format: self.payload.format.as_str().to_string(),
            commissioning_method: method.as_str().to_string(),
            network_ssid: self.credentials.ssid.clone(),
            transports_attempted: self.transport_names(),
            commissioned_at_ms: device.last_seen_ms,
        })
    }

    pub fn to_response(&self) -> CommissionResponse {
        CommissionResponse {
            success: self.is_success(),
            error: self.error(),
            device_id: self.device.as_ref().map(|device| device.device_id.clone()),
            node_id: self.node_id.to_hex(),
            commissioning_method: self.method.map(|method| method.as_str().to_string()),
            transports_attempted: self.transport_names(),
            hub_notified: self.hub_notified,
        }
    }

    fn transport_names(&self) -> Vec<String> {
        self.transports_attempted
            .iter()
            .map(|transport| transport.as_str().to_string())
            .collect()
    }
}

/// 设备记录 → 返回结构。
pub fn device_dto(record: &DeviceRecord) -> DeviceDto {
    DeviceDto {
        device_id: record.device_id.clone(),
        node_id: record.node_id.to_hex(),
        name: record.name.clone(),
        device_type: record.device_type.clone(),
        state: record.state.as_str().to_string(),
        power_state: record.power_state,
        last_seen_ms: record.last_seen_ms,
        commissioning_method: record.commissioning_method.as_str().to_string(),
        is_mock: record.is_mock,
        power_watts: record.metrics.power_watts,
        energy_wh: record.metrics.energy_wh,
        voltage: record.metrics.voltage,
        current: record.metrics.current,
    }
}
