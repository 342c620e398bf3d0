//! 调用方 DTO、配网结果与 Hub 通知报文。

use serde::{Deserialize, Serialize};

/// 配网请求体。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRequestDto {
    #[serde(alias = "device_key", alias = "deviceName", alias = "device_name")]
    pub device_key: String,
    #[serde(alias = "qr_code", alias = "qrCode", alias = "setup_code")]
    pub setup_code: String,
    #[serde(alias = "wifi_ssid")]
    pub ssid: String,
    #[serde(alias = "wifi_password")]
    pub password: String,
    pub name: Option<String>,
    #[serde(alias = "device_type")]
    pub device_type: Option<String>,
}

/// 配网结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionResponse {
    pub success: bool,
    pub error: Option<String>,
    pub device_id: Option<String>,
    /// 16 位大写十六进制。
    pub node_id: String,
    pub commissioning_method: Option<String>,
    pub transports_attempted: Vec<String>,
    pub hub_notified: bool,
}

/// 设备返回结构。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub device_id: String,
    pub node_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub state: String,
    pub power_state: bool,
    pub last_seen_ms: i64,
    pub commissioning_method: String,
    pub is_mock: bool,
    pub power_watts: Option<f64>,
    pub energy_wh: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
}

/// 发往 Hub 的设备更新通知（`POST /api/devices/update`）。
///
/// 字段名沿用 Hub Web 应用已有的下划线格式；不携带 passcode 与 WiFi 密码。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceUpdateNotification {
    pub device_id: String,
    pub device_data: DeviceData,
    /// 手动登记的设备没有配网过程，此字段为空。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commissioning_data: Option<CommissioningData>,
}

/// 打包后的配网结果，随通知发往 Hub 并写入转发记录。
///
/// 只含可公开的配网参数；passcode、原始配网码与 WiFi 密码都不在其中。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissioningData {
    pub attempt_id: String,
    /// `0x` 前缀的四位十六进制。
    pub vendor_id: String,
    pub product_id: String,
    pub discriminator: u16,
    pub payload_format: String,
    pub commissioning_method: String,
    pub network_ssid: String,
    pub transports_attempted: Vec<String>,
    pub commissioned_at_ms: i64,
}

/// 通知中的设备快照。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceData {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub node_id: String,
    pub state: DevicePowerData,
    pub commissioned: bool,
    pub mock: bool,
    pub method: String,
    pub last_seen_ms: i64,
}

/// 通知中的电参量。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePowerData {
    pub power: bool,
    pub power_consumption: f64,
    pub energy: f64,
}
