//! 设备记录与生命周期状态。

use crate::node::NodeId;

/// 配网链路。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Transport {
    Ble,
    WifiAp,
}

/// 固定的链路尝试顺序：BLE 不需要切换 Hub 自身的网络模式，优先尝试。
pub const TRANSPORT_PRIORITY: [Transport; 2] = [Transport::Ble, Transport::WifiAp];

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ble => "ble",
            Self::WifiAp => "wifi-ap",
        }
    }

    /// 面向人的标签（用于聚合错误信息）。
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ble => "BLE",
            Self::WifiAp => "WiFi-AP",
        }
    }

    /// 是否需要把 Hub 切换到 AP 模式。
    pub fn requires_network_switch(&self) -> bool {
        matches!(self, Self::WifiAp)
    }
}

/// 设备生命周期状态。
///
/// - `Discovered → Commissioning`：配网开始（逻辑状态，不单独落库）
/// - `Commissioning → Commissioned`：配网成功，`power_state` 初始化为 false
/// - `Commissioned → Commissioned`：每次控制/读取成功，刷新 `last_seen_ms`
/// - `Commissioned → ControlFailed`：控制链路失败，记录保留以便重试
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    Discovered,
    Commissioning,
    Commissioned,
    ControlFailed,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Commissioning => "commissioning",
            Self::Commissioned => "commissioned",
            Self::ControlFailed => "control-failed",
        }
    }

    /// 是否已有可寻址的节点（可以下发控制命令）。
    pub fn is_controllable(&self) -> bool {
        matches!(self, Self::Commissioned | Self::ControlFailed)
    }
}

/// 设备最终通过哪条路径完成配网。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommissioningMethod {
    Ble,
    WifiAp,
    /// 主引擎不可用，由备用原生引擎完成。
    EngineFallback,
    /// 主引擎不可用，由模拟引擎应答。
    Mock,
    /// 已在外部完成配网，按节点 ID 手动登记。
    Manual,
}

impl CommissioningMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ble => "ble",
            Self::WifiAp => "wifi-ap",
            Self::EngineFallback => "engine-fallback",
            Self::Mock => "mock",
            Self::Manual => "manual",
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, Self::Mock)
    }
}

impl From<Transport> for CommissioningMethod {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Ble => Self::Ble,
            Transport::WifiAp => Self::WifiAp,
        }
    }
}

/// 插座电参量（读取失败的字段保持 None）。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PowerMetrics {
    pub power_watts: Option<f64>,
    pub energy_wh: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
}

impl PowerMetrics {
    pub fn is_empty(&self) -> bool {
        self.power_watts.is_none()
            && self.energy_wh.is_none()
            && self.voltage.is_none()
            && self.current.is_none()
    }

    /// 用较新读数覆盖，缺失的字段保留原值。
    pub fn merge(&mut self, newer: PowerMetrics) {
        self.power_watts = newer.power_watts.or(self.power_watts);
        self.energy_wh = newer.energy_wh.or(self.energy_wh);
        self.voltage = newer.voltage.or(self.voltage);
        self.current = newer.current.or(self.current);
    }
}

/// 设备记录（由设备注册表独占持有）。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub device_id: String,
    /// 创建后不可变。
    pub node_id: NodeId,
    pub name: String,
    pub device_type: String,
    pub state: DeviceState,
    pub power_state: bool,
    pub last_seen_ms: i64,
    pub commissioning_method: CommissioningMethod,
    pub is_mock: bool,
    pub metrics: PowerMetrics,
}

impl DeviceRecord {
    /// 由节点 ID 派生设备 ID：同一 deviceKey 重复配网总是落到同一条记录。
    pub fn device_id_for(node_id: NodeId) -> String {
        format!("matter_{}", node_id.to_hex())
    }

    /// 配网成功后的新记录。
    pub fn commissioned(
        node_id: NodeId,
        name: impl Into<String>,
        device_type: impl Into<String>,
        method: CommissioningMethod,
        now_ms: i64,
    ) -> Self {
        Self {
            device_id: Self::device_id_for(node_id),
            node_id,
            name: name.into(),
            device_type: device_type.into(),
            state: DeviceState::Commissioned,
            power_state: false,
            last_seen_ms: now_ms,
            commissioning_method: method,
            is_mock: method.is_mock(),
            metrics: PowerMetrics::default(),
        }
    }
}
