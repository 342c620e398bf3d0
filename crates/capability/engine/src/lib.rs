//! 配网引擎能力抽象。
//!
//! 真正的 Matter 握手、BLE 链路与 WiFi 凭据下发都由外部引擎完成，
//! 本 crate 只定义调用契约与几种实现：
//!
//! - [`ChipToolEngine`]：驱动 chip-tool 子进程
//! - [`SimulatedEngine`]：总是应答的模拟引擎（备用路径，结果标记为 Mock）
//! - [`UnavailableEngine`]：显式的“没有引擎”变体
//!
//! 每次调用都有超时上限；超时与连接失败都按链路失败处理，不会 panic。

pub mod chip_tool;
pub mod error;
pub mod network;
pub mod simulated;

pub use chip_tool::{ChipToolConfig, ChipToolEngine};
pub use error::EngineError;
pub use network::{
    NetworkModeSwitch, NoopNetworkModeSwitch, ScriptNetworkModeSwitch, ScriptSwitchConfig,
};
pub use simulated::{SimulatedEngine, UnavailableEngine};

use async_trait::async_trait;
use domain::{NodeId, PowerMetrics, SetupPayload, Transport};
use std::fmt;
use std::time::Duration;

/// 引擎类别：决定备用路径成功时记录的配网方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// 真实协议引擎。
    Native,
    /// 模拟引擎。
    Simulated,
}

/// 一次配网调用的参数。
#[derive(Clone)]
pub struct EngineCommissionRequest {
    pub payload: SetupPayload,
    pub transport: Transport,
    pub node_id: NodeId,
    pub ssid: String,
    pub password: String,
}

impl fmt::Debug for EngineCommissionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineCommissionRequest")
            .field("payload", &self.payload)
            .field("transport", &self.transport)
            .field("node_id", &self.node_id)
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// 配网成功结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineCommissioned {
    pub node_id: NodeId,
}

/// 集群命令（节点 ID 与 endpoint 由引擎补齐）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    pub cluster: String,
    pub command: String,
    pub args: Vec<String>,
}

impl DeviceCommand {
    pub fn new(cluster: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            command: command.into(),
            args: Vec::new(),
        }
    }

    /// OnOff 集群开/关。
    pub fn on_off(power_on: bool) -> Self {
        Self::new("onoff", if power_on { "on" } else { "off" })
    }

    pub fn toggle() -> Self {
        Self::new("onoff", "toggle")
    }
}

/// 读取到的设备状态。`metrics` 只含随开关状态一并得到的读数。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceStateReport {
    /// OnOff 属性；读不到时为 None。
    pub power_on: Option<bool>,
    pub metrics: PowerMetrics,
}

/// 配网引擎能力接口。
#[async_trait]
pub trait CommissioningEngine: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> EngineKind;

    async fn attempt_commission(
        &self,
        request: &EngineCommissionRequest,
    ) -> Result<EngineCommissioned, EngineError>;

    async fn send_command(
        &self,
        node_id: NodeId,
        command: &DeviceCommand,
    ) -> Result<(), EngineError>;

    /// 读取开关状态；失败即链路失败。
    async fn read_state(&self, node_id: NodeId) -> Result<DeviceStateReport, EngineError>;

    /// 尽力读取电参量：不报错，`budget` 用尽时返回已读到的部分。
    async fn read_metrics(&self, _node_id: NodeId, _budget: Duration) -> PowerMetrics {
        PowerMetrics::default()
    }
}
