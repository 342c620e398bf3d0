//! 配网会话编排与设备控制。
//!
//! - [`CommissioningCoordinator`]：解析配网码 → 分配节点 ID → 按 BLE、WiFi-AP 顺序尝试
//!   → 写入设备注册表 → 尽力通知 Hub
//! - [`DeviceControlService`]：开关、状态读取、手动登记
//! - [`BridgeServices`]：按 [`msh_config::BridgeConfig`] 装配全部组件

pub mod attempt;
pub mod control;
pub mod coordinator;
pub mod error;
pub mod locks;
pub mod services;

pub use attempt::{
    AttemptOutcome, CommissionRequest, CommissioningAttempt, NetworkCredentials, device_dto,
};
pub use control::{DeviceControlService, ManualRegistration};
pub use coordinator::{CommissionTimeouts, CommissioningCoordinator};
pub use error::{CommissionError, ControlError};
pub use locks::KeyedLocks;
pub use services::BridgeServices;
