//! 桥接服务共享的领域模型：配网码、节点 ID、设备记录。

pub mod device;
pub mod node;
pub mod payload;

pub use device::{
    CommissioningMethod, DeviceRecord, DeviceState, PowerMetrics, TRANSPORT_PRIORITY, Transport,
};
pub use node::{NodeId, NodeIdParseError};
pub use payload::{PayloadFormat, SetupPayload};

/// 当前 Unix 时间（毫秒）。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
