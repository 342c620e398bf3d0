//! 编排层错误。

use msh_storage::StorageError;

/// 配网调用错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommissionError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// 节点 ID 映射或设备记录写入失败，本次配网中止。
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("all transports failed: {0}")]
    AllTransportsFailed(String),
    /// 后台任务异常退出。
    #[error("commissioning task aborted: {0}")]
    Aborted(String),
}

/// 设备控制错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("device not found: {0}")]
    NotFound(String),
    /// 控制链路失败或超时，设备已标记为 ControlFailed。
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for ControlError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(device_id) => Self::NotFound(device_id),
            other => Self::Storage(other.to_string()),
        }
    }
}
