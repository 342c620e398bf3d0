//! 转发错误。

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// 连接失败或超时。
    #[error("hub unreachable: {0}")]
    Unreachable(String),
    /// Hub 返回非成功状态。
    #[error("hub rejected notification: {0}")]
    Rejected(String),
    #[error("encode error: {0}")]
    Encode(String),
    /// 转发记录写入失败。
    #[error("transfer log error: {0}")]
    Log(String),
}
