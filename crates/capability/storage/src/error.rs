//! 存储层错误类型

/// 存储错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// 目标记录不存在。
    #[error("record not found: {0}")]
    NotFound(String),
    /// 映射文件写入失败（内存状态已回滚）。
    #[error("persistence failed: {0}")]
    Persistence(String),
    /// 锁被毒化。
    #[error("lock failed")]
    Lock,
}
