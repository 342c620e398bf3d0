//! 引擎调用错误。

/// 引擎调用错误；除 `Unavailable` 外都视为单条链路失败。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// 引擎不存在或无法连接，协调器据此切换到备用引擎。
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("engine reported failure: {0}")]
    Failed(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("failed to start process: {0}")]
    Spawn(String),
}

impl EngineError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
