//! 设备注册表接口。

use crate::error::StorageError;
use async_trait::async_trait;
use domain::{DeviceRecord, NodeId, PowerMetrics};

/// 设备存储接口。
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// 按 device_id 插入或替换；已存在时保留原节点 ID。
    async fn upsert(&self, record: DeviceRecord) -> Result<DeviceRecord, StorageError>;

    async fn get(&self, device_id: &str) -> Result<Option<DeviceRecord>, StorageError>;

    /// 全部设备（按 device_id 排序）。
    async fn list(&self) -> Result<Vec<DeviceRecord>, StorageError>;

    async fn find_by_node(&self, node_id: NodeId) -> Result<Option<DeviceRecord>, StorageError>;

    /// 控制/读取成功：更新开关状态，状态回到 Commissioned 并刷新 last_seen。
    async fn set_power_state(
        &self,
        device_id: &str,
        power_on: bool,
        now_ms: i64,
    ) -> Result<DeviceRecord, StorageError>;

    /// 控制链路失败：记录保留，状态置为 ControlFailed。
    async fn mark_control_failed(&self, device_id: &str) -> Result<DeviceRecord, StorageError>;

    /// 合并电参量（None 字段不覆盖已有值）。
    async fn record_metrics(
        &self,
        device_id: &str,
        metrics: PowerMetrics,
        now_ms: i64,
    ) -> Result<DeviceRecord, StorageError>;

    /// 删除设备，返回是否存在。
    async fn delete(&self, device_id: &str) -> Result<bool, StorageError>;

    /// 清空全部设备（测试环境重置）。
    async fn reset_all(&self) -> Result<(), StorageError>;
}
