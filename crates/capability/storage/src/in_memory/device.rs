//! 设备内存存储实现
//!
//! 使用 RwLock + HashMap 提供线程安全的设备注册表。

use crate::error::StorageError;
use crate::traits::DeviceStore;
use domain::{DeviceRecord, DeviceState, NodeId, PowerMetrics};
use std::collections::HashMap;
use std::sync::RwLock;

/// 设备内存存储
pub struct InMemoryDeviceStore {
    devices: RwLock<HashMap<String, DeviceRecord>>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }

    fn update<F>(&self, device_id: &str, apply: F) -> Result<DeviceRecord, StorageError>
    where
        F: FnOnce(&mut DeviceRecord),
    {
        let mut devices = self.devices.write().map_err(|_| StorageError::Lock)?;
        let record = devices
            .get_mut(device_id)
            .ok_or_else(|| StorageError::NotFound(device_id.to_string()))?;
        apply(record);
        Ok(record.clone())
    }
}

impl Default for InMemoryDeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn upsert(&self, mut record: DeviceRecord) -> Result<DeviceRecord, StorageError> {
        let mut devices = self.devices.write().map_err(|_| StorageError::Lock)?;
        if let Some(existing) = devices.get(&record.device_id) {
            record.node_id = existing.node_id;
        }
        devices.insert(record.device_id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, device_id: &str) -> Result<Option<DeviceRecord>, StorageError> {
        let devices = self.devices.read().map_err(|_| StorageError::Lock)?;
        Ok(devices.get(device_id).cloned())
    }

    async fn list(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        let devices = self.devices.read().map_err(|_| StorageError::Lock)?;
        let mut items: Vec<DeviceRecord> = devices.values().cloned().collect();
        items.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(items)
    }

    async fn find_by_node(&self, node_id: NodeId) -> Result<Option<DeviceRecord>, StorageError> {
        let devices = self.devices.read().map_err(|_| StorageError::Lock)?;
        Ok(devices
            .values()
            .find(|record| record.node_id == node_id)
            .cloned())
    }

    async fn set_power_state(
        &self,
        device_id: &str,
        power_on: bool,
        now_ms: i64,
    ) -> Result<DeviceRecord, StorageError> {
        self.update(device_id, |record| {
            record.power_state = power_on;
            record.state = DeviceState::Commissioned;
            record.last_seen_ms = now_ms;
        })
    }

    async fn mark_control_failed(&self, device_id: &str) -> Result<DeviceRecord, StorageError> {
        self.update(device_id, |record| {
            record.state = DeviceState::ControlFailed;
        })
    }

    async fn record_metrics(
        &self,
        device_id: &str,
        metrics: PowerMetrics,
        now_ms: i64,
    ) -> Result<DeviceRecord, StorageError> {
        self.update(device_id, |record| {
            record.metrics.merge(metrics);
            record.last_seen_ms = now_ms;
        })
    }

    async fn delete(&self, device_id: &str) -> Result<bool, StorageError> {
        let mut devices = self.devices.write().map_err(|_| StorageError::Lock)?;
        Ok(devices.remove(device_id).is_some())
    }

    async fn reset_all(&self) -> Result<(), StorageError> {
        let mut devices = self.devices.write().map_err(|_| StorageError::Lock)?;
        devices.clear();
        Ok(())
    }
}
