//! deviceKey → NodeId 的持久化映射表。

use crate::error::StorageError;
use crate::mapping::MappingPersistence;
use domain::{NodeId, now_epoch_ms};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Default)]
struct MappingTable {
    by_key: HashMap<String, NodeId>,
    issued: HashSet<NodeId>,
}

impl MappingTable {
    fn from_persisted(persisted: BTreeMap<String, String>) -> Self {
        let mut table = Self::default();
        for (device_key, raw) in persisted {
            match NodeId::parse_hex(&raw) {
                Ok(node_id) => {
                    table.issued.insert(node_id);
                    table.by_key.insert(device_key, node_id);
                }
                Err(err) => {
                    warn!(
                        target: "msh.storage",
                        device_key = %device_key,
                        error = %err,
                        "node_mapping_entry_skipped"
                    );
                }
            }
        }
        table
    }

    fn to_persisted(&self) -> BTreeMap<String, String> {
        self.by_key
            .iter()
            .map(|(key, node_id)| (key.clone(), node_id.to_hex()))
            .collect()
    }
}

/// 节点 ID 映射表。
///
/// 映射一旦写入即不再变化；新增映射必须落盘成功才对外可见。
pub struct NodeIdentityRegistry {
    persistence: Box<dyn MappingPersistence>,
    table: Mutex<MappingTable>,
}

impl NodeIdentityRegistry {
    /// 从持久化后端加载已有映射；无法读取或损坏的存储按空表处理。
    pub fn open(persistence: impl MappingPersistence + 'static) -> Self {
        let persisted = persistence.load().unwrap_or_else(|err| {
            warn!(target: "msh.storage", error = %err, "node_mappings_unreadable");
            BTreeMap::new()
        });
        let table = MappingTable::from_persisted(persisted);
        info!(
            target: "msh.storage",
            mappings = table.by_key.len(),
            "node_mappings_loaded"
        );
        Self {
            persistence: Box::new(persistence),
            table: Mutex::new(table),
        }
    }

    /// 返回 deviceKey 对应的节点 ID，不存在时生成并落盘。
    pub fn get_or_create(&self, device_key: &str) -> Result<NodeId, StorageError> {
        let mut table = self.table.lock().map_err(|_| StorageError::Lock)?;
        if let Some(node_id) = table.by_key.get(device_key) {
            return Ok(*node_id);
        }

        let mut candidate = candidate_node_id(device_key, now_epoch_ms());
        while table.issued.contains(&candidate) {
            candidate = next_operational(candidate);
        }

        table.by_key.insert(device_key.to_string(), candidate);
        table.issued.insert(candidate);
        if let Err(err) = self.persistence.save(&table.to_persisted()) {
            table.by_key.remove(device_key);
            table.issued.remove(&candidate);
            msh_telemetry::record_mapping_persist_failure();
            warn!(
                target: "msh.storage",
                device_key = %device_key,
                error = %err,
                "node_mapping_persist_failed"
            );
            return Err(err);
        }

        msh_telemetry::record_node_id_issued();
        info!(
            target: "msh.storage",
            device_key = %device_key,
            node_id = %candidate,
            "node_id_issued"
        );
        Ok(candidate)
    }

    /// 只读查询。
    pub fn find(&self, device_key: &str) -> Result<Option<NodeId>, StorageError> {
        let table = self.table.lock().map_err(|_| StorageError::Lock)?;
        Ok(table.by_key.get(device_key).copied())
    }

    /// 全部映射（按 deviceKey 排序）。
    pub fn list(&self) -> Result<Vec<(String, NodeId)>, StorageError> {
        let table = self.table.lock().map_err(|_| StorageError::Lock)?;
        let mut entries: Vec<(String, NodeId)> = table
            .by_key
            .iter()
            .map(|(key, node_id)| (key.clone(), *node_id))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        self.table
            .lock()
            .map(|table| table.by_key.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 从持久化后端重新加载；读取失败时保留内存中的表并返回错误。
    pub fn reload(&self) -> Result<usize, StorageError> {
        let mut table = self.table.lock().map_err(|_| StorageError::Lock)?;
        let persisted = self.persistence.load().inspect_err(|err| {
            warn!(
                target: "msh.storage",
                error = %err,
                kept = table.by_key.len(),
                "node_mappings_reload_failed"
            );
        })?;
        *table = MappingTable::from_persisted(persisted);
        Ok(table.by_key.len())
    }

    /// 清空映射并落盘（仅用于测试环境重置）。
    pub fn reset(&self) -> Result<(), StorageError> {
        let mut table = self.table.lock().map_err(|_| StorageError::Lock)?;
        self.persistence.save(&BTreeMap::new())?;
        *table = MappingTable::default();
        Ok(())
    }
}

/// 高 32 位取时间戳，低 32 位取 deviceKey 的稳定摘要。
fn candidate_node_id(device_key: &str, now_ms: i64) -> NodeId {
    let high = (now_ms.max(0) as u64) % 0xFFFF_FFFF;
    let digest = Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("msh:device-key:{device_key}").as_bytes(),
    );
    let bytes = digest.as_bytes();
    let low = u64::from(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])) % 0xFFFF_FFFF;
    into_operational((high << 32) | low)
}

fn into_operational(value: u64) -> NodeId {
    let value = if value > NodeId::MAX_OPERATIONAL {
        value & 0x7FFF_FFFF_FFFF_FFFF
    } else {
        value
    };
    NodeId::new(value.max(1))
}

fn next_operational(node_id: NodeId) -> NodeId {
    match node_id.value().checked_add(1) {
        Some(next) if next <= NodeId::MAX_OPERATIONAL => NodeId::new(next),
        _ => NodeId::new(1),
    }
}
