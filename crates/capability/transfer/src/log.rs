//! 转发记录。

use crate::error::TransferError;
use api_contract::CommissioningData;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// 转发结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Delivered,
    Failed,
    /// 未配置 Hub，未发送。
    Skipped,
}

/// 一次转发的记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub device_id: String,
    pub target: String,
    pub status: TransferStatus,
    pub message: Option<String>,
    pub timestamp_ms: i64,
    #[serde(default)]
    pub commissioning_data: Option<CommissioningData>,
}

/// 转发记录存储。
pub trait TransferLog: Send + Sync {
    fn append(&self, record: &TransferRecord) -> Result<(), TransferError>;

    /// 按时间倒序返回；`device_id` 为 None 时返回全部。
    fn history(&self, device_id: Option<&str>) -> Result<Vec<TransferRecord>, TransferError>;
}

#[derive(Debug, Default)]
pub struct InMemoryTransferLog {
    records: Mutex<Vec<TransferRecord>>,
}

impl InMemoryTransferLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransferLog for InMemoryTransferLog {
    fn append(&self, record: &TransferRecord) -> Result<(), TransferError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| TransferError::Log("lock failed".to_string()))?;
        records.push(record.clone());
        Ok(())
    }

    fn history(&self, device_id: Option<&str>) -> Result<Vec<TransferRecord>, TransferError> {
        let records = self
            .records
            .lock()
            .map_err(|_| TransferError::Log("lock failed".to_string()))?;
        Ok(newest_first(records.iter().cloned(), device_id))
    }
}

/// JSON Lines 文件：每次转发追加一行。
#[derive(Debug)]
pub struct JsonlTransferLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlTransferLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

impl TransferLog for JsonlTransferLog {
    fn append(&self, record: &TransferRecord) -> Result<(), TransferError> {
        let mut line =
            serde_json::to_string(record).map_err(|err| TransferError::Encode(err.to_string()))?;
        line.push('\n');
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| TransferError::Log("lock failed".to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| TransferError::Log(err.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|err| TransferError::Log(err.to_string()))
    }

    fn history(&self, device_id: Option<&str>) -> Result<Vec<TransferRecord>, TransferError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(TransferError::Log(err.to_string())),
        };
        let records = raw.lines().filter(|line| !line.trim().is_empty()).filter_map(|line| {
            match serde_json::from_str::<TransferRecord>(line) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(target: "msh.transfer", error = %err, "transfer_log_line_skipped");
                    None
                }
            }
        });
        Ok(newest_first(records, device_id))
    }
}

fn newest_first(
    records: impl Iterator<Item = TransferRecord>,
    device_id: Option<&str>,
) -> Vec<TransferRecord> {
    let mut items: Vec<TransferRecord> = records
        .filter(|record| device_id.is_none_or(|id| record.device_id == id))
        .collect();
    items.reverse();
    items.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
    items
}
