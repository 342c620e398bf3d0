//! 节点 ID 映射的持久化后端。
//!
//! 文件格式为 JSON 对象：`{"<deviceKey>": "<16 位大写十六进制节点 ID>"}`。

use crate::error::StorageError;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 映射表持久化接口（同步调用，调用方持锁期间执行）。
pub trait MappingPersistence: Send + Sync {
    /// 读取全部映射；文件缺失返回空表，无法读取或内容损坏返回错误。
    fn load(&self) -> Result<BTreeMap<String, String>, StorageError>;

    /// 整表写入。
    fn save(&self, mappings: &BTreeMap<String, String>) -> Result<(), StorageError>;
}

/// JSON 文件后端：先写临时文件并 fsync，再原子 rename。
pub struct JsonFileMappingStore {
    path: PathBuf,
}

impl JsonFileMappingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)
    }
}

impl MappingPersistence for JsonFileMappingStore {
    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(StorageError::Persistence(format!(
                    "{}: {}",
                    self.path.display(),
                    err
                )));
            }
        };
        serde_json::from_slice::<BTreeMap<String, String>>(&raw).map_err(|err| {
            StorageError::Persistence(format!("{}: corrupt: {}", self.path.display(), err))
        })
    }

    fn save(&self, mappings: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(mappings)
            .map_err(|err| StorageError::Persistence(err.to_string()))?;
        self.write_atomic(&bytes)
            .map_err(|err| StorageError::Persistence(format!("{}: {}", self.path.display(), err)))
    }
}

/// 内存后端（测试用），可注入读写失败。
#[derive(Default)]
pub struct InMemoryMappingStore {
    saved: Mutex<BTreeMap<String, String>>,
    fail_saves: Mutex<bool>,
    fail_loads: Mutex<bool>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以已有映射初始化（模拟重启前落盘的内容）。
    pub fn with_mappings(mappings: BTreeMap<String, String>) -> Self {
        Self {
            saved: Mutex::new(mappings),
            ..Self::default()
        }
    }

    /// 后续 `save` 是否返回失败。
    pub fn set_fail_saves(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_saves.lock() {
            *flag = fail;
        }
    }

    /// 后续 `load` 是否返回失败。
    pub fn set_fail_loads(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_loads.lock() {
            *flag = fail;
        }
    }

    /// 最近一次成功写入的内容。
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.saved
            .lock()
            .map(|saved| saved.clone())
            .unwrap_or_default()
    }
}

impl MappingPersistence for InMemoryMappingStore {
    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let fail = self.fail_loads.lock().map(|flag| *flag).unwrap_or(false);
        if fail {
            return Err(StorageError::Persistence("injected load failure".to_string()));
        }
        Ok(self.snapshot())
    }

    fn save(&self, mappings: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let fail = self.fail_saves.lock().map(|flag| *flag).unwrap_or(false);
        if fail {
            return Err(StorageError::Persistence("injected save failure".to_string()));
        }
        let mut saved = self.saved.lock().map_err(|_| StorageError::Lock)?;
        *saved = mappings.clone();
        Ok(())
    }
}
