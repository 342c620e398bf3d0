//! 按 deviceKey 串行化的异步锁。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// 每个 key 一把异步互斥锁；不同 key 互不阻塞，空闲的锁在释放时回收。
#[derive(Clone, Default)]
pub struct KeyedLocks {
    table: LockTable,
}

/// 持有期间同一 key 的其他调用方会等待。
pub struct KeyGuard {
    key: String,
    table: LockTable,
    _guard: OwnedMutexGuard<()>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> KeyGuard {
        let lock = {
            let mut table = self
                .table
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            table
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        KeyGuard {
            key: key.to_string(),
            table: self.table.clone(),
            _guard: lock.lock_owned().await,
        }
    }

    /// 当前登记的 key 数量。
    pub fn len(&self) -> usize {
        self.table.lock().map(|table| table.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let mut table = self
            .table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // 表内一份 + 本 guard 一份：没有等待者。
        if table
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) <= 2)
        {
            table.remove(&self.key);
        }
    }
}
