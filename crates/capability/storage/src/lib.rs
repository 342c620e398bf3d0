//! # MSH Storage 模块
//!
//! 桥接服务的两类状态：
//!
//! 1. **节点 ID 映射**（[`registry`]、[`mapping`]）：deviceKey → NodeId，
//!    每次新增都会落盘，重启后重新加载，同一 deviceKey 永远得到同一节点 ID。
//! 2. **设备注册表**（[`traits`]、[`in_memory`]）：已配网设备的记录，仅在进程内保存。
//!
//! ## 并发约束
//!
//! - 映射表：`get_or_create` 在同一把锁内完成查找、生成与落盘，
//!   并发调用不会为同一 deviceKey 生成两个 ID
//! - 设备表：`RwLock<HashMap>`，写操作以 device_id 为粒度原子生效
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use msh_storage::{JsonFileMappingStore, NodeIdentityRegistry};
//!
//! let store = JsonFileMappingStore::new("device_node_mappings.json");
//! let registry = NodeIdentityRegistry::open(store);
//! let node_id = registry.get_or_create("plug-kitchen")?;
//! ```

pub mod error;
pub mod in_memory;
pub mod mapping;
pub mod registry;
pub mod traits;

pub use error::*;
pub use in_memory::InMemoryDeviceStore;
pub use mapping::{InMemoryMappingStore, JsonFileMappingStore, MappingPersistence};
pub use registry::NodeIdentityRegistry;
pub use traits::*;
