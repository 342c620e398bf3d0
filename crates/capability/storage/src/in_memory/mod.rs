//! 内存存储实现

pub mod device;

pub use device::InMemoryDeviceStore;
