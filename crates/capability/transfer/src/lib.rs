//! 配网结果转发至 Hub。
//!
//! 转发是尽力而为的：每个配网事件最多通知一次，失败只记录、不重试，
//! 也不会回滚本地已经成功的配网。

pub mod coordinator;
pub mod error;
pub mod log;
pub mod notifier;

pub use coordinator::{CredentialTransferCoordinator, ForwardOutcome, notification_for};
pub use error::TransferError;
pub use log::{InMemoryTransferLog, JsonlTransferLog, TransferLog, TransferRecord, TransferStatus};
pub use notifier::{
    HttpHubNotifier, HubNotifier, MqttHubNotifier, MqttHubNotifierConfig, NoopHubNotifier,
};
