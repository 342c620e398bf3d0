//! Hub 自身网络模式切换（WiFi-AP 配网需要进入 AP 模式）。

use crate::error::EngineError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// 网络模式切换接口；两个操作都必须幂等。
#[async_trait]
pub trait NetworkModeSwitch: Send + Sync {
    async fn enter_commissioning_mode(&self) -> Result<(), EngineError>;

    async fn restore_normal_mode(&self) -> Result<(), EngineError>;
}

/// 空实现（不切换）。
#[derive(Debug, Default)]
pub struct NoopNetworkModeSwitch;

#[async_trait]
impl NetworkModeSwitch for NoopNetworkModeSwitch {
    async fn enter_commissioning_mode(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn restore_normal_mode(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// 脚本切换配置。
#[derive(Debug, Clone)]
pub struct ScriptSwitchConfig {
    /// 候选脚本路径，取第一个存在的。
    pub script_paths: Vec<PathBuf>,
    pub timeout: Duration,
    /// 切换后等待网络稳定的时间。
    pub settle: Duration,
}

/// 调用 `network-config.sh <auto-commissioning|normal>`。
#[derive(Debug, Clone)]
pub struct ScriptNetworkModeSwitch {
    config: ScriptSwitchConfig,
}

impl ScriptNetworkModeSwitch {
    pub const COMMISSIONING_MODE: &'static str = "auto-commissioning";
    pub const NORMAL_MODE: &'static str = "normal";

    pub fn new(config: ScriptSwitchConfig) -> Self {
        Self { config }
    }

    pub fn resolve_script(&self) -> Option<&Path> {
        self.config
            .script_paths
            .iter()
            .map(PathBuf::as_path)
            .find(|path| path.is_file())
    }

    async fn switch_to(&self, mode: &'static str) -> Result<(), EngineError> {
        let Some(script) = self.resolve_script() else {
            warn!(target: "msh.engine", mode, "network_script_missing");
            return Ok(());
        };
        info!(
            target: "msh.engine",
            mode,
            script = %script.display(),
            "network_mode_switch"
        );

        let child = Command::new("sh")
            .arg(script)
            .arg(mode)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| EngineError::Spawn(err.to_string()))?;

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                EngineError::Timeout(format!(
                    "network switch to {} exceeded {}s",
                    mode,
                    self.config.timeout.as_secs()
                ))
            })?
            .map_err(|err| EngineError::Spawn(err.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            return Err(EngineError::Failed(if detail.is_empty() {
                format!("network switch to {} exited with {}", mode, output.status)
            } else {
                format!("network switch to {}: {}", mode, detail)
            }));
        }

        if !self.config.settle.is_zero() {
            tokio::time::sleep(self.config.settle).await;
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkModeSwitch for ScriptNetworkModeSwitch {
    async fn enter_commissioning_mode(&self) -> Result<(), EngineError> {
        self.switch_to(Self::COMMISSIONING_MODE).await
    }

    async fn restore_normal_mode(&self) -> Result<(), EngineError> {
        self.switch_to(Self::NORMAL_MODE).await
    }
}
