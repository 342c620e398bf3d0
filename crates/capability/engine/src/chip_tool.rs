//! chip-tool 子进程驱动。
//!
//! 命令行约定：
//!
//! - BLE：`pairing ble-wifi <node> <ssid> <password> <passcode> <discriminator>`，
//!   厂商私有码改用 `pairing code-wifi <node> <ssid> <password> <code>`
//! - WiFi-AP：`pairing code <node> <code>`，分段格式码改用
//!   `pairing onnetwork-long <node> <passcode> <discriminator>`
//! - 控制：`<cluster> <command> [args..] <node> <endpoint>`
//! - 读取：`onoff read on-off <node> <endpoint>` 与 `electricalmeasurement read ...`

use crate::error::EngineError;
use crate::{
    CommissioningEngine, DeviceCommand, DeviceStateReport, EngineCommissionRequest,
    EngineCommissioned, EngineKind,
};
use async_trait::async_trait;
use domain::{NodeId, PayloadFormat, PowerMetrics, Transport};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 电参量属性，与 [`PowerMetrics`] 字段顺序一致。
const METRIC_ATTRIBUTES: [&str; 4] = ["active-power", "total-energy", "rms-voltage", "rms-current"];

/// chip-tool 驱动配置。
#[derive(Debug, Clone)]
pub struct ChipToolConfig {
    pub binary: PathBuf,
    pub bypass_attestation: bool,
    pub endpoint: u16,
    pub ble_timeout: Duration,
    pub wifi_timeout: Duration,
    pub control_timeout: Duration,
}

impl ChipToolConfig {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            bypass_attestation: true,
            endpoint: 1,
            ble_timeout: Duration::from_secs(300),
            wifi_timeout: Duration::from_secs(120),
            control_timeout: Duration::from_secs(30),
        }
    }
}

/// chip-tool 引擎。
#[derive(Debug, Clone)]
pub struct ChipToolEngine {
    config: ChipToolConfig,
}

impl ChipToolEngine {
    pub fn new(config: ChipToolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChipToolConfig {
        &self.config
    }

    fn ensure_available(&self) -> Result<(), EngineError> {
        if is_executable(&self.config.binary) {
            Ok(())
        } else {
            Err(EngineError::Unavailable(format!(
                "chip-tool not found at {}",
                self.config.binary.display()
            )))
        }
    }

    fn pairing_args(&self, request: &EngineCommissionRequest) -> Vec<String> {
        let node = request.node_id.to_string();
        let payload = &request.payload;
        let mut args: Vec<String> = match (request.transport, payload.format) {
            (Transport::Ble, PayloadFormat::Standard) => vec![
                "pairing".into(),
                "ble-wifi".into(),
                node,
                request.ssid.clone(),
                request.password.clone(),
                payload.passcode.clone(),
                payload.discriminator.to_string(),
            ],
            (Transport::Ble, PayloadFormat::VendorSpecific) => vec![
                "pairing".into(),
                "code-wifi".into(),
                node,
                request.ssid.clone(),
                request.password.clone(),
                payload.raw_code.trim().to_string(),
            ],
            (Transport::WifiAp, PayloadFormat::Standard) => vec![
                "pairing".into(),
                "onnetwork-long".into(),
                node,
                payload.passcode.clone(),
                payload.discriminator.to_string(),
            ],
            (Transport::WifiAp, PayloadFormat::VendorSpecific) => vec![
                "pairing".into(),
                "code".into(),
                node,
                payload.raw_code.trim().to_string(),
            ],
        };
        if self.config.bypass_attestation {
            args.push("--bypass-attestation-verifier".into());
            args.push("true".into());
        }
        args
    }

    fn node_args(&self, node_id: NodeId) -> [String; 2] {
        [node_id.to_string(), self.config.endpoint.to_string()]
    }

    /// 执行一次 chip-tool；参数中可能含凭据，只记录 operation 名称。
    async fn run(
        &self,
        operation: &'static str,
        args: Vec<String>,
        limit: Duration,
    ) -> Result<String, EngineError> {
        self.ensure_available()?;
        debug!(target: "msh.engine", operation, arg_count = args.len(), "chip_tool_invoke");

        let child = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => EngineError::Unavailable(err.to_string()),
                _ => EngineError::Spawn(err.to_string()),
            })?;

        let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return Err(EngineError::Spawn(err.to_string())),
            Err(_) => {
                warn!(
                    target: "msh.engine",
                    operation,
                    timeout_ms = limit.as_millis() as u64,
                    "chip_tool_timeout"
                );
                return Err(EngineError::Timeout(format!(
                    "chip-tool {} exceeded {}ms",
                    operation,
                    limit.as_millis()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = last_meaningful_line(&stderr)
            .or_else(|| last_meaningful_line(&stdout))
            .map(str::to_string)
            .unwrap_or_else(|| format!("exit status {}", output.status));
        warn!(
            target: "msh.engine",
            operation,
            status = %output.status,
            detail = %detail,
            "chip_tool_failed"
        );
        Err(EngineError::Failed(detail))
    }

    async fn read_metric(&self, node_id: NodeId, attribute: &str, limit: Duration) -> Option<f64> {
        let mut args = vec![
            "electricalmeasurement".to_string(),
            "read".to_string(),
            attribute.to_string(),
        ];
        args.extend(self.node_args(node_id));
        match self.run("read_metric", args, limit).await {
            Ok(stdout) => parse_attribute(&stdout, attribute).and_then(|value| value.parse().ok()),
            Err(err) => {
                debug!(
                    target: "msh.engine",
                    node_id = %node_id,
                    attribute,
                    error = %err,
                    "metric_read_skipped"
                );
                None
            }
        }
    }
}

#[async_trait]
impl CommissioningEngine for ChipToolEngine {
    fn name(&self) -> &str {
        "chip-tool"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Native
    }

    async fn attempt_commission(
        &self,
        request: &EngineCommissionRequest,
    ) -> Result<EngineCommissioned, EngineError> {
        let limit = match request.transport {
            Transport::Ble => self.config.ble_timeout,
            Transport::WifiAp => self.config.wifi_timeout,
        };
        info!(
            target: "msh.engine",
            node_id = %request.node_id,
            transport = %request.transport.as_str(),
            payload_format = %request.payload.format.as_str(),
            "chip_tool_pairing_started"
        );
        self.run("pairing", self.pairing_args(request), limit).await?;
        Ok(EngineCommissioned {
            node_id: request.node_id,
        })
    }

    async fn send_command(
        &self,
        node_id: NodeId,
        command: &DeviceCommand,
    ) -> Result<(), EngineError> {
        let mut args = vec![command.cluster.clone(), command.command.clone()];
        args.extend(command.args.iter().cloned());
        args.extend(self.node_args(node_id));
        self.run("command", args, self.config.control_timeout)
            .await
            .map(|_| ())
    }

    async fn read_state(&self, node_id: NodeId) -> Result<DeviceStateReport, EngineError> {
        let mut args = vec!["onoff".to_string(), "read".to_string(), "on-off".to_string()];
        args.extend(self.node_args(node_id));
        let stdout = self
            .run("read_on_off", args, self.config.control_timeout)
            .await?;
        let power_on = parse_attribute(&stdout, "on-off").map(|value| parse_bool(&value));
        Ok(DeviceStateReport {
            power_on,
            metrics: PowerMetrics::default(),
        })
    }

    async fn read_metrics(&self, node_id: NodeId, budget: Duration) -> PowerMetrics {
        let deadline = Instant::now() + budget;
        let mut readings = [None; METRIC_ATTRIBUTES.len()];
        for (slot, attribute) in readings.iter_mut().zip(METRIC_ATTRIBUTES) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(
                    target: "msh.engine",
                    node_id = %node_id,
                    attribute,
                    "metric_budget_exhausted"
                );
                break;
            }
            let limit = remaining.min(self.config.control_timeout);
            *slot = self.read_metric(node_id, attribute, limit).await;
        }
        let [power_watts, energy_wh, voltage, current] = readings;
        PowerMetrics {
            power_watts,
            energy_wh,
            voltage,
            current,
        }
    }
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

fn last_meaningful_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty()).last()
}

/// 在 chip-tool 输出中查找 `<attribute>: <value>` 行，返回 value 的第一个词。
fn parse_attribute(stdout: &str, attribute: &str) -> Option<String> {
    let marker = format!("{}:", attribute);
    stdout.lines().find_map(|line| {
        let lower = line.to_ascii_lowercase();
        let index = lower.find(&marker)?;
        line[index + marker.len()..]
            .split_whitespace()
            .next()
            .map(str::to_string)
    })
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attribute_lines() {
        let stdout = "[1700000000.1] [123:456] CHIP:TOO: Endpoint: 1 Cluster: 0x0006\n\
                      [1700000000.2] [123:456] CHIP:TOO:   On-Off: TRUE\n";
        assert_eq!(parse_attribute(stdout, "on-off"), Some("TRUE".to_string()));
        assert!(parse_bool("TRUE"));
        assert_eq!(parse_attribute(stdout, "active-power"), None);
    }

    #[test]
    fn parses_numeric_metric() {
        let stdout = "CHIP:TOO:   active-power: 1250\n";
        let value: Option<f64> =
            parse_attribute(stdout, "active-power").and_then(|value| value.parse().ok());
        assert_eq!(value, Some(1250.0));
    }

    #[test]
    fn picks_last_non_empty_line() {
        assert_eq!(last_meaningful_line("a\n  b  \n\n"), Some("b"));
        assert_eq!(last_meaningful_line("\n\n"), None);
    }
}
