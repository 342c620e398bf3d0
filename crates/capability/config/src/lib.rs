//! 桥接服务运行配置加载。

use std::env;
use std::path::PathBuf;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 网络配置脚本的默认查找路径（按顺序取第一个存在的）。
pub const DEFAULT_NETWORK_SCRIPT_PATHS: [&str; 4] = [
    "/app/network-config.sh",
    "/app/Matter/network-config.sh",
    "/network-config.sh",
    "/usr/local/bin/network-config.sh",
];

/// Hub 通知通道。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubTransport {
    /// 不通知（仅记录转发日志）。
    None,
    /// `POST {url}/api/devices/update`。
    Http { url: String },
    /// 发布到 `{topic_prefix}/devices/{device_id}`。
    Mqtt(HubMqttConfig),
}

/// Hub MQTT 通道配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubMqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
    pub qos: u8,
}

/// 桥接服务运行配置。
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub node_mappings_path: PathBuf,
    pub chip_tool_path: PathBuf,
    pub engine_simulation: bool,
    pub bypass_attestation: bool,
    pub control_endpoint: u16,
    pub ble_commission_timeout_seconds: u64,
    pub wifi_commission_timeout_seconds: u64,
    pub control_timeout_seconds: u64,
    pub network_switch_timeout_seconds: u64,
    pub network_settle_ms: u64,
    pub network_script_paths: Vec<PathBuf>,
    pub hub: HubTransport,
    pub hub_timeout_ms: u64,
    pub transfer_log_path: PathBuf,
}

impl BridgeConfig {
    /// 先加载本地 .env（如存在），再读取环境变量。
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let node_mappings_path = PathBuf::from(
            env::var("MSH_NODE_MAPPINGS_PATH")
                .unwrap_or_else(|_| "device_node_mappings.json".to_string()),
        );
        let chip_tool_path = PathBuf::from(
            env::var("MSH_CHIP_TOOL_PATH")
                .unwrap_or_else(|_| "/usr/local/bin/chip-tool".to_string()),
        );
        let engine_simulation = read_bool_with_default("MSH_ENGINE_SIMULATION", false);
        let bypass_attestation = read_bool_with_default("MSH_BYPASS_ATTESTATION", true);
        let control_endpoint = read_u16_with_default("MSH_CONTROL_ENDPOINT", 1)?;
        let ble_commission_timeout_seconds =
            read_u64_with_default("MSH_BLE_COMMISSION_TIMEOUT_SECONDS", 300)?;
        let wifi_commission_timeout_seconds =
            read_u64_with_default("MSH_WIFI_COMMISSION_TIMEOUT_SECONDS", 120)?;
        let control_timeout_seconds = read_u64_with_default("MSH_CONTROL_TIMEOUT_SECONDS", 30)?;
        let network_switch_timeout_seconds =
            read_u64_with_default("MSH_NETWORK_SWITCH_TIMEOUT_SECONDS", 30)?;
        let network_settle_ms = read_u64_with_default("MSH_NETWORK_SETTLE_MS", 3000)?;
        let network_script_paths = match read_optional("MSH_NETWORK_SCRIPT_PATHS") {
            Some(value) => value
                .split(',')
                .map(str::trim)
                .filter(|path| !path.is_empty())
                .map(PathBuf::from)
                .collect(),
            None => DEFAULT_NETWORK_SCRIPT_PATHS
                .iter()
                .map(PathBuf::from)
                .collect(),
        };
        let hub = read_hub_transport()?;
        let hub_timeout_ms = read_u64_with_default("MSH_HUB_TIMEOUT_MS", 5000)?;
        let transfer_log_path = PathBuf::from(
            read_optional("MSH_TRANSFER_LOG_PATH")
                .unwrap_or_else(|| "device_transfers.jsonl".to_string()),
        );

        for (key, value) in [
            ("MSH_BLE_COMMISSION_TIMEOUT_SECONDS", ble_commission_timeout_seconds),
            ("MSH_WIFI_COMMISSION_TIMEOUT_SECONDS", wifi_commission_timeout_seconds),
            ("MSH_CONTROL_TIMEOUT_SECONDS", control_timeout_seconds),
            ("MSH_NETWORK_SWITCH_TIMEOUT_SECONDS", network_switch_timeout_seconds),
            ("MSH_HUB_TIMEOUT_MS", hub_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(key.to_string(), "0".to_string()));
            }
        }

        Ok(Self {
            node_mappings_path,
            chip_tool_path,
            engine_simulation,
            bypass_attestation,
            control_endpoint,
            ble_commission_timeout_seconds,
            wifi_commission_timeout_seconds,
            control_timeout_seconds,
            network_switch_timeout_seconds,
            network_settle_ms,
            network_script_paths,
            hub,
            hub_timeout_ms,
            transfer_log_path,
        })
    }
}

fn read_hub_transport() -> Result<HubTransport, ConfigError> {
    let kind = env::var("MSH_HUB_TRANSPORT").unwrap_or_else(|_| "none".to_string());
    match kind.trim().to_ascii_lowercase().as_str() {
        "" | "none" | "off" => Ok(HubTransport::None),
        "http" => {
            let url = read_optional("MSH_HUB_URL")
                .ok_or_else(|| ConfigError::Missing("MSH_HUB_URL".to_string()))?;
            Ok(HubTransport::Http { url })
        }
        "mqtt" => {
            let host = read_optional("MSH_HUB_MQTT_HOST")
                .ok_or_else(|| ConfigError::Missing("MSH_HUB_MQTT_HOST".to_string()))?;
            Ok(HubTransport::Mqtt(HubMqttConfig {
                host,
                port: read_u16_with_default("MSH_HUB_MQTT_PORT", 1883)?,
                username: read_optional("MSH_HUB_MQTT_USERNAME"),
                password: read_optional("MSH_HUB_MQTT_PASSWORD"),
                topic_prefix: env::var("MSH_HUB_MQTT_TOPIC_PREFIX")
                    .unwrap_or_else(|_| "msh/hub".to_string()),
                qos: read_u8_with_default("MSH_HUB_MQTT_QOS", 1)?,
            }))
        }
        _ => Err(ConfigError::Invalid("MSH_HUB_TRANSPORT".to_string(), kind)),
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
