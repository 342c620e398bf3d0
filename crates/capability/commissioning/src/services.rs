//! 按配置装配桥接服务的全部组件。

use crate::control::DeviceControlService;
use crate::coordinator::{CommissionTimeouts, CommissioningCoordinator};
use msh_config::{BridgeConfig, HubTransport};
use msh_engine::{
    ChipToolConfig, ChipToolEngine, CommissioningEngine, NetworkModeSwitch,
    ScriptNetworkModeSwitch, ScriptSwitchConfig, SimulatedEngine,
};
use msh_storage::{DeviceStore, InMemoryDeviceStore, JsonFileMappingStore, NodeIdentityRegistry};
use msh_transfer::{
    CredentialTransferCoordinator, HttpHubNotifier, HubNotifier, JsonlTransferLog,
    MqttHubNotifier, MqttHubNotifierConfig, NoopHubNotifier, TransferError, TransferLog,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

type HubChannel = (Arc<dyn HubNotifier>, Option<JoinHandle<()>>);

/// 装配完成的服务集合。
pub struct BridgeServices {
    pub node_registry: Arc<NodeIdentityRegistry>,
    pub devices: Arc<dyn DeviceStore>,
    pub transfer: CredentialTransferCoordinator,
    pub coordinator: CommissioningCoordinator,
    pub control: DeviceControlService,
    /// MQTT 通知通道的后台 eventloop。
    pub hub_task: Option<JoinHandle<()>>,
}

impl BridgeServices {
    /// 需在 tokio 运行时内调用（MQTT 通道会启动后台任务）。
    pub fn from_config(config: &BridgeConfig) -> Result<Self, TransferError> {
        let node_registry = Arc::new(NodeIdentityRegistry::open(JsonFileMappingStore::new(
            config.node_mappings_path.clone(),
        )));
        let devices: Arc<dyn DeviceStore> = Arc::new(InMemoryDeviceStore::new());

        let mut chip_tool = ChipToolConfig::new(config.chip_tool_path.clone());
        chip_tool.bypass_attestation = config.bypass_attestation;
        chip_tool.endpoint = config.control_endpoint;
        chip_tool.ble_timeout = Duration::from_secs(config.ble_commission_timeout_seconds);
        chip_tool.wifi_timeout = Duration::from_secs(config.wifi_commission_timeout_seconds);
        chip_tool.control_timeout = Duration::from_secs(config.control_timeout_seconds);
        let engine: Arc<dyn CommissioningEngine> = Arc::new(ChipToolEngine::new(chip_tool));
        let secondary: Option<Arc<dyn CommissioningEngine>> = if config.engine_simulation {
            Some(Arc::new(SimulatedEngine::new()))
        } else {
            None
        };

        let network: Arc<dyn NetworkModeSwitch> =
            Arc::new(ScriptNetworkModeSwitch::new(ScriptSwitchConfig {
                script_paths: config.network_script_paths.clone(),
                timeout: Duration::from_secs(config.network_switch_timeout_seconds),
                settle: Duration::from_millis(config.network_settle_ms),
            }));

        let hub_timeout = Duration::from_millis(config.hub_timeout_ms);
        let (notifier, hub_task): HubChannel = match &config.hub {
            HubTransport::None => (Arc::new(NoopHubNotifier) as Arc<dyn HubNotifier>, None),
            HubTransport::Http { url } => {
                let notifier = HttpHubNotifier::new(url, hub_timeout)?;
                (Arc::new(notifier) as Arc<dyn HubNotifier>, None)
            }
            HubTransport::Mqtt(mqtt) => {
                let (notifier, handle) = MqttHubNotifier::connect(MqttHubNotifierConfig {
                    host: mqtt.host.clone(),
                    port: mqtt.port,
                    username: mqtt.username.clone(),
                    password: mqtt.password.clone(),
                    topic_prefix: mqtt.topic_prefix.clone(),
                    qos: mqtt.qos,
                });
                (Arc::new(notifier) as Arc<dyn HubNotifier>, Some(handle))
            }
        };
        let log: Arc<dyn TransferLog> =
            Arc::new(JsonlTransferLog::new(config.transfer_log_path.clone()));
        let transfer = CredentialTransferCoordinator::new(notifier.clone(), log, hub_timeout);

        let mut coordinator = CommissioningCoordinator::new(
            node_registry.clone(),
            devices.clone(),
            engine.clone(),
            network,
            transfer.clone(),
        )
        .with_timeouts(CommissionTimeouts {
            ble: Duration::from_secs(config.ble_commission_timeout_seconds),
            wifi_ap: Duration::from_secs(config.wifi_commission_timeout_seconds),
            network_switch: Duration::from_secs(config.network_switch_timeout_seconds),
        });
        let mut control = DeviceControlService::new(
            devices.clone(),
            engine,
            transfer.clone(),
            Duration::from_secs(config.control_timeout_seconds),
        );
        if let Some(secondary) = secondary {
            coordinator = coordinator.with_secondary_engine(secondary.clone());
            control = control.with_secondary_engine(secondary);
        }

        info!(
            target: "msh.commissioning",
            mappings = node_registry.len(),
            chip_tool = %config.chip_tool_path.display(),
            simulation = config.engine_simulation,
            hub = %notifier.target(),
            transfer_log = %config.transfer_log_path.display(),
            "bridge_services_ready"
        );

        Ok(Self {
            node_registry,
            devices,
            transfer,
            coordinator,
            control,
            hub_task,
        })
    }
}
