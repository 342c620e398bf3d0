#![allow(dead_code)]

use async_trait::async_trait;
use domain::{NodeId, Transport};
use msh_commissioning::{CommissionTimeouts, CommissioningCoordinator, DeviceControlService};
use msh_engine::{
    CommissioningEngine, DeviceCommand, DeviceStateReport, EngineCommissionRequest,
    EngineCommissioned, EngineError, EngineKind, NetworkModeSwitch,
};
use msh_storage::{
    DeviceStore, InMemoryDeviceStore, InMemoryMappingStore, NodeIdentityRegistry, StorageError,
};
use std::collections::BTreeMap;
use msh_transfer::{CredentialTransferCoordinator, InMemoryTransferLog, NoopHubNotifier};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SCENARIO_CODE: &str = "MT:1+0x1234+0x5678+0x0000+1234+20202021";

/// 按链路返回预设结果的引擎。
pub struct ScriptedEngine {
    pub kind: EngineKind,
    pub ble: Result<(), EngineError>,
    pub wifi_ap: Result<(), EngineError>,
    pub control: Mutex<Result<(), EngineError>>,
    pub delay: Duration,
    pub commission_calls: Mutex<Vec<Transport>>,
    pub commands: Mutex<Vec<(NodeId, DeviceCommand)>>,
    pub report: DeviceStateReport,
}

impl ScriptedEngine {
    pub fn new(ble: Result<(), EngineError>, wifi_ap: Result<(), EngineError>) -> Self {
        Self {
            kind: EngineKind::Native,
            ble,
            wifi_ap,
            control: Mutex::new(Ok(())),
            delay: Duration::ZERO,
            commission_calls: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            report: DeviceStateReport::default(),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Ok(()), Ok(()))
    }

    pub fn unavailable() -> Self {
        let err = EngineError::Unavailable("chip-tool not found".to_string());
        Self::new(Err(err.clone()), Err(err))
    }

    pub fn calls(&self) -> Vec<Transport> {
        self.commission_calls.lock().expect("lock").clone()
    }

    pub fn set_control_result(&self, result: Result<(), EngineError>) {
        *self.control.lock().expect("lock") = result;
    }
}

#[async_trait]
impl CommissioningEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn attempt_commission(
        &self,
        request: &EngineCommissionRequest,
    ) -> Result<EngineCommissioned, EngineError> {
        self.commission_calls
            .lock()
            .expect("lock")
            .push(request.transport);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = match request.transport {
            Transport::Ble => self.ble.clone(),
            Transport::WifiAp => self.wifi_ap.clone(),
        };
        result.map(|()| EngineCommissioned {
            node_id: request.node_id,
        })
    }

    async fn send_command(
        &self,
        node_id: NodeId,
        command: &DeviceCommand,
    ) -> Result<(), EngineError> {
        self.commands
            .lock()
            .expect("lock")
            .push((node_id, command.clone()));
        self.control.lock().expect("lock").clone()
    }

    async fn read_state(&self, _node_id: NodeId) -> Result<DeviceStateReport, EngineError> {
        self.control.lock().expect("lock").clone().map(|()| self.report)
    }
}

/// 记录进入/恢复次数的网络切换。
#[derive(Default)]
pub struct CountingSwitch {
    pub entered: AtomicUsize,
    pub restored: AtomicUsize,
    pub fail_enter: bool,
    pub fail_restore: bool,
}

impl CountingSwitch {
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn restored(&self) -> usize {
        self.restored.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkModeSwitch for CountingSwitch {
    async fn enter_commissioning_mode(&self) -> Result<(), EngineError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        if self.fail_enter {
            return Err(EngineError::Failed("hostapd did not start".to_string()));
        }
        Ok(())
    }

    async fn restore_normal_mode(&self) -> Result<(), EngineError> {
        self.restored.fetch_add(1, Ordering::SeqCst);
        if self.fail_restore {
            return Err(EngineError::Failed("wpa_supplicant restart failed".to_string()));
        }
        Ok(())
    }
}

pub struct Harness {
    pub registry: Arc<NodeIdentityRegistry>,
    pub mappings: Arc<InMemoryMappingStore>,
    pub devices: Arc<InMemoryDeviceStore>,
    pub engine: Arc<ScriptedEngine>,
    pub switch: Arc<CountingSwitch>,
    pub transfer: CredentialTransferCoordinator,
}

impl Harness {
    pub fn new(engine: ScriptedEngine, switch: CountingSwitch) -> Self {
        let mappings = Arc::new(InMemoryMappingStore::new());
        Self {
            registry: Arc::new(NodeIdentityRegistry::open(SharedMappings(mappings.clone()))),
            mappings,
            devices: Arc::new(InMemoryDeviceStore::new()),
            engine: Arc::new(engine),
            switch: Arc::new(switch),
            transfer: CredentialTransferCoordinator::new(
                Arc::new(NoopHubNotifier),
                Arc::new(InMemoryTransferLog::new()),
                Duration::from_secs(1),
            ),
        }
    }

    pub fn coordinator(&self) -> CommissioningCoordinator {
        let devices: Arc<dyn DeviceStore> = self.devices.clone();
        CommissioningCoordinator::new(
            self.registry.clone(),
            devices,
            self.engine.clone(),
            self.switch.clone(),
            self.transfer.clone(),
        )
        .with_timeouts(CommissionTimeouts {
            ble: Duration::from_secs(2),
            wifi_ap: Duration::from_secs(2),
            network_switch: Duration::from_secs(2),
        })
    }

    pub fn control(&self) -> DeviceControlService {
        let devices: Arc<dyn DeviceStore> = self.devices.clone();
        DeviceControlService::new(
            devices,
            self.engine.clone(),
            self.transfer.clone(),
            Duration::from_secs(2),
        )
    }
}

/// 让测试在注册表之外观察落盘内容。
pub struct SharedMappings(pub Arc<InMemoryMappingStore>);

impl msh_storage::MappingPersistence for SharedMappings {
    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        self.0.load()
    }

    fn save(&self, mappings: &BTreeMap<String, String>) -> Result<(), StorageError> {
        self.0.save(mappings)
    }
}

pub fn failed(message: &str) -> Result<(), EngineError> {
    Err(EngineError::Failed(message.to_string()))
}
