//! 模拟引擎与“不可用”引擎。

use crate::error::EngineError;
use crate::{
    CommissioningEngine, DeviceCommand, DeviceStateReport, EngineCommissionRequest,
    EngineCommissioned, EngineKind,
};
use async_trait::async_trait;
use domain::{NodeId, PowerMetrics};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

const SIMULATED_VOLTAGE: f64 = 230.0;
const SIMULATED_LOAD_WATTS: f64 = 12.0;

/// 模拟引擎：总是配网成功，在内存中维护开关状态。
#[derive(Debug, Default)]
pub struct SimulatedEngine {
    power: Mutex<HashMap<NodeId, bool>>,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_on(&self, node_id: NodeId) -> Result<bool, EngineError> {
        let power = self
            .power
            .lock()
            .map_err(|_| EngineError::Failed("simulated state lock failed".to_string()))?;
        Ok(power.get(&node_id).copied().unwrap_or(false))
    }
}

#[async_trait]
impl CommissioningEngine for SimulatedEngine {
    fn name(&self) -> &str {
        "simulated"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Simulated
    }

    async fn attempt_commission(
        &self,
        request: &EngineCommissionRequest,
    ) -> Result<EngineCommissioned, EngineError> {
        info!(
            target: "msh.engine",
            node_id = %request.node_id,
            transport = %request.transport.as_str(),
            "simulated_commission"
        );
        let mut power = self
            .power
            .lock()
            .map_err(|_| EngineError::Failed("simulated state lock failed".to_string()))?;
        power.insert(request.node_id, false);
        Ok(EngineCommissioned {
            node_id: request.node_id,
        })
    }

    async fn send_command(
        &self,
        node_id: NodeId,
        command: &DeviceCommand,
    ) -> Result<(), EngineError> {
        let mut power = self
            .power
            .lock()
            .map_err(|_| EngineError::Failed("simulated state lock failed".to_string()))?;
        let current = power.entry(node_id).or_insert(false);
        match (command.cluster.as_str(), command.command.as_str()) {
            ("onoff", "on") => *current = true,
            ("onoff", "off") => *current = false,
            ("onoff", "toggle") => *current = !*current,
            (cluster, name) => {
                return Err(EngineError::Failed(format!(
                    "unsupported command {} {}",
                    cluster, name
                )));
            }
        }
        Ok(())
    }

    async fn read_state(&self, node_id: NodeId) -> Result<DeviceStateReport, EngineError> {
        Ok(DeviceStateReport {
            power_on: Some(self.is_on(node_id)?),
            metrics: PowerMetrics::default(),
        })
    }

    async fn read_metrics(&self, node_id: NodeId, _budget: Duration) -> PowerMetrics {
        let Ok(power_on) = self.is_on(node_id) else {
            return PowerMetrics::default();
        };
        let watts = if power_on { SIMULATED_LOAD_WATTS } else { 0.0 };
        PowerMetrics {
            power_watts: Some(watts),
            energy_wh: None,
            voltage: Some(SIMULATED_VOLTAGE),
            current: Some(watts / SIMULATED_VOLTAGE),
        }
    }
}

/// 没有可用引擎。
#[derive(Debug, Clone)]
pub struct UnavailableEngine {
    reason: String,
}

impl UnavailableEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableEngine {
    fn default() -> Self {
        Self::new("no commissioning engine configured")
    }
}

#[async_trait]
impl CommissioningEngine for UnavailableEngine {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Native
    }

    async fn attempt_commission(
        &self,
        _request: &EngineCommissionRequest,
    ) -> Result<EngineCommissioned, EngineError> {
        Err(EngineError::Unavailable(self.reason.clone()))
    }

    async fn send_command(
        &self,
        _node_id: NodeId,
        _command: &DeviceCommand,
    ) -> Result<(), EngineError> {
        Err(EngineError::Unavailable(self.reason.clone()))
    }

    async fn read_state(&self, _node_id: NodeId) -> Result<DeviceStateReport, EngineError> {
        Err(EngineError::Unavailable(self.reason.clone()))
    }
}
