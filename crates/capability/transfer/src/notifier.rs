//! Hub 通知通道。

use crate::error::TransferError;
use api_contract::DeviceUpdateNotification;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Hub 通知器抽象。
#[async_trait]
pub trait HubNotifier: Send + Sync {
    /// 通知目标描述（写入转发记录）。
    fn target(&self) -> String;

    /// 是否真的会发出通知。
    fn is_enabled(&self) -> bool {
        true
    }

    async fn notify(&self, notification: &DeviceUpdateNotification) -> Result<(), TransferError>;
}

/// 空通知器（未配置 Hub）。
#[derive(Debug, Default)]
pub struct NoopHubNotifier;

#[async_trait]
impl HubNotifier for NoopHubNotifier {
    fn target(&self) -> String {
        "none".to_string()
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn notify(&self, _notification: &DeviceUpdateNotification) -> Result<(), TransferError> {
        Ok(())
    }
}

/// HTTP 通知器：`POST {base_url}/api/devices/update`。
#[derive(Debug, Clone)]
pub struct HttpHubNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpHubNotifier {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransferError::Unreachable(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/devices/update", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl HubNotifier for HttpHubNotifier {
    fn target(&self) -> String {
        self.endpoint.clone()
    }

    async fn notify(&self, notification: &DeviceUpdateNotification) -> Result<(), TransferError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await
            .map_err(|err| TransferError::Unreachable(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Rejected(format!("status {}", status)));
        }
        Ok(())
    }
}

/// MQTT 通知器配置。
#[derive(Debug, Clone)]
pub struct MqttHubNotifierConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
    pub qos: u8,
}

/// MQTT 通知器：发布到 `{prefix}/devices/{device_id}`。
///
/// `notify` 只在收到 Broker 的 CONNACK 后才发布；连不上 Broker 时一直等待，
/// 由调用方的超时判定失败。成功表示报文已交给已连接的会话。
#[derive(Clone)]
pub struct MqttHubNotifier {
    client: AsyncClient,
    topic_prefix: String,
    qos: QoS,
    connected: watch::Receiver<bool>,
}

impl MqttHubNotifier {
    /// 建立连接并在后台驱动 eventloop。
    pub fn connect(config: MqttHubNotifierConfig) -> (Self, tokio::task::JoinHandle<()>) {
        let client_id = format!("msh-hub-notify-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, config.host, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            options.set_credentials(username, password);
        }
        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let (connected_tx, connected) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        connected_tx.send_replace(true);
                    }
                    Ok(_) => {}
                    Err(err) => {
                        connected_tx.send_replace(false);
                        warn!(target: "msh.transfer", "mqtt notify eventloop error: {}", err);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
        (
            Self {
                client,
                topic_prefix: config.topic_prefix,
                qos: qos_from_u8(config.qos),
                connected,
            },
            handle,
        )
    }

    pub fn topic_for(&self, device_id: &str) -> String {
        topic_for(&self.topic_prefix, device_id)
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }
}

#[async_trait]
impl HubNotifier for MqttHubNotifier {
    fn target(&self) -> String {
        format!("mqtt:{}", self.topic_prefix.trim_end_matches('/'))
    }

    async fn notify(&self, notification: &DeviceUpdateNotification) -> Result<(), TransferError> {
        let mut connected = self.connected.clone();
        connected
            .wait_for(|up| *up)
            .await
            .map(|_| ())
            .map_err(|_| TransferError::Unreachable("mqtt eventloop stopped".to_string()))?;

        let topic = self.topic_for(&notification.device_id);
        let payload = serde_json::to_vec(notification)
            .map_err(|err| TransferError::Encode(err.to_string()))?;
        info!(
            target: "msh.transfer",
            device_id = %notification.device_id,
            topic = %topic,
            payload_size = payload.len(),
            "hub_notify_publish"
        );
        self.client
            .publish(topic, self.qos, false, payload)
            .await
            .map_err(|err| TransferError::Unreachable(err.to_string()))
    }
}

pub fn topic_for(prefix: &str, device_id: &str) -> String {
    format!("{}/devices/{}", prefix.trim_end_matches('/'), device_id)
}

fn qos_from_u8(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_trims_trailing_slash() {
        assert_eq!(topic_for("msh/hub/", "matter_01"), "msh/hub/devices/matter_01");
        assert_eq!(topic_for("msh/hub", "matter_01"), "msh/hub/devices/matter_01");
    }

    #[test]
    fn qos_defaults_to_at_least_once() {
        assert_eq!(qos_from_u8(0), QoS::AtMostOnce);
        assert_eq!(qos_from_u8(2), QoS::ExactlyOnce);
        assert_eq!(qos_from_u8(7), QoS::AtLeastOnce);
    }
}
