use api_contract::{CommissioningData, DeviceUpdateNotification};
use async_trait::async_trait;
use domain::{CommissioningMethod, DeviceRecord, NodeId};
use msh_transfer::{
    CredentialTransferCoordinator, HttpHubNotifier, HubNotifier, InMemoryTransferLog,
    JsonlTransferLog, MqttHubNotifier, MqttHubNotifierConfig, NoopHubNotifier, TransferError,
    TransferLog, TransferStatus,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn device() -> DeviceRecord {
    DeviceRecord::commissioned(
        NodeId::new(0xAB),
        "Kitchen Plug",
        "smart-plug",
        CommissioningMethod::WifiAp,
        1_000,
    )
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<DeviceUpdateNotification>>,
}

#[async_trait]
impl HubNotifier for RecordingNotifier {
    fn target(&self) -> String {
        "stub".to_string()
    }

    async fn notify(&self, notification: &DeviceUpdateNotification) -> Result<(), TransferError> {
        self.sent
            .lock()
            .expect("lock")
            .push(notification.clone());
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl HubNotifier for FailingNotifier {
    fn target(&self) -> String {
        "stub".to_string()
    }

    async fn notify(&self, _notification: &DeviceUpdateNotification) -> Result<(), TransferError> {
        Err(TransferError::Rejected("status 500".to_string()))
    }
}

struct SlowNotifier;

#[async_trait]
impl HubNotifier for SlowNotifier {
    fn target(&self) -> String {
        "stub".to_string()
    }

    async fn notify(&self, _notification: &DeviceUpdateNotification) -> Result<(), TransferError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    }
}

#[tokio::test]
async fn successful_forward_is_logged_once() {
    let notifier = Arc::new(RecordingNotifier::default());
    let log = Arc::new(InMemoryTransferLog::new());
    let coordinator =
        CredentialTransferCoordinator::new(notifier.clone(), log.clone(), Duration::from_secs(1));

    let outcome = coordinator.forward(&device(), None).await;
    assert!(outcome.success);

    let sent = notifier.sent.lock().expect("lock").clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].device_id, "matter_00000000000000AB");
    assert_eq!(sent[0].device_data.method, "wifi-ap");

    let history = coordinator.transfer_history(None).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TransferStatus::Delivered);
}

#[tokio::test]
async fn failure_never_raises() {
    let log = Arc::new(InMemoryTransferLog::new());
    let coordinator =
        CredentialTransferCoordinator::new(Arc::new(FailingNotifier), log, Duration::from_secs(1));

    let outcome = coordinator.forward(&device(), None).await;
    assert!(!outcome.success);

    let history = coordinator
        .transfer_history(Some("matter_00000000000000AB"))
        .expect("history");
    assert_eq!(history[0].status, TransferStatus::Failed);
    assert!(
        history[0]
            .message
            .as_deref()
            .unwrap_or_default()
            .contains("status 500")
    );
}

#[tokio::test]
async fn slow_hub_is_bounded() {
    let coordinator = CredentialTransferCoordinator::new(
        Arc::new(SlowNotifier),
        Arc::new(InMemoryTransferLog::new()),
        Duration::from_millis(50),
    );
    let outcome = coordinator.forward(&device(), None).await;
    assert!(!outcome.success);
}

#[tokio::test]
async fn disabled_hub_is_skipped() {
    let coordinator = CredentialTransferCoordinator::new(
        Arc::new(NoopHubNotifier),
        Arc::new(InMemoryTransferLog::new()),
        Duration::from_secs(1),
    );
    let outcome = coordinator.forward(&device(), None).await;
    assert!(!outcome.success);
    let history = coordinator.transfer_history(None).expect("history");
    assert_eq!(history[0].status, TransferStatus::Skipped);
    assert_eq!(history[0].target, "none");
}

#[tokio::test]
async fn jsonl_log_keeps_history_newest_first() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("transfers.jsonl");
    let coordinator = CredentialTransferCoordinator::new(
        Arc::new(RecordingNotifier::default()),
        Arc::new(JsonlTransferLog::new(&path)),
        Duration::from_secs(1),
    );

    coordinator.forward(&device(), None).await;
    let mut other = device();
    other.device_id = "matter_other".to_string();
    coordinator.forward(&other, None).await;

    let reopened = JsonlTransferLog::new(&path);
    let all = reopened.history(None).expect("history");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].device_id, "matter_other");

    let one = reopened
        .history(Some("matter_00000000000000AB"))
        .expect("history");
    assert_eq!(one.len(), 1);
}

fn commissioning_data() -> CommissioningData {
    CommissioningData {
        attempt_id: "attempt-7".to_string(),
        vendor_id: "0x1234".to_string(),
        product_id: "0x5678".to_string(),
        discriminator: 1234,
        payload_format: "standard".to_string(),
        commissioning_method: "wifi-ap".to_string(),
        network_ssid: "HomeNet".to_string(),
        transports_attempted: vec!["ble".to_string(), "wifi-ap".to_string()],
        commissioned_at_ms: 1_000,
    }
}

#[tokio::test]
async fn commissioning_data_is_sent_and_persisted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("transfers.jsonl");
    let notifier = Arc::new(RecordingNotifier::default());
    let coordinator = CredentialTransferCoordinator::new(
        notifier.clone(),
        Arc::new(JsonlTransferLog::new(&path)),
        Duration::from_secs(1),
    );
    let data = commissioning_data();

    assert!(coordinator.forward(&device(), Some(&data)).await.success);

    let sent = notifier.sent.lock().expect("lock").clone();
    assert_eq!(sent[0].commissioning_data.as_ref(), Some(&data));

    let history = JsonlTransferLog::new(&path).history(None).expect("history");
    assert_eq!(history[0].commissioning_data.as_ref(), Some(&data));
    let raw = std::fs::read_to_string(&path).expect("read log");
    assert!(raw.contains("\"network_ssid\":\"HomeNet\""));
    assert!(!raw.contains("20202021"));
}

#[tokio::test]
async fn skipped_forward_still_records_commissioning_data() {
    let coordinator = CredentialTransferCoordinator::new(
        Arc::new(NoopHubNotifier),
        Arc::new(InMemoryTransferLog::new()),
        Duration::from_secs(1),
    );
    let data = commissioning_data();

    assert!(!coordinator.forward(&device(), Some(&data)).await.success);

    let history = coordinator.transfer_history(None).expect("history");
    assert_eq!(history[0].status, TransferStatus::Skipped);
    assert_eq!(history[0].commissioning_data, Some(data));
}

#[test]
fn log_lines_without_commissioning_data_still_parse() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("transfers.jsonl");
    std::fs::write(
        &path,
        "{\"device_id\":\"matter_1\",\"target\":\"none\",\"status\":\"skipped\",\
         \"message\":null,\"timestamp_ms\":5}\n",
    )
    .expect("write");

    let history = JsonlTransferLog::new(&path).history(None).expect("history");
    assert_eq!(history.len(), 1);
    assert!(history[0].commissioning_data.is_none());
}

#[tokio::test]
async fn http_notifier_posts_device_update() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let read = socket.read(&mut buf).await.expect("read");
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buf[..read]);
            if request_complete(&request) {
                break;
            }
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await
            .expect("write");
        String::from_utf8_lossy(&request).into_owned()
    });

    let notifier =
        HttpHubNotifier::new(&format!("http://{}/", addr), Duration::from_secs(2)).expect("client");
    assert_eq!(notifier.endpoint(), format!("http://{}/api/devices/update", addr));

    let coordinator = CredentialTransferCoordinator::new(
        Arc::new(notifier),
        Arc::new(InMemoryTransferLog::new()),
        Duration::from_secs(2),
    );
    assert!(coordinator.forward(&device(), None).await.success);

    let request = server.await.expect("server");
    assert!(request.starts_with("POST /api/devices/update"));
    assert!(request.contains("\"device_id\":\"matter_00000000000000AB\""));
    assert!(!request.contains("passcode"));
}

#[tokio::test]
async fn http_notifier_reports_unreachable_hub() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let notifier =
        HttpHubNotifier::new(&format!("http://{}", addr), Duration::from_secs(1)).expect("client");
    let notification = msh_transfer::notification_for(&device(), None);
    let err = notifier.notify(&notification).await.unwrap_err();
    assert!(matches!(err, TransferError::Unreachable(_)));
}

#[tokio::test]
async fn mqtt_notifier_without_broker_is_not_reported_as_notified() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let (notifier, eventloop) = MqttHubNotifier::connect(MqttHubNotifierConfig {
        host: "127.0.0.1".to_string(),
        port,
        username: None,
        password: None,
        topic_prefix: "msh/hub".to_string(),
        qos: 1,
    });
    assert!(!notifier.is_connected());

    let coordinator = CredentialTransferCoordinator::new(
        Arc::new(notifier),
        Arc::new(InMemoryTransferLog::new()),
        Duration::from_millis(300),
    );
    let outcome = coordinator.forward(&device(), None).await;
    assert!(!outcome.success);
    let history = coordinator.transfer_history(None).expect("history");
    assert_eq!(history[0].status, TransferStatus::Failed);
    eventloop.abort();
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    request.len() >= header_end + 4 + content_length
}
