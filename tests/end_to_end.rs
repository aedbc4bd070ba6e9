//! Runs the client against a real TCP gateway on localhost.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use plantwatch::{ClientConfig, SessionOptions, SessionState, Snapshot, TelemetryClient};
use plantwatch_types::{ChannelId, ConnectionStatus, TelemetryReading};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const TIMEOUT: Duration = Duration::from_secs(5);

/// One envelope line carrying a full reading with the given turbidity.
fn frame(timestamp: &str, turbidity: f64) -> String {
    let reading = TelemetryReading::baseline()
        .iter()
        .fold(TelemetryReading::builder(timestamp), |b, (id, m)| {
            b.measurement(*id, m.clone())
        })
        .channel(ChannelId::ReservoirTurbidity, turbidity, "NTU")
        .build()
        .unwrap();

    let envelope = serde_json::json!({ "event": "mqtt_message", "data": reading });
    format!("{}\n", envelope)
}

fn config(endpoint: String, max_reconnect_attempts: u32) -> ClientConfig {
    ClientConfig {
        endpoint,
        min_interval: Duration::from_secs(60),
        session: SessionOptions {
            reconnect: true,
            max_reconnect_attempts,
            reconnect_delay: Duration::from_millis(50),
        },
        connect_timeout: Duration::from_secs(1),
        ..ClientConfig::default()
    }
}

async fn wait_until(client: &TelemetryClient, check: impl Fn(&Snapshot) -> bool) {
    let mut rx = client.watch();
    tokio::time::timeout(TIMEOUT, rx.wait_for(|s| check(s)))
        .await
        .expect("timed out waiting for snapshot")
        .unwrap();
}

fn turbidity(snapshot: &Snapshot) -> Option<f64> {
    snapshot.latest_reading().value(ChannelId::ReservoirTurbidity)
}

#[tokio::test]
async fn test_connect_drop_and_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = listener.local_addr().unwrap().to_string();
    let (drop_tx, drop_rx) = oneshot::channel::<()>();

    let gateway = tokio::spawn(async move {
        let (mut first, _) = listener.accept().await.unwrap();
        first.write_all(b"{\"event\":\"heartbeat\",\"data\":null}\n").await.unwrap();
        first.write_all(b"{\"event\":\"mqtt_message\",\"data\":{\"timestamp\":\"t0\"}}\n").await.unwrap();
        first.write_all(frame("t1", 4.3).as_bytes()).await.unwrap();

        let _ = drop_rx.await;
        drop(first);

        let (mut second, _) = listener.accept().await.unwrap();
        second.write_all(frame("t2", 5.1).as_bytes()).await.unwrap();
        std::future::pending::<()>().await;
    });

    let mut client = TelemetryClient::new(config(endpoint, 3), plantwatch::TcpConnector::default());
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    let _subscription = client.subscribe(move |snapshot| {
        let status = snapshot.connection_status();
        let mut seen = sink.lock();
        if seen.last() != Some(&status) {
            seen.push(status);
        }
    });

    client.start().unwrap();

    // First message after connect is accepted even with a 60s window
    wait_until(&client, |s| turbidity(s) == Some(4.3)).await;
    assert!(client.read().is_connected());
    let stats = client.stats();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.malformed, 1);

    drop_tx.send(()).unwrap();

    // Reconnect clears the throttle window, so t2 lands well inside 60s
    wait_until(&client, |s| turbidity(s) == Some(5.1)).await;
    assert_eq!(client.read().latest_reading().timestamp(), "t2");
    assert_eq!(
        *statuses.lock(),
        vec![
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connected
        ]
    );

    client.stop().await;
    let snapshot = client.read();
    assert!(!snapshot.is_connected());
    assert_eq!(snapshot.latest_reading(), &TelemetryReading::baseline());

    gateway.abort();
}

#[tokio::test]
async fn test_gives_up_when_gateway_is_down() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = listener.local_addr().unwrap().to_string();
    drop(listener);

    let mut client = TelemetryClient::new(config(endpoint, 2), plantwatch::TcpConnector::default());
    client.start().unwrap();

    tokio::time::timeout(TIMEOUT, async {
        while client.is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session kept retrying");

    assert_eq!(client.session_state(), SessionState::Idle);
    assert!(!client.read().is_connected());
    assert_eq!(client.stats().accepted, 0);
}
