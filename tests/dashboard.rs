//! The dashboard service on a real socket

use hostdeck::{Config, DashboardService};
use std::time::Duration;
use tokio::sync::oneshot;

#[tokio::test]
async fn serves_until_shutdown() {
    let config = Config {
        listen_addr: "127.0.0.1:0".to_string(),
        ..Config::default()
    };
    let mut service = DashboardService::new(config, false);
    service.initialize().await.unwrap();
    let addr = service.local_addr().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(service.run_until(async {
        let _ = stop_rx.await;
    }));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let overview: serde_json::Value = client
        .get(format!("http://{}/", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(overview["name"], "hostdeck");

    let rejected: serde_json::Value = client
        .post(format!("http://{}/terminal", addr))
        .form(&[("command", "id; reboot")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rejected["status"], "error");
    assert_eq!(rejected["message"], "Invalid command");

    let missing = client
        .get(format!("http://{}/news/unknown-topic", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
