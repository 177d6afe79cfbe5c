#![allow(clippy::unwrap_used)]
// Integration tests for `BridgeSdk` using wiremock.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use camfleet_api::{BridgeSdk, DeviceTarget, Error, NetworkJoinState, ShortRangeSdk};

async fn setup() -> (MockServer, BridgeSdk) {
    let server = MockServer::start().await;
    let sdk = BridgeSdk::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(5)).unwrap();
    (server, sdk)
}

#[tokio::test]
async fn test_connect_posts_address() {
    let (server, sdk) = setup().await;

    Mock::given(method("POST"))
        .and(path("/cameras/1234/connect"))
        .and(body_json(json!({ "address": "AA:BB" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let target = DeviceTarget {
        serial: "1234".into(),
        address: Some("AA:BB".into()),
    };
    sdk.connect(&target).await.unwrap();
}

#[tokio::test]
async fn test_adapter_error_code_maps_to_adapter_unavailable() {
    let (server, sdk) = setup().await;

    Mock::given(method("POST"))
        .and(path("/cameras/1234/connect"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": "adapter_unavailable",
            "message": "no bluetooth adapter"
        })))
        .mount(&server)
        .await;

    let target = DeviceTarget {
        serial: "1234".into(),
        address: None,
    };
    let result = sdk.connect(&target).await;
    assert!(
        matches!(result, Err(Error::AdapterUnavailable(ref m)) if m == "no bluetooth adapter"),
        "got {result:?}"
    );
}

#[tokio::test]
async fn test_device_error_maps_to_short_range() {
    let (server, sdk) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/cameras/1234/shutter"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "gatt",
            "message": "write failed"
        })))
        .mount(&server)
        .await;

    let result = sdk.set_shutter("1234", true).await;
    assert!(matches!(result, Err(Error::ShortRange(_))));
}

#[tokio::test]
async fn test_is_connected_false_on_error() {
    let (server, sdk) = setup().await;

    Mock::given(method("GET"))
        .and(path("/cameras/1234/connection"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "connected": true })))
        .mount(&server)
        .await;

    assert!(sdk.is_connected("1234").await);
    assert!(!sdk.is_connected("9999").await);
}

#[tokio::test]
async fn test_settings_and_home_network_status() {
    let (server, sdk) = setup().await;

    Mock::given(method("GET"))
        .and(path("/cameras/1234/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "2": 1, "3": 8 })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cameras/1234/home-network"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "connected",
            "ip_address": "192.168.1.40",
            "mac_address": "24:74:f7:aa:bb:cc",
            "username": "gopro",
            "password": "pw"
        })))
        .mount(&server)
        .await;

    let settings = sdk.settings("1234").await.unwrap();
    assert_eq!(settings.get(&3), Some(&8));

    let status = sdk.home_network_status("1234").await.unwrap();
    assert_eq!(status.state, NetworkJoinState::Connected);
    assert_eq!(status.ip_address.unwrap().to_string(), "192.168.1.40");
}

#[tokio::test]
async fn test_unreachable_bridge_is_adapter_unavailable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let sdk = BridgeSdk::new(
        Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(),
        Duration::from_secs(2),
    )
    .unwrap();
    let result = sdk.status("1234").await;
    assert!(matches!(result, Err(Error::AdapterUnavailable(_))), "got {result:?}");
}
