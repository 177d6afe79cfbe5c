#![allow(clippy::unwrap_used)]
// Home-network provisioning and reachability against wiremock cameras.

mod common;

use camfleet_api::{HomeNetworkStatus, NetworkJoinState};
use camfleet_core::{CohnState, Command, CoreError, MacAddress, Serial};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{basic_auth, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{NETWORK, credential, harness, harness_with_server, localhost};

fn joined(ip: Option<&str>, mac: &str) -> HomeNetworkStatus {
    HomeNetworkStatus {
        state: if ip.is_some() {
            NetworkJoinState::Connected
        } else {
            NetworkJoinState::Connecting
        },
        ip_address: ip.map(|ip| ip.parse().unwrap()),
        mac_address: Some(mac.into()),
        username: Some("gopro".into()),
        password: Some("cam-pass".into()),
        ssid: Some(NETWORK.into()),
    }
}

async fn mount_state(server: &MockServer, user: &str, pass: &str) {
    Mock::given(method("GET"))
        .and(path("/gopro/camera/state"))
        .and(basic_auth(user, pass))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": { "70": 64, "54": 5_000_000, "10": 0 },
            "settings": {}
        })))
        .mount(server)
        .await;
}

// ── Provisioning ────────────────────────────────────────────────────

#[tokio::test]
async fn provision_requires_a_short_range_link() {
    let h = harness().await;
    let serial = h.add_camera("0001").await;

    let err = h.fleet.cohn().provision(&serial).await.unwrap_err();
    assert!(matches!(err, CoreError::TransportUnavailable { .. }), "got {err:?}");
    assert_eq!(
        h.fleet.registry().get(&serial).unwrap().cohn_state,
        CohnState::Unprovisioned
    );
}

#[tokio::test]
async fn provision_stores_the_credential() {
    let h = harness().await;
    let serial = h.add_connected("0001").await;
    h.sdk
        .set_join_status("0001", joined(Some("192.168.1.40"), "AA:BB:CC:00:00:01"));

    let status = h.fleet.cohn().provision(&serial).await.unwrap();
    assert_eq!(status.state, CohnState::Online);
    assert_eq!(status.network.as_deref(), Some(NETWORK));

    let stored = h.fleet.credentials().get(&serial).await.unwrap();
    assert_eq!(stored.ip_address.to_string(), "192.168.1.40");
    assert_eq!(stored.username, "gopro");
    assert_eq!(stored.password, "cam-pass");
    assert!(stored.certificate.contains("BEGIN CERTIFICATE"));
    assert_eq!(stored.mac_address, Some(MacAddress::new("aa:bb:cc:00:00:01")));
}

#[tokio::test]
async fn provision_falls_back_to_the_address_table() {
    let h = harness().await;
    let serial = h.add_connected("0001").await;
    h.sdk.set_join_status("0001", joined(None, "AA:BB:CC:00:00:01"));
    h.arp
        .insert("aa-bb-cc-00-00-01", "192.168.1.41".parse().unwrap());

    let status = h.fleet.cohn().provision(&serial).await.unwrap();
    assert_eq!(status.ip.unwrap().to_string(), "192.168.1.41");
}

#[tokio::test]
async fn failed_provisioning_restores_the_previous_state() {
    let h = harness().await;
    let serial = h.add_connected("0001").await;
    h.sdk.set_join_status(
        "0001",
        HomeNetworkStatus {
            state: NetworkJoinState::Failed,
            ..HomeNetworkStatus::default()
        },
    );

    let err = h.fleet.cohn().provision(&serial).await.unwrap_err();
    assert!(matches!(err, CoreError::ProvisioningFailed { .. }), "got {err:?}");
    assert_eq!(
        h.fleet.registry().get(&serial).unwrap().cohn_state,
        CohnState::Unprovisioned
    );
    assert!(h.fleet.credentials().get(&serial).await.is_none());
}

#[tokio::test]
async fn concurrent_provisioning_of_one_camera_conflicts() {
    let h = harness().await;
    let serial = h.add_connected("0001").await;
    // Never reports an address, so the first run keeps polling.
    h.sdk.set_join_status(
        "0001",
        HomeNetworkStatus {
            state: NetworkJoinState::Connecting,
            ..HomeNetworkStatus::default()
        },
    );

    let cohn = h.fleet.cohn();
    let (first, second) = tokio::join!(cohn.provision(&serial), cohn.provision(&serial));
    assert!(matches!(first, Err(CoreError::ProvisioningFailed { .. })), "got {first:?}");
    assert!(matches!(second, Err(CoreError::Conflict { .. })), "got {second:?}");
}

// ── Reachability ────────────────────────────────────────────────────

#[tokio::test]
async fn successful_probe_marks_online_and_refreshes_battery() {
    let server = MockServer::start().await;
    mount_state(&server, "gopro", "pw1").await;
    let h = harness_with_server(&server).await;
    let serial = h.add_camera("0001").await;
    h.put_credential(&serial, credential("127.0.0.1", "gopro", "pw1"))
        .await;
    assert_eq!(
        h.fleet.registry().get(&serial).unwrap().cohn_state,
        CohnState::Offline
    );

    let status = h.fleet.cohn().status(&serial).await.unwrap();
    assert_eq!(status.state, CohnState::Online);
    let camera = h.fleet.registry().get(&serial).unwrap();
    assert_eq!(camera.battery_level, Some(64));
    assert_eq!(camera.storage_remaining_kb, Some(5_000_000));
}

#[tokio::test]
async fn going_offline_keeps_the_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gopro/camera/state"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let h = harness_with_server(&server).await;
    let serial = h.add_camera("0001").await;
    h.put_credential(&serial, credential("127.0.0.1", "gopro", "pw1"))
        .await;

    let status = h.fleet.cohn().status(&serial).await.unwrap();
    assert_eq!(status.state, CohnState::Offline);
    assert!(h.fleet.credentials().get(&serial).await.is_some());

    // Only explicit removal forgets it.
    h.fleet
        .execute(Command::RemoveProvisioning {
            serial: serial.clone(),
        })
        .await
        .unwrap();
    assert!(h.fleet.credentials().get(&serial).await.is_none());
    assert_eq!(
        h.fleet.registry().get(&serial).unwrap().cohn_state,
        CohnState::Unprovisioned
    );
}

#[tokio::test]
async fn moved_camera_is_found_through_the_address_table() {
    let server = MockServer::start().await;
    mount_state(&server, "gopro", "pw1").await;
    let h = harness_with_server(&server).await;
    let serial = h.add_camera("0001").await;
    let mut stale = credential("127.0.0.2", "gopro", "pw1");
    stale.mac_address = Some(MacAddress::new("aa:bb:cc:00:00:01"));
    h.put_credential(&serial, stale).await;
    h.arp.insert("aa:bb:cc:00:00:01", localhost());

    let status = h.fleet.cohn().status(&serial).await.unwrap();
    assert_eq!(status.state, CohnState::Online);
    assert_eq!(status.ip, Some(localhost()));
    assert_eq!(status.recovered_from.unwrap().to_string(), "127.0.0.2");
    let stored = h.fleet.credentials().get(&serial).await.unwrap();
    assert_eq!(stored.ip_address, localhost());
}

#[tokio::test]
async fn status_all_reports_every_camera() {
    let server = MockServer::start().await;
    mount_state(&server, "gopro", "pw1").await;
    let h = harness_with_server(&server).await;
    let online = h.add_camera("0001").await;
    h.add_camera("0002").await;
    h.put_credential(&online, credential("127.0.0.1", "gopro", "pw1"))
        .await;

    let result = h.fleet.cohn().status_all().await;
    let states: Vec<(&str, CohnState)> = result
        .iter()
        .map(|(s, r)| (s.as_str(), r.as_ref().unwrap().state))
        .collect();
    assert_eq!(
        states,
        vec![("0001", CohnState::Online), ("0002", CohnState::Unprovisioned)]
    );
}

// ── Profiles ────────────────────────────────────────────────────────

#[tokio::test]
async fn switching_networks_uses_that_profile_credentials() {
    let h = harness().await;
    let serial = h.add_camera("0001").await;
    h.fleet
        .credentials()
        .put("Cabin", &serial, credential("10.0.0.9", "gopro", "pw"))
        .await
        .unwrap();

    let profiles = match h
        .fleet
        .execute(Command::SwitchNetwork {
            ssid: "Cabin".into(),
        })
        .await
        .unwrap()
    {
        camfleet_core::CommandResult::Networks(profiles) => profiles,
        other => panic!("unexpected result {other:?}"),
    };
    let summary: Vec<(&str, usize, bool)> = profiles
        .iter()
        .map(|p| (p.ssid.as_str(), p.cameras.len(), p.active))
        .collect();
    assert_eq!(summary, vec![("Cabin", 1, true), ("Studio", 0, false)]);
    assert_eq!(
        h.fleet.registry().get(&serial).unwrap().cohn_state,
        CohnState::Offline
    );
}

#[tokio::test]
async fn removing_a_camera_drops_credentials_on_every_network() {
    let h = harness().await;
    let serial = h.add_camera("0001").await;
    let creds = h.fleet.credentials();
    creds
        .put(NETWORK, &serial, credential("10.0.0.8", "gopro", "pw"))
        .await
        .unwrap();
    creds
        .put("Cabin", &serial, credential("10.0.0.9", "gopro", "pw"))
        .await
        .unwrap();

    h.fleet
        .execute(Command::RemoveCamera {
            serial: serial.clone(),
        })
        .await
        .unwrap();
    assert!(creds.get_for(NETWORK, &serial).await.is_none());
    assert!(creds.get_for("Cabin", &serial).await.is_none());
    assert!(!h.fleet.registry().contains(&Serial::from("0001")));
}
