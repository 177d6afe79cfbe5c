#![allow(clippy::unwrap_used)]
// Short-range connection lifecycle against an in-memory SDK.

mod common;

use std::time::Duration;

use camfleet_api::ShortRangeStatus;
use camfleet_core::{Command, CommandResult, CoreError, FailureKind, HubMessage, Serial};
use pretty_assertions::assert_eq;

use common::harness;

#[tokio::test]
async fn connect_all_twice_is_idempotent() {
    let h = harness().await;
    h.add_camera("0001").await;
    h.add_camera("0002").await;

    let first = h.fleet.connections().connect_all().await.unwrap();
    assert!(first.is_complete_success());
    assert_eq!(h.sdk.connects(), 2);
    let seen = h.fleet.registry().get(&Serial::from("0001")).unwrap().last_seen;

    let second = h.fleet.connections().connect_all().await.unwrap();
    assert!(second.is_complete_success());
    assert_eq!(second.len(), 2);
    // Live links are reused, not reopened.
    assert_eq!(h.sdk.connects(), 2);
    let camera = h.fleet.registry().get(&Serial::from("0001")).unwrap();
    assert!(camera.connected);
    assert!(camera.last_seen >= seen);
}

#[tokio::test]
async fn out_of_range_camera_is_a_per_device_failure() {
    let h = harness().await;
    h.add_camera("0001").await;
    h.add_camera("0002").await;
    h.sdk.set_out_of_range("0002");

    let result = h.fleet.connections().connect_all().await.unwrap();
    let keys: Vec<&str> = result.serials().map(Serial::as_str).collect();
    assert_eq!(keys, vec!["0001", "0002"]);
    assert_eq!(result.summary(), "1/2 succeeded");
    let (serial, failure) = result.failed().next().unwrap();
    assert_eq!(serial.as_str(), "0002");
    assert_eq!(failure.kind, FailureKind::TransportUnavailable);
    assert!(!h.fleet.registry().get(serial).unwrap().connected);
}

#[tokio::test]
async fn a_connect_that_fails_once_is_retried() {
    let h = harness().await;
    let serial = h.add_camera("0001").await;
    h.sdk.fail_connects("0001", 1);

    let result = h.fleet.connections().connect(&serial).await.unwrap();
    assert!(result.is_complete_success());
    assert_eq!(h.sdk.connects(), 2);
    assert!(h.fleet.registry().get(&serial).unwrap().connected);
}

#[tokio::test]
async fn connect_gives_up_after_the_configured_tries() {
    let h = harness().await;
    let serial = h.add_camera("0001").await;
    h.sdk.set_out_of_range("0001");

    let result = h.fleet.connections().connect(&serial).await.unwrap();
    let (_, failure) = result.failed().next().unwrap();
    assert_eq!(failure.kind, FailureKind::TransportUnavailable);
    assert_eq!(h.sdk.connects(), h.fleet.config().retry.attempts as usize);
}

#[tokio::test]
async fn connect_waits_for_the_radio_before_touching_the_access_point() {
    let h = harness().await;
    let serial = h.add_camera("0003").await;
    let radio = h.fleet.downloads().radio_lock().lock_owned().await;

    let connect = h.fleet.connections().connect(&serial);
    tokio::pin!(connect);
    let early = tokio::time::timeout(Duration::from_millis(200), &mut connect).await;
    assert!(early.is_err(), "connect finished while the radio was busy");
    assert_eq!(h.sdk.connects(), 1);
    assert!(h.sdk.access_point_calls().is_empty());

    drop(radio);
    let result = connect.await.unwrap();
    assert!(result.is_complete_success());
    assert_eq!(h.sdk.access_point_calls(), vec![("0003".to_string(), false)]);
}

#[tokio::test]
async fn missing_adapter_fails_the_whole_call() {
    let h = harness().await;
    h.add_camera("0001").await;
    h.add_camera("0002").await;
    h.sdk.set_adapter_missing();

    let err = h.fleet.connections().connect_all().await.unwrap_err();
    assert!(matches!(err, CoreError::AdapterUnavailable { .. }), "got {err:?}");
}

#[tokio::test]
async fn connect_reads_battery_and_switches_access_point_off() {
    let h = harness().await;
    h.sdk.set_status(
        "0001",
        ShortRangeStatus {
            battery_percent: Some(81),
            space_remaining_kb: Some(12_000_000),
            encoding: false,
        },
    );
    let serial = h.add_connected("0001").await;

    let camera = h.fleet.registry().get(&serial).unwrap();
    assert_eq!(camera.battery_level, Some(81));
    assert_eq!(camera.storage_remaining_kb, Some(12_000_000));
    assert_eq!(h.sdk.access_point_calls(), vec![("0001".to_string(), false)]);
}

#[tokio::test]
async fn check_connections_reconnects_a_dropped_link_once() {
    let h = harness().await;
    let serial = h.add_connected("0001").await;
    h.sdk.drop_link("0001");

    let result = h.fleet.connections().check_connections().await.unwrap();
    assert_eq!(result.get(&serial), Some(&Ok(true)));
    assert_eq!(h.sdk.connects(), 2);
}

#[tokio::test]
async fn check_connections_reports_unrecoverable_links() {
    let h = harness().await;
    let serial = h.add_connected("0001").await;
    h.sdk.drop_link("0001");
    h.sdk.set_out_of_range("0001");

    let result = h.fleet.connections().check_connections().await.unwrap();
    assert!(result.get(&serial).unwrap().is_err());
    assert!(!h.fleet.registry().get(&serial).unwrap().connected);
}

#[tokio::test]
async fn disconnect_clears_the_flag_and_announces_it() {
    let h = harness().await;
    let serial = h.add_connected("0001").await;
    let (_, mut rx) = h.fleet.subscribe();

    let result = h
        .fleet
        .execute(Command::Disconnect { serial: None })
        .await
        .unwrap();
    assert!(matches!(result, CommandResult::Connections(ref r) if r.is_complete_success()));
    assert!(!h.fleet.registry().get(&serial).unwrap().connected);

    let first = rx.recv().await.unwrap();
    assert_eq!(
        *first,
        HubMessage::CameraConnection {
            serial,
            connected: false
        }
    );
    let second = rx.recv().await.unwrap();
    assert_eq!(second.kind(), "fleet_status");
}

#[tokio::test]
async fn discover_skips_registered_cameras() {
    let h = harness().await;
    h.add_camera("1111").await;
    h.sdk.advertise("GoPro 1111", "AA:01", -40);
    h.sdk.advertise("GoPro 2222", "AA:02", -70);
    h.sdk.advertise("GoPro 3333", "AA:03", -50);
    h.sdk.advertise("GoPro 3333", "AA:03", -52);
    h.sdk.advertise("Speaker 4444", "AA:04", -30);

    let found = h
        .fleet
        .connections()
        .discover(std::time::Duration::from_millis(10))
        .await
        .unwrap();
    let serials: Vec<&str> = found.iter().map(|c| c.serial.as_str()).collect();
    assert_eq!(serials, vec!["3333", "2222"]);
    assert_eq!(found[0].address, "AA:03");
}

#[tokio::test]
async fn watcher_publishes_only_on_change() {
    let h = harness().await;
    h.add_connected("0001").await;
    h.add_connected("0002").await;

    assert_eq!(h.fleet.health().watch_connections_once().await, 0);
    h.sdk.drop_link("0002");
    assert_eq!(h.fleet.health().watch_connections_once().await, 1);
    assert_eq!(h.fleet.health().watch_connections_once().await, 0);
    assert!(!h.fleet.registry().get(&Serial::from("0002")).unwrap().connected);
}
