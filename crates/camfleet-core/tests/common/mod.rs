// Shared fakes and a fleet harness for the integration tests.
#![allow(clippy::unwrap_used, dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;
use tempfile::TempDir;
use wiremock::MockServer;

use camfleet_api::arp::normalize_mac;
use camfleet_api::{
    AddressTable, Advertisement, DeviceTarget, Error, HomeNetworkStatus, ShortRangeSdk,
    ShortRangeStatus, WifiRadio,
};
use camfleet_core::{
    CohnCredential, Collaborators, Command, Fleet, FleetConfig, HomeNetwork, Serial,
};

pub const NETWORK: &str = "Studio";

// ── Short-range SDK ─────────────────────────────────────────────────

#[derive(Default)]
struct SdkState {
    links: HashSet<String>,
    out_of_range: HashSet<String>,
    adapter_missing: bool,
    /// Connect attempts that fail before the link comes up.
    flaky: HashMap<String, usize>,
    connects: usize,
    status: HashMap<String, ShortRangeStatus>,
    settings: HashMap<String, HashMap<u32, u32>>,
    written: Vec<(String, u32, u32)>,
    shutter: Vec<(String, bool)>,
    access_point: Vec<(String, bool)>,
    join: HashMap<String, HomeNetworkStatus>,
    advertisements: Vec<Advertisement>,
}

/// In-memory camera SDK. Every camera is in range unless told otherwise.
#[derive(Default)]
pub struct FakeSdk {
    state: Mutex<SdkState>,
}

impl FakeSdk {
    fn lock(&self) -> MutexGuard<'_, SdkState> {
        self.state.lock().unwrap()
    }

    pub fn set_out_of_range(&self, serial: &str) {
        self.lock().out_of_range.insert(serial.into());
    }

    /// The next `times` connects to `serial` fail as if out of range.
    pub fn fail_connects(&self, serial: &str, times: usize) {
        self.lock().flaky.insert(serial.into(), times);
    }

    pub fn set_adapter_missing(&self) {
        self.lock().adapter_missing = true;
    }

    /// The link goes away without the fleet being told.
    pub fn drop_link(&self, serial: &str) {
        self.lock().links.remove(serial);
    }

    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    pub fn set_status(&self, serial: &str, status: ShortRangeStatus) {
        self.lock().status.insert(serial.into(), status);
    }

    pub fn set_settings(&self, serial: &str, settings: HashMap<u32, u32>) {
        self.lock().settings.insert(serial.into(), settings);
    }

    pub fn written(&self) -> Vec<(String, u32, u32)> {
        self.lock().written.clone()
    }

    pub fn shutter_calls(&self) -> Vec<(String, bool)> {
        self.lock().shutter.clone()
    }

    pub fn access_point_calls(&self) -> Vec<(String, bool)> {
        self.lock().access_point.clone()
    }

    pub fn set_join_status(&self, serial: &str, status: HomeNetworkStatus) {
        self.lock().join.insert(serial.into(), status);
    }

    pub fn advertise(&self, name: &str, address: &str, rssi: i16) {
        self.lock().advertisements.push(Advertisement {
            name: name.into(),
            address: address.into(),
            rssi: Some(rssi),
        });
    }

    fn linked(&self, serial: &str) -> Result<(), Error> {
        if self.lock().links.contains(serial) {
            Ok(())
        } else {
            Err(Error::ShortRange(format!("{serial} not connected")))
        }
    }
}

#[async_trait]
impl ShortRangeSdk for FakeSdk {
    async fn scan(&self, _timeout: Duration) -> Result<Vec<Advertisement>, Error> {
        let state = self.lock();
        if state.adapter_missing {
            return Err(Error::AdapterUnavailable("no adapter".into()));
        }
        Ok(state.advertisements.clone())
    }

    async fn connect(&self, target: &DeviceTarget) -> Result<(), Error> {
        let mut state = self.lock();
        if state.adapter_missing {
            return Err(Error::AdapterUnavailable("no adapter".into()));
        }
        state.connects += 1;
        if state.out_of_range.contains(&target.serial) {
            return Err(Error::ShortRange(format!("{} out of range", target.serial)));
        }
        if let Some(left) = state.flaky.get_mut(&target.serial) {
            if *left > 0 {
                *left -= 1;
                return Err(Error::ShortRange(format!("{} did not answer", target.serial)));
            }
        }
        state.links.insert(target.serial.clone());
        Ok(())
    }

    async fn disconnect(&self, serial: &str) -> Result<(), Error> {
        self.lock().links.remove(serial);
        Ok(())
    }

    async fn is_connected(&self, serial: &str) -> bool {
        self.lock().links.contains(serial)
    }

    async fn status(&self, serial: &str) -> Result<ShortRangeStatus, Error> {
        self.linked(serial)?;
        Ok(self.lock().status.get(serial).cloned().unwrap_or_default())
    }

    async fn set_shutter(&self, serial: &str, recording: bool) -> Result<(), Error> {
        self.linked(serial)?;
        let mut state = self.lock();
        state.shutter.push((serial.into(), recording));
        state.status.entry(serial.into()).or_default().encoding = recording;
        Ok(())
    }

    async fn settings(&self, serial: &str) -> Result<HashMap<u32, u32>, Error> {
        self.linked(serial)?;
        Ok(self.lock().settings.get(serial).cloned().unwrap_or_default())
    }

    async fn set_setting(&self, serial: &str, setting: u32, option: u32) -> Result<(), Error> {
        self.linked(serial)?;
        self.lock().written.push((serial.into(), setting, option));
        Ok(())
    }

    async fn set_access_point(&self, serial: &str, enabled: bool) -> Result<(), Error> {
        self.lock().access_point.push((serial.into(), enabled));
        Ok(())
    }

    async fn join_home_network(
        &self,
        serial: &str,
        _ssid: &str,
        _password: &SecretString,
    ) -> Result<(), Error> {
        self.linked(serial)
    }

    async fn home_network_status(&self, serial: &str) -> Result<HomeNetworkStatus, Error> {
        self.linked(serial)?;
        Ok(self.lock().join.get(serial).cloned().unwrap_or_default())
    }

    async fn create_home_network_certificate(&self, serial: &str) -> Result<String, Error> {
        self.linked(serial)?;
        Ok("-----BEGIN CERTIFICATE-----\nfake\n-----END CERTIFICATE-----\n".into())
    }
}

// ── WiFi radio ──────────────────────────────────────────────────────

#[derive(Default)]
struct RadioState {
    current: Option<String>,
    joins: Vec<String>,
    leaves: Vec<String>,
    /// Joins and leaves in order, as `join X` / `leave X`.
    history: Vec<String>,
}

pub struct FakeRadio {
    state: Mutex<RadioState>,
}

impl FakeRadio {
    pub fn on(network: &str) -> Self {
        Self {
            state: Mutex::new(RadioState {
                current: Some(network.into()),
                ..RadioState::default()
            }),
        }
    }

    pub fn joins(&self) -> Vec<String> {
        self.state.lock().unwrap().joins.clone()
    }

    pub fn leaves(&self) -> Vec<String> {
        self.state.lock().unwrap().leaves.clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.state.lock().unwrap().history.clone()
    }

    pub fn current(&self) -> Option<String> {
        self.state.lock().unwrap().current.clone()
    }
}

#[async_trait]
impl WifiRadio for FakeRadio {
    async fn current_network(&self) -> Result<Option<String>, Error> {
        Ok(self.current())
    }

    async fn join(&self, ssid: &str, _password: &SecretString) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.joins.push(ssid.into());
        state.history.push(format!("join {ssid}"));
        state.current = Some(ssid.into());
        Ok(())
    }

    async fn leave(&self, ssid: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.leaves.push(ssid.into());
        state.history.push(format!("leave {ssid}"));
        if state.current.as_deref() == Some(ssid) {
            state.current = None;
        }
        Ok(())
    }
}

// ── Address table ───────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeAddressTable {
    entries: Mutex<HashMap<String, IpAddr>>,
}

impl FakeAddressTable {
    pub fn insert(&self, mac: &str, ip: IpAddr) {
        self.entries.lock().unwrap().insert(normalize_mac(mac), ip);
    }
}

#[async_trait]
impl AddressTable for FakeAddressTable {
    async fn lookup(&self, mac: &str) -> Result<Option<IpAddr>, Error> {
        Ok(self.entries.lock().unwrap().get(&normalize_mac(mac)).copied())
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub fleet: Fleet,
    pub sdk: Arc<FakeSdk>,
    pub radio: Arc<FakeRadio>,
    pub arp: Arc<FakeAddressTable>,
    pub dir: TempDir,
}

/// Short timeouts, no background tasks, plain HTTP on `port`.
pub fn test_config(data_dir: &Path, port: Option<u16>) -> FleetConfig {
    let mut config = FleetConfig::new(data_dir);
    config.connect_timeout = Duration::from_secs(2);
    config.check_timeout = Duration::from_millis(200);
    config.health_interval = Duration::ZERO;
    config.connection_watch_interval = Duration::ZERO;
    config.hub_capacity = 1024;
    config.networks = vec![HomeNetwork {
        ssid: NETWORK.into(),
        password: SecretString::from("studio-pass".to_string()),
    }];
    config.active_network = Some(NETWORK.into());
    config.cohn.scheme = "http".into();
    config.cohn.port = port;
    config.cohn.poll_attempts = 3;
    config.cohn.poll_interval = Duration::from_millis(10);
    config.cohn.probe_timeout = Duration::from_secs(2);
    config.download.ap_settle = Duration::ZERO;
    config.retry.initial_delay = Duration::from_millis(5);
    config.retry.max_delay = Duration::from_millis(20);
    config
}

pub async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), None);
    open(config, dir).await
}

/// Home-network and access-point traffic both land on `server`.
pub async fn harness_with_server(server: &MockServer) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), Some(server.address().port()));
    config.download.ap_url = server.uri();
    open(config, dir).await
}

pub async fn open(config: FleetConfig, dir: TempDir) -> Harness {
    let sdk = Arc::new(FakeSdk::default());
    let radio = Arc::new(FakeRadio::on(NETWORK));
    let arp = Arc::new(FakeAddressTable::default());
    let fleet = Fleet::open(
        config,
        Collaborators {
            sdk: sdk.clone(),
            radio: radio.clone(),
            address_table: arp.clone(),
        },
    )
    .await
    .unwrap();
    Harness {
        fleet,
        sdk,
        radio,
        arp,
        dir,
    }
}

impl Harness {
    pub async fn add_camera(&self, serial: &str) -> Serial {
        self.fleet
            .execute(Command::AddCamera {
                serial: serial.into(),
                name: format!("Cam {serial}"),
                address: None,
                wifi_ssid: None,
                wifi_password: None,
            })
            .await
            .unwrap();
        Serial::from(serial)
    }

    pub async fn add_connected(&self, serial: &str) -> Serial {
        let serial = self.add_camera(serial).await;
        let result = self.fleet.connections().connect(&serial).await.unwrap();
        assert!(result.is_complete_success());
        serial
    }

    /// Store a home-network credential and probe it once.
    pub async fn put_credential(&self, serial: &Serial, credential: CohnCredential) {
        self.fleet
            .credentials()
            .put(NETWORK, serial, credential)
            .await
            .unwrap();
        self.fleet.cohn().sync_state(serial).await.unwrap();
    }
}

pub fn credential(ip: &str, username: &str, password: &str) -> CohnCredential {
    CohnCredential {
        ip_address: ip.parse().unwrap(),
        username: username.into(),
        password: password.into(),
        certificate: String::new(),
        mac_address: None,
        provisioned_at: Utc::now(),
    }
}

pub fn localhost() -> IpAddr {
    "127.0.0.1".parse().unwrap()
}
