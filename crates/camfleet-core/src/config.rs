// ── Runtime configuration ──
//
// Resolved settings handed to `Fleet::open`. Loading from files and the
// environment happens in camfleet-config; this crate only consumes the
// result.

use std::path::PathBuf;
use std::time::Duration;

use camfleet_api::{DEVICE_AP_URL, TransportConfig};
use secrecy::SecretString;

use crate::retry::RetryConfig;

/// A home network cameras can be provisioned onto.
#[derive(Debug, Clone)]
pub struct HomeNetwork {
    pub ssid: String,
    pub password: SecretString,
}

/// Home-network provisioning and probing.
#[derive(Debug, Clone)]
pub struct CohnSettings {
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    /// Ceiling on one whole provisioning run.
    pub provision_timeout: Duration,
    pub probe_timeout: Duration,
    /// Used when the camera does not report a username.
    pub default_username: String,
    pub scheme: String,
    /// Only for cameras fronted by a non-default port.
    pub port: Option<u16>,
    pub tls: TransportConfig,
}

impl Default for CohnSettings {
    fn default() -> Self {
        Self {
            poll_attempts: 30,
            poll_interval: Duration::from_secs(3),
            provision_timeout: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(5),
            default_username: "gopro".into(),
            scheme: "https".into(),
            port: None,
            tls: TransportConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub download_dir: PathBuf,
    /// Wait after switching a camera's access point on.
    pub ap_settle: Duration,
    pub ap_url: String,
    /// Per-request timeout for one file transfer.
    pub media_timeout: Duration,
    /// Slack around a take's start/stop when matching files to it.
    pub match_tolerance: Duration,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            ap_settle: Duration::from_secs(20),
            ap_url: DEVICE_AP_URL.to_owned(),
            media_timeout: Duration::from_secs(30 * 60),
            match_tolerance: Duration::from_secs(60),
        }
    }
}

/// Everything the fleet needs to start.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Directory holding the four JSON stores.
    pub data_dir: PathBuf,
    pub connect_timeout: Duration,
    pub check_timeout: Duration,
    pub discover_timeout: Duration,
    pub health_interval: Duration,
    pub connection_watch_interval: Duration,
    pub networks: Vec<HomeNetwork>,
    /// Overrides the persisted active network at startup.
    pub active_network: Option<String>,
    pub cohn: CohnSettings,
    pub download: DownloadSettings,
    /// Backoff for transient connect, control and media-listing failures.
    pub retry: RetryConfig,
    /// Backlog per channel subscriber before it is dropped.
    pub hub_capacity: usize,
}

impl FleetConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            download: DownloadSettings {
                download_dir: data_dir.join("downloads"),
                ..DownloadSettings::default()
            },
            data_dir,
            connect_timeout: Duration::from_secs(20),
            check_timeout: Duration::from_secs(1),
            discover_timeout: Duration::from_secs(10),
            health_interval: Duration::from_secs(5),
            connection_watch_interval: Duration::from_secs(2),
            networks: Vec::new(),
            active_network: None,
            cohn: CohnSettings::default(),
            retry: RetryConfig::default(),
            hub_capacity: 64,
        }
    }

    pub fn cameras_path(&self) -> PathBuf {
        self.store_path("cameras.json")
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.store_path("cohn_credentials.json")
    }

    pub fn shoots_path(&self) -> PathBuf {
        self.store_path("shoots.json")
    }

    pub fn presets_path(&self) -> PathBuf {
        self.store_path("presets.json")
    }

    fn store_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }
}
