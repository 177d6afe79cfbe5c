// ── Short-range SDK seam ──
//
// The vendor camera SDK owns the low-level wireless protocol. The fleet
// core only talks to it through this trait, addressed by camera serial.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::Error;
use crate::models::{Advertisement, HomeNetworkStatus, ShortRangeStatus};

/// How to reach one camera over the short-range link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub serial: String,
    /// Last known radio address, if one was recorded at discovery.
    pub address: Option<String>,
}

/// Control surface of the short-range (BLE) transport.
///
/// Implementations must be safe to call concurrently for different
/// serials; calls for the same serial may be serialized internally.
#[async_trait]
pub trait ShortRangeSdk: Send + Sync {
    /// Scan for advertising cameras for at most `timeout`.
    async fn scan(&self, timeout: Duration) -> Result<Vec<Advertisement>, Error>;

    /// Open a link. Must return promptly with an error if the host adapter
    /// is missing ([`Error::AdapterUnavailable`]).
    async fn connect(&self, target: &DeviceTarget) -> Result<(), Error>;

    async fn disconnect(&self, serial: &str) -> Result<(), Error>;

    /// Whether the SDK currently holds an open link.
    async fn is_connected(&self, serial: &str) -> bool;

    async fn status(&self, serial: &str) -> Result<ShortRangeStatus, Error>;

    async fn set_shutter(&self, serial: &str, recording: bool) -> Result<(), Error>;

    async fn settings(&self, serial: &str) -> Result<HashMap<u32, u32>, Error>;

    async fn set_setting(&self, serial: &str, setting: u32, option: u32) -> Result<(), Error>;

    /// Toggle the camera-hosted access point.
    async fn set_access_point(&self, serial: &str, enabled: bool) -> Result<(), Error>;

    /// Ask the camera to join a home network. Returns once the request is
    /// accepted; completion is observed through [`Self::home_network_status`].
    async fn join_home_network(
        &self,
        serial: &str,
        ssid: &str,
        password: &SecretString,
    ) -> Result<(), Error>;

    async fn home_network_status(&self, serial: &str) -> Result<HomeNetworkStatus, Error>;

    /// Have the camera generate a fresh home-network certificate and
    /// return it as PEM.
    async fn create_home_network_certificate(&self, serial: &str) -> Result<String, Error>;
}
