// ── Camera domain types ──

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::Serial;

/// Home-network (COHN) state of a camera for the active network profile.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CohnState {
    #[default]
    Unprovisioned,
    Provisioning,
    Online,
    Offline,
}

/// A registered camera.
///
/// Identity and access-point fields are persisted. Everything else is
/// runtime state, reset on load and written only through
/// `CameraRegistry::update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camera {
    pub serial: Serial,
    pub name: String,
    /// Short-range radio address recorded at discovery.
    pub address: Option<String>,
    /// SSID of the camera-hosted access point.
    pub wifi_ssid: Option<String>,
    pub wifi_password: Option<String>,

    pub connected: bool,
    pub recording: bool,
    pub battery_level: Option<u8>,
    pub storage_remaining_kb: Option<u64>,
    pub cohn_state: CohnState,
    pub cohn_ip: Option<IpAddr>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Camera {
    pub fn new(serial: Serial, name: impl Into<String>) -> Self {
        Self {
            serial,
            name: name.into(),
            address: None,
            wifi_ssid: None,
            wifi_password: None,
            connected: false,
            recording: false,
            battery_level: None,
            storage_remaining_kb: None,
            cohn_state: CohnState::Unprovisioned,
            cohn_ip: None,
            last_seen: None,
        }
    }

    pub fn cohn_online(&self) -> bool {
        self.cohn_state == CohnState::Online
    }

    /// Both halves of the access-point login are known.
    pub fn has_access_point(&self) -> bool {
        self.wifi_ssid.as_deref().is_some_and(|s| !s.is_empty())
            && self.wifi_password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Any control route is live.
    pub fn reachable(&self) -> bool {
        self.connected || self.cohn_online()
    }

    pub(crate) fn touch(&mut self) {
        self.last_seen = Some(Utc::now());
    }
}

// ── Persisted shape ─────────────────────────────────────────────────

/// On-disk camera record, `cameras.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCamera {
    pub serial: Serial,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_ssid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCameras {
    #[serde(default)]
    pub cameras: Vec<SavedCamera>,
}

impl From<SavedCamera> for Camera {
    fn from(saved: SavedCamera) -> Self {
        Self {
            address: saved.address,
            wifi_ssid: saved.wifi_ssid,
            wifi_password: saved.wifi_password,
            ..Camera::new(saved.serial, saved.name)
        }
    }
}

impl From<&Camera> for SavedCamera {
    fn from(camera: &Camera) -> Self {
        Self {
            serial: camera.serial.clone(),
            name: camera.name.clone(),
            address: camera.address.clone(),
            wifi_ssid: camera.wifi_ssid.clone(),
            wifi_password: camera.wifi_password.clone(),
        }
    }
}

/// A nearby camera seen by a scan but not yet registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredCamera {
    pub serial: Serial,
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
}

/// Battery and storage as last read from a camera.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraHealth {
    pub battery_level: Option<u8>,
    pub storage_remaining_kb: Option<u64>,
    pub connected: bool,
    pub cohn_state: CohnState,
}
