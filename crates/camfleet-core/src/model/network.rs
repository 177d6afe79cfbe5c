// ── Home-network profile types ──

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CohnState, MacAddress, Serial};

/// Credential a camera issued for one home network.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohnCredential {
    pub ip_address: IpAddr,
    pub username: String,
    pub password: String,
    /// PEM root the camera generated for its HTTPS interface.
    pub certificate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<MacAddress>,
    pub provisioned_at: DateTime<Utc>,
}

impl CohnCredential {
    pub fn with_ip(&self, ip: IpAddr) -> Self {
        Self {
            ip_address: ip,
            ..self.clone()
        }
    }
}

impl fmt::Debug for CohnCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CohnCredential")
            .field("ip_address", &self.ip_address)
            .field("username", &self.username)
            .field("password", &"****")
            .field("mac_address", &self.mac_address)
            .field("provisioned_at", &self.provisioned_at)
            .finish_non_exhaustive()
    }
}

/// Persisted credential map, `cohn_credentials.json`.
///
/// A camera may hold credentials for several networks; only the active
/// profile's credential is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBook {
    #[serde(default)]
    pub active_network: Option<String>,
    #[serde(default)]
    pub networks: BTreeMap<String, BTreeMap<Serial, CohnCredential>>,
}

/// One network profile as listed to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub ssid: String,
    pub cameras: Vec<Serial>,
    pub active: bool,
    /// A password is configured, so cameras can be provisioned onto it.
    pub joinable: bool,
}

/// Result of a provisioning run or reachability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohnStatus {
    pub state: CohnState,
    pub ip: Option<IpAddr>,
    pub network: Option<String>,
    /// Previous address when the camera was found at a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered_from: Option<IpAddr>,
}

impl CohnStatus {
    pub fn unprovisioned(network: Option<String>) -> Self {
        Self {
            state: CohnState::Unprovisioned,
            ip: None,
            network,
            recovered_from: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn debug_redacts_password() {
        let cred = CohnCredential {
            ip_address: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40)),
            username: "gopro".into(),
            password: "hunter2".into(),
            certificate: String::new(),
            mac_address: None,
            provisioned_at: Utc::now(),
        };
        let shown = format!("{cred:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("192.168.1.40"));
    }
}
