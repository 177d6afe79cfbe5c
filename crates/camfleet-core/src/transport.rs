// ── Transport selection ──
//
// The one place that decides how a camera is reached. Every component
// that talks to a camera asks here instead of branching on flags itself.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CoreError;
use crate::model::{Camera, CohnState};

/// The route a camera operation travels over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "kebab-case")]
pub enum TransportKind {
    /// Short-range (BLE) link via the camera SDK.
    ShortRange,
    /// Provisioned home-network HTTPS interface (COHN).
    HomeNetwork,
    /// The camera's own access point, joined with the controller's radio.
    DeviceAp,
}

/// What the caller wants to do with the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Commands and small reads: shutter, settings, status.
    Control,
    /// Media listing and file transfer.
    Media,
}

/// Caller's route preference.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Preference {
    #[default]
    Auto,
    ShortRange,
    HomeNetwork,
}

/// Pick the route for `purpose`.
///
/// Control prefers the short-range link and falls back to the home
/// network. Media prefers the home network and falls back to the device
/// access point, which needs a live short-range link to switch it on.
pub fn select_transport(
    camera: &Camera,
    purpose: Purpose,
    preference: Preference,
) -> Result<TransportKind, CoreError> {
    match (purpose, preference) {
        (_, Preference::ShortRange) => {
            if camera.connected {
                Ok(TransportKind::ShortRange)
            } else {
                Err(unavailable(camera, TransportKind::ShortRange, "not connected"))
            }
        }
        (_, Preference::HomeNetwork) => home_network(camera),
        (Purpose::Control, Preference::Auto) => {
            if camera.connected {
                Ok(TransportKind::ShortRange)
            } else if camera.cohn_online() {
                Ok(TransportKind::HomeNetwork)
            } else {
                Err(unavailable(
                    camera,
                    TransportKind::ShortRange,
                    "not connected and home network offline",
                ))
            }
        }
        (Purpose::Media, Preference::Auto) => {
            if camera.cohn_online() {
                Ok(TransportKind::HomeNetwork)
            } else if camera.connected && camera.has_access_point() {
                Ok(TransportKind::DeviceAp)
            } else if camera.connected {
                Err(unavailable(
                    camera,
                    TransportKind::DeviceAp,
                    "access point login unknown",
                ))
            } else {
                Err(unavailable(
                    camera,
                    TransportKind::HomeNetwork,
                    "home network offline and no short-range link to enable the access point",
                ))
            }
        }
    }
}

fn home_network(camera: &Camera) -> Result<TransportKind, CoreError> {
    match camera.cohn_state {
        CohnState::Online => Ok(TransportKind::HomeNetwork),
        CohnState::Unprovisioned => Err(CoreError::NotProvisioned {
            serial: camera.serial.to_string(),
            network: "active".into(),
        }),
        CohnState::Provisioning => Err(CoreError::conflict(format!(
            "camera {} is being provisioned",
            camera.serial
        ))),
        CohnState::Offline => Err(unavailable(camera, TransportKind::HomeNetwork, "offline")),
    }
}

fn unavailable(camera: &Camera, transport: TransportKind, reason: &str) -> CoreError {
    CoreError::TransportUnavailable {
        serial: camera.serial.to_string(),
        transport: transport.to_string(),
        reason: reason.to_owned(),
    }
}
