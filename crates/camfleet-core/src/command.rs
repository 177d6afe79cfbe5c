// ── Command API ──
//
// Every state-changing fleet operation flows through one `Command` enum.
// `Fleet::execute` routes each variant to the component that owns it and
// then broadcasts a fresh `fleet_status` snapshot.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    Camera, CohnStatus, DownloadReport, FleetResult, MediaSelection, NetworkProfile, Preset,
    PresetSettings, Serial, Shoot, ShootDownloadReport, Take, TakeFile,
};
use crate::transport::{Preference, TransportKind};

/// All write operations against the fleet.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Cameras ──────────────────────────────────────────────────────
    AddCamera {
        serial: Serial,
        name: String,
        address: Option<String>,
        wifi_ssid: Option<String>,
        wifi_password: Option<String>,
    },
    RemoveCamera { serial: Serial },
    RenameCamera { serial: Serial, name: String },
    SetAccessPoint {
        serial: Serial,
        ssid: Option<String>,
        password: Option<String>,
    },
    /// `None` targets every registered camera.
    Connect { serial: Option<Serial> },
    Disconnect { serial: Option<Serial> },
    CheckConnections,

    // ── Recording ────────────────────────────────────────────────────
    StartRecording { via: Preference },
    StopRecording { via: Preference },

    // ── Shoots / takes ───────────────────────────────────────────────
    CreateShoot { name: String },
    ActivateShoot { id: Uuid },
    DeactivateShoot,
    DeleteShoot { id: Uuid },
    CreateTake {
        shoot_id: Uuid,
        name: Option<String>,
        files: Vec<TakeFile>,
    },
    UpdateTake {
        shoot_id: Uuid,
        take: u32,
        name: Option<String>,
        files: Option<Vec<TakeFile>>,
    },
    DeleteTake { shoot_id: Uuid, take: u32 },

    // ── Home network (COHN) ──────────────────────────────────────────
    Provision { serial: Serial },
    RemoveProvisioning { serial: Serial },
    /// `None` re-enables every offline camera.
    Reenable { serial: Option<Serial> },
    SetCohnIp { serial: Serial, ip: IpAddr },
    SwitchNetwork { ssid: String },

    // ── Downloads ────────────────────────────────────────────────────
    /// `None` targets every registered camera.
    Download {
        serials: Option<Vec<Serial>>,
        selection: MediaSelection,
    },
    DownloadShoot { shoot_id: Uuid },
    EraseSd { serial: Serial },

    // ── Presets ──────────────────────────────────────────────────────
    CreatePreset { name: String, settings: PresetSettings },
    UpdatePreset { name: String, settings: PresetSettings },
    DeletePreset { name: String },
    TogglePresetPin { name: String },
    CapturePreset {
        serial: Serial,
        name: String,
        via: Preference,
    },
    /// `None` targets every registered camera.
    ApplyPreset {
        name: String,
        serials: Option<Vec<Serial>>,
        via: Preference,
    },
}

impl Command {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddCamera { .. } => "add_camera",
            Self::RemoveCamera { .. } => "remove_camera",
            Self::RenameCamera { .. } => "rename_camera",
            Self::SetAccessPoint { .. } => "set_access_point",
            Self::Connect { .. } => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::CheckConnections => "check_connections",
            Self::StartRecording { .. } => "start_recording",
            Self::StopRecording { .. } => "stop_recording",
            Self::CreateShoot { .. } => "create_shoot",
            Self::ActivateShoot { .. } => "activate_shoot",
            Self::DeactivateShoot => "deactivate_shoot",
            Self::DeleteShoot { .. } => "delete_shoot",
            Self::CreateTake { .. } => "create_take",
            Self::UpdateTake { .. } => "update_take",
            Self::DeleteTake { .. } => "delete_take",
            Self::Provision { .. } => "provision",
            Self::RemoveProvisioning { .. } => "remove_provisioning",
            Self::Reenable { .. } => "reenable",
            Self::SetCohnIp { .. } => "set_cohn_ip",
            Self::SwitchNetwork { .. } => "switch_network",
            Self::Download { .. } => "download",
            Self::DownloadShoot { .. } => "download_shoot",
            Self::EraseSd { .. } => "erase_sd",
            Self::CreatePreset { .. } => "create_preset",
            Self::UpdatePreset { .. } => "update_preset",
            Self::DeletePreset { .. } => "delete_preset",
            Self::TogglePresetPin { .. } => "toggle_preset_pin",
            Self::CapturePreset { .. } => "capture_preset",
            Self::ApplyPreset { .. } => "apply_preset",
        }
    }
}

/// Outcome of a start or stop recording command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingOutcome {
    /// The take opened or closed, if a shoot was active.
    pub take: Option<Take>,
    /// Route each camera's shutter command took.
    pub cameras: FleetResult<TransportKind>,
}

/// Result of a command execution.
#[derive(Debug)]
pub enum CommandResult {
    Ok,
    Camera(Camera),
    Connections(FleetResult<()>),
    ConnectionCheck(FleetResult<bool>),
    Recording(RecordingOutcome),
    Shoot(Shoot),
    /// Deactivating with nothing active yields `None`.
    Deactivated(Option<Shoot>),
    Take(Take),
    Cohn(CohnStatus),
    CohnFleet(FleetResult<CohnStatus>),
    Networks(Vec<NetworkProfile>),
    Download(DownloadReport),
    ShootDownload(ShootDownloadReport),
    Erased(TransportKind),
    Preset(Preset),
    PresetApplied(FleetResult<usize>),
}
