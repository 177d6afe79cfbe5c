// ── Domain model ──
//
// Plain data types shared by every component. Persisted shapes live next
// to the runtime types they are derived from.

pub mod camera;
pub mod download;
pub mod fleet;
pub mod ids;
pub mod network;
pub mod preset;
pub mod shoot;

pub use camera::{Camera, CameraHealth, CohnState, DiscoveredCamera, SavedCamera, SavedCameras};
pub use download::{
    CameraDownload, DownloadReport, FileOutcome, FileStatus, LocalFile, MediaSelection,
    ShootDownloadReport, TakeDownload,
};
pub use fleet::{DeviceFailure, FailureKind, FleetResult};
pub use ids::{MacAddress, Serial};
pub use network::{CohnCredential, CohnStatus, CredentialBook, NetworkProfile};
pub use preset::{Preset, PresetSettings, SettingKind, settings_from_ids};
pub use shoot::{SessionState, Shoot, ShootBook, Take, TakeFile};
