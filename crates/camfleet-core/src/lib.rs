//! Fleet orchestration core for action cameras.
//!
//! This crate owns the business logic and persisted state for a small
//! fleet of cameras reached over three interchangeable transports:
//!
//! - **[`Fleet`]** is the facade. [`Fleet::open`] loads the four JSON
//!   stores and wires the components; [`Fleet::start`] spawns the health
//!   poll and connection watcher; [`Fleet::execute`] routes every
//!   [`Command`] and broadcasts a fresh status snapshot afterwards.
//!
//! - **[`CameraRegistry`]** holds camera records in a reactive
//!   `DashMap`-backed collection. Runtime fields change only through a
//!   per-record read-modify-write, so concurrent fleet tasks never lose
//!   updates. [`SnapshotStream`] hands out sorted snapshots.
//!
//! - **[`ConnectionManager`]**, **[`NetworkTransportManager`]** and
//!   **[`DownloadOrchestrator`]** own the short-range link, home-network
//!   provisioning and media transfer. All of them ask
//!   [`select_transport`] which route to take.
//!
//! - **[`ShootSessionManager`]** tracks shoots and numbered takes;
//!   **[`PresetManager`]** keeps named setting bundles.
//!
//! - **[`BroadcastHub`]** fans `{type, payload}` messages out to realtime
//!   subscribers; **[`HealthMonitor`]** feeds it on every poll tick.
//!
//! Fleet-wide operations answer with a [`FleetResult`] holding one
//! outcome per targeted camera. Partial failure is the normal shape.

pub mod cohn;
pub mod command;
pub mod config;
pub mod connection;
pub mod control;
pub mod download;
pub mod error;
mod fanout;
pub mod fleet;
pub mod health;
pub mod hub;
pub mod model;
pub mod preset;
mod retry;
pub mod shoot;
pub mod store;
pub mod stream;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cohn::NetworkTransportManager;
pub use command::{Command, CommandResult, RecordingOutcome};
pub use config::{CohnSettings, DownloadSettings, FleetConfig, HomeNetwork};
pub use connection::{ConnectionManager, parse_advertised_serial};
pub use control::CameraControl;
pub use download::{DownloadOrchestrator, sanitize_name};
pub use error::CoreError;
pub use fleet::{Collaborators, Fleet};
pub use health::HealthMonitor;
pub use hub::{
    BroadcastHub, DownloadProgress, FleetSnapshot, HubMessage, HubSink, RecordingEvent,
    SinkClosed, SubscriberId,
};
pub use preset::PresetManager;
pub use retry::RetryConfig;
pub use shoot::ShootSessionManager;
pub use store::{CameraRegistry, CredentialStore};
pub use stream::{SnapshotStream, SnapshotWatchStream};
pub use transport::{Preference, Purpose, TransportKind, select_transport};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Camera, CameraDownload, CameraHealth, CohnCredential, CohnState, CohnStatus, DeviceFailure,
    DiscoveredCamera, DownloadReport, FailureKind, FileOutcome, FileStatus, FleetResult, LocalFile,
    MacAddress, MediaSelection, NetworkProfile, Preset, PresetSettings, Serial, SessionState,
    SettingKind, Shoot, ShootDownloadReport, Take, TakeDownload, TakeFile,
};
