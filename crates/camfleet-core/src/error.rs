// ── Core error types ──
//
// Fleet-level errors from camfleet-core. Consumers never see HTTP status
// codes or SDK reply bodies directly. The `From<camfleet_api::Error>`
// impl translates transport-layer errors into the fleet taxonomy.

use thiserror::Error;

use crate::model::{DeviceFailure, FailureKind};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Fleet taxonomy ───────────────────────────────────────────────
    /// Device unreachable over the attempted transport.
    #[error("Camera {serial} unreachable over {transport}: {reason}")]
    TransportUnavailable {
        serial: String,
        transport: String,
        reason: String,
    },

    /// Home-network operation on a camera with no credential for the
    /// active network profile.
    #[error("Camera {serial} is not provisioned for network '{network}'")]
    NotProvisioned { serial: String, network: String },

    /// Raised only when a caller asks for strict fleet semantics.
    #[error("{failed} of {total} cameras failed ({succeeded} succeeded)")]
    PartialFleetFailure {
        succeeded: usize,
        failed: usize,
        total: usize,
    },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Stored home-network address stopped answering.
    #[error("Camera {serial} no longer answers at {ip}")]
    StaleAddress { serial: String, ip: String },

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Camera not found: {serial}")]
    CameraNotFound { serial: String },

    #[error("Camera already registered: {serial}")]
    CameraExists { serial: String },

    #[error("Shoot not found: {id}")]
    ShootNotFound { id: String },

    #[error("Take {take} not found in shoot {shoot}")]
    TakeNotFound { shoot: String, take: u32 },

    #[error("Preset not found: {name}")]
    PresetNotFound { name: String },

    #[error("Preset already exists: {name}")]
    PresetExists { name: String },

    // ── Operation errors ─────────────────────────────────────────────
    /// Host-side short-range adapter missing. Fatal for fleet-wide calls.
    #[error("Short-range adapter unavailable: {reason}")]
    AdapterUnavailable { reason: String },

    #[error("Provisioning camera {serial} failed: {reason}")]
    ProvisioningFailed { serial: String, reason: String },

    #[error("No active home network selected")]
    NoActiveNetwork,

    #[error("Invalid value for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// A serialized store write failed. The in-memory state was left
    /// untouched; the caller may retry.
    #[error("Store write failed for {path}: {reason}")]
    Store { path: String, reason: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Camera API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an API error raised while talking to `serial` over `transport`,
    /// keeping unreachability distinct from device-side rejections.
    pub(crate) fn from_device(
        serial: &impl std::fmt::Display,
        transport: impl std::fmt::Display,
        err: camfleet_api::Error,
    ) -> Self {
        match err {
            camfleet_api::Error::AdapterUnavailable(reason) => Self::AdapterUnavailable { reason },
            e if e.is_unreachable() => Self::TransportUnavailable {
                serial: serial.to_string(),
                transport: transport.to_string(),
                reason: e.to_string(),
            },
            e => Self::from(e),
        }
    }

    /// Worth another try after a short wait. A stale address needs a new
    /// lookup first, so it does not count.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportUnavailable { .. } | Self::Timeout { .. })
    }

    /// Coarse classification used in per-device outcomes.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::TransportUnavailable { .. } | Self::StaleAddress { .. } => {
                FailureKind::TransportUnavailable
            }
            Self::NotProvisioned { .. } | Self::NoActiveNetwork => FailureKind::NotProvisioned,
            Self::Conflict { .. } => FailureKind::Conflict,
            Self::CameraNotFound { .. }
            | Self::ShootNotFound { .. }
            | Self::TakeNotFound { .. }
            | Self::PresetNotFound { .. } => FailureKind::NotFound,
            Self::Timeout { .. } => FailureKind::Timeout,
            _ => FailureKind::Device,
        }
    }
}

impl From<&CoreError> for DeviceFailure {
    fn from(err: &CoreError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for DeviceFailure {
    fn from(err: CoreError) -> Self {
        Self::from(&err)
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<camfleet_api::Error> for CoreError {
    fn from(err: camfleet_api::Error) -> Self {
        match err {
            camfleet_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::TransportUnavailable {
                        serial: String::new(),
                        transport: "http".into(),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            camfleet_api::Error::InvalidUrl(e) => CoreError::Validation {
                field: "url".into(),
                reason: e.to_string(),
            },
            camfleet_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            camfleet_api::Error::Tls(msg) => CoreError::TransportUnavailable {
                serial: String::new(),
                transport: "https".into(),
                reason: format!("TLS error: {msg}"),
            },
            camfleet_api::Error::Camera { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            camfleet_api::Error::ShortRange(reason) => CoreError::TransportUnavailable {
                serial: String::new(),
                transport: "short-range".into(),
                reason,
            },
            camfleet_api::Error::AdapterUnavailable(reason) => {
                CoreError::AdapterUnavailable { reason }
            }
            camfleet_api::Error::Radio(reason) => CoreError::TransportUnavailable {
                serial: String::new(),
                transport: "wifi radio".into(),
                reason,
            },
            camfleet_api::Error::AddressTable(reason) => CoreError::Internal(reason),
            camfleet_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            camfleet_api::Error::Io(e) => CoreError::Internal(format!("I/O error: {e}")),
        }
    }
}
