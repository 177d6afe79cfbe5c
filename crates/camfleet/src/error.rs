//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use camfleet_config::ConfigError;
use camfleet_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const TRANSPORT: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    /// Some cameras succeeded, some did not.
    pub const PARTIAL: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Reachability ─────────────────────────────────────────────────
    #[error("Camera {serial} unreachable over {transport}")]
    #[diagnostic(
        code(camfleet::transport_unavailable),
        help(
            "{reason}\n\
             Check the camera is powered on and in range, then run: camfleet cameras connect {serial}"
        )
    )]
    TransportUnavailable {
        serial: String,
        transport: String,
        reason: String,
    },

    #[error("Short-range adapter unavailable")]
    #[diagnostic(
        code(camfleet::adapter_unavailable),
        help(
            "{reason}\n\
             Check that the SDK bridge is running and that bridge_url in the config points at it."
        )
    )]
    AdapterUnavailable { reason: String },

    #[error("Camera {serial} is not provisioned for network '{network}'")]
    #[diagnostic(
        code(camfleet::not_provisioned),
        help("Run: camfleet network provision {serial}")
    )]
    NotProvisioned { serial: String, network: String },

    #[error("No active home network selected")]
    #[diagnostic(
        code(camfleet::no_active_network),
        help(
            "Add one with: camfleet config set-network <SSID> --activate\n\
             Or switch with: camfleet network switch <SSID>"
        )
    )]
    NoActiveNetwork,

    #[error("Provisioning camera {serial} failed: {reason}")]
    #[diagnostic(
        code(camfleet::provisioning_failed),
        help("Keep the camera connected and in range of the home network, then retry.")
    )]
    ProvisioningFailed { serial: String, reason: String },

    #[error("{failed} of {total} cameras failed")]
    #[diagnostic(
        code(camfleet::partial_failure),
        help("The per-camera results above show which cameras need attention.")
    )]
    Partial { failed: usize, total: usize },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(camfleet::not_found),
        help("Run: camfleet {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{resource_type} '{identifier}' already exists")]
    #[diagnostic(code(camfleet::exists))]
    Exists {
        resource_type: String,
        identifier: String,
    },

    #[error("{message}")]
    #[diagnostic(code(camfleet::conflict))]
    Conflict { message: String },

    // ── Camera / API ─────────────────────────────────────────────────
    #[error("Camera API error: {message}")]
    #[diagnostic(code(camfleet::api_error))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(camfleet::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No password available for network '{ssid}'")]
    #[diagnostic(
        code(camfleet::no_password),
        help(
            "Store one with: camfleet config set-network {ssid}\n\
             Or point password_env at an environment variable that holds it."
        )
    )]
    NoPassword { ssid: String },

    #[error(transparent)]
    #[diagnostic(code(camfleet::config))]
    Config(ConfigError),

    #[error("Store at {path} could not be written")]
    #[diagnostic(code(camfleet::store), help("{reason}"))]
    Store { path: String, reason: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(camfleet::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Operation timed out after {seconds}s")]
    #[diagnostic(
        code(camfleet::timeout),
        help("Raise the matching value under [timeouts] in the config file.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(camfleet::render))]
    Render(String),

    #[error("{0}")]
    #[diagnostic(code(camfleet::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::TransportUnavailable { .. } | Self::AdapterUnavailable { .. } => {
                exit_code::TRANSPORT
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Exists { .. } | Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Partial { .. } => exit_code::PARTIAL,
            Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::NoActiveNetwork
            | Self::NotProvisioned { .. }
            | Self::NoPassword { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TransportUnavailable {
                serial,
                transport,
                reason,
            } => Self::TransportUnavailable {
                serial,
                transport,
                reason,
            },
            CoreError::StaleAddress { serial, ip } => Self::TransportUnavailable {
                transport: "home-network".into(),
                reason: format!("no answer at {ip}; run: camfleet network reenable {serial}"),
                serial,
            },
            CoreError::AdapterUnavailable { reason } => Self::AdapterUnavailable { reason },
            CoreError::NotProvisioned { serial, network } => {
                Self::NotProvisioned { serial, network }
            }
            CoreError::NoActiveNetwork => Self::NoActiveNetwork,
            CoreError::ProvisioningFailed { serial, reason } => {
                Self::ProvisioningFailed { serial, reason }
            }
            CoreError::PartialFleetFailure { failed, total, .. } => Self::Partial { failed, total },
            CoreError::Conflict { message } => Self::Conflict { message },
            CoreError::CameraNotFound { serial } => Self::NotFound {
                resource_type: "camera".into(),
                identifier: serial,
                list_command: "cameras list".into(),
            },
            CoreError::CameraExists { serial } => Self::Exists {
                resource_type: "camera".into(),
                identifier: serial,
            },
            CoreError::ShootNotFound { id } => Self::NotFound {
                resource_type: "shoot".into(),
                identifier: id,
                list_command: "shoots list".into(),
            },
            CoreError::TakeNotFound { shoot, take } => Self::NotFound {
                resource_type: "take".into(),
                identifier: take.to_string(),
                list_command: format!("takes list {shoot}"),
            },
            CoreError::PresetNotFound { name } => Self::NotFound {
                resource_type: "preset".into(),
                identifier: name,
                list_command: "presets list".into(),
            },
            CoreError::PresetExists { name } => Self::Exists {
                resource_type: "preset".into(),
                identifier: name,
            },
            CoreError::Validation { field, reason } => Self::Validation { field, reason },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Store { path, reason } => Self::Store { path, reason },
            CoreError::Api { message, status } => Self::Api {
                message: match status {
                    Some(code) => format!("{message} (HTTP {code})"),
                    None => message,
                },
            },
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoPassword { ssid } => Self::NoPassword { ssid },
            other => Self::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_map_to_not_found() {
        let err = CliError::from(CoreError::PresetNotFound {
            name: "Night".into(),
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert!(err.to_string().contains("Night"));
    }

    #[test]
    fn unreachable_cameras_get_the_transport_code() {
        let err = CliError::from(CoreError::StaleAddress {
            serial: "0001".into(),
            ip: "10.0.0.9".into(),
        });
        assert_eq!(err.exit_code(), exit_code::TRANSPORT);
    }

    #[test]
    fn partial_failure_has_its_own_code() {
        let err = CliError::from(CoreError::PartialFleetFailure {
            succeeded: 1,
            failed: 2,
            total: 3,
        });
        assert_eq!(err.exit_code(), exit_code::PARTIAL);
        assert_eq!(err.to_string(), "2 of 3 cameras failed");
    }

    #[test]
    fn missing_password_is_a_usage_error() {
        let err = CliError::from(ConfigError::NoPassword {
            ssid: "Studio".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
