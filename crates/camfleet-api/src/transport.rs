// Shared transport configuration for building reqwest::Client instances.
//
// Home-network and device-AP clients share TLS and timeout settings
// through this module, avoiding duplicated builder logic.

use std::time::Duration;

/// TLS verification mode for camera HTTPS endpoints.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Trust exactly this PEM root (the certificate the camera generated
    /// during provisioning).
    PinnedPem(String),
    /// Accept any certificate. Cameras present self-signed certs that are
    /// not bound to a hostname, so this is the working default.
    #[default]
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Whole-request timeout. Media transfers use a separate, longer one.
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl TransportConfig {
    /// Same settings with a different whole-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Same settings trusting `pem` as the only root, when the mode is not
    /// already "accept anything".
    pub fn with_pinned_certificate(mut self, pem: &str) -> Self {
        if !matches!(self.tls, TlsMode::DangerAcceptInvalid) && !pem.trim().is_empty() {
            self.tls = TlsMode::PinnedPem(pem.to_owned());
        }
        self
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(concat!("camfleet/", env!("CARGO_PKG_VERSION")));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::PinnedPem(pem) => {
                let cert = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(|e| {
                    crate::error::Error::Tls(format!("invalid camera certificate: {e}"))
                })?;
                builder = builder
                    .tls_built_in_root_certs(false)
                    .add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| crate::error::Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pinning_is_ignored_in_accept_invalid_mode() {
        let cfg = TransportConfig::default().with_pinned_certificate("-----BEGIN CERTIFICATE-----");
        assert!(matches!(cfg.tls, TlsMode::DangerAcceptInvalid));
    }

    #[test]
    fn pinning_replaces_system_roots() {
        let cfg = TransportConfig {
            tls: TlsMode::System,
            ..TransportConfig::default()
        }
        .with_pinned_certificate("PEM");
        assert!(matches!(cfg.tls, TlsMode::PinnedPem(ref p) if p == "PEM"));
    }

    #[test]
    fn default_client_builds() {
        assert!(TransportConfig::default().build_client().is_ok());
    }
}
