use thiserror::Error;

/// Top-level error type for the `camfleet-api` crate.
///
/// Covers every failure mode across the three camera transports and the
/// host-side collaborators (WiFi radio, address table).
/// `camfleet-core` maps these into its fleet error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Camera HTTP API ─────────────────────────────────────────────
    /// The camera answered with a non-success HTTP status.
    #[error("Camera rejected request (HTTP {status}): {message}")]
    Camera { status: u16, message: String },

    // ── Short-range SDK ─────────────────────────────────────────────
    /// The short-range SDK reported a per-device failure.
    #[error("Short-range transport error: {0}")]
    ShortRange(String),

    /// No usable Bluetooth adapter on this host. Fatal for fleet-wide calls.
    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    // ── Host collaborators ──────────────────────────────────────────
    /// Joining or leaving a WiFi network failed.
    #[error("WiFi radio error: {0}")]
    Radio(String),

    /// The neighbour/ARP table could not be read.
    #[error("Address table lookup failed: {0}")]
    AddressTable(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Local filesystem error while writing media.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Camera { status, .. } => *status == 503,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Camera { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the device could not be reached at all, as
    /// opposed to answering with an error.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Timeout { .. } | Self::Tls(_) | Self::ShortRange(_) => true,
            _ => false,
        }
    }
}
