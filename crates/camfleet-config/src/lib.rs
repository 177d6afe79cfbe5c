//! Configuration for the camfleet binary.
//!
//! One TOML file plus `CAMFLEET_` environment overrides, home-network
//! password resolution (env var, keyring, plaintext) and translation to
//! [`camfleet_core::FleetConfig`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camfleet_api::{TlsMode, TransportConfig};
use camfleet_core::{FleetConfig, HomeNetwork};
use directories::{ProjectDirs, UserDirs};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Keyring service name; entries are `network/<ssid>`.
pub const KEYRING_SERVICE: &str = "camfleet";

/// Points the loader at a different config file.
pub const CONFIG_ENV: &str = "CAMFLEET_CONFIG";

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for network '{ssid}'")]
    NoPassword { ssid: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Where the JSON stores live. Platform data dir when unset.
    pub data_dir: Option<PathBuf>,

    /// Download root. `~/Documents/GoPro Downloads` when unset.
    pub download_dir: Option<PathBuf>,

    /// Loopback daemon fronting the vendor short-range SDK.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// WiFi interface used to join camera access points.
    pub wifi_interface: Option<String>,

    /// Home network to use at startup, overriding the stored choice.
    pub active_network: Option<String>,

    #[serde(default)]
    pub tls: TlsSetting,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub timeouts: Timeouts,

    /// Home networks keyed by SSID.
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            download_dir: None,
            bridge_url: default_bridge_url(),
            wifi_interface: None,
            active_network: None,
            tls: TlsSetting::default(),
            defaults: Defaults::default(),
            timeouts: Timeouts::default(),
            networks: BTreeMap::new(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:8765/".into()
}

/// How home-network HTTPS certificates are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TlsSetting {
    /// Cameras present self-signed certificates bound to no hostname.
    #[default]
    AcceptInvalid,
    /// Trust the certificate each camera issued during provisioning.
    Pinned,
    System,
}

impl TlsSetting {
    /// `Pinned` starts from system roots; the per-camera PEM replaces them.
    pub fn mode(self) -> TlsMode {
        match self {
            Self::AcceptInvalid => TlsMode::DangerAcceptInvalid,
            Self::Pinned | Self::System => TlsMode::System,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// Every timeout and interval, in whole units named by the field.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Timeouts {
    pub connect_secs: u64,
    /// Quick link check before reconnecting.
    pub check_ms: u64,
    pub discover_secs: u64,
    pub probe_secs: u64,
    pub ap_settle_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_attempts: u32,
    /// Tries per connect, control or media-listing call.
    pub transport_attempts: u32,
    /// First backoff between those tries; doubles up to five seconds.
    pub retry_delay_ms: u64,
    pub provision_secs: u64,
    pub health_secs: u64,
    pub watch_secs: u64,
    /// One file transfer.
    pub media_secs: u64,
    /// One round-trip to the SDK bridge.
    pub bridge_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_secs: 20,
            check_ms: 1_000,
            discover_secs: 10,
            probe_secs: 5,
            ap_settle_secs: 20,
            poll_interval_secs: 3,
            poll_attempts: 30,
            transport_attempts: 3,
            retry_delay_ms: 500,
            provision_secs: 300,
            health_secs: 5,
            watch_secs: 2,
            media_secs: 30 * 60,
            bridge_secs: 30,
        }
    }
}

/// One home network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkEntry {
    /// Plaintext password. Prefer the keyring or `password_env`.
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "camfleet", "camfleet")
}

/// `$CAMFLEET_CONFIG`, else `config.toml` in the platform config dir.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    project_dirs().map_or_else(
        || home_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback().join("data"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn default_download_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(Path::to_path_buf))
        .map_or_else(
            || default_data_dir().join("downloads"),
            |docs| docs.join("GoPro Downloads"),
        )
}

fn home_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("camfleet");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

/// Defaults, then the file at `path`, then `CAMFLEET_` variables.
/// Nested keys use a double underscore: `CAMFLEET_TIMEOUTS__CONNECT_SECS`.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CAMFLEET_").ignore(&["config"]).split("__"))
}

pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    Ok(figment(path).extract()?)
}

// ── Saving ──────────────────────────────────────────────────────────

pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Secrets ─────────────────────────────────────────────────────────

fn keyring_entry(ssid: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(KEYRING_SERVICE, &format!("network/{ssid}"))?)
}

/// Store a network password in the system keyring.
pub fn store_network_password(ssid: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(ssid)?.set_password(password)?;
    Ok(())
}

/// Resolve a network password: `password_env`, then the keyring entry
/// `camfleet/network/<ssid>`, then the plaintext field.
pub fn resolve_network_password(
    ssid: &str,
    entry: &NetworkEntry,
) -> Result<SecretString, ConfigError> {
    if let Some(value) = entry
        .password_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
    {
        return Ok(SecretString::from(value));
    }

    if let Ok(secret) = keyring_entry(ssid).and_then(|e| Ok(e.get_password()?)) {
        return Ok(SecretString::from(secret));
    }

    if let Some(ref password) = entry.password {
        return Ok(SecretString::from(password.clone()));
    }

    Err(ConfigError::NoPassword { ssid: ssid.into() })
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(default_download_dir)
    }

    pub fn bridge_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.bridge_url).map_err(|e| ConfigError::Validation {
            field: "bridge_url".into(),
            reason: format!("{e}: {}", self.bridge_url),
        })
    }

    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.bridge_secs)
    }

    /// Copy with every plaintext password masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for entry in copy.networks.values_mut() {
            if entry.password.is_some() {
                entry.password = Some(REDACTED.into());
            }
        }
        copy
    }

    /// Resolve secrets and build the core's runtime configuration.
    pub fn to_fleet_config(&self) -> Result<FleetConfig, ConfigError> {
        if let Some(ref active) = self.active_network {
            if active.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: "active_network".into(),
                    reason: "must not be empty".into(),
                });
            }
        }
        if self.timeouts.poll_attempts == 0 {
            return Err(ConfigError::Validation {
                field: "timeouts.poll_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.timeouts.transport_attempts == 0 {
            return Err(ConfigError::Validation {
                field: "timeouts.transport_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }

        let networks = self
            .networks
            .iter()
            .map(|(ssid, entry)| {
                Ok(HomeNetwork {
                    ssid: ssid.clone(),
                    password: resolve_network_password(ssid, entry)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let t = &self.timeouts;
        let mut fleet = FleetConfig::new(self.data_dir());
        fleet.connect_timeout = Duration::from_secs(t.connect_secs);
        fleet.check_timeout = Duration::from_millis(t.check_ms);
        fleet.discover_timeout = Duration::from_secs(t.discover_secs);
        fleet.health_interval = Duration::from_secs(t.health_secs);
        fleet.connection_watch_interval = Duration::from_secs(t.watch_secs);
        fleet.networks = networks;
        fleet.active_network.clone_from(&self.active_network);
        fleet.retry.attempts = t.transport_attempts;
        fleet.retry.initial_delay = Duration::from_millis(t.retry_delay_ms);

        fleet.cohn.poll_attempts = t.poll_attempts;
        fleet.cohn.poll_interval = Duration::from_secs(t.poll_interval_secs);
        fleet.cohn.provision_timeout = Duration::from_secs(t.provision_secs);
        fleet.cohn.probe_timeout = Duration::from_secs(t.probe_secs);
        fleet.cohn.tls = TransportConfig {
            tls: self.tls.mode(),
            ..TransportConfig::default()
        };

        fleet.download.download_dir = self.download_dir();
        fleet.download.ap_settle = Duration::from_secs(t.ap_settle_secs);
        fleet.download.media_timeout = Duration::from_secs(t.media_secs);
        Ok(fleet)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(cfg.bridge_url, "http://127.0.0.1:8765/");
        assert_eq!(cfg.tls, TlsSetting::AcceptInvalid);
        assert_eq!(cfg.timeouts.poll_attempts, 30);
        assert!(cfg.networks.is_empty());
    }

    #[test]
    fn file_then_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                    data_dir = "/srv/camfleet"
                    active_network = "Studio"
                    tls = "pinned"

                    [timeouts]
                    connect_secs = 45

                    [networks.Studio]
                    password = "from-file"
                "#,
            )?;
            jail.set_env("CAMFLEET_TIMEOUTS__CONNECT_SECS", "7");
            jail.set_env("CAMFLEET_ACTIVE_NETWORK", "Cabin");

            let cfg = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(cfg.data_dir, Some(PathBuf::from("/srv/camfleet")));
            assert_eq!(cfg.timeouts.connect_secs, 7);
            assert_eq!(cfg.timeouts.probe_secs, 5);
            assert_eq!(cfg.active_network.as_deref(), Some("Cabin"));
            assert_eq!(cfg.tls, TlsSetting::Pinned);
            Ok(())
        });
    }

    #[test]
    fn password_env_wins_over_plaintext() {
        Jail::expect_with(|jail| {
            jail.set_env("STUDIO_WIFI", "from-env");
            let entry = NetworkEntry {
                password: Some("from-file".into()),
                password_env: Some("STUDIO_WIFI".into()),
            };
            let secret = resolve_network_password("Studio-test-env", &entry).unwrap();
            assert_eq!(secret.expose_secret(), "from-env");
            Ok(())
        });
    }

    #[test]
    fn missing_password_is_an_error() {
        let entry = NetworkEntry {
            password: None,
            password_env: Some("CAMFLEET_TEST_UNSET_VARIABLE".into()),
        };
        let err = resolve_network_password("camfleet-test-no-such-network", &entry);
        assert!(matches!(err, Err(ConfigError::NoPassword { .. })));
    }

    #[test]
    fn translates_to_fleet_config() {
        let mut cfg = Config {
            data_dir: Some("/data".into()),
            download_dir: Some("/media".into()),
            active_network: Some("Studio".into()),
            ..Config::default()
        };
        cfg.timeouts.check_ms = 250;
        cfg.timeouts.transport_attempts = 5;
        cfg.networks.insert(
            "Studio".into(),
            NetworkEntry {
                password: Some("pw".into()),
                password_env: None,
            },
        );

        let fleet = cfg.to_fleet_config().unwrap();
        assert_eq!(fleet.data_dir, PathBuf::from("/data"));
        assert_eq!(fleet.cameras_path(), PathBuf::from("/data/cameras.json"));
        assert_eq!(fleet.download.download_dir, PathBuf::from("/media"));
        assert_eq!(fleet.check_timeout, Duration::from_millis(250));
        assert_eq!(fleet.retry.attempts, 5);
        assert_eq!(fleet.retry.initial_delay, Duration::from_millis(500));
        assert_eq!(fleet.networks.len(), 1);
        assert_eq!(fleet.networks[0].ssid, "Studio");
        assert_eq!(fleet.active_network.as_deref(), Some("Studio"));
        assert!(matches!(fleet.cohn.tls.tls, TlsMode::DangerAcceptInvalid));
    }

    #[test]
    fn zero_transport_attempts_is_rejected() {
        let mut cfg = Config::default();
        cfg.timeouts.transport_attempts = 0;
        assert!(matches!(
            cfg.to_fleet_config(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn zero_poll_attempts_is_rejected() {
        let mut cfg = Config::default();
        cfg.timeouts.poll_attempts = 0;
        assert!(matches!(
            cfg.to_fleet_config(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn redaction_masks_plaintext_only() {
        let mut cfg = Config::default();
        cfg.networks.insert(
            "Studio".into(),
            NetworkEntry {
                password: Some("secret".into()),
                password_env: Some("STUDIO_WIFI".into()),
            },
        );
        let shown = cfg.redacted();
        let entry = &shown.networks["Studio"];
        assert_eq!(entry.password.as_deref(), Some(REDACTED));
        assert_eq!(entry.password_env.as_deref(), Some("STUDIO_WIFI"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config {
            wifi_interface: Some("wlan1".into()),
            ..Config::default()
        };
        cfg.networks.insert("Cabin".into(), NetworkEntry::default());
        save_config_to(&cfg, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[networks.Cabin]"));
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.wifi_interface.as_deref(), Some("wlan1"));
        assert!(loaded.networks.contains_key("Cabin"));
    }
}
