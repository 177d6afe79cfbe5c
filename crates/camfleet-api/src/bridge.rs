// Short-range bridge client
//
// Implements `ShortRangeSdk` by talking JSON over loopback HTTP to a
// sidecar process that hosts the vendor BLE SDK. The sidecar keeps links
// open between CLI invocations.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{Advertisement, HomeNetworkStatus, ShortRangeStatus};
use crate::sdk::{DeviceTarget, ShortRangeSdk};
use crate::transport::{TlsMode, TransportConfig};

/// Error body returned by the bridge on non-2xx responses.
#[derive(Debug, Deserialize)]
struct BridgeError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectionReply {
    connected: bool,
}

#[derive(Debug, Deserialize)]
struct CertificateReply {
    certificate: String,
}

#[derive(Serialize)]
struct ScanRequest {
    timeout_secs: u64,
}

#[derive(Serialize)]
struct ConnectRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a str>,
}

#[derive(Serialize)]
struct ShutterRequest {
    recording: bool,
}

#[derive(Serialize)]
struct SettingRequest {
    option: u32,
}

#[derive(Serialize)]
struct AccessPointRequest {
    enabled: bool,
}

#[derive(Serialize)]
struct JoinRequest<'a> {
    ssid: &'a str,
    password: &'a str,
}

/// [`ShortRangeSdk`] backed by the loopback bridge daemon.
pub struct BridgeSdk {
    http: reqwest::Client,
    base_url: Url,
}

impl BridgeSdk {
    /// `timeout` bounds every bridge round-trip; it must exceed the
    /// longest SDK operation (a connect attempt).
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, Error> {
        let http = TransportConfig {
            tls: TlsMode::System,
            timeout,
            connect_timeout: Duration::from_secs(2),
        }
        .build_client()?;
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    fn camera_url(&self, serial: &str, tail: &str) -> Result<Url, Error> {
        self.url(&format!("cameras/{serial}/{tail}"))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, Error> {
        let resp = builder.send().await.map_err(bridge_unreachable)?;
        let resp = check_bridge(resp).await?;
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    async fn send_empty(&self, builder: reqwest::RequestBuilder) -> Result<(), Error> {
        let resp = builder.send().await.map_err(bridge_unreachable)?;
        check_bridge(resp).await.map(drop)
    }
}

/// The bridge being down means no short-range transport at all.
fn bridge_unreachable(e: reqwest::Error) -> Error {
    if e.is_connect() {
        Error::AdapterUnavailable(format!("short-range bridge not reachable: {e}"))
    } else if e.is_timeout() {
        Error::ShortRange(format!("bridge request timed out: {e}"))
    } else {
        Error::Transport(e)
    }
}

async fn check_bridge(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let parsed: Option<BridgeError> = serde_json::from_str(&body).ok();
    let (code, message) = match parsed {
        Some(err) => {
            let message = err.message.unwrap_or_else(|| err.error.clone());
            (err.error, message)
        }
        None => (String::new(), body),
    };
    Err(match code.as_str() {
        "adapter_unavailable" => Error::AdapterUnavailable(message),
        _ if status == reqwest::StatusCode::NOT_FOUND => Error::Camera {
            status: 404,
            message,
        },
        _ => Error::ShortRange(message),
    })
}

#[async_trait]
impl ShortRangeSdk for BridgeSdk {
    async fn scan(&self, timeout: Duration) -> Result<Vec<Advertisement>, Error> {
        debug!(timeout_secs = timeout.as_secs(), "bridge scan");
        let body = ScanRequest {
            timeout_secs: timeout.as_secs().max(1),
        };
        // The scan itself runs for `timeout`; give the round-trip headroom.
        let builder = self
            .http
            .post(self.url("scan")?)
            .timeout(timeout + Duration::from_secs(5))
            .json(&body);
        self.send(builder).await
    }

    async fn connect(&self, target: &DeviceTarget) -> Result<(), Error> {
        let body = ConnectRequest {
            address: target.address.as_deref(),
        };
        let url = self.camera_url(&target.serial, "connect")?;
        self.send_empty(self.http.post(url).json(&body)).await
    }

    async fn disconnect(&self, serial: &str) -> Result<(), Error> {
        let url = self.camera_url(serial, "disconnect")?;
        self.send_empty(self.http.post(url)).await
    }

    async fn is_connected(&self, serial: &str) -> bool {
        let Ok(url) = self.camera_url(serial, "connection") else {
            return false;
        };
        self.send::<ConnectionReply>(self.http.get(url))
            .await
            .is_ok_and(|reply| reply.connected)
    }

    async fn status(&self, serial: &str) -> Result<ShortRangeStatus, Error> {
        let url = self.camera_url(serial, "status")?;
        self.send(self.http.get(url)).await
    }

    async fn set_shutter(&self, serial: &str, recording: bool) -> Result<(), Error> {
        let url = self.camera_url(serial, "shutter")?;
        self.send_empty(self.http.put(url).json(&ShutterRequest { recording }))
            .await
    }

    async fn settings(&self, serial: &str) -> Result<HashMap<u32, u32>, Error> {
        let url = self.camera_url(serial, "settings")?;
        self.send(self.http.get(url)).await
    }

    async fn set_setting(&self, serial: &str, setting: u32, option: u32) -> Result<(), Error> {
        let url = self.camera_url(serial, &format!("settings/{setting}"))?;
        self.send_empty(self.http.put(url).json(&SettingRequest { option }))
            .await
    }

    async fn set_access_point(&self, serial: &str, enabled: bool) -> Result<(), Error> {
        let url = self.camera_url(serial, "access-point")?;
        self.send_empty(self.http.put(url).json(&AccessPointRequest { enabled }))
            .await
    }

    async fn join_home_network(
        &self,
        serial: &str,
        ssid: &str,
        password: &SecretString,
    ) -> Result<(), Error> {
        let url = self.camera_url(serial, "home-network")?;
        let body = JoinRequest {
            ssid,
            password: password.expose_secret(),
        };
        self.send_empty(self.http.post(url).json(&body)).await
    }

    async fn home_network_status(&self, serial: &str) -> Result<HomeNetworkStatus, Error> {
        let url = self.camera_url(serial, "home-network")?;
        self.send(self.http.get(url)).await
    }

    async fn create_home_network_certificate(&self, serial: &str) -> Result<String, Error> {
        let url = self.camera_url(serial, "home-network/certificate")?;
        let reply: CertificateReply = self.send(self.http.post(url)).await?;
        Ok(reply.certificate)
    }
}
