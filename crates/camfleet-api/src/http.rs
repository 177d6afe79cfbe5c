// Camera HTTP client
//
// One client type serves both HTTP transports: the home-network (COHN)
// interface, reached over HTTPS with basic auth at the camera's leased
// address, and the device-hosted access point at a fixed address without
// auth. Endpoints are identical on both.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::models::{CameraState, MediaFile, MediaListResponse};
use crate::transport::TransportConfig;

/// Fixed address of the camera's own access point.
pub const DEVICE_AP_URL: &str = "http://10.5.5.9:8080";

/// Build the base URL for a camera on the home network.
///
/// `port` is only set when the camera is fronted by something other than
/// the default HTTPS port (test servers, port forwards).
pub fn home_network_url(scheme: &str, ip: IpAddr, port: Option<u16>) -> Result<Url, Error> {
    let host = match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    };
    let raw = match port {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    };
    Ok(Url::parse(&raw)?)
}

struct BasicAuth {
    username: String,
    password: SecretString,
}

/// Raw HTTP client for one camera.
pub struct CameraHttpClient {
    http: reqwest::Client,
    /// Same TLS settings, longer timeout for file transfers.
    media_http: reqwest::Client,
    base_url: Url,
    auth: Option<BasicAuth>,
}

impl CameraHttpClient {
    /// Client for a provisioned camera on the home network.
    pub fn home_network(
        base_url: Url,
        username: impl Into<String>,
        password: SecretString,
        transport: &TransportConfig,
        media_timeout: Duration,
    ) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            media_http: transport.clone().with_timeout(media_timeout).build_client()?,
            base_url,
            auth: Some(BasicAuth {
                username: username.into(),
                password,
            }),
        })
    }

    /// Client for a camera reached through its own access point.
    pub fn access_point(
        base_url: Url,
        transport: &TransportConfig,
        media_timeout: Duration,
    ) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            media_http: transport.clone().with_timeout(media_timeout).build_client()?,
            base_url,
            auth: None,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Full camera state. Doubles as the reachability probe.
    pub async fn state(&self) -> Result<CameraState, Error> {
        self.get_json(self.url("gopro/camera/state")?).await
    }

    /// Media on the SD card, newest first.
    pub async fn list_media(&self) -> Result<Vec<MediaFile>, Error> {
        let list: MediaListResponse = self.get_json(self.url("gopro/media/list")?).await?;
        Ok(list.into_files())
    }

    pub async fn set_shutter(&self, recording: bool) -> Result<(), Error> {
        let path = if recording {
            "gopro/camera/shutter/start"
        } else {
            "gopro/camera/shutter/stop"
        };
        self.get_empty(self.url(path)?).await
    }

    pub async fn set_setting(&self, setting: u32, option: u32) -> Result<(), Error> {
        let mut url = self.url("gopro/camera/setting")?;
        url.query_pairs_mut()
            .append_pair("setting", &setting.to_string())
            .append_pair("option", &option.to_string());
        self.get_empty(url).await
    }

    pub async fn keep_alive(&self) -> Result<(), Error> {
        self.get_empty(self.url("gopro/camera/keep_alive")?).await
    }

    /// Erase every file on the SD card.
    pub async fn erase_all(&self) -> Result<(), Error> {
        let url = self.url("gopro/media/all")?;
        debug!("DELETE {}", url);
        let resp = self
            .authorize(self.http.delete(url))
            .send()
            .await
            .map_err(Error::Transport)?;
        check_status(resp).await.map(drop)
    }

    /// Stream one file to `dest`. Data lands in `dest.part` first and is
    /// renamed on success; the partial file is removed on any failure.
    /// Returns the number of bytes written.
    pub async fn download(&self, file: &MediaFile, dest: &Path) -> Result<u64, Error> {
        let part = partial_path(dest);
        match self.download_to(file, &part).await {
            Ok(written) => {
                tokio::fs::rename(&part, dest).await?;
                Ok(written)
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&part).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %part.display(), error = %rm, "failed to remove partial file");
                    }
                }
                Err(e)
            }
        }
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(auth) => builder.basic_auth(&auth.username, Some(auth.password.expose_secret())),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(Error::Transport)?;
        let body = check_status(resp).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }

    async fn get_empty(&self, url: Url) -> Result<(), Error> {
        debug!("GET {}", url);
        let resp = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(Error::Transport)?;
        check_status(resp).await.map(drop)
    }

    async fn download_to(&self, file: &MediaFile, part: &Path) -> Result<u64, Error> {
        let url = self.url(&format!("videos/DCIM/{}", file.camera_path()))?;
        debug!("GET {}", url);
        let resp = self
            .authorize(self.media_http.get(url))
            .send()
            .await
            .map_err(Error::Transport)?;
        let resp = check_status(resp).await?;

        if let Some(parent) = part.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut out = tokio::fs::File::create(part).await?;
        let mut written: u64 = 0;
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            written += u64::try_from(chunk.len()).unwrap_or(u64::MAX);
        }
        out.flush().await?;

        if file.size_bytes > 0 && written != file.size_bytes {
            return Err(Error::Camera {
                status: 200,
                message: format!(
                    "short transfer for {}: {written} of {} bytes",
                    file.filename, file.size_bytes
                ),
            });
        }
        Ok(written)
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Camera {
        status: status.as_u16(),
        message: body.chars().take(200).collect(),
    })
}
