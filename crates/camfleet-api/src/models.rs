// ── Camera wire models ──
//
// Shapes returned by the camera HTTP API (same on home network and
// device AP) and by the short-range bridge.

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Status / setting identifiers ────────────────────────────────────

/// Numeric status ids reported under `status` in the camera state.
pub mod status_ids {
    pub const BUSY: &str = "8";
    pub const ENCODING: &str = "10";
    pub const SPACE_REMAINING_KB: &str = "54";
    pub const BATTERY_PERCENT: &str = "70";
}

/// Numeric setting ids used by presets.
pub mod setting_ids {
    pub const RESOLUTION: u32 = 2;
    pub const FRAME_RATE: u32 = 3;
    pub const GPS: u32 = 83;
    pub const FIELD_OF_VIEW: u32 = 121;
    pub const ANTI_FLICKER: u32 = 134;
    pub const STABILIZATION: u32 = 135;
    pub const SHUTTER: u32 = 145;
}

// ── Camera state ────────────────────────────────────────────────────

/// Response of `GET /gopro/camera/state`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CameraState {
    #[serde(default)]
    pub status: HashMap<String, Value>,
    #[serde(default)]
    pub settings: HashMap<String, Value>,
}

impl CameraState {
    pub fn battery_percent(&self) -> Option<u8> {
        self.status_u64(status_ids::BATTERY_PERCENT)
            .and_then(|v| u8::try_from(v.min(100)).ok())
    }

    pub fn space_remaining_kb(&self) -> Option<u64> {
        self.status_u64(status_ids::SPACE_REMAINING_KB)
    }

    pub fn is_encoding(&self) -> bool {
        self.status_u64(status_ids::ENCODING).is_some_and(|v| v != 0)
    }

    pub fn is_busy(&self) -> bool {
        self.status_u64(status_ids::BUSY).is_some_and(|v| v != 0)
    }

    /// Current setting values keyed by numeric id. Non-numeric keys or
    /// values are ignored.
    pub fn setting_values(&self) -> HashMap<u32, u32> {
        self.settings
            .iter()
            .filter_map(|(k, v)| {
                let id = k.parse::<u32>().ok()?;
                let value = value_as_u64(v).and_then(|v| u32::try_from(v).ok())?;
                Some((id, value))
            })
            .collect()
    }

    fn status_u64(&self, id: &str) -> Option<u64> {
        self.status.get(id).and_then(value_as_u64)
    }
}

fn value_as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        Value::Bool(b) => Some(u64::from(*b)),
        _ => None,
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_u64(&value).unwrap_or(0))
}

// ── Media list ──────────────────────────────────────────────────────

/// Response of `GET /gopro/media/list`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MediaListResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub media: Vec<MediaDirectory>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaDirectory {
    #[serde(rename = "d")]
    pub directory: String,
    #[serde(rename = "fs", default)]
    pub files: Vec<RawMediaFile>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawMediaFile {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "cre", default, deserialize_with = "lenient_u64")]
    pub created: u64,
    #[serde(rename = "mod", default, deserialize_with = "lenient_u64")]
    pub modified: u64,
    #[serde(rename = "s", default, deserialize_with = "lenient_u64")]
    pub size: u64,
}

/// One file on the camera's SD card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub directory: String,
    pub filename: String,
    pub size_bytes: u64,
    /// Capture time as reported by the camera (seconds since epoch).
    pub created: Option<DateTime<Utc>>,
    pub modified: u64,
}

impl MediaFile {
    pub fn is_video(&self) -> bool {
        std::path::Path::new(&self.filename)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"))
    }

    /// Camera-relative path, `{dir}/{file}`.
    pub fn camera_path(&self) -> String {
        format!("{}/{}", self.directory, self.filename)
    }
}

impl MediaListResponse {
    /// Flatten directories into a single list, newest first.
    pub fn into_files(self) -> Vec<MediaFile> {
        let mut files: Vec<MediaFile> = self
            .media
            .into_iter()
            .flat_map(|dir| {
                let directory = dir.directory;
                dir.files.into_iter().map(move |f| MediaFile {
                    directory: directory.clone(),
                    filename: f.name,
                    size_bytes: f.size,
                    created: i64::try_from(f.created)
                        .ok()
                        .filter(|secs| *secs > 0)
                        .and_then(|secs| DateTime::from_timestamp(secs, 0)),
                    modified: f.modified,
                })
            })
            .collect();
        files.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        files
    }
}

// ── Short-range models ──────────────────────────────────────────────

/// One advertisement seen during a short-range scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub rssi: Option<i16>,
}

/// Status reported over the short-range link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortRangeStatus {
    #[serde(default)]
    pub battery_percent: Option<u8>,
    #[serde(default)]
    pub space_remaining_kb: Option<u64>,
    #[serde(default)]
    pub encoding: bool,
}

/// Provisioning state of the home-network interface, as the camera sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkJoinState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Failed,
}

/// Home-network status polled during provisioning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomeNetworkStatus {
    #[serde(default)]
    pub state: NetworkJoinState,
    #[serde(default)]
    pub ip_address: Option<IpAddr>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ssid: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn media_list_accepts_string_and_numeric_sizes() {
        let json = r#"{
            "id": "1",
            "media": [{
                "d": "100GOPRO",
                "fs": [
                    {"n": "GX010001.MP4", "cre": "1700000000", "mod": "1700000100", "s": "1024"},
                    {"n": "GOPR0002.JPG", "cre": 1700000200, "mod": 1700000200, "s": 2048}
                ]
            }]
        }"#;
        let files = serde_json::from_str::<MediaListResponse>(json)
            .unwrap()
            .into_files();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "GOPR0002.JPG");
        assert_eq!(files[0].size_bytes, 2048);
        assert_eq!(files[1].size_bytes, 1024);
        assert_eq!(files[1].camera_path(), "100GOPRO/GX010001.MP4");
        assert!(files[1].is_video());
        assert!(!files[0].is_video());
        assert_eq!(files[1].created.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn empty_media_list_is_empty() {
        let files = serde_json::from_str::<MediaListResponse>("{}")
            .unwrap()
            .into_files();
        assert!(files.is_empty());
    }

    #[test]
    fn camera_state_helpers() {
        let json = r#"{"status": {"70": 85, "54": "123456", "10": 1, "8": 0},
                       "settings": {"2": 1, "3": "8", "x": 4}}"#;
        let state: CameraState = serde_json::from_str(json).unwrap();
        assert_eq!(state.battery_percent(), Some(85));
        assert_eq!(state.space_remaining_kb(), Some(123_456));
        assert!(state.is_encoding());
        assert!(!state.is_busy());

        let settings = state.setting_values();
        assert_eq!(settings.get(&2), Some(&1));
        assert_eq!(settings.get(&3), Some(&8));
        assert_eq!(settings.len(), 2);
    }
}
