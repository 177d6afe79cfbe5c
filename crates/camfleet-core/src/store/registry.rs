// ── Camera registry ──
//
// Single owner of every camera record. Identity fields are persisted to
// `cameras.json`; runtime fields live only in memory and change through
// `update`, which holds the record's lock for the whole closure so a
// health write never clobbers a connect write for the same serial.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::collection::Collection;
use super::json_file::JsonFile;
use crate::error::CoreError;
use crate::model::{Camera, SavedCamera, SavedCameras, Serial};
use crate::stream::SnapshotStream;

pub struct CameraRegistry {
    cameras: Collection<Camera>,
    file: JsonFile<SavedCameras>,
    /// Held across snapshot + write so the newest snapshot lands last.
    persist_lock: Mutex<()>,
}

impl CameraRegistry {
    /// Load `path` (missing file means an empty fleet).
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let file: JsonFile<SavedCameras> = JsonFile::new(path);
        let saved: SavedCameras = file.load().await?;
        let cameras = Collection::new();
        for record in saved.cameras {
            cameras.upsert(record.serial.as_str().to_owned(), Camera::from(record));
        }
        info!(
            path = %file.path().display(),
            cameras = cameras.len(),
            "camera registry loaded"
        );
        Ok(Self {
            cameras,
            file,
            persist_lock: Mutex::new(()),
        })
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, serial: &Serial) -> Option<Arc<Camera>> {
        self.cameras.get(serial.as_str())
    }

    pub fn require(&self, serial: &Serial) -> Result<Arc<Camera>, CoreError> {
        self.get(serial).ok_or_else(|| CoreError::CameraNotFound {
            serial: serial.to_string(),
        })
    }

    pub fn contains(&self, serial: &Serial) -> bool {
        self.cameras.contains(serial.as_str())
    }

    /// All cameras, sorted by serial.
    pub fn snapshot(&self) -> Arc<Vec<Arc<Camera>>> {
        self.cameras.snapshot()
    }

    pub fn serials(&self) -> Vec<Serial> {
        self.cameras.keys().into_iter().map(Serial::from).collect()
    }

    pub fn subscribe(&self) -> SnapshotStream<Camera> {
        SnapshotStream::new(self.cameras.subscribe())
    }

    /// Bumped on every change, persisted or not.
    pub fn version(&self) -> u64 {
        self.cameras.version()
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Persisted mutations ──────────────────────────────────────────

    pub async fn add(&self, camera: Camera) -> Result<Arc<Camera>, CoreError> {
        if camera.serial.is_empty() {
            return Err(CoreError::validation("serial", "must not be empty"));
        }
        let serial = camera.serial.clone();
        if !self.cameras.insert_new(serial.as_str().to_owned(), camera) {
            return Err(CoreError::CameraExists {
                serial: serial.to_string(),
            });
        }
        if let Err(e) = self.persist().await {
            self.cameras.remove(serial.as_str());
            return Err(e);
        }
        info!(%serial, "camera added");
        self.require(&serial)
    }

    /// Remove a camera. Refused while it is recording.
    pub async fn remove(&self, serial: &Serial) -> Result<Arc<Camera>, CoreError> {
        let removed = self
            .cameras
            .remove_if(serial.as_str(), |cam| !cam.recording)
            .ok_or_else(|| match self.get(serial) {
                Some(_) => CoreError::conflict(format!("camera {serial} is recording")),
                None => CoreError::CameraNotFound {
                    serial: serial.to_string(),
                },
            })?;

        if let Err(e) = self.persist().await {
            self.cameras
                .upsert(serial.as_str().to_owned(), (*removed).clone());
            return Err(e);
        }
        info!(%serial, "camera removed");
        Ok(removed)
    }

    pub async fn rename(&self, serial: &Serial, name: &str) -> Result<Arc<Camera>, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("name", "must not be empty"));
        }
        let (_, previous) =
            self.update(serial, |cam| std::mem::replace(&mut cam.name, name.to_owned()))?;
        if let Err(e) = self.persist().await {
            self.cameras.update(serial.as_str(), |cam| cam.name = previous);
            return Err(e);
        }
        self.require(serial)
    }

    /// Record the login for the camera-hosted access point.
    pub async fn set_access_point(
        &self,
        serial: &Serial,
        ssid: Option<String>,
        password: Option<String>,
    ) -> Result<Arc<Camera>, CoreError> {
        let (_, previous) = self.update(serial, |cam| {
            let old = (cam.wifi_ssid.take(), cam.wifi_password.take());
            cam.wifi_ssid = ssid;
            cam.wifi_password = password;
            old
        })?;
        if let Err(e) = self.persist().await {
            self.cameras.update(serial.as_str(), |cam| {
                (cam.wifi_ssid, cam.wifi_password) = previous;
            });
            return Err(e);
        }
        self.require(serial)
    }

    // ── Runtime mutations ────────────────────────────────────────────

    /// Read-modify-write one record's runtime state. Not persisted.
    pub fn update<R>(
        &self,
        serial: &Serial,
        f: impl FnOnce(&mut Camera) -> R,
    ) -> Result<(Arc<Camera>, R), CoreError> {
        self.cameras
            .update(serial.as_str(), f)
            .ok_or_else(|| CoreError::CameraNotFound {
                serial: serial.to_string(),
            })
    }

    async fn persist(&self) -> Result<(), CoreError> {
        let _guard = self.persist_lock.lock().await;
        let doc = SavedCameras {
            cameras: self
                .snapshot()
                .iter()
                .map(|cam| SavedCamera::from(cam.as_ref()))
                .collect(),
        };
        debug!(cameras = doc.cameras.len(), "persisting camera registry");
        self.file.save(&doc).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn open_temp() -> (tempfile::TempDir, CameraRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = CameraRegistry::open(dir.path().join("cameras.json"))
            .await
            .unwrap();
        (dir, registry)
    }

    #[tokio::test]
    async fn add_persists_identity_only() {
        let (dir, registry) = open_temp().await;
        registry
            .add(Camera::new(Serial::from("1234"), "Left"))
            .await
            .unwrap();
        registry
            .update(&Serial::from("1234"), |cam| cam.connected = true)
            .unwrap();
        registry.rename(&Serial::from("1234"), "Wide").await.unwrap();

        let reopened = CameraRegistry::open(dir.path().join("cameras.json"))
            .await
            .unwrap();
        let cam = reopened.require(&Serial::from("1234")).unwrap();
        assert_eq!(cam.name, "Wide");
        assert!(!cam.connected);
    }

    #[tokio::test]
    async fn duplicate_serial_is_rejected() {
        let (_dir, registry) = open_temp().await;
        registry
            .add(Camera::new(Serial::from("1234"), "Left"))
            .await
            .unwrap();
        let err = registry
            .add(Camera::new(Serial::from("1234"), "Other"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CameraExists { .. }));
        assert_eq!(registry.require(&Serial::from("1234")).unwrap().name, "Left");
    }

    #[tokio::test]
    async fn recording_camera_cannot_be_removed() {
        let (_dir, registry) = open_temp().await;
        let serial = Serial::from("1234");
        registry.add(Camera::new(serial.clone(), "Left")).await.unwrap();
        registry.update(&serial, |cam| cam.recording = true).unwrap();

        let err = registry.remove(&serial).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
        assert!(registry.contains(&serial));

        registry.update(&serial, |cam| cam.recording = false).unwrap();
        registry.remove(&serial).await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn failed_write_rolls_back_add() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every write fail.
        let path = dir.path().join("cameras.json");
        std::fs::create_dir(&path).unwrap();
        let registry = CameraRegistry {
            cameras: Collection::new(),
            file: JsonFile::new(&path),
            persist_lock: Mutex::new(()),
        };

        let err = registry
            .add(Camera::new(Serial::from("1234"), "Left"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Store { .. }));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn unknown_serial_is_not_found() {
        let (_dir, registry) = open_temp().await;
        let err = registry
            .update(&Serial::from("9999"), |cam| cam.connected = true)
            .unwrap_err();
        assert!(matches!(err, CoreError::CameraNotFound { .. }));
    }
}
