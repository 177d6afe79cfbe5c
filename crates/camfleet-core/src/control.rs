// ── Control route ──
//
// Commands and small reads over whichever control transport
// `select_transport` picks: the short-range link first, the home network
// second. Recording, presets, and the health poll all go through here.

use std::collections::HashMap;
use std::sync::Arc;

use camfleet_api::ShortRangeSdk;
use tracing::debug;

use crate::cohn::NetworkTransportManager;
use crate::error::CoreError;
use crate::model::{CameraHealth, Serial};
use crate::retry::RetryConfig;
use crate::store::CameraRegistry;
use crate::transport::{Preference, Purpose, TransportKind, select_transport};

pub struct CameraControl {
    registry: Arc<CameraRegistry>,
    sdk: Arc<dyn ShortRangeSdk>,
    cohn: Arc<NetworkTransportManager>,
    retry: RetryConfig,
}

impl CameraControl {
    pub fn new(
        registry: Arc<CameraRegistry>,
        sdk: Arc<dyn ShortRangeSdk>,
        cohn: Arc<NetworkTransportManager>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            registry,
            sdk,
            cohn,
            retry,
        }
    }

    fn route(
        &self,
        serial: &Serial,
        via: Preference,
    ) -> Result<TransportKind, CoreError> {
        let camera = self.registry.require(serial)?;
        select_transport(&camera, Purpose::Control, via)
    }

    /// Start or stop recording. Updates the `recording` flag on success.
    pub async fn set_shutter(
        &self,
        serial: &Serial,
        recording: bool,
        via: Preference,
    ) -> Result<TransportKind, CoreError> {
        let kind = self.route(serial, via)?;
        self.retry
            .run(serial, move || async move {
                let sent = match kind {
                    TransportKind::ShortRange => {
                        self.sdk.set_shutter(serial.as_str(), recording).await
                    }
                    _ => self.cohn.client(serial).await?.set_shutter(recording).await,
                };
                sent.map_err(|e| CoreError::from_device(serial, kind, e))
            })
            .await?;
        self.registry.update(serial, |cam| {
            cam.recording = recording;
            cam.touch();
        })?;
        debug!(%serial, recording, via = %kind, "shutter set");
        Ok(kind)
    }

    /// Current numeric settings, keyed by setting id.
    pub async fn settings(
        &self,
        serial: &Serial,
        via: Preference,
    ) -> Result<HashMap<u32, u32>, CoreError> {
        let kind = self.route(serial, via)?;
        self.retry
            .run(serial, move || async move {
                match kind {
                    TransportKind::ShortRange => self
                        .sdk
                        .settings(serial.as_str())
                        .await
                        .map_err(|e| CoreError::from_device(serial, kind, e)),
                    _ => {
                        let state = self
                            .cohn
                            .client(serial)
                            .await?
                            .state()
                            .await
                            .map_err(|e| CoreError::from_device(serial, kind, e))?;
                        Ok(state.setting_values())
                    }
                }
            })
            .await
    }

    pub async fn set_setting(
        &self,
        serial: &Serial,
        setting: u32,
        option: u32,
        via: Preference,
    ) -> Result<(), CoreError> {
        let kind = self.route(serial, via)?;
        self.retry
            .run(serial, move || async move {
                let sent = match kind {
                    TransportKind::ShortRange => {
                        self.sdk
                            .set_setting(serial.as_str(), setting, option)
                            .await
                    }
                    _ => {
                        self.cohn
                            .client(serial)
                            .await?
                            .set_setting(setting, option)
                            .await
                    }
                };
                sent.map_err(|e| CoreError::from_device(serial, kind, e))
            })
            .await
    }

    /// Read battery and storage and write them into the registry.
    pub async fn health(&self, serial: &Serial) -> Result<CameraHealth, CoreError> {
        let kind = self.route(serial, Preference::Auto)?;
        let (battery, storage, encoding) = match kind {
            TransportKind::ShortRange => {
                let status = self
                    .sdk
                    .status(serial.as_str())
                    .await
                    .map_err(|e| CoreError::from_device(serial, kind, e))?;
                (status.battery_percent, status.space_remaining_kb, status.encoding)
            }
            _ => {
                let state = self
                    .cohn
                    .client(serial)
                    .await?
                    .state()
                    .await
                    .map_err(|e| CoreError::from_device(serial, kind, e))?;
                (state.battery_percent(), state.space_remaining_kb(), state.is_encoding())
            }
        };
        let (camera, ()) = self.registry.update(serial, |cam| {
            cam.battery_level = battery.or(cam.battery_level);
            cam.storage_remaining_kb = storage.or(cam.storage_remaining_kb);
            cam.recording = encoding;
            cam.touch();
        })?;
        Ok(CameraHealth {
            battery_level: camera.battery_level,
            storage_remaining_kb: camera.storage_remaining_kb,
            connected: camera.connected,
            cohn_state: camera.cohn_state,
        })
    }
}
