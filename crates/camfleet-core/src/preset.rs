// ── Preset manager ──
//
// Named setting bundles persisted to `presets.json`, captured from and
// applied to cameras over the control route.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::control::CameraControl;
use crate::error::CoreError;
use crate::fanout::{collect_outcomes, fan_out};
use crate::model::{FleetResult, Preset, PresetSettings, Serial, settings_from_ids};
use crate::store::json_file::JsonFile;
use crate::transport::Preference;

type PresetMap = BTreeMap<String, Preset>;

pub struct PresetManager {
    presets: Mutex<PresetMap>,
    file: JsonFile<PresetMap>,
    control: Arc<CameraControl>,
}

impl PresetManager {
    pub async fn open(
        path: impl Into<PathBuf>,
        control: Arc<CameraControl>,
    ) -> Result<Self, CoreError> {
        let file = JsonFile::new(path);
        let presets: PresetMap = file.load().await?;
        debug!(presets = presets.len(), "presets loaded");
        Ok(Self {
            presets: Mutex::new(presets),
            file,
            control,
        })
    }

    /// Pinned presets first, then by name.
    pub async fn list(&self) -> Vec<Preset> {
        let mut presets: Vec<Preset> = self.presets.lock().await.values().cloned().collect();
        presets.sort_by(|a, b| b.pinned.cmp(&a.pinned).then_with(|| a.name.cmp(&b.name)));
        presets
    }

    pub async fn get(&self, name: &str) -> Result<Preset, CoreError> {
        self.presets
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    pub async fn create(&self, name: &str, settings: PresetSettings) -> Result<Preset, CoreError> {
        let name = valid_name(name)?;
        let preset = Preset::new(name, settings);
        let created = preset.clone();
        self.mutate(|presets| {
            if presets.contains_key(name) {
                return Err(CoreError::PresetExists { name: name.into() });
            }
            presets.insert(name.to_owned(), preset);
            Ok(())
        })
        .await?;
        info!(name, "preset created");
        Ok(created)
    }

    /// Replace a preset's settings.
    pub async fn update(&self, name: &str, settings: PresetSettings) -> Result<Preset, CoreError> {
        self.mutate(|presets| {
            let preset = presets.get_mut(name).ok_or_else(|| not_found(name))?;
            preset.settings = settings;
            preset.updated_at = Utc::now();
            Ok(preset.clone())
        })
        .await
    }

    /// Cameras already configured with it keep their settings.
    pub async fn delete(&self, name: &str) -> Result<Preset, CoreError> {
        self.mutate(|presets| presets.remove(name).ok_or_else(|| not_found(name)))
            .await
    }

    pub async fn toggle_pin(&self, name: &str) -> Result<Preset, CoreError> {
        self.mutate(|presets| {
            let preset = presets.get_mut(name).ok_or_else(|| not_found(name))?;
            preset.pinned = !preset.pinned;
            preset.updated_at = Utc::now();
            Ok(preset.clone())
        })
        .await
    }

    /// Read a camera's current settings into `name`, creating or
    /// overwriting it. Pin state and creation time survive an overwrite.
    pub async fn capture(
        &self,
        serial: &Serial,
        name: &str,
        via: Preference,
    ) -> Result<Preset, CoreError> {
        let name = valid_name(name)?;
        let raw = self.control.settings(serial, via).await?;
        let settings = settings_from_ids(&raw);
        if settings.is_empty() {
            return Err(CoreError::validation(
                "settings",
                format!("camera {serial} reported none of the preset settings"),
            ));
        }
        let preset = self
            .mutate(|presets| {
                let preset = presets
                    .entry(name.to_owned())
                    .or_insert_with(|| Preset::new(name, PresetSettings::new()));
                preset.settings = settings;
                preset.updated_at = Utc::now();
                Ok(preset.clone())
            })
            .await?;
        info!(name, %serial, settings = preset.settings.len(), "preset captured");
        Ok(preset)
    }

    /// Push a preset to each camera. The value is the number of settings
    /// written; a camera stops at its first rejected setting.
    pub async fn apply(
        &self,
        name: &str,
        serials: Vec<Serial>,
        via: Preference,
    ) -> Result<FleetResult<usize>, CoreError> {
        let preset = self.get(name).await?;
        let preset = &preset;
        let outcomes = fan_out(serials, |serial| async move {
            let mut written = 0;
            for (kind, option) in &preset.settings {
                self.control
                    .set_setting(&serial, kind.setting_id(), *option, via)
                    .await?;
                written += 1;
            }
            Ok(written)
        })
        .await;
        let result = collect_outcomes(outcomes)?;
        info!(name, summary = %result.summary(), "preset applied");
        Ok(result)
    }

    async fn mutate<R>(
        &self,
        f: impl FnOnce(&mut PresetMap) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let mut presets = self.presets.lock().await;
        let mut next = presets.clone();
        let out = f(&mut next)?;
        self.file.save(&next).await?;
        *presets = next;
        Ok(out)
    }
}

fn valid_name(name: &str) -> Result<&str, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        Err(CoreError::validation("name", "must not be empty"))
    } else {
        Ok(name)
    }
}

fn not_found(name: &str) -> CoreError {
    CoreError::PresetNotFound { name: name.into() }
}
