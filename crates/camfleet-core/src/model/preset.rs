// ── Preset types ──

use std::collections::{BTreeMap, HashMap};

use camfleet_api::models::setting_ids;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Setting a preset can carry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SettingKind {
    Resolution,
    FrameRate,
    FieldOfView,
    Stabilization,
    AntiFlicker,
    Shutter,
    Gps,
}

impl SettingKind {
    /// Numeric id the camera uses for this setting.
    pub fn setting_id(self) -> u32 {
        match self {
            Self::Resolution => setting_ids::RESOLUTION,
            Self::FrameRate => setting_ids::FRAME_RATE,
            Self::FieldOfView => setting_ids::FIELD_OF_VIEW,
            Self::Stabilization => setting_ids::STABILIZATION,
            Self::AntiFlicker => setting_ids::ANTI_FLICKER,
            Self::Shutter => setting_ids::SHUTTER,
            Self::Gps => setting_ids::GPS,
        }
    }

    pub fn from_setting_id(id: u32) -> Option<Self> {
        Self::iter().find(|kind| kind.setting_id() == id)
    }
}

pub type PresetSettings = BTreeMap<SettingKind, u32>;

/// Keep only the settings a preset can carry.
pub fn settings_from_ids(raw: &HashMap<u32, u32>) -> PresetSettings {
    raw.iter()
        .filter_map(|(id, value)| SettingKind::from_setting_id(*id).map(|kind| (kind, *value)))
        .collect()
}

/// A named bundle of camera settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub settings: PresetSettings,
    #[serde(default)]
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Preset {
    pub fn new(name: impl Into<String>, settings: PresetSettings) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            settings,
            pinned: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn setting_ids_are_unique() {
        let mut ids: Vec<u32> = SettingKind::iter().map(SettingKind::setting_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), SettingKind::iter().count());
    }

    #[test]
    fn unknown_ids_are_dropped() {
        let raw = HashMap::from([(2, 1), (3, 8), (999, 4)]);
        let settings = settings_from_ids(&raw);
        assert_eq!(settings.len(), 2);
        assert_eq!(settings.get(&SettingKind::FrameRate), Some(&8));
    }

    #[test]
    fn settings_serialize_with_names() {
        let preset = Preset::new("4k", BTreeMap::from([(SettingKind::Resolution, 1)]));
        let json = serde_json::to_value(&preset).unwrap();
        assert_eq!(json["settings"]["resolution"], 1);
        let back: Preset = serde_json::from_value(json).unwrap();
        assert_eq!(back.settings, preset.settings);
    }
}
