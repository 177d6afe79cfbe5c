// ── Per-device fleet outcomes ──
//
// Every fleet command answers with one entry per targeted camera. A
// partial failure is the normal shape, not an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::Display;

use super::Serial;
use crate::error::CoreError;

/// Coarse failure class for one camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    TransportUnavailable,
    NotProvisioned,
    Conflict,
    NotFound,
    Timeout,
    Device,
}

/// Why one camera's part of a fleet command failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// `serial → outcome` for a fleet command. The key set is exactly the set
/// of targeted cameras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FleetResult<T> {
    results: BTreeMap<Serial, Result<T, DeviceFailure>>,
}

impl<T> Default for FleetResult<T> {
    fn default() -> Self {
        Self {
            results: BTreeMap::new(),
        }
    }
}

impl<T> FleetResult<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw per-camera outcomes.
    pub fn from_outcomes(
        outcomes: impl IntoIterator<Item = (Serial, Result<T, CoreError>)>,
    ) -> Self {
        outcomes
            .into_iter()
            .map(|(serial, r)| (serial, r.map_err(DeviceFailure::from)))
            .collect()
    }

    pub fn insert(&mut self, serial: Serial, outcome: Result<T, DeviceFailure>) {
        self.results.insert(serial, outcome);
    }

    pub fn get(&self, serial: &Serial) -> Option<&Result<T, DeviceFailure>> {
        self.results.get(serial)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Serial, &Result<T, DeviceFailure>)> {
        self.results.iter()
    }

    pub fn serials(&self) -> impl Iterator<Item = &Serial> {
        self.results.keys()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&Serial, &T)> {
        self.results
            .iter()
            .filter_map(|(s, r)| r.as_ref().ok().map(|v| (s, v)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Serial, &DeviceFailure)> {
        self.results
            .iter()
            .filter_map(|(s, r)| r.as_ref().err().map(|e| (s, e)))
    }

    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn is_complete_success(&self) -> bool {
        self.results.values().all(Result::is_ok)
    }

    /// "N/M succeeded".
    pub fn summary(&self) -> String {
        format!("{}/{} succeeded", self.success_count(), self.len())
    }

    /// Turn any per-camera failure into [`CoreError::PartialFleetFailure`].
    pub fn into_strict(self) -> Result<Self, CoreError> {
        let total = self.len();
        let succeeded = self.success_count();
        if succeeded == total {
            Ok(self)
        } else {
            Err(CoreError::PartialFleetFailure {
                succeeded,
                failed: total - succeeded,
                total,
            })
        }
    }
}

impl<T> FromIterator<(Serial, Result<T, DeviceFailure>)> for FleetResult<T> {
    fn from_iter<I: IntoIterator<Item = (Serial, Result<T, DeviceFailure>)>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for FleetResult<T> {
    type Item = (Serial, Result<T, DeviceFailure>);
    type IntoIter = std::collections::btree_map::IntoIter<Serial, Result<T, DeviceFailure>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
