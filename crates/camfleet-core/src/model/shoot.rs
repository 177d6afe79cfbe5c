// ── Shoot / take types ──

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Serial;

/// A downloaded file attached to a take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeFile {
    pub serial: Serial,
    pub filename: String,
    pub path: PathBuf,
    #[serde(default)]
    pub size_bytes: u64,
}

/// One synchronized start/stop interval within a shoot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Take {
    pub take_number: u32,
    pub name: String,
    /// Participants captured when the take started.
    pub cameras: Vec<Serial>,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: Vec<TakeFile>,
    /// Created by hand rather than by a recording command.
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub downloaded: bool,
}

impl Take {
    pub fn in_progress(&self) -> bool {
        self.stopped_at.is_none()
    }
}

/// A named recording session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shoot {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    /// Highest take number ever issued. Never decremented, so deleted
    /// numbers are not reused.
    pub current_take_number: u32,
    #[serde(default)]
    pub takes: Vec<Take>,
}

impl Shoot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
            active: false,
            current_take_number: 0,
            takes: Vec::new(),
        }
    }

    pub fn take_in_progress(&self) -> Option<&Take> {
        self.takes.iter().find(|t| t.in_progress())
    }

    pub fn take(&self, number: u32) -> Option<&Take> {
        self.takes.iter().find(|t| t.take_number == number)
    }

    pub(crate) fn take_mut(&mut self, number: u32) -> Option<&mut Take> {
        self.takes.iter_mut().find(|t| t.take_number == number)
    }

    pub(crate) fn next_take_number(&mut self) -> u32 {
        self.current_take_number += 1;
        self.current_take_number
    }
}

/// Persisted shoot history, `shoots.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShootBook {
    #[serde(default)]
    pub shoots: Vec<Shoot>,
    #[serde(default)]
    pub active_shoot_id: Option<Uuid>,
}

impl ShootBook {
    pub fn get(&self, id: Uuid) -> Option<&Shoot> {
        self.shoots.iter().find(|s| s.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: Uuid) -> Option<&mut Shoot> {
        self.shoots.iter_mut().find(|s| s.id == id)
    }

    pub fn active(&self) -> Option<&Shoot> {
        self.active_shoot_id.and_then(|id| self.get(id))
    }

    pub(crate) fn active_mut(&mut self) -> Option<&mut Shoot> {
        let id = self.active_shoot_id?;
        self.get_mut(id)
    }

    pub fn session_state(&self) -> SessionState {
        match self.active() {
            None => SessionState::NoActiveShoot,
            Some(shoot) => match shoot.take_in_progress() {
                Some(take) => SessionState::Recording {
                    shoot_id: shoot.id,
                    take: take.take_number,
                },
                None => SessionState::ShootActive {
                    shoot_id: shoot.id,
                    current_take: shoot.current_take_number,
                },
            },
        }
    }
}

/// Where the recording session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    NoActiveShoot,
    ShootActive { shoot_id: Uuid, current_take: u32 },
    Recording { shoot_id: Uuid, take: u32 },
}
