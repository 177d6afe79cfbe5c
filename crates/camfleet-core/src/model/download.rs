// ── Download job types ──
//
// Ephemeral; nothing here is persisted.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DeviceFailure, Serial};
use crate::transport::TransportKind;

/// Which files to pull from a camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MediaSelection {
    All,
    /// The newest N files.
    Latest(usize),
    /// The newest video file only.
    LatestVideo,
    Named(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Downloaded { bytes: u64 },
    /// Already present locally.
    Skipped,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_number: Option<u32>,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileOutcome {
    /// File is on local storage after this job.
    pub fn is_present(&self) -> bool {
        matches!(
            self.status,
            FileStatus::Downloaded { .. } | FileStatus::Skipped
        )
    }
}

/// One camera's part of a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDownload {
    /// `None` when no transport could be selected.
    pub transport: Option<TransportKind>,
    pub files: Vec<FileOutcome>,
    /// Job-level failure (no route, listing failed, AP join failed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<DeviceFailure>,
    pub overall_success: bool,
}

impl CameraDownload {
    pub fn fatal(transport: Option<TransportKind>, failure: DeviceFailure) -> Self {
        Self {
            transport,
            files: Vec::new(),
            fatal: Some(failure),
            overall_success: false,
        }
    }

    pub fn finished(transport: TransportKind, files: Vec<FileOutcome>) -> Self {
        let overall_success = files.iter().all(FileOutcome::is_present);
        Self {
            transport: Some(transport),
            files,
            fatal: None,
            overall_success,
        }
    }

    pub fn downloaded(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed { .. }))
    }

    pub fn bytes(&self) -> u64 {
        self.files
            .iter()
            .map(|f| match f.status {
                FileStatus::Downloaded { bytes } => bytes,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.status)).count()
    }
}

/// `serial → CameraDownload` for every targeted camera.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadReport {
    pub cameras: BTreeMap<Serial, CameraDownload>,
}

impl DownloadReport {
    pub fn all_succeeded(&self) -> bool {
        self.cameras.values().all(|c| c.overall_success)
    }

    pub fn summary(&self) -> String {
        let ok = self.cameras.values().filter(|c| c.overall_success).count();
        format!("{ok}/{} cameras complete", self.cameras.len())
    }
}

/// Per-take verdict of a shoot download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeDownload {
    pub take_number: u32,
    pub cameras: Vec<Serial>,
    pub files: usize,
    /// Every participating camera finished without a job-level failure.
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShootDownloadReport {
    pub shoot_id: Uuid,
    pub takes: Vec<TakeDownload>,
    pub report: DownloadReport,
}

/// A file already on local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFile {
    pub path: PathBuf,
    pub serial: Option<Serial>,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}
