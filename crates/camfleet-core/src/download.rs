// ── Download orchestrator ──
//
// Moves media off cameras onto local storage. Each camera gets one job
// over the route `select_transport` picks for media:
//
// - home-network jobs run concurrently, one per camera;
// - access-point jobs hold the radio lock for their whole duration, so
//   they run one after another and never overlap other radio work.
//
// Inside a job files transfer one at a time; a failed file is recorded
// and the job moves on. Only a failure before any transfer (no route, no
// listing, cannot join the access point) fails the camera's job as a whole.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use camfleet_api::models::MediaFile;
use camfleet_api::{CameraHttpClient, ShortRangeSdk, TransportConfig, WifiRadio};
use chrono::{DateTime, Local, Utc};
use futures_util::future::join_all;
use secrecy::SecretString;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::cohn::NetworkTransportManager;
use crate::config::DownloadSettings;
use crate::error::CoreError;
use crate::hub::{BroadcastHub, DownloadProgress, HubMessage};
use crate::model::{
    CameraDownload, DeviceFailure, DownloadReport, FileOutcome, FileStatus, LocalFile,
    MediaSelection, Serial, ShootDownloadReport, TakeDownload, TakeFile,
};
use crate::retry::RetryConfig;
use crate::shoot::ShootSessionManager;
use crate::store::CameraRegistry;
use crate::transport::{Preference, Purpose, TransportKind, select_transport};

const FORBIDDEN_PATH_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replace characters that are not allowed in directory names.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if FORBIDDEN_PATH_CHARS.contains(&c) { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "untitled".into()
    } else {
        cleaned
    }
}

// ── Job planning ────────────────────────────────────────────────────

/// A stopped take, as a time window files are matched against.
struct TakeWindow {
    number: u32,
    cameras: Vec<Serial>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

struct ShootPlan {
    root: PathBuf,
    windows: Vec<TakeWindow>,
}

#[derive(Clone, Copy)]
enum Target<'a> {
    AdHoc(&'a MediaSelection),
    Shoot(&'a ShootPlan),
}

struct PlannedFile {
    file: MediaFile,
    dest: PathBuf,
    take: Option<u32>,
}

fn select_files(files: Vec<MediaFile>, selection: &MediaSelection) -> Vec<MediaFile> {
    match selection {
        MediaSelection::All => files,
        MediaSelection::Latest(n) => files.into_iter().take(*n).collect(),
        MediaSelection::LatestVideo => {
            files.into_iter().find(MediaFile::is_video).into_iter().collect()
        }
        MediaSelection::Named(names) => files
            .into_iter()
            .filter(|f| names.iter().any(|n| n.eq_ignore_ascii_case(&f.filename)))
            .collect(),
    }
}

fn capture_time(file: &MediaFile) -> Option<DateTime<Utc>> {
    file.created.or_else(|| {
        i64::try_from(file.modified)
            .ok()
            .filter(|secs| *secs > 0)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    })
}

// ── Access-point session ────────────────────────────────────────────

/// The controller's radio joined to one camera's access point.
struct ApSession {
    client: CameraHttpClient,
    ssid: String,
    previous: Option<String>,
    _radio: OwnedMutexGuard<()>,
}

pub struct DownloadOrchestrator {
    registry: Arc<CameraRegistry>,
    cohn: Arc<NetworkTransportManager>,
    sdk: Arc<dyn ShortRangeSdk>,
    radio: Arc<dyn WifiRadio>,
    shoots: Arc<ShootSessionManager>,
    hub: Arc<BroadcastHub>,
    /// The controller has one WiFi radio. Anything that moves it holds this.
    radio_lock: Arc<Mutex<()>>,
    settings: DownloadSettings,
    transport: TransportConfig,
    retry: RetryConfig,
}

impl DownloadOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<CameraRegistry>,
        cohn: Arc<NetworkTransportManager>,
        sdk: Arc<dyn ShortRangeSdk>,
        radio: Arc<dyn WifiRadio>,
        shoots: Arc<ShootSessionManager>,
        hub: Arc<BroadcastHub>,
        settings: DownloadSettings,
        transport: TransportConfig,
        retry: RetryConfig,
        radio_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            registry,
            cohn,
            sdk,
            radio,
            shoots,
            hub,
            radio_lock,
            settings,
            transport,
            retry,
        }
    }

    /// The radio lock, for other work that needs the WiFi radio.
    pub fn radio_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.radio_lock)
    }

    pub fn download_dir(&self) -> &Path {
        &self.settings.download_dir
    }

    // ── Ad-hoc downloads ─────────────────────────────────────────────

    pub async fn download_all(&self) -> DownloadReport {
        self.download_selected(self.registry.serials(), &MediaSelection::All)
            .await
    }

    pub async fn download_one(
        &self,
        serial: &Serial,
        selection: &MediaSelection,
    ) -> DownloadReport {
        self.download_selected(vec![serial.clone()], selection).await
    }

    pub async fn download_selected(
        &self,
        serials: Vec<Serial>,
        selection: &MediaSelection,
    ) -> DownloadReport {
        let report = self.run(serials, Target::AdHoc(selection)).await;
        info!(summary = %report.summary(), "download finished");
        report
    }

    // ── Shoot downloads ──────────────────────────────────────────────

    /// Download every stopped take of a shoot into
    /// `{shoot}/Take_{nn}/GoPro{serial}/` and attach the files to their takes.
    pub async fn download_shoot(&self, shoot_id: Uuid) -> Result<ShootDownloadReport, CoreError> {
        let shoot = self.shoots.get(shoot_id).await?;
        let tolerance = chrono::Duration::from_std(self.settings.match_tolerance)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        let now = Utc::now();
        let windows: Vec<TakeWindow> = shoot
            .takes
            .iter()
            .filter(|t| !t.manual && !t.in_progress())
            .map(|t| TakeWindow {
                number: t.take_number,
                cameras: t.cameras.clone(),
                from: t.started_at - tolerance,
                to: t.stopped_at.unwrap_or(now) + tolerance,
            })
            .collect();

        let serials: Vec<Serial> = windows.iter().flat_map(|w| w.cameras.clone()).collect();

        let plan = ShootPlan {
            root: self.settings.download_dir.join(sanitize_name(&shoot.name)),
            windows,
        };
        let report = self.run(serials, Target::Shoot(&plan)).await;

        let mut takes = Vec::with_capacity(plan.windows.len());
        for window in &plan.windows {
            let files: Vec<TakeFile> = report
                .cameras
                .iter()
                .flat_map(|(serial, job)| {
                    job.files
                        .iter()
                        .filter(|f| f.take_number == Some(window.number) && f.is_present())
                        .map(move |f| TakeFile {
                            serial: serial.clone(),
                            filename: f.filename.clone(),
                            path: f.path.clone(),
                            size_bytes: f.size_bytes,
                        })
                })
                .collect();
            let success = window.cameras.iter().all(|serial| {
                report
                    .cameras
                    .get(serial)
                    .is_some_and(|job| job.fatal.is_none())
            });
            let count = files.len();
            if count > 0 || success {
                self.shoots
                    .attach_files(shoot_id, window.number, files, success)
                    .await?;
            }
            takes.push(TakeDownload {
                take_number: window.number,
                cameras: window.cameras.clone(),
                files: count,
                success,
            });
        }

        info!(shoot = %shoot.name, summary = %report.summary(), "shoot download finished");
        Ok(ShootDownloadReport {
            shoot_id,
            takes,
            report,
        })
    }

    // ── Camera-side media ────────────────────────────────────────────

    /// Files on the camera, newest first.
    pub async fn list_media(&self, serial: &Serial) -> Result<Vec<MediaFile>, CoreError> {
        match self.media_route(serial)? {
            TransportKind::DeviceAp => {
                let session = self.open_access_point(serial).await?;
                let listed = self
                    .list_with_retry(serial, &session.client, TransportKind::DeviceAp)
                    .await;
                self.close_access_point(serial, session).await;
                listed
            }
            kind => {
                let client = self.cohn.client(serial).await?;
                self.list_with_retry(serial, &client, kind).await
            }
        }
    }

    /// Delete everything on the camera's card. Refused while recording.
    pub async fn erase_sd(&self, serial: &Serial) -> Result<TransportKind, CoreError> {
        if self.registry.require(serial)?.recording {
            return Err(CoreError::conflict(format!(
                "camera {serial} is recording"
            )));
        }
        let kind = self.media_route(serial)?;
        let erased = match kind {
            TransportKind::DeviceAp => {
                let session = self.open_access_point(serial).await?;
                let erased = session.client.erase_all().await;
                self.close_access_point(serial, session).await;
                erased
            }
            _ => self.cohn.client(serial).await?.erase_all().await,
        };
        erased.map_err(|e| CoreError::from_device(serial, kind, e))?;
        warn!(%serial, via = %kind, "card erased");
        Ok(kind)
    }

    // ── Local files ──────────────────────────────────────────────────

    /// Downloaded files, optionally for one camera, sorted by path.
    pub async fn list_local(&self, serial: Option<&Serial>) -> Result<Vec<LocalFile>, CoreError> {
        let root = &self.settings.download_dir;
        let mut found = Vec::new();
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(local_error(&dir, &e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| local_error(&dir, &e))?
            {
                let path = entry.path();
                let meta = entry.metadata().await.map_err(|e| local_error(&path, &e))?;
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().is_some_and(|ext| ext == "part") {
                    continue;
                }
                let owner = serial_from_path(&path, root);
                if serial.is_some_and(|want| owner.as_ref() != Some(want)) {
                    continue;
                }
                found.push(LocalFile {
                    size_bytes: meta.len(),
                    modified: meta.modified().ok().map(DateTime::<Utc>::from),
                    serial: owner,
                    path,
                });
            }
        }
        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    // ── Engine ───────────────────────────────────────────────────────

    /// One job per distinct camera; repeated serials are collapsed.
    async fn run(&self, mut serials: Vec<Serial>, target: Target<'_>) -> DownloadReport {
        serials.sort();
        serials.dedup();
        let mut report = DownloadReport::default();
        let mut home = Vec::new();
        let mut access_point = Vec::new();

        for serial in serials {
            match self.media_route(&serial) {
                Ok(TransportKind::DeviceAp) => access_point.push(serial),
                Ok(_) => home.push(serial),
                Err(e) => {
                    debug!(%serial, error = %e, "no media route");
                    report
                        .cameras
                        .insert(serial, CameraDownload::fatal(None, DeviceFailure::from(e)));
                }
            }
        }
        debug!(
            home = home.len(),
            access_point = access_point.len(),
            "download jobs planned"
        );

        let home_jobs = join_all(home.into_iter().map(|serial| async move {
            let job = self.home_network_job(&serial, target).await;
            (serial, job)
        }));
        let access_point_jobs = async {
            let mut done = Vec::new();
            for serial in access_point {
                let job = self.access_point_job(&serial, target).await;
                done.push((serial, job));
            }
            done
        };
        let (home_done, access_point_done) = tokio::join!(home_jobs, access_point_jobs);
        report.cameras.extend(home_done.into_iter().chain(access_point_done));
        report
    }

    fn media_route(&self, serial: &Serial) -> Result<TransportKind, CoreError> {
        let camera = self.registry.require(serial)?;
        select_transport(&camera, Purpose::Media, Preference::Auto)
    }

    async fn home_network_job(&self, serial: &Serial, target: Target<'_>) -> CameraDownload {
        let kind = TransportKind::HomeNetwork;
        match self.cohn.client(serial).await {
            Ok(client) => self.transfer(serial, &client, kind, target).await,
            Err(e) => self.job_failed(serial, kind, &e),
        }
    }

    async fn access_point_job(&self, serial: &Serial, target: Target<'_>) -> CameraDownload {
        let kind = TransportKind::DeviceAp;
        let session = match self.open_access_point(serial).await {
            Ok(session) => session,
            Err(e) => return self.job_failed(serial, kind, &e),
        };
        let job = self.transfer(serial, &session.client, kind, target).await;
        self.close_access_point(serial, session).await;
        job
    }

    async fn transfer(
        &self,
        serial: &Serial,
        client: &CameraHttpClient,
        kind: TransportKind,
        target: Target<'_>,
    ) -> CameraDownload {
        let files = match self.list_with_retry(serial, client, kind).await {
            Ok(files) => files,
            Err(e) => return self.job_failed(serial, kind, &e),
        };
        let planned = self.plan(serial, files, target);
        let total = planned.len();
        debug!(%serial, via = %kind, files = total, "transferring");

        let mut outcomes = Vec::with_capacity(total);
        for (index, planned) in planned.into_iter().enumerate() {
            outcomes.push(self.transfer_file(serial, client, planned, index + 1, total).await);
        }

        let job = CameraDownload::finished(kind, outcomes);
        self.hub.publish(HubMessage::DownloadComplete {
            serial: serial.clone(),
            downloaded: job.downloaded(),
            skipped: job.skipped(),
            failed: job.failed(),
            bytes: job.bytes(),
        });
        job
    }

    async fn list_with_retry(
        &self,
        serial: &Serial,
        client: &CameraHttpClient,
        kind: TransportKind,
    ) -> Result<Vec<MediaFile>, CoreError> {
        self.retry
            .run(serial, move || async move {
                client
                    .list_media()
                    .await
                    .map_err(|e| CoreError::from_device(serial, kind, e))
            })
            .await
    }

    async fn transfer_file(
        &self,
        serial: &Serial,
        client: &CameraHttpClient,
        planned: PlannedFile,
        index: usize,
        total: usize,
    ) -> FileOutcome {
        let PlannedFile { file, dest, take } = planned;
        let status = if already_present(&dest, file.size_bytes).await {
            debug!(%serial, file = %file.filename, "already present");
            FileStatus::Skipped
        } else {
            match client.download(&file, &dest).await {
                Ok(bytes) => {
                    self.hub.publish(HubMessage::DownloadProgress(DownloadProgress {
                        serial: serial.clone(),
                        filename: file.filename.clone(),
                        index,
                        total,
                        bytes,
                    }));
                    FileStatus::Downloaded { bytes }
                }
                Err(e) => {
                    warn!(%serial, file = %file.filename, error = %e, "file transfer failed");
                    self.hub.publish(HubMessage::DownloadError {
                        serial: serial.clone(),
                        filename: Some(file.filename.clone()),
                        message: e.to_string(),
                    });
                    FileStatus::Failed {
                        error: e.to_string(),
                    }
                }
            }
        };
        FileOutcome {
            filename: file.filename,
            path: dest,
            size_bytes: file.size_bytes,
            take_number: take,
            status,
        }
    }

    fn plan(&self, serial: &Serial, files: Vec<MediaFile>, target: Target<'_>) -> Vec<PlannedFile> {
        match target {
            Target::AdHoc(selection) => {
                let dir = self.settings.download_dir.join(format!(
                    "{}_GoPro{serial}",
                    Local::now().format("%Y-%m-%d")
                ));
                select_files(files, selection)
                    .into_iter()
                    .map(|file| PlannedFile {
                        dest: dir.join(&file.filename),
                        file,
                        take: None,
                    })
                    .collect()
            }
            Target::Shoot(plan) => files
                .into_iter()
                .filter_map(|file| {
                    let at = capture_time(&file)?;
                    let window = plan.windows.iter().find(|w| {
                        w.cameras.contains(serial) && w.from <= at && at <= w.to
                    })?;
                    Some(PlannedFile {
                        dest: plan
                            .root
                            .join(format!("Take_{:02}", window.number))
                            .join(format!("GoPro{serial}"))
                            .join(&file.filename),
                        file,
                        take: Some(window.number),
                    })
                })
                .collect(),
        }
    }

    fn job_failed(&self, serial: &Serial, kind: TransportKind, err: &CoreError) -> CameraDownload {
        warn!(%serial, via = %kind, error = %err, "download job failed");
        self.hub.publish(HubMessage::DownloadError {
            serial: serial.clone(),
            filename: None,
            message: err.to_string(),
        });
        CameraDownload::fatal(Some(kind), DeviceFailure::from(err))
    }

    // ── Access point ─────────────────────────────────────────────────

    /// Take the radio, switch the camera's access point on, wait for it to
    /// settle, and join it. The radio lock is held until the session closes.
    async fn open_access_point(&self, serial: &Serial) -> Result<ApSession, CoreError> {
        let radio = Arc::clone(&self.radio_lock).lock_owned().await;
        let camera = self.registry.require(serial)?;
        let (Some(ssid), Some(password)) = (camera.wifi_ssid.clone(), camera.wifi_password.clone())
        else {
            return Err(CoreError::validation(
                "wifi",
                format!("access point login for camera {serial} is unknown"),
            ));
        };
        let ap_url = Url::parse(&self.settings.ap_url)
            .map_err(|e| CoreError::validation("ap_url", e.to_string()))?;

        let previous = match self.radio.current_network().await {
            Ok(current) => current.filter(|s| *s != ssid),
            Err(e) => {
                debug!(error = %e, "could not read the current network");
                None
            }
        };

        self.sdk
            .set_access_point(serial.as_str(), true)
            .await
            .map_err(|e| CoreError::from_device(serial, TransportKind::ShortRange, e))?;
        debug!(%serial, settle = ?self.settings.ap_settle, "access point on, settling");
        sleep(self.settings.ap_settle).await;

        if let Err(e) = self.radio.join(&ssid, &SecretString::from(password)).await {
            self.restore_radio(serial, &ssid, previous.as_deref()).await;
            return Err(CoreError::from_device(serial, TransportKind::DeviceAp, e));
        }
        info!(%serial, ssid, "joined camera access point");

        let client = match CameraHttpClient::access_point(
            ap_url,
            &self.transport,
            self.settings.media_timeout,
        ) {
            Ok(client) => client,
            Err(e) => {
                self.restore_radio(serial, &ssid, previous.as_deref()).await;
                return Err(e.into());
            }
        };
        Ok(ApSession {
            client,
            ssid,
            previous,
            _radio: radio,
        })
    }

    async fn close_access_point(&self, serial: &Serial, session: ApSession) {
        self.restore_radio(serial, &session.ssid, session.previous.as_deref())
            .await;
        // Dropping the session releases the radio.
    }

    /// Leave the camera's network, rejoin the previous one if its password
    /// is known, and switch the access point off. Every step is best effort.
    async fn restore_radio(&self, serial: &Serial, ssid: &str, previous: Option<&str>) {
        if let Err(e) = self.radio.leave(ssid).await {
            debug!(ssid, error = %e, "leaving access point failed");
        }
        if let Some(previous) = previous {
            match self.cohn.network_password(previous) {
                Some(password) => {
                    if let Err(e) = self.radio.join(previous, &password).await {
                        warn!(ssid = previous, error = %e, "could not rejoin previous network");
                    }
                }
                None => debug!(ssid = previous, "no password for previous network"),
            }
        }
        if let Err(e) = self.sdk.set_access_point(serial.as_str(), false).await {
            debug!(%serial, error = %e, "could not switch access point off");
        }
    }
}

async fn already_present(dest: &Path, expected: u64) -> bool {
    match tokio::fs::metadata(dest).await {
        Ok(meta) => meta.is_file() && (expected == 0 || meta.len() == expected),
        Err(_) => false,
    }
}

/// `GoPro{serial}` or `{date}_GoPro{serial}` anywhere between `root` and the file.
fn serial_from_path(path: &Path, root: &Path) -> Option<Serial> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .parent()?
        .components()
        .rev()
        .find_map(|component| {
            let name = component.as_os_str().to_str()?;
            let pos = name.find("GoPro")?;
            let serial = &name[pos + "GoPro".len()..];
            (!serial.is_empty()).then(|| Serial::new(serial))
        })
}

fn local_error(path: &Path, err: &std::io::Error) -> CoreError {
    CoreError::Store {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn media(name: &str, modified: u64) -> MediaFile {
        MediaFile {
            directory: "100GOPRO".into(),
            filename: name.into(),
            size_bytes: 1,
            created: None,
            modified,
        }
    }

    #[test]
    fn sanitize_replaces_forbidden_characters() {
        assert_eq!(sanitize_name("Day 1: Beach/Sunset?"), "Day 1_ Beach_Sunset_");
        assert_eq!(sanitize_name("   "), "untitled");
    }

    #[test]
    fn selections_pick_from_newest_first_lists() {
        let files = vec![
            media("GX010003.MP4", 3),
            media("GOPR0002.JPG", 2),
            media("GX010001.MP4", 1),
        ];
        assert_eq!(select_files(files.clone(), &MediaSelection::Latest(2)).len(), 2);
        let latest = select_files(files.clone(), &MediaSelection::LatestVideo);
        assert_eq!(latest[0].filename, "GX010003.MP4");
        let named = select_files(files, &MediaSelection::Named(vec!["gopr0002.jpg".into()]));
        assert_eq!(named[0].filename, "GOPR0002.JPG");
    }

    #[test]
    fn serial_is_read_from_camera_directories() {
        let root = Path::new("/dl");
        assert_eq!(
            serial_from_path(Path::new("/dl/2024-05-01_GoPro1234/GX01.MP4"), root),
            Some(Serial::from("1234"))
        );
        assert_eq!(
            serial_from_path(Path::new("/dl/Beach/Take_01/GoPro5678/GX01.MP4"), root),
            Some(Serial::from("5678"))
        );
        assert_eq!(serial_from_path(Path::new("/dl/misc/file.bin"), root), None);
    }

    #[test]
    fn capture_time_falls_back_to_modified() {
        let file = media("a.MP4", 1_700_000_000);
        assert_eq!(capture_time(&file).unwrap().timestamp(), 1_700_000_000);
    }
}
