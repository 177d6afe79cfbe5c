// ── Shoot session manager ──
//
// Named recording sessions and their numbered takes, persisted to
// `shoots.json`. Invariants held here:
//
// - at most one shoot is active;
// - at most one take per shoot is in progress;
// - take numbers only grow, so deleting a take never frees its number.
//
// Every mutation validates against a clone of the book, writes the clone,
// and only then commits it. A rejected or failed write leaves no trace.

use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{SessionState, Serial, Shoot, ShootBook, Take, TakeFile};
use crate::store::json_file::JsonFile;

pub struct ShootSessionManager {
    book: Mutex<ShootBook>,
    file: JsonFile<ShootBook>,
}

impl ShootSessionManager {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let file = JsonFile::new(path);
        let mut book: ShootBook = file.load().await?;
        // The pointer is authoritative; repair flags that disagree with it.
        let active = book.active_shoot_id;
        for shoot in &mut book.shoots {
            shoot.active = Some(shoot.id) == active;
        }
        if active.is_some() && book.active().is_none() {
            book.active_shoot_id = None;
        }
        info!(shoots = book.shoots.len(), "shoot history loaded");
        Ok(Self {
            book: Mutex::new(book),
            file,
        })
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub async fn list(&self) -> Vec<Shoot> {
        self.book.lock().await.shoots.clone()
    }

    pub async fn get(&self, id: Uuid) -> Result<Shoot, CoreError> {
        self.book
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| shoot_not_found(id))
    }

    pub async fn active(&self) -> Option<Shoot> {
        self.book.lock().await.active().cloned()
    }

    pub async fn session_state(&self) -> SessionState {
        self.book.lock().await.session_state()
    }

    pub async fn take_files(
        &self,
        shoot_id: Uuid,
        number: u32,
    ) -> Result<Vec<TakeFile>, CoreError> {
        let book = self.book.lock().await;
        let shoot = book.get(shoot_id).ok_or_else(|| shoot_not_found(shoot_id))?;
        shoot
            .take(number)
            .map(|take| take.files.clone())
            .ok_or_else(|| take_not_found(shoot_id, number))
    }

    /// Fails with `Conflict` if a take could not start right now.
    pub async fn ensure_can_start_take(&self) -> Result<(), CoreError> {
        let book = self.book.lock().await;
        let shoot = book
            .active()
            .ok_or_else(|| CoreError::conflict("no active shoot"))?;
        match shoot.take_in_progress() {
            Some(take) => Err(CoreError::conflict(format!(
                "take {} is already in progress",
                take.take_number
            ))),
            None => Ok(()),
        }
    }

    // ── Shoots ───────────────────────────────────────────────────────

    /// Appended inactive.
    pub async fn create_shoot(&self, name: &str) -> Result<Shoot, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("name", "must not be empty"));
        }
        let shoot = Shoot::new(name);
        let created = shoot.clone();
        self.mutate(|book| {
            book.shoots.push(shoot);
            Ok(())
        })
        .await?;
        info!(id = %created.id, name = %created.name, "shoot created");
        Ok(created)
    }

    /// Make `id` the active shoot. Refused while any camera is recording
    /// or while a different shoot is active; re-activating is a no-op.
    pub async fn set_active(&self, id: Uuid, any_recording: bool) -> Result<Shoot, CoreError> {
        if any_recording {
            return Err(CoreError::conflict(
                "cannot change the active shoot while cameras are recording",
            ));
        }
        let shoot = self
            .mutate(|book| {
                if book.get(id).is_none() {
                    return Err(shoot_not_found(id));
                }
                match book.active() {
                    Some(current) if current.id == id => {}
                    Some(current) => {
                        return Err(CoreError::conflict(format!(
                            "shoot '{}' is active; deactivate it first",
                            current.name
                        )));
                    }
                    None => {
                        book.active_shoot_id = Some(id);
                        if let Some(shoot) = book.get_mut(id) {
                            shoot.active = true;
                        }
                    }
                }
                book.get(id).cloned().ok_or_else(|| shoot_not_found(id))
            })
            .await?;
        info!(id = %shoot.id, name = %shoot.name, "shoot active");
        Ok(shoot)
    }

    /// Clear the active shoot. Refused while a take is in progress.
    pub async fn deactivate(&self) -> Result<Option<Shoot>, CoreError> {
        self.mutate(|book| {
            let Some(shoot) = book.active_mut() else {
                return Ok(None);
            };
            if let Some(take) = shoot.take_in_progress() {
                return Err(CoreError::conflict(format!(
                    "take {} is in progress; stop recording first",
                    take.take_number
                )));
            }
            shoot.active = false;
            let shoot = shoot.clone();
            book.active_shoot_id = None;
            Ok(Some(shoot))
        })
        .await
    }

    pub async fn delete_shoot(&self, id: Uuid) -> Result<Shoot, CoreError> {
        self.mutate(|book| {
            let pos = book
                .shoots
                .iter()
                .position(|s| s.id == id)
                .ok_or_else(|| shoot_not_found(id))?;
            if book.active_shoot_id == Some(id) {
                return Err(CoreError::conflict("cannot delete the active shoot"));
            }
            Ok(book.shoots.remove(pos))
        })
        .await
    }

    // ── Takes ────────────────────────────────────────────────────────

    /// Open the next take on the active shoot with `cameras` as participants.
    pub async fn start_take(&self, cameras: Vec<Serial>) -> Result<Take, CoreError> {
        let take = self
            .mutate(|book| {
                let shoot = book
                    .active_mut()
                    .ok_or_else(|| CoreError::conflict("no active shoot"))?;
                if let Some(take) = shoot.take_in_progress() {
                    return Err(CoreError::conflict(format!(
                        "take {} is already in progress",
                        take.take_number
                    )));
                }
                let number = shoot.next_take_number();
                let take = Take {
                    take_number: number,
                    name: format!("Take {number}"),
                    cameras,
                    started_at: Utc::now(),
                    stopped_at: None,
                    files: Vec::new(),
                    manual: false,
                    downloaded: false,
                };
                shoot.takes.push(take.clone());
                Ok(take)
            })
            .await?;
        info!(take = take.take_number, cameras = take.cameras.len(), "take started");
        Ok(take)
    }

    /// Close the in-progress take. Errors (without side effects) if none.
    pub async fn stop_take(&self) -> Result<Take, CoreError> {
        let take = self
            .mutate(|book| {
                let shoot = book
                    .active_mut()
                    .ok_or_else(|| CoreError::conflict("no active shoot"))?;
                let take = shoot
                    .takes
                    .iter_mut()
                    .find(|t| t.in_progress())
                    .ok_or_else(|| CoreError::conflict("no take in progress"))?;
                take.stopped_at = Some(Utc::now());
                Ok(take.clone())
            })
            .await?;
        info!(take = take.take_number, "take stopped");
        Ok(take)
    }

    /// Record a take by hand, already stopped, on the shoot's counter.
    pub async fn create_manual_take(
        &self,
        shoot_id: Uuid,
        name: Option<String>,
        files: Vec<TakeFile>,
    ) -> Result<Take, CoreError> {
        self.mutate(|book| {
            let shoot = book.get_mut(shoot_id).ok_or_else(|| shoot_not_found(shoot_id))?;
            let number = shoot.next_take_number();
            let now = Utc::now();
            let mut cameras: Vec<Serial> = files.iter().map(|f| f.serial.clone()).collect();
            cameras.sort();
            cameras.dedup();
            let take = Take {
                take_number: number,
                name: name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| format!("Take {number}")),
                cameras,
                started_at: now,
                stopped_at: Some(now),
                downloaded: !files.is_empty(),
                files,
                manual: true,
            };
            shoot.takes.push(take.clone());
            Ok(take)
        })
        .await
    }

    pub async fn update_take(
        &self,
        shoot_id: Uuid,
        number: u32,
        name: Option<String>,
        files: Option<Vec<TakeFile>>,
    ) -> Result<Take, CoreError> {
        self.mutate(|book| {
            let take = take_mut(book, shoot_id, number)?;
            if let Some(name) = name {
                let name = name.trim();
                if name.is_empty() {
                    return Err(CoreError::validation("name", "must not be empty"));
                }
                name.clone_into(&mut take.name);
            }
            if let Some(files) = files {
                take.files = files;
            }
            Ok(take.clone())
        })
        .await
    }

    /// Add downloaded files to a take, skipping ones already attached.
    /// `complete` marks the take as fully downloaded.
    pub async fn attach_files(
        &self,
        shoot_id: Uuid,
        number: u32,
        files: Vec<TakeFile>,
        complete: bool,
    ) -> Result<Take, CoreError> {
        self.mutate(|book| {
            let take = take_mut(book, shoot_id, number)?;
            for file in files {
                let known = take
                    .files
                    .iter()
                    .any(|f| f.serial == file.serial && f.filename == file.filename);
                if !known {
                    take.files.push(file);
                }
            }
            take.downloaded |= complete;
            Ok(take.clone())
        })
        .await
    }

    /// Remove a stopped take. Remaining takes keep their numbers.
    pub async fn delete_take(&self, shoot_id: Uuid, number: u32) -> Result<Take, CoreError> {
        self.mutate(|book| {
            let shoot = book.get_mut(shoot_id).ok_or_else(|| shoot_not_found(shoot_id))?;
            let pos = shoot
                .takes
                .iter()
                .position(|t| t.take_number == number)
                .ok_or_else(|| take_not_found(shoot_id, number))?;
            if shoot.takes[pos].in_progress() {
                return Err(CoreError::conflict(format!(
                    "take {number} is in progress"
                )));
            }
            Ok(shoot.takes.remove(pos))
        })
        .await
    }

    async fn mutate<R>(
        &self,
        f: impl FnOnce(&mut ShootBook) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let mut book = self.book.lock().await;
        let mut next = book.clone();
        let out = f(&mut next)?;
        self.file.save(&next).await?;
        *book = next;
        Ok(out)
    }
}

fn take_mut(book: &mut ShootBook, shoot_id: Uuid, number: u32) -> Result<&mut Take, CoreError> {
    book.get_mut(shoot_id)
        .ok_or_else(|| shoot_not_found(shoot_id))?
        .take_mut(number)
        .ok_or_else(|| take_not_found(shoot_id, number))
}

fn shoot_not_found(id: Uuid) -> CoreError {
    CoreError::ShootNotFound { id: id.to_string() }
}

fn take_not_found(shoot: Uuid, take: u32) -> CoreError {
    CoreError::TakeNotFound {
        shoot: shoot.to_string(),
        take,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;

    use super::*;

    async fn manager() -> (tempfile::TempDir, ShootSessionManager) {
        let dir = tempfile::tempdir().unwrap();
        let mgr = ShootSessionManager::open(dir.path().join("shoots.json"))
            .await
            .unwrap();
        (dir, mgr)
    }

    fn cams() -> Vec<Serial> {
        vec![Serial::from("1111"), Serial::from("2222")]
    }

    #[tokio::test]
    async fn session_walks_through_its_states() {
        let (_dir, mgr) = manager().await;
        assert_eq!(mgr.session_state().await, SessionState::NoActiveShoot);

        let shoot = mgr.create_shoot("Beach").await.unwrap();
        assert!(!shoot.active);
        mgr.set_active(shoot.id, false).await.unwrap();
        assert_eq!(
            mgr.session_state().await,
            SessionState::ShootActive {
                shoot_id: shoot.id,
                current_take: 0
            }
        );

        mgr.start_take(cams()).await.unwrap();
        assert_eq!(
            mgr.session_state().await,
            SessionState::Recording {
                shoot_id: shoot.id,
                take: 1
            }
        );
        assert!(matches!(
            mgr.deactivate().await,
            Err(CoreError::Conflict { .. })
        ));

        mgr.stop_take().await.unwrap();
        assert_eq!(
            mgr.session_state().await,
            SessionState::ShootActive {
                shoot_id: shoot.id,
                current_take: 1
            }
        );
        mgr.deactivate().await.unwrap();
        assert_eq!(mgr.session_state().await, SessionState::NoActiveShoot);
    }

    #[tokio::test]
    async fn second_active_shoot_is_a_conflict() {
        let (_dir, mgr) = manager().await;
        let first = mgr.create_shoot("One").await.unwrap();
        let second = mgr.create_shoot("Two").await.unwrap();
        mgr.set_active(first.id, false).await.unwrap();

        let err = mgr.set_active(second.id, false).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
        let shoots = mgr.list().await;
        assert_eq!(shoots.iter().filter(|s| s.active).count(), 1);
        assert_eq!(mgr.active().await.unwrap().id, first.id);

        // Re-activating the active shoot changes nothing.
        mgr.set_active(first.id, false).await.unwrap();
    }

    #[tokio::test]
    async fn recording_blocks_activation() {
        let (_dir, mgr) = manager().await;
        let shoot = mgr.create_shoot("One").await.unwrap();
        let err = mgr.set_active(shoot.id, true).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
        assert!(mgr.active().await.is_none());
    }

    #[tokio::test]
    async fn take_numbers_are_never_reused() {
        let (_dir, mgr) = manager().await;
        let shoot = mgr.create_shoot("One").await.unwrap();
        mgr.set_active(shoot.id, false).await.unwrap();
        for _ in 0..3 {
            mgr.start_take(cams()).await.unwrap();
            mgr.stop_take().await.unwrap();
        }
        mgr.delete_take(shoot.id, 2).await.unwrap();
        mgr.delete_take(shoot.id, 3).await.unwrap();

        let next = mgr.start_take(cams()).await.unwrap();
        assert_eq!(next.take_number, 4);
        let numbers: Vec<u32> = mgr
            .get(shoot.id)
            .await
            .unwrap()
            .takes
            .iter()
            .map(|t| t.take_number)
            .collect();
        assert_eq!(numbers, vec![1, 4]);
    }

    #[tokio::test]
    async fn stop_without_a_take_is_an_error() {
        let (_dir, mgr) = manager().await;
        let shoot = mgr.create_shoot("One").await.unwrap();
        mgr.set_active(shoot.id, false).await.unwrap();
        assert!(matches!(
            mgr.stop_take().await,
            Err(CoreError::Conflict { .. })
        ));
        assert!(mgr.get(shoot.id).await.unwrap().takes.is_empty());
    }

    #[tokio::test]
    async fn in_progress_take_and_active_shoot_cannot_be_deleted() {
        let (_dir, mgr) = manager().await;
        let shoot = mgr.create_shoot("One").await.unwrap();
        mgr.set_active(shoot.id, false).await.unwrap();
        mgr.start_take(cams()).await.unwrap();

        assert!(matches!(
            mgr.delete_take(shoot.id, 1).await,
            Err(CoreError::Conflict { .. })
        ));
        assert!(matches!(
            mgr.delete_shoot(shoot.id).await,
            Err(CoreError::Conflict { .. })
        ));
        mgr.stop_take().await.unwrap();
        mgr.deactivate().await.unwrap();
        mgr.delete_shoot(shoot.id).await.unwrap();
        assert!(mgr.list().await.is_empty());
    }

    #[tokio::test]
    async fn manual_takes_share_the_counter_and_files_attach_once() {
        let (dir, mgr) = manager().await;
        let shoot = mgr.create_shoot("One").await.unwrap();
        mgr.set_active(shoot.id, false).await.unwrap();
        mgr.start_take(cams()).await.unwrap();
        mgr.stop_take().await.unwrap();

        let manual = mgr
            .create_manual_take(shoot.id, Some("B-roll".into()), Vec::new())
            .await
            .unwrap();
        assert_eq!(manual.take_number, 2);
        assert!(manual.manual);

        let file = TakeFile {
            serial: Serial::from("1111"),
            filename: "GX010001.MP4".into(),
            path: PathBuf::from("x/GX010001.MP4"),
            size_bytes: 10,
        };
        mgr.attach_files(shoot.id, 1, vec![file.clone()], false).await.unwrap();
        let take = mgr.attach_files(shoot.id, 1, vec![file], true).await.unwrap();
        assert_eq!(take.files.len(), 1);
        assert!(take.downloaded);

        let reopened = ShootSessionManager::open(dir.path().join("shoots.json"))
            .await
            .unwrap();
        assert_eq!(reopened.take_files(shoot.id, 1).await.unwrap().len(), 1);
        assert_eq!(reopened.active().await.unwrap().id, shoot.id);
    }
}
