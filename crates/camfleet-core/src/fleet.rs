// ── Fleet facade ──
//
// Owns every component, the background tasks, and the command router.
// Cheap to clone; all clones share one `FleetInner`.

use std::sync::Arc;
use std::time::Duration;

use camfleet_api::{AddressTable, ShortRangeSdk, WifiRadio};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cohn::NetworkTransportManager;
use crate::command::{Command, CommandResult, RecordingOutcome};
use crate::config::FleetConfig;
use crate::connection::ConnectionManager;
use crate::control::CameraControl;
use crate::download::DownloadOrchestrator;
use crate::error::CoreError;
use crate::fanout::{collect_outcomes, fan_out};
use crate::health::HealthMonitor;
use crate::hub::{BroadcastHub, FleetSnapshot, HubMessage, HubSink, RecordingEvent, SubscriberId};
use crate::model::{Camera, FleetResult, Serial, SessionState};
use crate::preset::PresetManager;
use crate::shoot::ShootSessionManager;
use crate::store::{CameraRegistry, CredentialStore};
use crate::stream::SnapshotStream;
use crate::transport::{Preference, TransportKind};

/// The outside world the fleet talks through.
#[derive(Clone)]
pub struct Collaborators {
    pub sdk: Arc<dyn ShortRangeSdk>,
    pub radio: Arc<dyn WifiRadio>,
    pub address_table: Arc<dyn AddressTable>,
}

/// The fleet orchestration core.
///
/// ```ignore
/// let fleet = Fleet::open(config, collaborators).await?;
/// fleet.start().await;
/// let outcome = fleet.execute(Command::Connect { serial: None }).await?;
/// fleet.shutdown().await;
/// ```
#[derive(Clone)]
pub struct Fleet {
    inner: Arc<FleetInner>,
}

struct FleetInner {
    config: FleetConfig,
    registry: Arc<CameraRegistry>,
    credentials: Arc<CredentialStore>,
    hub: Arc<BroadcastHub>,
    connections: Arc<ConnectionManager>,
    cohn: Arc<NetworkTransportManager>,
    control: Arc<CameraControl>,
    shoots: Arc<ShootSessionManager>,
    downloads: Arc<DownloadOrchestrator>,
    presets: Arc<PresetManager>,
    health: Arc<HealthMonitor>,
    cancel: CancellationToken,
    /// Child token for the current run of background tasks; replaced on
    /// every `start()` so the fleet can be restarted after `shutdown()`.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Fleet {
    /// Load the four stores and wire the components together. Nothing
    /// talks to a camera until a command or `start()`.
    pub async fn open(config: FleetConfig, with: Collaborators) -> Result<Self, CoreError> {
        let registry = Arc::new(CameraRegistry::open(config.cameras_path()).await?);
        let credentials = Arc::new(CredentialStore::open(config.credentials_path()).await?);
        if let Some(ssid) = config.active_network.clone() {
            if credentials.active_network().as_deref() != Some(ssid.as_str()) {
                credentials.set_active(Some(ssid)).await?;
            }
        }
        let hub = Arc::new(BroadcastHub::new(config.hub_capacity));
        // One WiFi radio and one access point per camera: connects and
        // access-point downloads take turns.
        let radio_lock = Arc::new(Mutex::new(()));

        let connections = Arc::new(ConnectionManager::new(
            Arc::clone(&registry),
            Arc::clone(&with.sdk),
            Arc::clone(&hub),
            config.connect_timeout,
            config.check_timeout,
            config.retry.clone(),
            Arc::clone(&radio_lock),
        ));
        let cohn = Arc::new(NetworkTransportManager::new(
            Arc::clone(&registry),
            Arc::clone(&credentials),
            Arc::clone(&with.sdk),
            Arc::clone(&with.address_table),
            Arc::clone(&hub),
            config.networks.clone(),
            config.cohn.clone(),
            config.download.media_timeout,
        ));
        cohn.sync_states().await?;

        let control = Arc::new(CameraControl::new(
            Arc::clone(&registry),
            Arc::clone(&with.sdk),
            Arc::clone(&cohn),
            config.retry.clone(),
        ));
        let shoots = Arc::new(ShootSessionManager::open(config.shoots_path()).await?);
        let downloads = Arc::new(DownloadOrchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&cohn),
            Arc::clone(&with.sdk),
            Arc::clone(&with.radio),
            Arc::clone(&shoots),
            Arc::clone(&hub),
            config.download.clone(),
            config.cohn.tls.clone(),
            config.retry.clone(),
            radio_lock,
        ));
        let presets =
            Arc::new(PresetManager::open(config.presets_path(), Arc::clone(&control)).await?);
        let health = Arc::new(HealthMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&control),
            Arc::clone(&connections),
            Arc::clone(&cohn),
            Arc::clone(&shoots),
            Arc::clone(&hub),
        ));

        info!(
            cameras = registry.len(),
            network = ?cohn.active_network(),
            "fleet opened"
        );

        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();
        Ok(Self {
            inner: Arc::new(FleetInner {
                config,
                registry,
                credentials,
                hub,
                connections,
                cohn,
                control,
                shoots,
                downloads,
                presets,
                health,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the health poll and the connection watcher. A second call
    /// while they run is a no-op.
    pub async fn start(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return;
        }
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let health_interval = self.inner.config.health_interval;
        if !health_interval.is_zero() {
            let fleet = self.clone();
            let cancel = child.clone();
            handles.push(tokio::spawn(health_poll_task(fleet, health_interval, cancel)));
        }

        let watch_interval = self.inner.config.connection_watch_interval;
        if !watch_interval.is_zero() {
            let fleet = self.clone();
            let cancel = child.clone();
            handles.push(tokio::spawn(connection_watch_task(fleet, watch_interval, cancel)));
        }
        info!(tasks = handles.len(), "background tasks started");
    }

    /// Cancel the background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel_child.lock().await.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("background tasks stopped");
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &FleetConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<CameraRegistry> {
        &self.inner.registry
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.inner.credentials
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.inner.hub
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.inner.connections
    }

    pub fn cohn(&self) -> &Arc<NetworkTransportManager> {
        &self.inner.cohn
    }

    pub fn control(&self) -> &Arc<CameraControl> {
        &self.inner.control
    }

    pub fn shoots(&self) -> &Arc<ShootSessionManager> {
        &self.inner.shoots
    }

    pub fn downloads(&self) -> &Arc<DownloadOrchestrator> {
        &self.inner.downloads
    }

    pub fn presets(&self) -> &Arc<PresetManager> {
        &self.inner.presets
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.inner.health
    }

    // ── State observation ────────────────────────────────────────────

    pub fn cameras_snapshot(&self) -> Arc<Vec<Arc<Camera>>> {
        self.inner.registry.snapshot()
    }

    pub fn cameras(&self) -> SnapshotStream<Camera> {
        self.inner.registry.subscribe()
    }

    pub async fn snapshot(&self) -> FleetSnapshot {
        self.inner.health.snapshot().await
    }

    /// Subscribe to the realtime feed with a bounded channel.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<Arc<HubMessage>>) {
        self.inner.hub.subscribe()
    }

    pub fn subscribe_sink(&self, sink: Arc<dyn HubSink>) -> SubscriberId {
        self.inner.hub.subscribe_sink(sink)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.hub.unsubscribe(id);
    }

    // ── Command execution ────────────────────────────────────────────

    /// Route a state-changing command, then broadcast a fresh snapshot.
    /// Failed commands change nothing and publish nothing.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let name = cmd.name();
        debug!(command = name, "executing");
        let result = self.route(cmd).await;
        match &result {
            Ok(_) => {
                self.inner.health.publish_snapshot().await;
            }
            Err(e) => warn!(command = name, error = %e, "command failed"),
        }
        result
    }

    #[allow(clippy::too_many_lines)]
    async fn route(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let inner = &self.inner;
        match cmd {
            // ── Cameras ──────────────────────────────────────────────
            Command::AddCamera {
                serial,
                name,
                address,
                wifi_ssid,
                wifi_password,
            } => {
                let camera = self
                    .add_camera(Camera {
                        address,
                        wifi_ssid,
                        wifi_password,
                        ..Camera::new(serial, name)
                    })
                    .await?;
                Ok(CommandResult::Camera(camera))
            }
            Command::RemoveCamera { serial } => {
                Ok(CommandResult::Camera(self.remove_camera(&serial).await?))
            }
            Command::RenameCamera { serial, name } => {
                let camera = inner.registry.rename(&serial, &name).await?;
                Ok(CommandResult::Camera(camera.as_ref().clone()))
            }
            Command::SetAccessPoint {
                serial,
                ssid,
                password,
            } => {
                let camera = inner
                    .registry
                    .set_access_point(&serial, ssid, password)
                    .await?;
                Ok(CommandResult::Camera(camera.as_ref().clone()))
            }
            Command::Connect { serial: Some(serial) } => Ok(CommandResult::Connections(
                inner.connections.connect(&serial).await?,
            )),
            Command::Connect { serial: None } => Ok(CommandResult::Connections(
                inner.connections.connect_all().await?,
            )),
            Command::Disconnect { serial: Some(serial) } => {
                inner.connections.disconnect(&serial).await?;
                Ok(CommandResult::Connections(FleetResult::from_iter([(
                    serial,
                    Ok(()),
                )])))
            }
            Command::Disconnect { serial: None } => Ok(CommandResult::Connections(
                inner.connections.disconnect_all().await,
            )),
            Command::CheckConnections => Ok(CommandResult::ConnectionCheck(
                inner.connections.check_connections().await?,
            )),

            // ── Recording ────────────────────────────────────────────
            Command::StartRecording { via } => {
                Ok(CommandResult::Recording(self.start_recording(via).await?))
            }
            Command::StopRecording { via } => {
                Ok(CommandResult::Recording(self.stop_recording(via).await?))
            }

            // ── Shoots / takes ───────────────────────────────────────
            Command::CreateShoot { name } => {
                Ok(CommandResult::Shoot(inner.shoots.create_shoot(&name).await?))
            }
            Command::ActivateShoot { id } => {
                let recording = inner.registry.snapshot().iter().any(|c| c.recording);
                let shoot = inner.shoots.set_active(id, recording).await?;
                self.shoot_changed().await;
                Ok(CommandResult::Shoot(shoot))
            }
            Command::DeactivateShoot => {
                let shoot = inner.shoots.deactivate().await?;
                self.shoot_changed().await;
                Ok(CommandResult::Deactivated(shoot))
            }
            Command::DeleteShoot { id } => {
                Ok(CommandResult::Shoot(inner.shoots.delete_shoot(id).await?))
            }
            Command::CreateTake {
                shoot_id,
                name,
                files,
            } => Ok(CommandResult::Take(
                inner
                    .shoots
                    .create_manual_take(shoot_id, name, files)
                    .await?,
            )),
            Command::UpdateTake {
                shoot_id,
                take,
                name,
                files,
            } => Ok(CommandResult::Take(
                inner.shoots.update_take(shoot_id, take, name, files).await?,
            )),
            Command::DeleteTake { shoot_id, take } => Ok(CommandResult::Take(
                inner.shoots.delete_take(shoot_id, take).await?,
            )),

            // ── Home network ─────────────────────────────────────────
            Command::Provision { serial } => {
                Ok(CommandResult::Cohn(inner.cohn.provision(&serial).await?))
            }
            Command::RemoveProvisioning { serial } => Ok(CommandResult::Cohn(
                inner.cohn.remove_provisioning(&serial).await?,
            )),
            Command::Reenable { serial: Some(serial) } => {
                Ok(CommandResult::Cohn(inner.cohn.reenable(&serial).await?))
            }
            Command::Reenable { serial: None } => {
                Ok(CommandResult::CohnFleet(inner.cohn.reenable_all().await))
            }
            Command::SetCohnIp { serial, ip } => {
                Ok(CommandResult::Cohn(inner.cohn.set_ip(&serial, ip).await?))
            }
            Command::SwitchNetwork { ssid } => Ok(CommandResult::Networks(
                inner.cohn.switch_network(&ssid).await?,
            )),

            // ── Downloads ────────────────────────────────────────────
            Command::Download { serials, selection } => {
                let serials = self.targets(serials)?;
                Ok(CommandResult::Download(
                    inner.downloads.download_selected(serials, &selection).await,
                ))
            }
            Command::DownloadShoot { shoot_id } => Ok(CommandResult::ShootDownload(
                inner.downloads.download_shoot(shoot_id).await?,
            )),
            Command::EraseSd { serial } => {
                Ok(CommandResult::Erased(inner.downloads.erase_sd(&serial).await?))
            }

            // ── Presets ──────────────────────────────────────────────
            Command::CreatePreset { name, settings } => Ok(CommandResult::Preset(
                inner.presets.create(&name, settings).await?,
            )),
            Command::UpdatePreset { name, settings } => Ok(CommandResult::Preset(
                inner.presets.update(&name, settings).await?,
            )),
            Command::DeletePreset { name } => {
                Ok(CommandResult::Preset(inner.presets.delete(&name).await?))
            }
            Command::TogglePresetPin { name } => {
                Ok(CommandResult::Preset(inner.presets.toggle_pin(&name).await?))
            }
            Command::CapturePreset { serial, name, via } => Ok(CommandResult::Preset(
                inner.presets.capture(&serial, &name, via).await?,
            )),
            Command::ApplyPreset { name, serials, via } => {
                let serials = self.targets(serials)?;
                Ok(CommandResult::PresetApplied(
                    inner.presets.apply(&name, serials, via).await?,
                ))
            }
        }
    }

    // ── Camera membership ────────────────────────────────────────────

    async fn add_camera(&self, camera: Camera) -> Result<Camera, CoreError> {
        let inner = &self.inner;
        let added = inner.registry.add(camera).await?;
        // A camera re-added after removal may still hold a credential.
        inner.cohn.sync_state(&added.serial).await?;
        inner.hub.publish(HubMessage::CameraAdded {
            serial: added.serial.clone(),
            name: added.name.clone(),
        });
        Ok(inner.registry.require(&added.serial)?.as_ref().clone())
    }

    /// Unregister a camera and drop its credentials on every network.
    async fn remove_camera(&self, serial: &Serial) -> Result<Camera, CoreError> {
        let inner = &self.inner;
        if inner.registry.require(serial)?.recording {
            return Err(CoreError::conflict(format!("camera {serial} is recording")));
        }
        // Credentials first, so a failed removal never strands them.
        let dropped = inner.credentials.remove_camera(serial).await?;
        let removed = match inner.registry.remove(serial).await {
            Ok(removed) => removed,
            Err(e) => {
                if let Err(restore) = inner.credentials.restore_camera(serial, dropped).await {
                    warn!(%serial, error = %restore, "could not restore credentials");
                }
                return Err(e);
            }
        };
        if !dropped.is_empty() {
            debug!(%serial, dropped = dropped.len(), "credentials removed with camera");
        }
        inner.hub.publish(HubMessage::CameraRemoved {
            serial: serial.clone(),
        });
        Ok(removed.as_ref().clone())
    }

    /// Explicit targets must be registered and are deduplicated; `None`
    /// means the whole fleet.
    fn targets(&self, serials: Option<Vec<Serial>>) -> Result<Vec<Serial>, CoreError> {
        match serials {
            None => Ok(self.inner.registry.serials()),
            Some(mut serials) => {
                serials.sort();
                serials.dedup();
                for serial in &serials {
                    self.inner.registry.require(serial)?;
                }
                Ok(serials)
            }
        }
    }

    // ── Recording ────────────────────────────────────────────────────

    /// Start every camera reachable over `via`, then open a take with the
    /// cameras that actually started. Refused while a take is running.
    pub async fn start_recording(&self, via: Preference) -> Result<RecordingOutcome, CoreError> {
        let inner = &self.inner;
        let targets: Vec<Serial> = inner
            .registry
            .snapshot()
            .iter()
            .filter(|cam| controllable(cam, via))
            .map(|cam| cam.serial.clone())
            .collect();
        if targets.is_empty() {
            return Err(CoreError::validation(
                "cameras",
                "no connected cameras to record with",
            ));
        }
        let shoot_active = inner.shoots.active().await.is_some();
        if shoot_active {
            inner.shoots.ensure_can_start_take().await?;
        }

        let cameras = self.shutter_all(targets, true, via).await?;
        let started: Vec<Serial> = cameras.succeeded().map(|(s, _)| s.clone()).collect();
        let take = if shoot_active && !started.is_empty() {
            Some(inner.shoots.start_take(started.clone()).await?)
        } else {
            None
        };
        info!(
            summary = %cameras.summary(),
            take = ?take.as_ref().map(|t| t.take_number),
            "recording started"
        );
        if !started.is_empty() {
            inner
                .hub
                .publish(HubMessage::RecordingStarted(RecordingEvent {
                    shoot_id: inner.shoots.active().await.map(|s| s.id),
                    take: take.as_ref().map(|t| t.take_number),
                    cameras: started,
                }));
            self.shoot_changed().await;
        }
        Ok(RecordingOutcome { take, cameras })
    }

    /// Stop every recording camera (every reachable one if none is
    /// flagged) and close the in-progress take, if any.
    pub async fn stop_recording(&self, via: Preference) -> Result<RecordingOutcome, CoreError> {
        let inner = &self.inner;
        let snapshot = inner.registry.snapshot();
        let recording: Vec<Serial> = snapshot
            .iter()
            .filter(|cam| cam.recording)
            .map(|cam| cam.serial.clone())
            .collect();
        let targets = if recording.is_empty() {
            snapshot
                .iter()
                .filter(|cam| controllable(cam, via))
                .map(|cam| cam.serial.clone())
                .collect()
        } else {
            recording
        };

        let cameras = self.shutter_all(targets, false, via).await?;
        let in_take = matches!(
            inner.shoots.session_state().await,
            SessionState::Recording { .. }
        );
        let take = if in_take {
            Some(inner.shoots.stop_take().await?)
        } else {
            None
        };
        info!(
            summary = %cameras.summary(),
            take = ?take.as_ref().map(|t| t.take_number),
            "recording stopped"
        );
        inner
            .hub
            .publish(HubMessage::RecordingStopped(RecordingEvent {
                shoot_id: inner.shoots.active().await.map(|s| s.id),
                take: take.as_ref().map(|t| t.take_number),
                cameras: cameras.succeeded().map(|(s, _)| s.clone()).collect(),
            }));
        self.shoot_changed().await;
        Ok(RecordingOutcome { take, cameras })
    }

    async fn shutter_all(
        &self,
        serials: Vec<Serial>,
        on: bool,
        via: Preference,
    ) -> Result<FleetResult<TransportKind>, CoreError> {
        let control = &self.inner.control;
        let outcomes = fan_out(serials, |serial| async move {
            control.set_shutter(&serial, on, via).await
        })
        .await;
        let result = collect_outcomes(outcomes)?;
        for (serial, failure) in result.failed() {
            warn!(%serial, error = %failure.message, on, "shutter command failed");
        }
        Ok(result)
    }

    async fn shoot_changed(&self) {
        let state = self.inner.shoots.session_state().await;
        self.inner.hub.publish(HubMessage::ShootChanged(state));
    }
}

/// The camera has a live control route matching `via`.
fn controllable(camera: &Camera, via: Preference) -> bool {
    match via {
        Preference::Auto => camera.reachable(),
        Preference::ShortRange => camera.connected,
        Preference::HomeNetwork => camera.cohn_online(),
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn health_poll_task(fleet: Fleet, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let snapshot = fleet.inner.health.poll_once().await;
                debug!(cameras = snapshot.cameras.len(), "health poll complete");
            }
        }
    }
}

async fn connection_watch_task(fleet: Fleet, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let changed = fleet.inner.health.watch_connections_once().await;
                if changed > 0 {
                    debug!(changed, "connection flags changed");
                }
            }
        }
    }
}
