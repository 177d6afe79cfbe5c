// ── Health monitor ──
//
// Fixed-interval fleet poll, independent of user commands. Each tick
// refreshes the connection flag, probes home-network reachability for
// cameras holding a credential, reads battery and storage over the
// short-range link, then broadcasts one `fleet_status` snapshot.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, trace};

use crate::cohn::NetworkTransportManager;
use crate::connection::ConnectionManager;
use crate::control::CameraControl;
use crate::error::CoreError;
use crate::fanout::fan_out;
use crate::hub::{BroadcastHub, FleetSnapshot, HubMessage};
use crate::model::{CameraHealth, CohnState, FleetResult, Serial};
use crate::shoot::ShootSessionManager;
use crate::store::CameraRegistry;

pub struct HealthMonitor {
    registry: Arc<CameraRegistry>,
    control: Arc<CameraControl>,
    connections: Arc<ConnectionManager>,
    cohn: Arc<NetworkTransportManager>,
    shoots: Arc<ShootSessionManager>,
    hub: Arc<BroadcastHub>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<CameraRegistry>,
        control: Arc<CameraControl>,
        connections: Arc<ConnectionManager>,
        cohn: Arc<NetworkTransportManager>,
        shoots: Arc<ShootSessionManager>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            registry,
            control,
            connections,
            cohn,
            shoots,
            hub,
        }
    }

    /// Battery and storage for every registered camera over its control
    /// route.
    pub async fn query_all(&self) -> FleetResult<CameraHealth> {
        FleetResult::from_outcomes(
            fan_out(self.registry.serials(), |serial| async move {
                self.control.health(&serial).await
            })
            .await,
        )
    }

    /// One poll tick over the whole fleet. Per-camera faults are logged
    /// and never stop the tick.
    pub async fn poll_once(&self) -> FleetSnapshot {
        let serials = self.registry.serials();
        trace!(cameras = serials.len(), "health poll");
        join_all(serials.iter().map(|serial| self.poll_camera(serial))).await;
        self.publish_snapshot().await
    }

    async fn poll_camera(&self, serial: &Serial) {
        if let Err(e) = self.connections.refresh_flag(serial).await {
            debug!(%serial, error = %e, "connection refresh failed");
            return;
        }
        let Some(camera) = self.registry.get(serial) else {
            return;
        };
        if matches!(camera.cohn_state, CohnState::Online | CohnState::Offline) {
            if let Err(e) = self.cohn.status(serial).await {
                debug!(%serial, error = %e, "home-network probe failed");
            }
        }
        // A successful probe already refreshed battery and storage.
        if camera.connected {
            if let Err(e) = self.control.health(serial).await {
                debug!(%serial, error = %e, "health read failed");
            }
        }
    }

    /// One pass of the fast connection watcher. Returns how many flags
    /// changed; each change was already published as `camera_connection`.
    pub async fn watch_connections_once(&self) -> usize {
        let serials = self.registry.serials();
        let changes = join_all(
            serials
                .iter()
                .map(|serial| self.connections.refresh_flag(serial)),
        )
        .await;
        changes
            .into_iter()
            .filter(|change| matches!(change, Ok(Some(_))))
            .count()
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub async fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            cameras: self
                .registry
                .snapshot()
                .iter()
                .map(|cam| cam.as_ref().clone())
                .collect(),
            session: self.shoots.session_state().await,
            active_network: self.cohn.active_network(),
            taken_at: Utc::now(),
        }
    }

    /// Broadcast the current snapshot and return it.
    pub async fn publish_snapshot(&self) -> FleetSnapshot {
        let snapshot = self.snapshot().await;
        let delivered = self.hub.publish(HubMessage::FleetStatus(snapshot.clone()));
        trace!(delivered, "fleet status published");
        snapshot
    }

    /// Battery and storage of one camera.
    pub async fn query(&self, serial: &Serial) -> Result<CameraHealth, CoreError> {
        self.control.health(serial).await
    }
}
