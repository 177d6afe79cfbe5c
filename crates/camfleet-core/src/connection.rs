// ── Connection manager ──
//
// Short-range link lifecycle per camera: connect, disconnect, discovery,
// and reconciliation of the stored `connected` flag against the live
// link. Per-camera failures land in the fleet result; only a missing host
// adapter fails a whole call.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use camfleet_api::{DeviceTarget, ShortRangeSdk};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::fanout::{collect_outcomes, fan_out};
use crate::hub::{BroadcastHub, HubMessage};
use crate::model::{Camera, DiscoveredCamera, FleetResult, Serial};
use crate::retry::RetryConfig;
use crate::store::CameraRegistry;
use crate::transport::TransportKind;

pub struct ConnectionManager {
    registry: Arc<CameraRegistry>,
    sdk: Arc<dyn ShortRangeSdk>,
    hub: Arc<BroadcastHub>,
    connect_timeout: Duration,
    /// Bound for the quick "is the link still up" check.
    check_timeout: Duration,
    retry: RetryConfig,
    /// Shared with the download orchestrator; held around access-point
    /// toggles so a connect never flips one mid-transfer.
    radio_lock: Arc<Mutex<()>>,
}

impl ConnectionManager {
    pub fn new(
        registry: Arc<CameraRegistry>,
        sdk: Arc<dyn ShortRangeSdk>,
        hub: Arc<BroadcastHub>,
        connect_timeout: Duration,
        check_timeout: Duration,
        retry: RetryConfig,
        radio_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            registry,
            sdk,
            hub,
            connect_timeout,
            check_timeout,
            retry,
            radio_lock,
        }
    }

    // ── Connect ──────────────────────────────────────────────────────

    pub async fn connect(&self, serial: &Serial) -> Result<FleetResult<()>, CoreError> {
        self.connect_many(vec![serial.clone()]).await
    }

    pub async fn connect_all(&self) -> Result<FleetResult<()>, CoreError> {
        self.connect_many(self.registry.serials()).await
    }

    pub async fn connect_many(&self, serials: Vec<Serial>) -> Result<FleetResult<()>, CoreError> {
        let outcomes =
            fan_out(serials, |serial| async move { self.connect_one(&serial).await }).await;
        let result = collect_outcomes(outcomes)?;
        info!(summary = %result.summary(), "connect finished");
        Ok(result)
    }

    /// Connect one camera. An already-live link only refreshes `last_seen`.
    pub async fn connect_one(&self, serial: &Serial) -> Result<(), CoreError> {
        let camera = self.registry.require(serial)?;

        if camera.connected && self.link_alive(serial).await {
            self.registry.update(serial, Camera::touch)?;
            debug!(%serial, "link already up");
            return Ok(());
        }

        let target = DeviceTarget {
            serial: serial.to_string(),
            address: camera.address.clone(),
        };
        let target = &target;
        let failure = self
            .retry
            .run(serial, move || self.try_connect(serial, target))
            .await
            .err();
        if let Some(err) = failure {
            warn!(%serial, error = %err, "connect failed");
            self.set_connected(serial, false)?;
            return Err(err);
        }

        let status = match timeout(self.connect_timeout, self.sdk.status(serial.as_str())).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                debug!(%serial, error = %e, "status read after connect failed");
                None
            }
            Err(_) => None,
        };
        {
            let _radio = self.radio_lock.lock().await;
            if let Err(e) = self.sdk.set_access_point(serial.as_str(), false).await {
                debug!(%serial, error = %e, "could not switch access point off");
            }
        }

        let (_, was_connected) = self.registry.update(serial, |cam| {
            let was = cam.connected;
            cam.connected = true;
            cam.touch();
            if let Some(status) = &status {
                cam.battery_level = status.battery_percent.or(cam.battery_level);
                cam.storage_remaining_kb = status.space_remaining_kb.or(cam.storage_remaining_kb);
                if !status.encoding {
                    cam.recording = false;
                }
            }
            was
        })?;
        if !was_connected {
            self.announce(serial, true);
        }
        info!(%serial, "connected");
        Ok(())
    }

    /// One bounded link attempt.
    async fn try_connect(&self, serial: &Serial, target: &DeviceTarget) -> Result<(), CoreError> {
        match timeout(self.connect_timeout, self.sdk.connect(target)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CoreError::from_device(serial, TransportKind::ShortRange, e)),
            Err(_) => Err(CoreError::TransportUnavailable {
                serial: serial.to_string(),
                transport: TransportKind::ShortRange.to_string(),
                reason: format!(
                    "connect timed out after {}s",
                    self.connect_timeout.as_secs()
                ),
            }),
        }
    }

    // ── Disconnect ───────────────────────────────────────────────────

    /// Tear down the link. Local state is cleared even if the camera errors.
    pub async fn disconnect(&self, serial: &Serial) -> Result<(), CoreError> {
        self.registry.require(serial)?;
        let teardown = timeout(
            self.check_timeout.max(Duration::from_secs(5)),
            self.sdk.disconnect(serial.as_str()),
        )
        .await;
        match teardown {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(%serial, error = %e, "disconnect errored, clearing local state"),
            Err(_) => warn!(%serial, "disconnect timed out, clearing local state"),
        }
        self.set_connected(serial, false)
    }

    pub async fn disconnect_all(&self) -> FleetResult<()> {
        let serials: Vec<Serial> = self
            .registry
            .snapshot()
            .iter()
            .filter(|cam| cam.connected)
            .map(|cam| cam.serial.clone())
            .collect();
        let outcomes =
            fan_out(serials, |serial| async move { self.disconnect(&serial).await }).await;
        FleetResult::from_outcomes(outcomes)
    }

    // ── Discovery ────────────────────────────────────────────────────

    /// Nearby cameras that are not registered yet, strongest signal first.
    /// Does not touch the registry.
    pub async fn discover(&self, scan_for: Duration) -> Result<Vec<DiscoveredCamera>, CoreError> {
        let adverts = self
            .sdk
            .scan(scan_for)
            .await
            .map_err(|e| CoreError::from_device(&"scan", TransportKind::ShortRange, e))?;

        let mut seen = HashSet::new();
        let mut found: Vec<DiscoveredCamera> = adverts
            .into_iter()
            .filter_map(|advert| {
                let serial = parse_advertised_serial(&advert.name)?;
                if self.registry.contains(&serial) || !seen.insert(serial.clone()) {
                    return None;
                }
                Some(DiscoveredCamera {
                    serial,
                    name: advert.name,
                    address: advert.address,
                    rssi: advert.rssi,
                })
            })
            .collect();
        found.sort_by(|a, b| b.rssi.cmp(&a.rssi).then_with(|| a.serial.cmp(&b.serial)));
        info!(count = found.len(), "discovery finished");
        Ok(found)
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Compare stored flags with the live links. A camera whose link
    /// dropped silently gets exactly one reconnect attempt. The value is
    /// whether the camera ends up connected.
    pub async fn check_connections(&self) -> Result<FleetResult<bool>, CoreError> {
        let outcomes = fan_out(self.registry.serials(), |serial| async move {
            self.reconcile(&serial).await
        })
        .await;
        collect_outcomes(outcomes)
    }

    async fn reconcile(&self, serial: &Serial) -> Result<bool, CoreError> {
        let stored = self.registry.require(serial)?.connected;
        let live = self.link_alive(serial).await;
        match (stored, live) {
            (true, false) => {
                info!(%serial, "link dropped, reconnecting once");
                self.set_connected(serial, false)?;
                self.connect_one(serial).await.map(|()| true)
            }
            (false, true) => {
                self.set_connected(serial, true)?;
                Ok(true)
            }
            (_, live) => Ok(live),
        }
    }

    /// Refresh the stored flag from the live link without reconnecting.
    /// Returns `Some(new)` when the flag changed.
    pub async fn refresh_flag(&self, serial: &Serial) -> Result<Option<bool>, CoreError> {
        let stored = self.registry.require(serial)?.connected;
        let live = self.link_alive(serial).await;
        if stored == live {
            return Ok(None);
        }
        self.set_connected(serial, live)?;
        Ok(Some(live))
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn link_alive(&self, serial: &Serial) -> bool {
        timeout(self.check_timeout, self.sdk.is_connected(serial.as_str()))
            .await
            .unwrap_or(false)
    }

    fn set_connected(&self, serial: &Serial, connected: bool) -> Result<(), CoreError> {
        let (_, changed) = self.registry.update(serial, |cam| {
            let changed = cam.connected != connected;
            cam.connected = connected;
            if connected {
                cam.touch();
            }
            changed
        })?;
        if changed {
            self.announce(serial, connected);
        }
        Ok(())
    }

    fn announce(&self, serial: &Serial, connected: bool) {
        self.hub.publish(HubMessage::CameraConnection {
            serial: serial.clone(),
            connected,
        });
    }
}

/// Serial from an advertised name: the four digits after `GoPro`, else the
/// last four digits anywhere in the name. Names without `GoPro` are not
/// cameras.
pub fn parse_advertised_serial(name: &str) -> Option<Serial> {
    let pos = name.find("GoPro")?;
    let after: String = name[pos + "GoPro".len()..]
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if after.len() >= 4 {
        return Some(Serial::new(&after[..4]));
    }
    let digits: Vec<char> = name.chars().filter(char::is_ascii_digit).collect();
    let tail = digits.len().checked_sub(4)?;
    Some(Serial::new(digits[tail..].iter().collect::<String>()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn serial_follows_the_brand_name() {
        assert_eq!(parse_advertised_serial("GoPro 1234").unwrap().as_str(), "1234");
        assert_eq!(parse_advertised_serial("GoPro5678XY").unwrap().as_str(), "5678");
    }

    #[test]
    fn serial_falls_back_to_last_four_digits() {
        assert_eq!(
            parse_advertised_serial("GoPro Hero12 C3461324698765").unwrap().as_str(),
            "8765"
        );
    }

    #[test]
    fn non_camera_names_are_ignored() {
        assert!(parse_advertised_serial("Headphones 1234").is_none());
        assert!(parse_advertised_serial("GoPro").is_none());
    }
}
