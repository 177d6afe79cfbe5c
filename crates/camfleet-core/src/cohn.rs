// ── Network transport manager (COHN) ──
//
// Per (camera, network) state machine:
//
//   Unprovisioned ──provision──▶ Provisioning ──▶ Online
//        ▲                            ▲              │ probe fails,
//        │ remove_provisioning        │ reenable     ▼ no new address
//        └──────────── any ───────────┴─────────── Offline
//
// A failed probe first asks the address table where the camera's MAC
// lives now; only if that does not answer either does the camera go
// Offline. Offline never discards the credential.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use camfleet_api::models::{CameraState, HomeNetworkStatus, NetworkJoinState};
use camfleet_api::{AddressTable, CameraHttpClient, ShortRangeSdk, home_network_url};
use chrono::Utc;
use dashmap::DashMap;
use secrecy::SecretString;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::{CohnSettings, HomeNetwork};
use crate::error::CoreError;
use crate::fanout::fan_out;
use crate::hub::{BroadcastHub, HubMessage};
use crate::model::{
    CohnCredential, CohnState, CohnStatus, FleetResult, MacAddress, NetworkProfile, Serial,
};
use crate::store::{CameraRegistry, CredentialStore};
use crate::transport::TransportKind;

pub struct NetworkTransportManager {
    registry: Arc<CameraRegistry>,
    credentials: Arc<CredentialStore>,
    sdk: Arc<dyn ShortRangeSdk>,
    address_table: Arc<dyn AddressTable>,
    hub: Arc<BroadcastHub>,
    networks: Vec<HomeNetwork>,
    settings: CohnSettings,
    media_timeout: Duration,
    /// One provisioning run per camera at a time.
    provisioning: DashMap<Serial, Arc<Mutex<()>>>,
}

impl NetworkTransportManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<CameraRegistry>,
        credentials: Arc<CredentialStore>,
        sdk: Arc<dyn ShortRangeSdk>,
        address_table: Arc<dyn AddressTable>,
        hub: Arc<BroadcastHub>,
        networks: Vec<HomeNetwork>,
        settings: CohnSettings,
        media_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            credentials,
            sdk,
            address_table,
            hub,
            networks,
            settings,
            media_timeout,
            provisioning: DashMap::new(),
        }
    }

    pub fn active_network(&self) -> Option<String> {
        self.credentials.active_network()
    }

    /// Reflect stored credentials into the registry for the whole fleet.
    /// Used on load and after a network switch: every camera with a
    /// credential reads Offline until its first probe on this profile.
    pub async fn sync_states(&self) -> Result<(), CoreError> {
        for serial in self.registry.serials() {
            self.apply_credential(&serial, true).await?;
        }
        Ok(())
    }

    /// Reflect the stored credential for one camera. A camera that is
    /// already Online or Provisioning at the credential's address keeps
    /// its state; only a failed probe takes it Offline.
    pub async fn sync_state(&self, serial: &Serial) -> Result<(), CoreError> {
        self.apply_credential(serial, false).await
    }

    async fn apply_credential(&self, serial: &Serial, reset: bool) -> Result<(), CoreError> {
        let credential = match self.active_network() {
            Some(ssid) => self.credentials.get_for(&ssid, serial).await,
            None => None,
        };
        self.registry.update(serial, |cam| match &credential {
            Some(credential) => {
                let live = matches!(cam.cohn_state, CohnState::Online | CohnState::Provisioning)
                    && cam.cohn_ip == Some(credential.ip_address);
                if reset || !live {
                    cam.cohn_ip = Some(credential.ip_address);
                    cam.cohn_state = CohnState::Offline;
                }
            }
            None => {
                cam.cohn_ip = None;
                cam.cohn_state = CohnState::Unprovisioned;
            }
        })?;
        Ok(())
    }

    // ── Provisioning ─────────────────────────────────────────────────

    /// Put a short-range-connected camera on the active home network.
    pub async fn provision(&self, serial: &Serial) -> Result<CohnStatus, CoreError> {
        let camera = self.registry.require(serial)?;
        if !camera.connected {
            return Err(CoreError::TransportUnavailable {
                serial: serial.to_string(),
                transport: TransportKind::ShortRange.to_string(),
                reason: "not connected; connect before provisioning".into(),
            });
        }
        let ssid = self.active_network().ok_or(CoreError::NoActiveNetwork)?;
        let password = self.network_password(&ssid).ok_or_else(|| {
            CoreError::validation("network", format!("no password configured for '{ssid}'"))
        })?;

        let lock = Arc::clone(&self.provisioning.entry(serial.clone()).or_default());
        let Ok(_running) = lock.try_lock() else {
            return Err(CoreError::conflict(format!(
                "camera {serial} is already being provisioned"
            )));
        };

        let previous = camera.cohn_state;
        self.set_state(serial, CohnState::Provisioning)?;
        info!(%serial, ssid, "provisioning started");

        let run = timeout(
            self.settings.provision_timeout,
            self.run_provisioning(serial, &ssid, &password),
        )
        .await
        .unwrap_or_else(|_| {
            Err(CoreError::ProvisioningFailed {
                serial: serial.to_string(),
                reason: format!(
                    "gave up after {}s",
                    self.settings.provision_timeout.as_secs()
                ),
            })
        });

        let stored = match run {
            Ok(credential) => {
                let ip = credential.ip_address;
                self.credentials
                    .put(&ssid, serial, credential)
                    .await
                    .map(|()| ip)
            }
            Err(e) => Err(e),
        };
        match stored {
            Ok(ip) => {
                self.registry.update(serial, |cam| {
                    cam.cohn_state = CohnState::Online;
                    cam.cohn_ip = Some(ip);
                    cam.touch();
                })?;
                info!(%serial, %ip, ssid, "provisioned");
                Ok(self.announce(serial, CohnState::Online, Some(ip), None))
            }
            Err(e) => {
                warn!(%serial, error = %e, "provisioning failed");
                self.set_state(serial, previous)?;
                Err(e)
            }
        }
    }

    async fn run_provisioning(
        &self,
        serial: &Serial,
        ssid: &str,
        password: &SecretString,
    ) -> Result<CohnCredential, CoreError> {
        let short_range = |e| CoreError::from_device(serial, TransportKind::ShortRange, e);
        self.sdk
            .join_home_network(serial.as_str(), ssid, password)
            .await
            .map_err(short_range)?;

        let status = self.poll_join(serial).await?;
        let mac = status.mac_address.as_deref().map(MacAddress::new);

        let ip = match status.ip_address {
            Some(ip) => ip,
            None => self.lookup_mac(serial, mac.as_ref()).await.ok_or_else(|| {
                CoreError::ProvisioningFailed {
                    serial: serial.to_string(),
                    reason: format!(
                        "no address reported after {} polls",
                        self.settings.poll_attempts
                    ),
                }
            })?,
        };
        let password = status.password.ok_or_else(|| CoreError::ProvisioningFailed {
            serial: serial.to_string(),
            reason: "camera did not report a password".into(),
        })?;
        let certificate = self
            .sdk
            .create_home_network_certificate(serial.as_str())
            .await
            .map_err(short_range)?;

        Ok(CohnCredential {
            ip_address: ip,
            username: status
                .username
                .unwrap_or_else(|| self.settings.default_username.clone()),
            password,
            certificate,
            mac_address: mac,
            provisioned_at: Utc::now(),
        })
    }

    /// Poll until the camera reports an address or the attempts run out.
    /// Returns the last status seen; its address is `None` on exhaustion.
    async fn poll_join(&self, serial: &Serial) -> Result<HomeNetworkStatus, CoreError> {
        let mut last = HomeNetworkStatus::default();
        for attempt in 1..=self.settings.poll_attempts {
            match self.sdk.home_network_status(serial.as_str()).await {
                Ok(status) if status.state == NetworkJoinState::Failed => {
                    return Err(CoreError::ProvisioningFailed {
                        serial: serial.to_string(),
                        reason: "camera could not join the network".into(),
                    });
                }
                Ok(status)
                    if status.state == NetworkJoinState::Connected
                        && status.ip_address.is_some() =>
                {
                    debug!(%serial, attempt, "camera reported an address");
                    return Ok(status);
                }
                Ok(status) => {
                    debug!(%serial, attempt, state = ?status.state, "waiting for address");
                    last = HomeNetworkStatus {
                        ip_address: None,
                        ..status
                    };
                }
                Err(e) => debug!(%serial, attempt, error = %e, "status poll failed"),
            }
            if attempt < self.settings.poll_attempts {
                sleep(self.settings.poll_interval).await;
            }
        }
        Ok(last)
    }

    /// Run provisioning again for a camera that already has a credential.
    pub async fn reenable(&self, serial: &Serial) -> Result<CohnStatus, CoreError> {
        let ssid = self.active_network().ok_or(CoreError::NoActiveNetwork)?;
        if self.credentials.get_for(&ssid, serial).await.is_none() {
            return Err(CoreError::NotProvisioned {
                serial: serial.to_string(),
                network: ssid,
            });
        }
        self.provision(serial).await
    }

    /// Re-enable every camera currently Offline.
    pub async fn reenable_all(&self) -> FleetResult<CohnStatus> {
        let offline: Vec<Serial> = self
            .registry
            .snapshot()
            .iter()
            .filter(|cam| cam.cohn_state == CohnState::Offline)
            .map(|cam| cam.serial.clone())
            .collect();
        FleetResult::from_outcomes(
            fan_out(offline, |serial| async move { self.reenable(&serial).await }).await,
        )
    }

    /// Forget the active network's credential. Re-provisioning is the only way back.
    pub async fn remove_provisioning(&self, serial: &Serial) -> Result<CohnStatus, CoreError> {
        self.registry.require(serial)?;
        let ssid = self.active_network().ok_or(CoreError::NoActiveNetwork)?;
        let removed = self.credentials.remove(&ssid, serial).await?;
        self.registry.update(serial, |cam| {
            cam.cohn_state = CohnState::Unprovisioned;
            cam.cohn_ip = None;
        })?;
        if removed.is_some() {
            info!(%serial, ssid, "provisioning removed");
        }
        Ok(self.announce(serial, CohnState::Unprovisioned, None, None))
    }

    // ── Reachability ─────────────────────────────────────────────────

    /// Probe the stored address, recovering from an address change once.
    pub async fn status(&self, serial: &Serial) -> Result<CohnStatus, CoreError> {
        let camera = self.registry.require(serial)?;
        let Some(ssid) = self.active_network() else {
            self.set_state(serial, CohnState::Unprovisioned)?;
            return Ok(CohnStatus::unprovisioned(None));
        };
        let Some(credential) = self.credentials.get_for(&ssid, serial).await else {
            self.registry.update(serial, |cam| {
                cam.cohn_state = CohnState::Unprovisioned;
                cam.cohn_ip = None;
            })?;
            return Ok(CohnStatus::unprovisioned(Some(ssid)));
        };
        if camera.cohn_state == CohnState::Provisioning {
            return Ok(CohnStatus {
                state: CohnState::Provisioning,
                ip: camera.cohn_ip,
                network: Some(ssid),
                recovered_from: None,
            });
        }

        match self.probe(&credential).await {
            Ok(state) => {
                self.mark_online(serial, credential.ip_address, &state)?;
                let ip = credential.ip_address;
                return Ok(self.announce(serial, CohnState::Online, Some(ip), None));
            }
            Err(e) => debug!(%serial, ip = %credential.ip_address, error = %e, "probe failed"),
        }

        let recovered = self
            .lookup_mac(serial, credential.mac_address.as_ref())
            .await
            .filter(|ip| *ip != credential.ip_address);
        if let Some(ip) = recovered {
            let moved = credential.with_ip(ip);
            match self.probe(&moved).await {
                Ok(state) => {
                    self.credentials.update_ip(&ssid, serial, ip).await?;
                    self.mark_online(serial, ip, &state)?;
                    info!(%serial, from = %credential.ip_address, to = %ip, "address recovered");
                    return Ok(self.announce(
                        serial,
                        CohnState::Online,
                        Some(ip),
                        Some(credential.ip_address),
                    ));
                }
                Err(e) => debug!(%serial, %ip, error = %e, "probe at recovered address failed"),
            }
        }

        let (_, was) = self.registry.update(serial, |cam| {
            let was = cam.cohn_state;
            cam.cohn_state = CohnState::Offline;
            cam.cohn_ip = Some(credential.ip_address);
            was
        })?;
        if was == CohnState::Online {
            warn!(%serial, ip = %credential.ip_address, "camera went offline");
        }
        Ok(self.announce(serial, CohnState::Offline, Some(credential.ip_address), None))
    }

    pub async fn status_all(&self) -> FleetResult<CohnStatus> {
        FleetResult::from_outcomes(
            fan_out(self.registry.serials(), |serial| async move {
                self.status(&serial).await
            })
            .await,
        )
    }

    /// Manually point the active credential at `ip`, then probe it.
    pub async fn set_ip(&self, serial: &Serial, ip: IpAddr) -> Result<CohnStatus, CoreError> {
        self.registry.require(serial)?;
        let ssid = self.active_network().ok_or(CoreError::NoActiveNetwork)?;
        self.credentials.update_ip(&ssid, serial, ip).await?;
        self.registry.update(serial, |cam| cam.cohn_ip = Some(ip))?;
        self.status(serial).await
    }

    // ── Network profiles ─────────────────────────────────────────────

    /// Every network that is configured or has credentials.
    pub async fn networks(&self) -> Vec<NetworkProfile> {
        let active = self.active_network();
        let mut profiles: Vec<NetworkProfile> = self
            .credentials
            .networks()
            .await
            .into_iter()
            .map(|(ssid, cameras)| NetworkProfile {
                active: active.as_deref() == Some(ssid.as_str()),
                joinable: self.network_password(&ssid).is_some(),
                ssid,
                cameras,
            })
            .collect();
        for net in &self.networks {
            if !profiles.iter().any(|p| p.ssid == net.ssid) {
                profiles.push(NetworkProfile {
                    ssid: net.ssid.clone(),
                    cameras: Vec::new(),
                    active: active.as_deref() == Some(net.ssid.as_str()),
                    joinable: true,
                });
            }
        }
        profiles.sort_by(|a, b| a.ssid.cmp(&b.ssid));
        profiles
    }

    /// Point the fleet at another network profile. Nothing is re-provisioned.
    pub async fn switch_network(&self, ssid: &str) -> Result<Vec<NetworkProfile>, CoreError> {
        let ssid = ssid.trim();
        if ssid.is_empty() {
            return Err(CoreError::validation("ssid", "must not be empty"));
        }
        self.credentials.set_active(Some(ssid.to_owned())).await?;
        self.sync_states().await?;
        info!(ssid, "active network switched");
        Ok(self.networks().await)
    }

    // ── Clients ──────────────────────────────────────────────────────

    /// HTTP client for an Online camera on the active network.
    pub async fn client(&self, serial: &Serial) -> Result<CameraHttpClient, CoreError> {
        let camera = self.registry.require(serial)?;
        let ssid = self.active_network().ok_or(CoreError::NoActiveNetwork)?;
        let credential = self.credentials.get_for(&ssid, serial).await.ok_or_else(|| {
            CoreError::NotProvisioned {
                serial: serial.to_string(),
                network: ssid.clone(),
            }
        })?;
        if camera.cohn_state == CohnState::Offline {
            return Err(CoreError::StaleAddress {
                serial: serial.to_string(),
                ip: credential.ip_address.to_string(),
            });
        }
        self.http_client(&credential, self.settings.tls.timeout)
    }

    pub(crate) fn network_password(&self, ssid: &str) -> Option<SecretString> {
        self.networks
            .iter()
            .find(|n| n.ssid == ssid)
            .map(|n| n.password.clone())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn http_client(
        &self,
        credential: &CohnCredential,
        request_timeout: Duration,
    ) -> Result<CameraHttpClient, CoreError> {
        let base = home_network_url(
            &self.settings.scheme,
            credential.ip_address,
            self.settings.port,
        )?;
        let transport = self
            .settings
            .tls
            .clone()
            .with_timeout(request_timeout)
            .with_pinned_certificate(&credential.certificate);
        Ok(CameraHttpClient::home_network(
            base,
            credential.username.clone(),
            SecretString::from(credential.password.clone()),
            &transport,
            self.media_timeout,
        )?)
    }

    async fn probe(&self, credential: &CohnCredential) -> Result<CameraState, CoreError> {
        let client = self.http_client(credential, self.settings.probe_timeout)?;
        Ok(client.state().await?)
    }

    async fn lookup_mac(&self, serial: &Serial, mac: Option<&MacAddress>) -> Option<IpAddr> {
        let mac = mac?;
        match self.address_table.lookup(mac.as_str()).await {
            Ok(found) => found,
            Err(e) => {
                debug!(%serial, %mac, error = %e, "address table lookup failed");
                None
            }
        }
    }

    fn mark_online(
        &self,
        serial: &Serial,
        ip: IpAddr,
        state: &CameraState,
    ) -> Result<(), CoreError> {
        self.registry.update(serial, |cam| {
            cam.cohn_state = CohnState::Online;
            cam.cohn_ip = Some(ip);
            cam.battery_level = state.battery_percent().or(cam.battery_level);
            cam.storage_remaining_kb = state.space_remaining_kb().or(cam.storage_remaining_kb);
            cam.recording = state.is_encoding();
            cam.touch();
        })?;
        Ok(())
    }

    fn set_state(&self, serial: &Serial, state: CohnState) -> Result<(), CoreError> {
        self.registry.update(serial, |cam| cam.cohn_state = state)?;
        Ok(())
    }

    fn announce(
        &self,
        serial: &Serial,
        state: CohnState,
        ip: Option<IpAddr>,
        recovered_from: Option<IpAddr>,
    ) -> CohnStatus {
        let status = CohnStatus {
            state,
            ip,
            network: self.active_network(),
            recovered_from,
        };
        self.hub.publish(HubMessage::CohnStatus {
            serial: serial.clone(),
            status: status.clone(),
        });
        status
    }
}
