// ── Home-network credential store ──
//
// `cohn_credentials.json`: one credential per (network, camera) plus the
// active-network pointer. Every mutation clones the book, writes the
// clone, and only then swaps it in, so a failed write changes nothing.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::json_file::JsonFile;
use crate::error::CoreError;
use crate::model::{CohnCredential, CredentialBook, Serial};

pub struct CredentialStore {
    book: Mutex<CredentialBook>,
    /// Lock-free copy of `book.active_network` for hot-path reads.
    active: ArcSwapOption<String>,
    file: JsonFile<CredentialBook>,
}

impl CredentialStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let file = JsonFile::new(path);
        let book: CredentialBook = file.load().await?;
        info!(
            networks = book.networks.len(),
            active = book.active_network.as_deref().unwrap_or("-"),
            "credential store loaded"
        );
        Ok(Self {
            active: ArcSwapOption::from(book.active_network.clone().map(Arc::new)),
            book: Mutex::new(book),
            file,
        })
    }

    pub fn active_network(&self) -> Option<String> {
        self.active.load_full().map(|ssid| ssid.as_str().to_owned())
    }

    /// Credential for the active network.
    pub async fn get(&self, serial: &Serial) -> Option<CohnCredential> {
        let ssid = self.active_network()?;
        self.get_for(&ssid, serial).await
    }

    pub async fn get_for(&self, ssid: &str, serial: &Serial) -> Option<CohnCredential> {
        self.book
            .lock()
            .await
            .networks
            .get(ssid)
            .and_then(|cams| cams.get(serial))
            .cloned()
    }

    pub async fn put(
        &self,
        ssid: &str,
        serial: &Serial,
        credential: CohnCredential,
    ) -> Result<(), CoreError> {
        self.mutate(|book| {
            book.networks
                .entry(ssid.to_owned())
                .or_default()
                .insert(serial.clone(), credential);
        })
        .await?;
        debug!(%serial, ssid, "credential stored");
        Ok(())
    }

    /// Drop one network's credential. Returns what was removed.
    pub async fn remove(
        &self,
        ssid: &str,
        serial: &Serial,
    ) -> Result<Option<CohnCredential>, CoreError> {
        self.mutate(|book| {
            let cams = book.networks.get_mut(ssid)?;
            let removed = cams.remove(serial);
            if cams.is_empty() {
                book.networks.remove(ssid);
            }
            removed
        })
        .await
    }

    /// Drop a camera from every network. Returns the removed entries
    /// keyed by network so a failed follow-up can put them back.
    pub async fn remove_camera(
        &self,
        serial: &Serial,
    ) -> Result<Vec<(String, CohnCredential)>, CoreError> {
        self.mutate(|book| {
            let mut removed = Vec::new();
            book.networks.retain(|ssid, cams| {
                if let Some(credential) = cams.remove(serial) {
                    removed.push((ssid.clone(), credential));
                }
                !cams.is_empty()
            });
            removed
        })
        .await
    }

    /// Put back entries returned by [`Self::remove_camera`].
    pub async fn restore_camera(
        &self,
        serial: &Serial,
        entries: Vec<(String, CohnCredential)>,
    ) -> Result<(), CoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        self.mutate(|book| {
            for (ssid, credential) in entries {
                book.networks
                    .entry(ssid)
                    .or_default()
                    .insert(serial.clone(), credential);
            }
        })
        .await
    }

    /// Rewrite the stored address after the camera moved.
    pub async fn update_ip(
        &self,
        ssid: &str,
        serial: &Serial,
        ip: IpAddr,
    ) -> Result<(), CoreError> {
        let found = self
            .mutate(|book| {
                book.networks
                    .get_mut(ssid)
                    .and_then(|cams| cams.get_mut(serial))
                    .map(|cred| cred.ip_address = ip)
                    .is_some()
            })
            .await?;
        if found {
            Ok(())
        } else {
            Err(CoreError::NotProvisioned {
                serial: serial.to_string(),
                network: ssid.to_owned(),
            })
        }
    }

    pub async fn set_active(&self, ssid: Option<String>) -> Result<(), CoreError> {
        self.mutate(|book| book.active_network = ssid).await
    }

    /// `(ssid, provisioned serials)` for every network with credentials.
    pub async fn networks(&self) -> Vec<(String, Vec<Serial>)> {
        self.book
            .lock()
            .await
            .networks
            .iter()
            .map(|(ssid, cams)| (ssid.clone(), cams.keys().cloned().collect()))
            .collect()
    }

    async fn mutate<R>(&self, f: impl FnOnce(&mut CredentialBook) -> R) -> Result<R, CoreError> {
        let mut book = self.book.lock().await;
        let mut next = book.clone();
        let out = f(&mut next);
        self.file.save(&next).await?;
        self.active
            .store(next.active_network.clone().map(Arc::new));
        *book = next;
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;

    use chrono::Utc;

    use super::*;

    fn credential(last_octet: u8) -> CohnCredential {
        CohnCredential {
            ip_address: IpAddr::V4(Ipv4Addr::new(192, 168, 1, last_octet)),
            username: "gopro".into(),
            password: "pw".into(),
            certificate: String::new(),
            mac_address: None,
            provisioned_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn credentials_are_scoped_to_the_active_network() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("cohn.json")).await.unwrap();
        let serial = Serial::from("1234");
        store.put("Studio", &serial, credential(10)).await.unwrap();
        store.put("Home", &serial, credential(20)).await.unwrap();

        assert!(store.get(&serial).await.is_none());
        store.set_active(Some("Home".into())).await.unwrap();
        assert_eq!(
            store.get(&serial).await.unwrap().ip_address,
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))
        );
    }

    #[tokio::test]
    async fn remove_camera_clears_every_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohn.json");
        let store = CredentialStore::open(&path).await.unwrap();
        let serial = Serial::from("1234");
        store.put("Studio", &serial, credential(10)).await.unwrap();
        store.put("Home", &serial, credential(20)).await.unwrap();
        store.put("Home", &Serial::from("5678"), credential(21)).await.unwrap();

        assert_eq!(store.remove_camera(&serial).await.unwrap().len(), 2);
        let reopened = CredentialStore::open(&path).await.unwrap();
        let networks = reopened.networks().await;
        assert_eq!(networks, vec![("Home".to_owned(), vec![Serial::from("5678")])]);
    }

    #[tokio::test]
    async fn restore_camera_puts_removed_entries_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("cohn.json")).await.unwrap();
        let serial = Serial::from("1234");
        store.put("Studio", &serial, credential(10)).await.unwrap();
        store.put("Home", &serial, credential(20)).await.unwrap();

        let removed = store.remove_camera(&serial).await.unwrap();
        assert!(store.networks().await.is_empty());
        store.restore_camera(&serial, removed).await.unwrap();

        let home = store.get_for("Home", &serial).await.unwrap();
        assert_eq!(home.ip_address, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)));
        assert!(store.get_for("Studio", &serial).await.is_some());
    }

    #[tokio::test]
    async fn update_ip_requires_a_credential() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("cohn.json")).await.unwrap();
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
        let err = store
            .update_ip("Home", &Serial::from("1234"), ip)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotProvisioned { .. }));
    }
}
