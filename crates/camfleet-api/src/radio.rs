// ── Host WiFi radio ──
//
// The controlling machine has a single WiFi radio. Joining a camera's
// access point takes it off the home network until it rejoins.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tracing::debug;

use crate::error::Error;

/// Join/leave control over the host's WiFi interface.
#[async_trait]
pub trait WifiRadio: Send + Sync {
    /// SSID the radio is associated with, if any.
    async fn current_network(&self) -> Result<Option<String>, Error>;

    async fn join(&self, ssid: &str, password: &SecretString) -> Result<(), Error>;

    async fn leave(&self, ssid: &str) -> Result<(), Error>;
}

/// [`WifiRadio`] driven through NetworkManager's `nmcli`.
#[derive(Debug, Clone, Default)]
pub struct NmcliRadio {
    interface: Option<String>,
}

impl NmcliRadio {
    pub fn new(interface: Option<String>) -> Self {
        Self { interface }
    }

    async fn run(&self, args: &[&str]) -> Result<String, Error> {
        debug!(?args, "nmcli");
        let output = Command::new("nmcli")
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Radio(format!("failed to run nmcli: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Radio(format!(
                "nmcli {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl WifiRadio for NmcliRadio {
    async fn current_network(&self) -> Result<Option<String>, Error> {
        let out = self.run(&["-t", "-f", "ACTIVE,SSID", "dev", "wifi"]).await?;
        Ok(parse_active_ssid(&out))
    }

    async fn join(&self, ssid: &str, password: &SecretString) -> Result<(), Error> {
        let mut args = vec![
            "dev",
            "wifi",
            "connect",
            ssid,
            "password",
            password.expose_secret(),
        ];
        if let Some(ifname) = self.interface.as_deref() {
            args.extend(["ifname", ifname]);
        }
        self.run(&args).await.map(drop)
    }

    async fn leave(&self, ssid: &str) -> Result<(), Error> {
        self.run(&["connection", "down", "id", ssid]).await.map(drop)
    }
}

/// Pick the active SSID out of `nmcli -t -f ACTIVE,SSID dev wifi` output.
/// Terse mode escapes `:` inside values as `\:`.
pub fn parse_active_ssid(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| line.strip_prefix("yes:"))
        .map(|ssid| ssid.replace("\\:", ":"))
        .find(|ssid| !ssid.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_active_line() {
        let out = "no:Neighbours\nyes:Studio WiFi\nno:GP24501234\n";
        assert_eq!(parse_active_ssid(out).as_deref(), Some("Studio WiFi"));
    }

    #[test]
    fn unescapes_colons() {
        assert_eq!(parse_active_ssid("yes:a\\:b\n").as_deref(), Some("a:b"));
    }

    #[test]
    fn none_when_disassociated() {
        assert_eq!(parse_active_ssid("no:Foo\nno:Bar\n"), None);
    }
}
