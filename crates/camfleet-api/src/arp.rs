// ── Address-table lookup ──
//
// Resolves a camera's current IP from its hardware address using the
// host's neighbour cache. Read-only: nothing here sends traffic to the
// camera.

use std::net::IpAddr;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::Error;

/// One IP/MAC pair from the neighbour cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpEntry {
    pub ip: IpAddr,
    /// Normalized: lowercase, colon-separated, two digits per octet.
    pub mac: String,
}

/// Strategy for resolving hardware address → current IP.
#[async_trait]
pub trait AddressTable: Send + Sync {
    async fn lookup(&self, mac: &str) -> Result<Option<IpAddr>, Error>;
}

/// [`AddressTable`] over the system neighbour cache: `ip neigh show`,
/// falling back to `arp -a` where `ip` is missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAddressTable;

impl SystemAddressTable {
    pub async fn entries(&self) -> Result<Vec<ArpEntry>, Error> {
        match run("ip", &["neigh", "show"]).await {
            Ok(out) => Ok(parse_ip_neigh(&out)),
            Err(e) => {
                debug!(error = %e, "ip neigh unavailable, trying arp -a");
                let out = run("arp", &["-a"]).await?;
                Ok(parse_arp_a(&out))
            }
        }
    }
}

#[async_trait]
impl AddressTable for SystemAddressTable {
    async fn lookup(&self, mac: &str) -> Result<Option<IpAddr>, Error> {
        let wanted = normalize_mac(mac);
        let entries = self.entries().await?;
        Ok(entries.into_iter().find(|e| e.mac == wanted).map(|e| e.ip))
    }
}

async fn run(program: &str, args: &[&str]) -> Result<String, Error> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::AddressTable(format!("{program} failed to start: {e}")))?;
    if !output.status.success() {
        return Err(Error::AddressTable(format!(
            "{program} exited with {}",
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Normalize any common MAC spelling to `aa:bb:cc:dd:ee:ff`.
///
/// Handles dash separators, upper case, bare hex, and the zero-stripped
/// octets macOS prints (`a:b:c:d:e:f`).
pub fn normalize_mac(raw: &str) -> String {
    let raw = raw.trim().to_lowercase();
    if raw.contains(':') || raw.contains('-') {
        raw.split([':', '-'])
            .map(|octet| format!("{octet:0>2}"))
            .collect::<Vec<_>>()
            .join(":")
    } else {
        raw.as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).into_owned())
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Parse `ip neigh show` output:
///
/// ```text
/// 192.168.1.40 dev wlan0 lladdr 24:74:f7:aa:bb:cc REACHABLE
/// 192.168.1.41 dev wlan0  FAILED
/// ```
pub fn parse_ip_neigh(output: &str) -> Vec<ArpEntry> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let ip = parts.next()?.parse::<IpAddr>().ok()?;
            let mac = parts.skip_while(|p| *p != "lladdr").nth(1)?;
            Some(ArpEntry {
                ip,
                mac: normalize_mac(mac),
            })
        })
        .collect()
}

/// Parse BSD/macOS `arp -a` output:
///
/// ```text
/// ? (192.168.1.40) at 24:74:f7:aa:bb:cc on en0 ifscope [ethernet]
/// ? (192.168.1.41) at (incomplete) on en0 ifscope [ethernet]
/// ```
pub fn parse_arp_a(output: &str) -> Vec<ArpEntry> {
    output
        .lines()
        .filter_map(|line| {
            let start = line.find('(')?;
            let end = line.get(start..)?.find(')')? + start;
            let ip = line.get(start + 1..end)?.parse::<IpAddr>().ok()?;
            let rest = line.get(end + 1..)?;
            let mac = rest.split_whitespace().skip_while(|p| *p != "at").nth(1)?;
            if !mac.contains(':') {
                return None;
            }
            Some(ArpEntry {
                ip,
                mac: normalize_mac(mac),
            })
        })
        .collect()
}
