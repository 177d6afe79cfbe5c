//! Camera command handlers.

use std::time::Duration;

use bytesize::ByteSize;
use camfleet_core::{
    Camera, CameraHealth, CohnState, Command as CoreCommand, CommandResult, DiscoveredCamera,
    Fleet, Serial,
};
use tabled::Tabled;

use crate::cli::{CamerasArgs, CamerasCommand, GlobalOpts};
use crate::error::CliError;
use crate::output::{self, Tone};

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct CameraRow {
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Link")]
    link: String,
    #[tabled(rename = "Home Net")]
    cohn: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Rec")]
    recording: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Free")]
    storage: String,
}

impl CameraRow {
    fn new(c: &Camera, color: bool) -> Self {
        Self {
            serial: c.serial.to_string(),
            name: c.name.clone(),
            link: if c.connected {
                output::paint("connected", Tone::Good, color)
            } else {
                output::paint("-", Tone::Dim, color)
            },
            cohn: output::paint(c.cohn_state.to_string(), cohn_tone(c.cohn_state), color),
            ip: output::or_dash(c.cohn_ip),
            recording: if c.recording {
                output::paint("REC", Tone::Bad, color)
            } else {
                String::new()
            },
            battery: battery(c.battery_level),
            storage: storage(c.storage_remaining_kb),
        }
    }
}

#[derive(Tabled)]
struct DiscoveredRow {
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Advertised")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "RSSI")]
    rssi: String,
}

impl From<&DiscoveredCamera> for DiscoveredRow {
    fn from(d: &DiscoveredCamera) -> Self {
        Self {
            serial: d.serial.to_string(),
            name: d.name.clone(),
            address: d.address.clone(),
            rssi: d.rssi.map_or_else(|| "-".into(), |r| format!("{r} dBm")),
        }
    }
}

fn cohn_tone(state: CohnState) -> Tone {
    match state {
        CohnState::Online => Tone::Good,
        CohnState::Provisioning => Tone::Warn,
        CohnState::Offline => Tone::Bad,
        CohnState::Unprovisioned => Tone::Dim,
    }
}

fn battery(level: Option<u8>) -> String {
    level.map_or_else(|| "-".into(), |b| format!("{b}%"))
}

fn storage(kb: Option<u64>) -> String {
    kb.map_or_else(|| "-".into(), |kb| ByteSize::kib(kb).to_string())
}

fn detail(c: &Camera) -> String {
    output::detail_lines(&[
        ("Serial:", c.serial.to_string()),
        ("Name:", c.name.clone()),
        ("Address:", output::or_dash(c.address.as_deref())),
        ("Connected:", c.connected.to_string()),
        ("Recording:", c.recording.to_string()),
        ("Home network:", c.cohn_state.to_string()),
        ("IP:", output::or_dash(c.cohn_ip)),
        ("AP SSID:", output::or_dash(c.wifi_ssid.as_deref())),
        ("Battery:", battery(c.battery_level)),
        ("Free space:", storage(c.storage_remaining_kb)),
        (
            "Last seen:",
            output::or_dash(c.last_seen.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC"))),
        ),
    ])
}

fn health_detail(h: &CameraHealth) -> String {
    format!(
        "battery {}, {} free",
        battery(h.battery_level),
        storage(h.storage_remaining_kb)
    )
}

fn print_camera(global: &GlobalOpts, camera: &Camera) -> Result<(), CliError> {
    let out = output::render_single(global.output, camera, detail, |c| c.serial.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    fleet: &Fleet,
    args: CamerasArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        CamerasCommand::List => {
            let snap = fleet.cameras_snapshot();
            let cameras: Vec<Camera> = snap.iter().map(|c| c.as_ref().clone()).collect();
            let color = output::should_color(global.color);
            let out = output::render_list(
                global.output,
                &cameras,
                |c| CameraRow::new(c, color),
                |c| c.serial.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CamerasCommand::Get { serial } => {
            let camera = fleet.registry().require(&Serial::new(&serial))?;
            print_camera(global, &camera)
        }

        CamerasCommand::Add {
            serial,
            name,
            address,
            ap_ssid,
            ap_password,
        } => {
            let serial = Serial::new(&serial);
            let name = name.unwrap_or_else(|| format!("GoPro {serial}"));
            let result = fleet
                .execute(CoreCommand::AddCamera {
                    serial,
                    name,
                    address,
                    wifi_ssid: ap_ssid,
                    wifi_password: ap_password,
                })
                .await?;
            if let CommandResult::Camera(camera) = result {
                util::notice(global, format!("Added camera {}", camera.serial));
                print_camera(global, &camera)?;
            }
            Ok(())
        }

        CamerasCommand::Remove { serial } => {
            if !util::confirm(
                &format!("Remove camera {serial} and its home-network credentials?"),
                "cameras remove",
                global.yes,
            )? {
                return Ok(());
            }
            fleet
                .execute(CoreCommand::RemoveCamera {
                    serial: Serial::new(&serial),
                })
                .await?;
            util::notice(global, format!("Removed camera {serial}"));
            Ok(())
        }

        CamerasCommand::Rename { serial, name } => {
            let result = fleet
                .execute(CoreCommand::RenameCamera {
                    serial: Serial::new(&serial),
                    name,
                })
                .await?;
            if let CommandResult::Camera(camera) = result {
                util::notice(global, format!("Camera {} is now '{}'", camera.serial, camera.name));
            }
            Ok(())
        }

        CamerasCommand::SetAp {
            serial,
            ssid,
            password,
        } => {
            let password = match (&ssid, password) {
                (Some(_), None) => Some(
                    rpassword::prompt_password("Access point password: ")
                        .map_err(CliError::Io)?,
                ),
                (_, password) => password,
            };
            fleet
                .execute(CoreCommand::SetAccessPoint {
                    serial: Serial::new(&serial),
                    ssid: ssid.clone(),
                    password,
                })
                .await?;
            match ssid {
                Some(ssid) => util::notice(global, format!("Camera {serial} access point: {ssid}")),
                None => util::notice(global, format!("Cleared access point login for {serial}")),
            }
            Ok(())
        }

        CamerasCommand::Discover { timeout } => {
            let scan_for = timeout.map_or(fleet.config().discover_timeout, Duration::from_secs);
            util::notice(global, format!("Scanning for {}s...", scan_for.as_secs()));
            let found = fleet.connections().discover(scan_for).await?;
            let out = output::render_list(
                global.output,
                &found,
                |d| DiscoveredRow::from(d),
                |d| d.serial.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            if found.is_empty() {
                util::notice(global, "No unregistered cameras found");
            }
            Ok(())
        }

        CamerasCommand::Connect { serial } => {
            let result = fleet
                .execute(CoreCommand::Connect {
                    serial: serial.map(Serial::from),
                })
                .await?;
            match result {
                CommandResult::Connections(result) => {
                    util::finish_fleet(global, &result, |()| "connected".into())
                }
                _ => Ok(()),
            }
        }

        CamerasCommand::Disconnect { serial } => {
            let result = fleet
                .execute(CoreCommand::Disconnect {
                    serial: serial.map(Serial::from),
                })
                .await?;
            match result {
                CommandResult::Connections(result) => {
                    util::finish_fleet(global, &result, |()| "disconnected".into())
                }
                _ => Ok(()),
            }
        }

        CamerasCommand::Check => {
            let result = fleet.execute(CoreCommand::CheckConnections).await?;
            match result {
                CommandResult::ConnectionCheck(result) => util::finish_fleet(global, &result, |up| {
                    if *up { "linked" } else { "not connected" }.into()
                }),
                _ => Ok(()),
            }
        }

        CamerasCommand::Status => {
            let result = fleet.health().query_all().await;
            util::finish_fleet(global, &result, health_detail)
        }
    }
}
