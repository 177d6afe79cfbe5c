//! Home-network (COHN) command handlers.

use camfleet_core::{
    CohnStatus, Command as CoreCommand, CommandResult, Fleet, NetworkProfile, Serial,
};
use tabled::Tabled;

use crate::cli::{GlobalOpts, NetworkArgs, NetworkCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct NetworkRow {
    #[tabled(rename = "SSID")]
    ssid: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Password")]
    joinable: String,
    #[tabled(rename = "Cameras")]
    cameras: String,
}

impl From<&NetworkProfile> for NetworkRow {
    fn from(n: &NetworkProfile) -> Self {
        Self {
            ssid: n.ssid.clone(),
            active: if n.active { "*" } else { "" }.into(),
            joinable: if n.joinable { "configured" } else { "missing" }.into(),
            cameras: if n.cameras.is_empty() {
                "-".into()
            } else {
                n.cameras
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            },
        }
    }
}

fn status_line(s: &CohnStatus) -> String {
    let mut line = s.state.to_string();
    if let Some(ip) = s.ip {
        line.push_str(&format!(" at {ip}"));
    }
    if let Some(old) = s.recovered_from {
        line.push_str(&format!(" (moved from {old})"));
    }
    line
}

fn status_detail(s: &CohnStatus) -> String {
    output::detail_lines(&[
        ("State:", s.state.to_string()),
        ("IP:", output::or_dash(s.ip)),
        ("Network:", output::or_dash(s.network.as_deref())),
        ("Recovered from:", output::or_dash(s.recovered_from)),
    ])
}

fn print_status(global: &GlobalOpts, status: &CohnStatus) -> Result<(), CliError> {
    let out = output::render_single(global.output, status, status_detail, |s| {
        s.state.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn print_networks(global: &GlobalOpts, networks: &[NetworkProfile]) -> Result<(), CliError> {
    let out = output::render_list(
        global.output,
        networks,
        |n| NetworkRow::from(n),
        |n| n.ssid.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle(
    fleet: &Fleet,
    args: NetworkArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        NetworkCommand::Provision { serial } => {
            util::notice(
                global,
                format!("Provisioning camera {serial}; this can take a few minutes..."),
            );
            let result = fleet
                .execute(CoreCommand::Provision {
                    serial: Serial::new(&serial),
                })
                .await?;
            if let CommandResult::Cohn(status) = result {
                print_status(global, &status)?;
            }
            Ok(())
        }

        NetworkCommand::Unprovision { serial } => {
            if !util::confirm(
                &format!("Forget camera {serial}'s credential for the active network?"),
                "network unprovision",
                global.yes,
            )? {
                return Ok(());
            }
            fleet
                .execute(CoreCommand::RemoveProvisioning {
                    serial: Serial::new(&serial),
                })
                .await?;
            util::notice(global, format!("Camera {serial} unprovisioned"));
            Ok(())
        }

        NetworkCommand::Status { serial: Some(serial) } => {
            let status = fleet.cohn().status(&Serial::new(&serial)).await?;
            print_status(global, &status)
        }

        NetworkCommand::Status { serial: None } => {
            let result = fleet.cohn().status_all().await;
            util::finish_fleet(global, &result, status_line)
        }

        NetworkCommand::Reenable { serial } => {
            let result = fleet
                .execute(CoreCommand::Reenable {
                    serial: serial.map(Serial::from),
                })
                .await?;
            match result {
                CommandResult::Cohn(status) => print_status(global, &status),
                CommandResult::CohnFleet(result) => {
                    if result.is_empty() {
                        util::notice(global, "No offline cameras");
                    }
                    util::finish_fleet(global, &result, status_line)
                }
                _ => Ok(()),
            }
        }

        NetworkCommand::SetIp { serial, ip } => {
            let result = fleet
                .execute(CoreCommand::SetCohnIp {
                    serial: Serial::new(&serial),
                    ip,
                })
                .await?;
            if let CommandResult::Cohn(status) = result {
                print_status(global, &status)?;
            }
            Ok(())
        }

        NetworkCommand::List => print_networks(global, &fleet.cohn().networks().await),

        NetworkCommand::Switch { ssid } => {
            let result = fleet.execute(CoreCommand::SwitchNetwork { ssid }).await?;
            if let CommandResult::Networks(networks) = result {
                if let Some(active) = networks.iter().find(|n| n.active) {
                    util::notice(global, format!("Active network: {}", active.ssid));
                }
                print_networks(global, &networks)?;
            }
            Ok(())
        }
    }
}
